//! Streaming parser for FGD DEM GML tile documents.
//!
//! The document is consumed as a flat event stream; no tree is built. Three
//! records are picked out, each at most once and in any order:
//!
//! * identifier: `mesh` (or `code`) inside `DEM`
//! * coverage geometry: `lowerCorner`, `upperCorner` and `high` inside `coverage`
//! * sample payload: `tupleList`
//!
//! Broken markup is tolerated. Mismatched end tags are ignored, undecodable
//! text is taken raw, and a syntax error that stops the reader ends the scan
//! with whatever was collected up to that point.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use super::samples::{self, Reconciled, SampleDecoder};
use super::{LatLon, ParseOptions, ParsedTile, TileMeta};
use crate::error::TileError;

const READ_BUFFER: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Mesh,
    LowerCorner,
    UpperCorner,
    High,
    TupleList,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"mesh" | b"code" => Some(Self::Mesh),
            b"lowerCorner" => Some(Self::LowerCorner),
            b"upperCorner" => Some(Self::UpperCorner),
            b"high" => Some(Self::High),
            b"tupleList" => Some(Self::TupleList),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::LowerCorner => "lowerCorner",
            Self::UpperCorner => "upperCorner",
            Self::High => "high",
            Self::TupleList => "tupleList",
        }
    }
}

/// Parse the tile document at `path`.
pub fn parse_tile(path: &Path, opts: &ParseOptions) -> Result<ParsedTile, TileError> {
    let file = File::open(path).map_err(|source| TileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_reader(BufReader::with_capacity(READ_BUFFER, file), path, opts)
}

/// Parse a tile document from any buffered reader. `source` names the
/// document in errors and logs.
pub fn parse_reader<R: BufRead>(
    reader: R,
    source: &Path,
    opts: &ParseOptions,
) -> Result<ParsedTile, TileError> {
    let mut scanner = Scanner::new(opts.nodata);
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    loop {
        let before = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => scanner.start(e.local_name().as_ref(), false),
            Ok(Event::Empty(e)) => scanner.start(e.local_name().as_ref(), true),
            Ok(Event::End(e)) => scanner.end(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                if scanner.capturing() {
                    match t.unescape() {
                        Ok(text) => scanner.text(&text),
                        Err(_) => scanner.text(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if scanner.capturing() {
                    scanner.text(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                let stalled = reader.buffer_position() == before;
                warn!(
                    source = %source.display(),
                    error = %e,
                    "Recovering from malformed XML"
                );
                if stalled {
                    break;
                }
            }
        }
        buf.clear();
    }

    scanner.finish(source, opts)
}

#[derive(Debug)]
struct Scanner {
    in_dem: bool,
    in_coverage: bool,
    capture: Option<Field>,
    text: String,
    mesh: Option<String>,
    lower: Option<String>,
    upper: Option<String>,
    high: Option<String>,
    payload: Option<SampleDecoder>,
    payload_closed: bool,
    nodata: f32,
}

impl Scanner {
    fn new(nodata: f32) -> Self {
        Self {
            in_dem: false,
            in_coverage: false,
            capture: None,
            text: String::new(),
            mesh: None,
            lower: None,
            upper: None,
            high: None,
            payload: None,
            payload_closed: false,
            nodata,
        }
    }

    fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn start(&mut self, name: &[u8], empty: bool) {
        // A new element inside a scalar field means its end tag was lost.
        if matches!(self.capture, Some(f) if f != Field::TupleList) {
            self.commit();
        }
        match name {
            b"DEM" => self.in_dem = !empty,
            b"coverage" => self.in_coverage = !empty,
            _ => {}
        }
        let Some(field) = Field::from_local_name(name) else {
            return;
        };
        if !self.accepts(field) {
            debug!(field = field.name(), "Ignoring repeated or out-of-place record");
            return;
        }
        if field == Field::TupleList {
            self.payload = Some(SampleDecoder::new(self.nodata));
        }
        if empty {
            self.capture = Some(field);
            self.commit();
        } else {
            self.capture = Some(field);
        }
    }

    fn accepts(&self, field: Field) -> bool {
        match field {
            Field::Mesh => self.in_dem && self.mesh.is_none(),
            Field::LowerCorner => self.in_coverage && self.lower.is_none(),
            Field::UpperCorner => self.in_coverage && self.upper.is_none(),
            Field::High => self.in_coverage && self.high.is_none(),
            Field::TupleList => self.payload.is_none(),
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"DEM" => self.in_dem = false,
            b"coverage" => self.in_coverage = false,
            _ => {}
        }
        if let Some(field) = self.capture {
            if Field::from_local_name(name) == Some(field) {
                self.commit();
            }
        }
    }

    fn text(&mut self, text: &str) {
        match self.capture {
            Some(Field::TupleList) => {
                if let Some(decoder) = self.payload.as_mut() {
                    decoder.feed(text);
                }
            }
            Some(_) => self.text.push_str(text),
            None => {}
        }
    }

    fn commit(&mut self) {
        let Some(field) = self.capture.take() else {
            return;
        };
        let text = std::mem::take(&mut self.text);
        match field {
            Field::Mesh => self.mesh = Some(text),
            Field::LowerCorner => self.lower = Some(text),
            Field::UpperCorner => self.upper = Some(text),
            Field::High => self.high = Some(text),
            Field::TupleList => self.payload_closed = true,
        }
    }

    fn finish(mut self, source: &Path, opts: &ParseOptions) -> Result<ParsedTile, TileError> {
        // Whatever was open when the stream ended still counts.
        self.commit();

        let missing = |field| TileError::MissingRequiredField {
            path: source.to_path_buf(),
            field,
        };
        let lower = self.lower.as_deref().ok_or_else(|| missing("lowerCorner"))?;
        let upper = self.upper.as_deref().ok_or_else(|| missing("upperCorner"))?;
        let high = self.high.as_deref().ok_or_else(|| missing("high"))?;
        let payload = self.payload.take().ok_or_else(|| missing("tupleList"))?;
        if !self.payload_closed {
            warn!(source = %source.display(), "Sample payload is not terminated");
        }

        let (lower_lat, lower_lon) = parse_pair::<f64>(lower, "lowerCorner", source)?;
        let (upper_lat, upper_lon) = parse_pair::<f64>(upper, "upperCorner", source)?;
        if !(upper_lat > lower_lat && upper_lon > lower_lon) {
            return Err(TileError::DegenerateCoverage {
                path: source.to_path_buf(),
            });
        }

        // `high` is the last valid (x, y) index, i.e. (cols - 1, rows - 1).
        let (high_x, high_y) = parse_pair::<usize>(high, "high", source)?;
        let malformed_high = || TileError::MalformedField {
            path: source.to_path_buf(),
            field: "high",
            value: high.trim().to_string(),
        };
        let cols = high_x.checked_add(1).ok_or_else(malformed_high)?;
        let rows = high_y.checked_add(1).ok_or_else(malformed_high)?;
        let expected = rows.checked_mul(cols).ok_or_else(malformed_high)?;

        let mut values = payload.finish();
        // A declared grid too large to hold is rejected rather than aborting.
        values
            .try_reserve_exact(expected.saturating_sub(values.len()))
            .map_err(|_| malformed_high())?;
        match samples::reconcile(&mut values, expected, opts.nodata) {
            Reconciled::Exact => {}
            Reconciled::Padded(n) => {
                debug!(source = %source.display(), padded = n, "Short payload padded with NODATA");
            }
            Reconciled::Truncated(n) => {
                warn!(source = %source.display(), dropped = n, "Over-long payload truncated");
            }
        }
        if opts.sea_at_zero {
            samples::substitute_sea_level(&mut values, opts.nodata);
        }
        let grid = Array2::from_shape_vec((rows, cols), values).map_err(|_| malformed_high())?;

        let mesh_id = self
            .mesh
            .as_deref()
            .and_then(|m| m.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let meta = TileMeta {
            mesh_id,
            lower: LatLon::new(lower_lat, lower_lon),
            upper: LatLon::new(upper_lat, upper_lon),
            grid_size: (rows, cols),
        };
        debug!(
            source = %source.display(),
            mesh_id,
            rows,
            cols,
            "Parsed tile"
        );
        Ok(ParsedTile { meta, grid })
    }
}

fn parse_pair<T: std::str::FromStr>(
    text: &str,
    field: &'static str,
    source: &Path,
) -> Result<(T, T), TileError> {
    let malformed = || TileError::MalformedField {
        path: source.to_path_buf(),
        field,
        value: text.trim().to_string(),
    };
    let mut parts = text.split_whitespace().map(str::parse::<T>);
    match (parts.next(), parts.next()) {
        (Some(Ok(a)), Some(Ok(b))) => Ok((a, b)),
        _ => Err(malformed()),
    }
}
