//! Single-band float32 GeoTIFF output in EPSG:4326.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ndarray::ArrayView2;
use tempfile::NamedTempFile;
use tiff::encoder::{colortype, compression::Lzw, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::{debug, info};

use super::{MemorySink, RasterSink};
use crate::error::SinkError;
use crate::mosaic::MosaicSpec;

/// Target size of one LZW strip before compression.
const STRIP_BYTES: usize = 256 * 1024;

#[rustfmt::skip]
const GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3,         // directory version 1.1.0, 3 keys
    1024, 0, 1, 2,      // GTModelType = geographic
    1025, 0, 1, 1,      // GTRasterType = PixelIsArea
    2048, 0, 1, 4326,   // GeographicType = WGS 84
];

/// Process-wide writer settings, built once before the first sink.
struct WriterProfile {
    geo_keys: Vec<u16>,
    temp_prefix: String,
}

fn profile() -> &'static WriterProfile {
    static PROFILE: OnceLock<WriterProfile> = OnceLock::new();
    PROFILE.get_or_init(|| {
        debug!("Initialising GeoTIFF writer");
        WriterProfile {
            geo_keys: GEO_KEYS.to_vec(),
            temp_prefix: format!(".{}-", env!("CARGO_PKG_NAME")),
        }
    })
}

/// Classic TIFF offsets are 32-bit; larger rasters need BigTIFF.
fn needs_bigtiff(width: usize, height: usize) -> bool {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
        .map_or(true, |bytes| bytes as u64 > u64::from(u32::MAX))
}

/// Georeferencing written alongside the samples.
#[derive(Clone, Copy, Debug)]
struct GeoRef {
    pixel_size: f64,
    west: f64,
    north: f64,
    nodata: f32,
}

fn encode<W, K>(
    mut encoder: TiffEncoder<W, K>,
    (width, height): (u32, u32),
    georef: GeoRef,
    samples: &[f32],
) -> Result<(), SinkError>
where
    W: Write + Seek,
    K: TiffKind,
{
    let row_bytes = (width as usize).max(1) * std::mem::size_of::<f32>();
    let rows_per_strip = (STRIP_BYTES / row_bytes).clamp(1, height.max(1) as usize) as u32;
    // GDAL reads the NODATA tag as ASCII text.
    let nodata = georef.nodata.to_string();

    let mut image = encoder
        .new_image_with_compression::<colortype::Gray32Float, _>(width, height, Lzw::default())?;
    let dir = image.encoder();
    dir.write_tag(
        Tag::ModelPixelScaleTag,
        &[georef.pixel_size, georef.pixel_size, 0.0][..],
    )?;
    dir.write_tag(
        Tag::ModelTiepointTag,
        &[0.0, 0.0, 0.0, georef.west, georef.north, 0.0][..],
    )?;
    dir.write_tag(Tag::GeoKeyDirectoryTag, &profile().geo_keys[..])?;
    dir.write_tag(Tag::GdalNodata, nodata.as_str())?;
    image.rows_per_strip(rows_per_strip)?;
    image.write_data(samples)?;
    Ok(())
}

/// Buffers the mosaic in memory and encodes it on [`GeoTiffSink::finish`].
///
/// The file is written to a temporary path beside `path` and only renamed
/// into place once encoding succeeds, so a failed run leaves no partial output.
pub struct GeoTiffSink {
    path: PathBuf,
    file: NamedTempFile,
    buffer: MemorySink,
    georef: GeoRef,
}

impl GeoTiffSink {
    /// Validate and allocate the raster, then open the temporary file.
    ///
    /// Nothing is created on disk when the raster cannot be held.
    pub fn create(path: impl AsRef<Path>, spec: &MosaicSpec) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let (width, height) = (spec.width, spec.height);
        if u32::try_from(width).is_err() || u32::try_from(height).is_err() {
            return Err(SinkError::InvalidSize { width, height });
        }
        let buffer = MemorySink::for_spec(spec)?;

        let profile = profile();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file = tempfile::Builder::new()
            .prefix(&profile.temp_prefix)
            .suffix(".tif.part")
            .tempfile_in(&dir)
            .map_err(|source| SinkError::Create {
                path: path.clone(),
                source,
            })?;

        let origin = spec.origin();
        Ok(Self {
            path,
            file,
            buffer,
            georef: GeoRef {
                pixel_size: spec.pixel_size,
                west: origin.lon,
                north: origin.lat,
                nodata: spec.nodata,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode the raster and move it to its final path.
    pub fn finish(mut self) -> Result<PathBuf, SinkError> {
        let (width, height) = self.buffer.size();
        let invalid = || SinkError::InvalidSize { width, height };
        let shape = (
            u32::try_from(width).map_err(|_| invalid())?,
            u32::try_from(height).map_err(|_| invalid())?,
        );
        let samples = self.buffer.data().as_slice().ok_or_else(invalid)?;

        let mut writer = BufWriter::new(self.file.as_file_mut());
        if needs_bigtiff(width, height) {
            debug!(width, height, "Writing BigTIFF");
            encode(TiffEncoder::new_big(&mut writer)?, shape, self.georef, samples)?;
        } else {
            encode(TiffEncoder::new(&mut writer)?, shape, self.georef, samples)?;
        }
        writer.flush().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;
        drop(writer);

        self.file.as_file().sync_all().map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })?;
        let Self { path, file, .. } = self;
        let _: File = file.persist(&path)?;
        info!(path = %path.display(), width, height, "Wrote GeoTIFF");
        Ok(path)
    }
}

impl RasterSink for GeoTiffSink {
    fn size(&self) -> (usize, usize) {
        self.buffer.size()
    }

    fn write_block(
        &mut self,
        offset: (usize, usize),
        block: ArrayView2<'_, f32>,
    ) -> Result<(), SinkError> {
        self.buffer.write_block(offset, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::LatLon;
    use ndarray::array;
    use std::fs;
    use std::io::Cursor;
    use tiff::decoder::{Decoder, DecodingResult};

    fn spec() -> MosaicSpec {
        MosaicSpec {
            lower: LatLon::new(35.0, 139.0),
            upper: LatLon::new(35.5, 140.5),
            pixel_size: 0.5,
            width: 3,
            height: 1,
            nodata: -9999.0,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mosaic.tif");
        let mut sink = GeoTiffSink::create(&out, &spec()).unwrap();
        assert_eq!(sink.size(), (3, 1));
        sink.write_block((1, 0), array![[12.5f32]].view()).unwrap();
        assert_eq!(sink.finish().unwrap(), out);

        let mut decoder = Decoder::new(fs::File::open(&out).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 1));
        match decoder.read_image().unwrap() {
            DecodingResult::F32(values) => assert_eq!(values, vec![-9999.0, 12.5, -9999.0]),
            other => panic!("unexpected sample type: {other:?}"),
        }

        assert_georeferenced(&mut decoder);
    }

    fn assert_georeferenced<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) {
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(scale, vec![0.5, 0.5, 0.0]);
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_eq!(tiepoint, vec![0.0, 0.0, 0.0, 139.0, 35.5, 0.0]);
        let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).unwrap();
        assert_eq!(keys, GEO_KEYS.to_vec());
        let nodata = decoder.get_tag_ascii_string(Tag::GdalNodata).unwrap();
        assert_eq!(nodata.trim_end_matches('\0'), "-9999");
    }

    #[test]
    fn test_bigtiff_threshold() {
        assert!(!needs_bigtiff(3, 1));
        // 32768 x 32767 x 4 bytes is just under 4 GiB.
        assert!(!needs_bigtiff(32_768, 32_767));
        assert!(needs_bigtiff(32_768, 32_768));
        assert!(needs_bigtiff(usize::MAX, 2));
    }

    #[test]
    fn test_bigtiff_encoding_reads_back() {
        let georef = GeoRef {
            pixel_size: 0.5,
            west: 139.0,
            north: 35.5,
            nodata: -9999.0,
        };
        let mut bytes = Cursor::new(Vec::new());
        encode(
            TiffEncoder::new_big(&mut bytes).unwrap(),
            (3, 1),
            georef,
            &[1.0, 2.0, 3.0],
        )
        .unwrap();

        bytes.set_position(0);
        let mut decoder = Decoder::new(bytes).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 1));
        match decoder.read_image().unwrap() {
            DecodingResult::F32(values) => assert_eq!(values, vec![1.0, 2.0, 3.0]),
            other => panic!("unexpected sample type: {other:?}"),
        }
        assert_georeferenced(&mut decoder);
    }

    #[test]
    fn test_oversized_raster_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mosaic.tif");
        for (width, height) in [
            // Wider than a TIFF can describe.
            (u32::MAX as usize + 1, 1),
            // Describable, but the buffer cannot be allocated.
            (u32::MAX as usize, u32::MAX as usize),
        ] {
            let spec = MosaicSpec {
                width,
                height,
                ..spec()
            };
            assert!(matches!(
                GeoTiffSink::create(&out, &spec),
                Err(SinkError::InvalidSize { .. })
            ));
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_no_output_until_finish() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mosaic.tif");
        let sink = GeoTiffSink::create(&out, &spec()).unwrap();
        assert_eq!(sink.path(), out.as_path());
        assert!(!out.exists());
        drop(sink);
        assert!(!out.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("no/such/dir/mosaic.tif");
        assert!(matches!(
            GeoTiffSink::create(&out, &spec()),
            Err(SinkError::Create { .. })
        ));
    }
}
