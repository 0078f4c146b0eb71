//! Decoding of the `tupleList` payload.
//!
//! The payload is a text block of newline-separated records such as
//! `地表面,12.34`. Only the second comma-separated field is used. Text may
//! arrive in several chunks, so lines are assembled incrementally and decoded
//! as soon as they are complete.

use std::iter;

/// Outcome of matching the decoded payload length to the grid size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    Exact,
    /// Tail padded with this many NODATA samples.
    Padded(usize),
    /// This many trailing samples dropped.
    Truncated(usize),
}

/// Incremental line decoder for the sample payload.
#[derive(Debug)]
pub struct SampleDecoder {
    nodata: f32,
    carry: String,
    samples: Vec<f32>,
    // Blank lines are only samples when a record follows them.
    pending_blank: usize,
    seen_record: bool,
}

impl SampleDecoder {
    pub fn new(nodata: f32) -> Self {
        Self {
            nodata,
            carry: String::new(),
            samples: Vec::new(),
            pending_blank: 0,
            seen_record: false,
        }
    }

    /// Feed the next chunk of payload text.
    pub fn feed(&mut self, chunk: &str) {
        let mut rest = chunk;
        while let Some(pos) = rest.find('\n') {
            let (head, tail) = rest.split_at(pos);
            if self.carry.is_empty() {
                self.push_line(head);
            } else {
                self.carry.push_str(head);
                let line = std::mem::take(&mut self.carry);
                self.push_line(&line);
            }
            rest = &tail[1..];
        }
        self.carry.push_str(rest);
    }

    /// Number of samples decoded so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Flush the last partial line and return all samples.
    pub fn finish(mut self) -> Vec<f32> {
        let line = std::mem::take(&mut self.carry);
        self.push_line(&line);
        self.samples
    }

    fn push_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            if self.seen_record {
                self.pending_blank += 1;
            }
            return;
        }
        let blanks = std::mem::take(&mut self.pending_blank);
        self.samples.extend(iter::repeat(self.nodata).take(blanks));
        self.seen_record = true;
        self.samples.push(decode_sample(line, self.nodata));
    }
}

/// Decode one payload record; anything unparsable becomes `nodata`.
pub fn decode_sample(line: &str, nodata: f32) -> f32 {
    let mut fields = line.split(',');
    let _kind = fields.next();
    match fields.next() {
        Some(value) => value.trim().parse::<f32>().unwrap_or(nodata),
        None => nodata,
    }
}

/// Pad with `nodata` or truncate so that `samples.len() == expected`.
pub fn reconcile(samples: &mut Vec<f32>, expected: usize, nodata: f32) -> Reconciled {
    let len = samples.len();
    if len < expected {
        samples.resize(expected, nodata);
        Reconciled::Padded(expected - len)
    } else if len > expected {
        samples.truncate(expected);
        Reconciled::Truncated(len - expected)
    } else {
        Reconciled::Exact
    }
}

pub fn is_nodata(value: f32, nodata: f32) -> bool {
    value == nodata || (nodata.is_nan() && value.is_nan())
}

/// Replace every NODATA sample with sea level (0.0).
pub fn substitute_sea_level(samples: &mut [f32], nodata: f32) {
    for v in samples.iter_mut().filter(|v| is_nodata(**v, nodata)) {
        *v = 0.0;
    }
}
