use crate::error::MosaicError;

/// A 2D affine geotransform between mosaic pixels and geographic degrees.
///
/// Maps pixel coordinates (col, row) to (lon, lat):
///   lon = a * col + b * row + c
///   lat = d * col + e * row + f
///
/// Fields follow the usual `a..f` naming; [`Affine::to_gdal`] gives the
/// GDAL ordering `[c, a, b, f, d, e]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform with square pixels and origin at the top-left corner.
    pub fn north_up(west: f64, north: f64, pixel_size: f64) -> Self {
        Self::new(pixel_size, 0.0, west, 0.0, -pixel_size, north)
    }

    /// Convert to GDAL-style geotransform array [c, a, b, f, d, e].
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Apply the forward transform: (col, row) -> (lon, lat).
    pub fn forward(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.a * col + self.b * row + self.c;
        let y = self.d * col + self.e * row + self.f;
        (x, y)
    }

    /// Compute the inverse transform: (lon, lat) -> (col, row).
    pub fn inverse(&self) -> Result<Affine, MosaicError> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON * f64::EPSILON {
            return Err(MosaicError::Affine(
                "Singular affine transform (determinant is zero)".into(),
            ));
        }
        let inv_det = 1.0 / det;
        Ok(Affine {
            a: self.e * inv_det,
            b: -self.b * inv_det,
            c: (self.b * self.f - self.e * self.c) * inv_det,
            d: -self.d * inv_det,
            e: self.a * inv_det,
            f: (self.d * self.c - self.a * self.f) * inv_det,
        })
    }
}
