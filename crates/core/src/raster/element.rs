//! Cell value types a raster can hold

use std::fmt::Debug;

/// On-disk sample layout used when a raster is written to GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Boolean masks, stored as 0/1 bytes
    Bool,
    U8,
    U32,
    I32,
    F32,
    F64,
}

/// Trait for types that can be stored in a raster cell.
///
/// Elevation grids use `f64`, flow directions `u8`, accumulation counts
/// `u32`, HAND `f32` and masks `bool`.
pub trait RasterElement: Copy + Debug + PartialOrd + PartialEq + Send + Sync + 'static {
    /// Sample layout for GeoTIFF output
    const FORMAT: SampleFormat;

    /// The fill value of a freshly allocated raster
    fn zero() -> Self;

    /// Check if this value represents no-data.
    ///
    /// Floating-point NaN is always no-data. Otherwise the value must equal
    /// the sentinel exactly.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Widen to f64
    fn to_f64(self) -> f64;

    /// Narrow from f64, `None` when the value is not representable
    fn from_f64(value: f64) -> Option<Self>;
}

macro_rules! impl_raster_element_int {
    ($t:ty, $fmt:expr) => {
        impl RasterElement for $t {
            const FORMAT: SampleFormat = $fmt;

            fn zero() -> Self {
                0
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Option<Self> {
                num_traits::cast(value)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $fmt:expr) => {
        impl RasterElement for $t {
            const FORMAT: SampleFormat = $fmt;

            fn zero() -> Self {
                0.0
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan() || nodata.is_some_and(|nd| *self == nd)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Option<Self> {
                Some(value as $t)
            }
        }
    };
}

impl_raster_element_int!(u8, SampleFormat::U8);
impl_raster_element_int!(u32, SampleFormat::U32);
impl_raster_element_int!(i32, SampleFormat::I32);
impl_raster_element_float!(f32, SampleFormat::F32);
impl_raster_element_float!(f64, SampleFormat::F64);

impl RasterElement for bool {
    const FORMAT: SampleFormat = SampleFormat::Bool;

    fn zero() -> Self {
        false
    }

    fn is_nodata(&self, _nodata: Option<Self>) -> bool {
        false
    }

    fn to_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }

    fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            None
        } else {
            Some(value != 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nodata_is_exact() {
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!(-9998.9999_f64).is_nodata(Some(-9999.0)));
        assert!(f64::NAN.is_nodata(None));
        assert!(!0.0_f64.is_nodata(None));
    }

    #[test]
    fn test_int_nodata() {
        assert!(0_u8.is_nodata(Some(0)));
        assert!(!0_u32.is_nodata(None));
    }

    #[test]
    fn test_bool_roundtrip() {
        assert_eq!(bool::from_f64(1.0), Some(true));
        assert_eq!(bool::from_f64(0.0), Some(false));
        assert_eq!(true.to_f64(), 1.0);
    }
}
