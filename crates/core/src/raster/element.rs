//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Sample data type of a raster, independent of the Rust cell type in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl DataType {
    /// Size of one sample in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::U64 => "uint64",
            DataType::I8 => "int8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sample data type tag for this cell type
    const DATA_TYPE: DataType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data.
    ///
    /// Comparison is exact equality; NaN always counts as no-data for floats.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Check against a no-data value with an absolute tolerance.
    fn is_nodata_within(&self, nodata: Option<Self>, tolerance: f64) -> bool {
        if self.is_nodata(nodata) {
            return true;
        }
        match (nodata.and_then(RasterElement::to_f64), RasterElement::to_f64(*self)) {
            (Some(nd), Some(v)) => (v - nd).abs() <= tolerance,
            _ => false,
        }
    }

    /// Whether this type is a floating point type
    fn is_float() -> bool {
        Self::DATA_TYPE.is_float()
    }

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $dt;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $dt;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(i8, DataType::I8);
impl_raster_element_int!(i16, DataType::I16);
impl_raster_element_int!(i32, DataType::I32);
impl_raster_element_int!(i64, DataType::I64);
impl_raster_element_int!(u8, DataType::U8);
impl_raster_element_int!(u16, DataType::U16);
impl_raster_element_int!(u32, DataType::U32);
impl_raster_element_int!(u64, DataType::U64);
impl_raster_element_float!(f32, DataType::F32);
impl_raster_element_float!(f64, DataType::F64);
