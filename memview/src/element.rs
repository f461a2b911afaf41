use std::{fmt, str::FromStr};

use bytemuck::{Pod, Zeroable};
use num_traits::AsPrimitive;

use crate::{any::AnyView, error::Error, view::MemoryView};

/// The closed set of element kinds a view can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint8Clamped,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::Uint8,
        DType::Uint8Clamped,
        DType::Uint16,
        DType::Uint32,
        DType::Uint64,
        DType::Float32,
        DType::Float64,
    ];

    pub const fn byte_size(self) -> usize {
        match self {
            DType::Int8 | DType::Uint8 | DType::Uint8Clamped => 1,
            DType::Int16 | DType::Uint16 => 2,
            DType::Int32 | DType::Uint32 | DType::Float32 => 4,
            DType::Int64 | DType::Uint64 | DType::Float64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Uint8 => "uint8",
            DType::Uint8Clamped => "uint8clamped",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Uint64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    /// Accepts `int8`, `Int8`, `Int8Array` and `Int8Buffer` style tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let base = lower
            .strip_suffix("array")
            .or_else(|| lower.strip_suffix("buffer"))
            .unwrap_or(&lower);
        DType::ALL
            .into_iter()
            .find(|dtype| dtype.name() == base)
            .ok_or_else(|| Error::UnsupportedDType(s.to_string()))
    }
}

/// An unsigned byte that saturates instead of wrapping when converted from numbers.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
pub struct Clamped(pub u8);

impl From<u8> for Clamped {
    fn from(v: u8) -> Self {
        Clamped(v)
    }
}

impl From<Clamped> for u8 {
    fn from(v: Clamped) -> Self {
        v.0
    }
}

/// A type that can live in a [`MemoryView`].
pub trait Element: Pod + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    /// Converts a host number the way a typed array store does. Integers
    /// truncate toward zero and wrap modulo 2^bits, with NaN and infinities
    /// stored as 0. [`Clamped`] saturates instead. Floats round to nearest.
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;

    fn into_any(view: MemoryView<Self>) -> AnyView;
    fn from_any(any: &AnyView) -> Option<&MemoryView<Self>>;
}

/// `v` truncated and reduced modulo 2^64, as a two's complement bit pattern.
/// Narrower integers keep the low bits, which is the same residue mod 2^bits.
fn modular(v: f64) -> u64 {
    const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
    if !v.is_finite() {
        return 0;
    }
    // exact: |r| < 2^64 and r is an integer
    let r = v.trunc() % TWO_POW_64;
    if r >= 0.0 {
        r as u64
    } else if r >= i64::MIN as f64 {
        r as i64 as u64
    } else {
        (r + TWO_POW_64) as u64
    }
}

macro_rules! impl_element {
    (@from int, $ty:ty, $v:ident) => {
        modular($v) as $ty
    };
    (@from float, $ty:ty, $v:ident) => {
        $v.as_()
    };
    ($($ty:ty => $variant:ident as $kind:ident),* $(,)?) => {$(
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn from_f64(v: f64) -> Self {
                impl_element!(@from $kind, $ty, v)
            }

            fn to_f64(self) -> f64 {
                self.as_()
            }

            fn into_any(view: MemoryView<Self>) -> AnyView {
                AnyView::$variant(view)
            }

            fn from_any(any: &AnyView) -> Option<&MemoryView<Self>> {
                match any {
                    AnyView::$variant(view) => Some(view),
                    _ => None,
                }
            }
        }
    )*};
}

impl_element! {
    i8 => Int8 as int,
    i16 => Int16 as int,
    i32 => Int32 as int,
    i64 => Int64 as int,
    u8 => Uint8 as int,
    u16 => Uint16 as int,
    u32 => Uint32 as int,
    u64 => Uint64 as int,
    f32 => Float32 as float,
    f64 => Float64 as float,
}

impl Element for Clamped {
    const DTYPE: DType = DType::Uint8Clamped;

    fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            return Clamped(0);
        }
        let v = v.clamp(0.0, 255.0);
        // ties go to the even neighbour
        let floor = v.floor();
        let rounded = match v - floor {
            d if d > 0.5 => floor + 1.0,
            d if d < 0.5 => floor,
            _ if floor % 2.0 == 0.0 => floor,
            _ => floor + 1.0,
        };
        Clamped(rounded as u8)
    }

    fn to_f64(self) -> f64 {
        f64::from(self.0)
    }

    fn into_any(view: MemoryView<Self>) -> AnyView {
        AnyView::Uint8Clamped(view)
    }

    fn from_any(any: &AnyView) -> Option<&MemoryView<Self>> {
        match any {
            AnyView::Uint8Clamped(view) => Some(view),
            _ => None,
        }
    }
}
