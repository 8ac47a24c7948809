//! Sample types and their numeric primitives.
//!
//! A *sample* is one scalar value of one channel of one pixel. Images are
//! generic over the [`Sample`] trait, implemented for:
//!
//! | type        | [`SampleType`]   | nominal range      |
//! |-------------|------------------|--------------------|
//! | `u8`        | `U8`             | `0..=255`          |
//! | `u16`       | `U16`            | `0..=65535`        |
//! | `u32`       | `U32`            | `0..=4294967295`   |
//! | `f32`       | `F32`            | `[0, 1]`           |
//! | `f64`       | `F64`            | `[0, 1]`           |
//! | `Complex32` | `Complex32`      | magnitude `[0, 1]` |
//! | `Complex64` | `Complex64`      | magnitude `[0, 1]` |
//!
//! Every sample converts to and from a *normalized* `f64` where the nominal
//! range maps onto `[0, 1]`. Complex samples normalize to their magnitude.
//!
//! # Example
//!
//! ```rust
//! use pxl_core::{ImageOp, Sample};
//!
//! assert_eq!(u8::from_f64(0.5), 128);
//! assert_eq!(200u8.apply(ImageOp::Add, 100), 255); // saturates
//! assert_eq!(0.25f32.apply(ImageOp::Div, 0.0), 1.0); // max sample value
//! ```

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
pub use num_complex::{Complex32, Complex64};

use crate::op::{EPSILON, ImageOp, eval};

/// Runtime identifier of a sample type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleType {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
    /// Complex with 32-bit float components.
    Complex32,
    /// Complex with 64-bit float components.
    Complex64,
}

impl SampleType {
    /// Size of one sample in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::U32 | SampleType::F32 => 4,
            SampleType::F64 | SampleType::Complex32 => 8,
            SampleType::Complex64 => 16,
        }
    }

    /// Returns `true` for floating point real samples.
    pub const fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Returns `true` for complex samples.
    pub const fn is_complex(self) -> bool {
        matches!(self, SampleType::Complex32 | SampleType::Complex64)
    }

    /// Short name, e.g. `"u16"`.
    pub const fn name(self) -> &'static str {
        match self {
            SampleType::U8 => "u8",
            SampleType::U16 => "u16",
            SampleType::U32 => "u32",
            SampleType::F32 => "f32",
            SampleType::F64 => "f64",
            SampleType::Complex32 => "complex32",
            SampleType::Complex64 => "complex64",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric primitives of a pixel sample type.
///
/// All conversions go through normalized `f64` values. Integer conversions
/// round and clamp to the representable range; real conversions never clamp.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Runtime identifier.
    const TYPE: SampleType;

    /// Smallest nominal value (zero for every sample type).
    fn min_value() -> Self;

    /// Largest nominal value: `1.0` for reals, `MAX` for integers.
    fn max_value() -> Self;

    /// Converts to a normalized `f64`. Complex samples yield their magnitude.
    fn to_f64(self) -> f64;

    /// Converts from a normalized `f64`.
    fn from_f64(value: f64) -> Self;

    /// Applies `op` with `self` as target and `rhs` as operand.
    ///
    /// Division by a (near) zero operand yields [`Sample::max_value`].
    #[inline]
    fn apply(self, op: ImageOp, rhs: Self) -> Self {
        match op {
            ImageOp::Nop => self,
            ImageOp::Mov => rhs,
            _ => Self::from_f64(eval(op, self.to_f64(), rhs.to_f64())),
        }
    }

    /// Absolute value. Complex samples become their (real) magnitude.
    fn absolute(self) -> Self;

    /// Writes the sample in little-endian byte order.
    fn write_le<W: Write>(self, w: &mut W) -> io::Result<()>;

    /// Reads one little-endian sample.
    fn read_le<R: Read>(r: &mut R) -> io::Result<Self>;

    /// Returns the runtime sample type.
    #[inline]
    fn sample_type() -> SampleType {
        Self::TYPE
    }
}

macro_rules! impl_integer_sample {
    ($t:ty, $id:ident, $read:ident, $write:ident) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$id;

            #[inline]
            fn min_value() -> Self {
                0
            }

            #[inline]
            fn max_value() -> Self {
                <$t>::MAX
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64 / <$t>::MAX as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                if value.is_nan() {
                    return 0;
                }
                (value.clamp(0.0, 1.0) * <$t>::MAX as f64).round() as $t
            }

            #[inline]
            fn apply(self, op: ImageOp, rhs: Self) -> Self {
                match op {
                    ImageOp::Nop => self,
                    ImageOp::Mov => rhs,
                    ImageOp::Add => self.saturating_add(rhs),
                    ImageOp::Sub => self.saturating_sub(rhs),
                    ImageOp::Div if rhs == 0 => <$t>::MAX,
                    ImageOp::Dif => self.abs_diff(rhs),
                    ImageOp::Min => self.min(rhs),
                    ImageOp::Max => self.max(rhs),
                    ImageOp::Not => !self,
                    ImageOp::Or => self | rhs,
                    ImageOp::And => self & rhs,
                    ImageOp::Xor => self ^ rhs,
                    ImageOp::Nor => !(self | rhs),
                    ImageOp::Nand => !(self & rhs),
                    ImageOp::Xnor => !(self ^ rhs),
                    _ => Self::from_f64(eval(op, self.to_f64(), rhs.to_f64())),
                }
            }

            #[inline]
            fn absolute(self) -> Self {
                self
            }

            fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
                w.$write::<LittleEndian>(self)
            }

            fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
                r.$read::<LittleEndian>()
            }
        }
    };
}

impl_integer_sample!(u16, U16, read_u16, write_u16);
impl_integer_sample!(u32, U32, read_u32, write_u32);

// u8 has no byte order, so it cannot go through the macro's generic calls.
impl Sample for u8 {
    const TYPE: SampleType = SampleType::U8;

    #[inline]
    fn min_value() -> Self {
        0
    }

    #[inline]
    fn max_value() -> Self {
        u8::MAX
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64 / 255.0
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return 0;
        }
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    #[inline]
    fn apply(self, op: ImageOp, rhs: Self) -> Self {
        match op {
            ImageOp::Nop => self,
            ImageOp::Mov => rhs,
            ImageOp::Add => self.saturating_add(rhs),
            ImageOp::Sub => self.saturating_sub(rhs),
            ImageOp::Div if rhs == 0 => u8::MAX,
            ImageOp::Dif => self.abs_diff(rhs),
            ImageOp::Min => self.min(rhs),
            ImageOp::Max => self.max(rhs),
            ImageOp::Not => !self,
            ImageOp::Or => self | rhs,
            ImageOp::And => self & rhs,
            ImageOp::Xor => self ^ rhs,
            ImageOp::Nor => !(self | rhs),
            ImageOp::Nand => !(self & rhs),
            ImageOp::Xnor => !(self ^ rhs),
            _ => Self::from_f64(eval(op, self.to_f64(), rhs.to_f64())),
        }
    }

    #[inline]
    fn absolute(self) -> Self {
        self
    }

    fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
        w.write_u8(self)
    }

    fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
        r.read_u8()
    }
}

macro_rules! impl_float_sample {
    ($t:ty, $id:ident, $read:ident, $write:ident) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$id;

            #[inline]
            fn min_value() -> Self {
                0.0
            }

            #[inline]
            fn max_value() -> Self {
                1.0
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn absolute(self) -> Self {
                self.abs()
            }

            fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
                w.$write::<LittleEndian>(self)
            }

            fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
                r.$read::<LittleEndian>()
            }
        }
    };
}

impl_float_sample!(f32, F32, read_f32, write_f32);
impl_float_sample!(f64, F64, read_f64, write_f64);

macro_rules! impl_complex_sample {
    ($t:ty, $f:ty, $id:ident, $read:ident, $write:ident) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$id;

            #[inline]
            fn min_value() -> Self {
                <$t>::new(0.0, 0.0)
            }

            #[inline]
            fn max_value() -> Self {
                <$t>::new(1.0, 0.0)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self.norm() as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                <$t>::new(value as $f, 0.0)
            }

            #[inline]
            fn apply(self, op: ImageOp, rhs: Self) -> Self {
                match op {
                    ImageOp::Nop => self,
                    ImageOp::Mov => rhs,
                    ImageOp::Add => self + rhs,
                    ImageOp::Sub => self - rhs,
                    ImageOp::Mul => self * rhs,
                    ImageOp::Div => {
                        if (rhs.norm() as f64) < EPSILON {
                            Self::max_value()
                        } else {
                            self / rhs
                        }
                    }
                    ImageOp::Pow => self.powc(rhs),
                    ImageOp::Min => {
                        if rhs.norm() < self.norm() {
                            rhs
                        } else {
                            self
                        }
                    }
                    ImageOp::Max => {
                        if rhs.norm() > self.norm() {
                            rhs
                        } else {
                            self
                        }
                    }
                    _ => Self::from_f64(eval(op, self.to_f64(), rhs.to_f64())),
                }
            }

            #[inline]
            fn absolute(self) -> Self {
                <$t>::new(self.norm(), 0.0)
            }

            fn write_le<W: Write>(self, w: &mut W) -> io::Result<()> {
                w.$write::<LittleEndian>(self.re)?;
                w.$write::<LittleEndian>(self.im)
            }

            fn read_le<R: Read>(r: &mut R) -> io::Result<Self> {
                let re = r.$read::<LittleEndian>()?;
                let im = r.$read::<LittleEndian>()?;
                Ok(<$t>::new(re, im))
            }
        }
    };
}

impl_complex_sample!(Complex32, f32, Complex32, read_f32, write_f32);
impl_complex_sample!(Complex64, f64, Complex64, read_f64, write_f64);
