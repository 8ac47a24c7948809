//! Elementwise image operators.
//!
//! [`ImageOp`] enumerates every operator accepted by
//! [`Image::apply_scalar`](crate::Image::apply_scalar) and
//! [`Image::apply_image`](crate::Image::apply_image): arithmetic, bitwise
//! logic and pixel composition (blend modes).
//!
//! [`eval`] defines each operator on normalized real samples in `[0, 1]`.
//! Sample types refine it where they have a native representation
//! (saturating integer addition, native bitwise ops, complex arithmetic),
//! see [`Sample::apply`](crate::Sample::apply).
//!
//! # Composition formulas
//!
//! With `a` the target sample and `b` the operand sample:
//!
//! | operator    | result                                                      |
//! |-------------|-------------------------------------------------------------|
//! | ColorBurn   | `1 - min((1-a)/b, 1)`                                       |
//! | LinearBurn  | `a + b - 1`                                                 |
//! | Screen      | `1 - (1-a)(1-b)`                                            |
//! | ColorDodge  | `min(a/(1-b), 1)`                                           |
//! | Overlay     | `a > 0.5 ? 1 - (1-2(a-0.5))(1-b) : 2ab`                     |
//! | SoftLight   | `b > 0.5 ? 1 - (1-a)(1-(b-0.5)) : a(b+0.5)`                 |
//! | HardLight   | `b > 0.5 ? 1 - (1-a)(1-2(b-0.5)) : 2ab`                     |
//! | VividLight  | `b > 0.5 ? ColorDodge(a, 2(b-0.5)) : ColorBurn(a, 2b)`      |
//! | LinearLight | `b > 0.5 ? min(a + 2(b-0.5), 1) : max(a + 2b - 1, 0)`       |
//! | PinLight    | `b > 0.5 ? max(a, 2(b-0.5)) : min(a, 2b)`                   |
//! | Exclusion   | `clamp(0.5 - 2(a-0.5)(b-0.5), 0, 1)`                        |
//!
//! Divisors are bounded below by [`EPSILON`].

use std::fmt;

/// Smallest divisor magnitude treated as nonzero by the operators.
pub const EPSILON: f64 = f32::EPSILON as f64;

/// An elementwise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageOp {
    /// Leaves the target unchanged.
    Nop,
    /// Copies the operand: `a = b`.
    Mov,
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`, saturating to the maximum sample value when `b` is zero.
    Div,
    /// `a ^ b`
    Pow,
    /// `|a - b|`
    Dif,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
    /// `~a`
    Not,
    /// `a | b`
    Or,
    /// `a & b`
    And,
    /// `a ^ b` (bitwise)
    Xor,
    /// `~(a | b)`
    Nor,
    /// `~(a & b)`
    Nand,
    /// `~(a ^ b)`
    Xnor,
    /// Color burn blend.
    ColorBurn,
    /// Linear burn blend.
    LinearBurn,
    /// Screen blend.
    Screen,
    /// Color dodge blend.
    ColorDodge,
    /// Overlay blend.
    Overlay,
    /// Soft light blend.
    SoftLight,
    /// Hard light blend.
    HardLight,
    /// Vivid light blend.
    VividLight,
    /// Linear light blend.
    LinearLight,
    /// Pin light blend.
    PinLight,
    /// Exclusion blend.
    Exclusion,
}

impl ImageOp {
    /// Every operator, in declaration order.
    pub const ALL: [ImageOp; 28] = [
        ImageOp::Nop,
        ImageOp::Mov,
        ImageOp::Add,
        ImageOp::Sub,
        ImageOp::Mul,
        ImageOp::Div,
        ImageOp::Pow,
        ImageOp::Dif,
        ImageOp::Min,
        ImageOp::Max,
        ImageOp::Not,
        ImageOp::Or,
        ImageOp::And,
        ImageOp::Xor,
        ImageOp::Nor,
        ImageOp::Nand,
        ImageOp::Xnor,
        ImageOp::ColorBurn,
        ImageOp::LinearBurn,
        ImageOp::Screen,
        ImageOp::ColorDodge,
        ImageOp::Overlay,
        ImageOp::SoftLight,
        ImageOp::HardLight,
        ImageOp::VividLight,
        ImageOp::LinearLight,
        ImageOp::PinLight,
        ImageOp::Exclusion,
    ];

    /// Human readable operator name.
    pub const fn name(self) -> &'static str {
        match self {
            ImageOp::Nop => "No-op",
            ImageOp::Mov => "Move",
            ImageOp::Add => "Add",
            ImageOp::Sub => "Subtract",
            ImageOp::Mul => "Multiply",
            ImageOp::Div => "Divide",
            ImageOp::Pow => "Power",
            ImageOp::Dif => "Absolute difference",
            ImageOp::Min => "Minimum",
            ImageOp::Max => "Maximum",
            ImageOp::Not => "Bitwise NOT",
            ImageOp::Or => "Bitwise OR",
            ImageOp::And => "Bitwise AND",
            ImageOp::Xor => "Bitwise XOR",
            ImageOp::Nor => "Bitwise NOR",
            ImageOp::Nand => "Bitwise NAND",
            ImageOp::Xnor => "Bitwise XNOR",
            ImageOp::ColorBurn => "Color burn",
            ImageOp::LinearBurn => "Linear burn",
            ImageOp::Screen => "Screen",
            ImageOp::ColorDodge => "Color dodge",
            ImageOp::Overlay => "Overlay",
            ImageOp::SoftLight => "Soft light",
            ImageOp::HardLight => "Hard light",
            ImageOp::VividLight => "Vivid light",
            ImageOp::LinearLight => "Linear light",
            ImageOp::PinLight => "Pin light",
            ImageOp::Exclusion => "Exclusion",
        }
    }

    /// Returns `true` for the bitwise logical operators.
    pub const fn is_bitwise(self) -> bool {
        matches!(
            self,
            ImageOp::Not
                | ImageOp::Or
                | ImageOp::And
                | ImageOp::Xor
                | ImageOp::Nor
                | ImageOp::Nand
                | ImageOp::Xnor
        )
    }

    /// Returns `true` for the pixel composition operators.
    pub const fn is_composition(self) -> bool {
        matches!(
            self,
            ImageOp::ColorBurn
                | ImageOp::LinearBurn
                | ImageOp::Screen
                | ImageOp::ColorDodge
                | ImageOp::Overlay
                | ImageOp::SoftLight
                | ImageOp::HardLight
                | ImageOp::VividLight
                | ImageOp::LinearLight
                | ImageOp::PinLight
                | ImageOp::Exclusion
        )
    }
}

impl fmt::Display for ImageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn to_byte(x: f64) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn from_byte(b: u8) -> f64 {
    b as f64 / 255.0
}

#[inline]
fn color_burn(a: f64, b: f64) -> f64 {
    1.0 - ((1.0 - a) / b.max(EPSILON)).min(1.0)
}

#[inline]
fn color_dodge(a: f64, b: f64) -> f64 {
    (a / (1.0 - b).max(EPSILON)).min(1.0)
}

/// Evaluates `op` on normalized real samples.
///
/// Integer bitwise semantics are emulated on 8-bit quantized values.
/// Division by `|b| < EPSILON` yields `1.0`, the maximum normalized value.
///
/// # Example
///
/// ```rust
/// use pxl_core::op::{eval, ImageOp};
///
/// assert_eq!(eval(ImageOp::Dif, 0.25, 0.75), 0.5);
/// assert_eq!(eval(ImageOp::Div, 0.5, 0.0), 1.0);
/// assert_eq!(eval(ImageOp::Screen, 0.5, 0.5), 0.75);
/// ```
pub fn eval(op: ImageOp, a: f64, b: f64) -> f64 {
    match op {
        ImageOp::Nop => a,
        ImageOp::Mov => b,
        ImageOp::Add => a + b,
        ImageOp::Sub => a - b,
        ImageOp::Mul => a * b,
        ImageOp::Div => {
            if b.abs() < EPSILON {
                1.0
            } else {
                a / b
            }
        }
        ImageOp::Pow => a.powf(b),
        ImageOp::Dif => (a - b).abs(),
        ImageOp::Min => a.min(b),
        ImageOp::Max => a.max(b),
        ImageOp::Not => from_byte(!to_byte(a)),
        ImageOp::Or => from_byte(to_byte(a) | to_byte(b)),
        ImageOp::And => from_byte(to_byte(a) & to_byte(b)),
        ImageOp::Xor => from_byte(to_byte(a) ^ to_byte(b)),
        ImageOp::Nor => from_byte(!(to_byte(a) | to_byte(b))),
        ImageOp::Nand => from_byte(!(to_byte(a) & to_byte(b))),
        ImageOp::Xnor => from_byte(!(to_byte(a) ^ to_byte(b))),
        ImageOp::ColorBurn => color_burn(a, b),
        ImageOp::LinearBurn => a + b - 1.0,
        ImageOp::Screen => 1.0 - (1.0 - a) * (1.0 - b),
        ImageOp::ColorDodge => color_dodge(a, b),
        ImageOp::Overlay => {
            if a > 0.5 {
                1.0 - (1.0 - 2.0 * (a - 0.5)) * (1.0 - b)
            } else {
                2.0 * a * b
            }
        }
        ImageOp::SoftLight => {
            if b > 0.5 {
                1.0 - (1.0 - a) * (1.0 - (b - 0.5))
            } else {
                a * (b + 0.5)
            }
        }
        ImageOp::HardLight => {
            if b > 0.5 {
                1.0 - (1.0 - a) * (1.0 - 2.0 * (b - 0.5))
            } else {
                2.0 * a * b
            }
        }
        ImageOp::VividLight => {
            if b > 0.5 {
                color_dodge(a, 2.0 * (b - 0.5))
            } else {
                color_burn(a, 2.0 * b)
            }
        }
        ImageOp::LinearLight => {
            if b > 0.5 {
                (a + 2.0 * (b - 0.5)).min(1.0)
            } else {
                (a + 2.0 * b - 1.0).max(0.0)
            }
        }
        ImageOp::PinLight => {
            if b > 0.5 {
                a.max(2.0 * (b - 0.5))
            } else {
                a.min(2.0 * b)
            }
        }
        ImageOp::Exclusion => (0.5 - 2.0 * (a - 0.5) * (b - 0.5)).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_is_complete() {
        let mut seen = std::collections::HashSet::new();
        for op in ImageOp::ALL {
            assert!(seen.insert(op));
        }
        assert_eq!(seen.len(), 28);
        assert_eq!(ImageOp::ALL.iter().filter(|o| o.is_bitwise()).count(), 7);
        assert_eq!(ImageOp::ALL.iter().filter(|o| o.is_composition()).count(), 11);
    }

    #[test]
    fn test_arithmetic_table() {
        let (a, b) = (0.6, 0.3);
        assert_eq!(eval(ImageOp::Nop, a, b), a);
        assert_eq!(eval(ImageOp::Mov, a, b), b);
        assert_relative_eq!(eval(ImageOp::Add, a, b), 0.9, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Sub, a, b), 0.3, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Mul, a, b), 0.18, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Div, a, b), 2.0, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Pow, a, b), 0.6f64.powf(0.3), epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Dif, b, a), 0.3, epsilon = 1e-12);
        assert_eq!(eval(ImageOp::Min, a, b), b);
        assert_eq!(eval(ImageOp::Max, a, b), a);
    }

    #[test]
    fn test_div_by_zero_saturates() {
        assert_eq!(eval(ImageOp::Div, 0.25, 0.0), 1.0);
        assert_eq!(eval(ImageOp::Div, 0.25, 1e-20), 1.0);
    }

    #[test]
    fn test_bitwise_table() {
        // 0.2 -> 51 (0b0011_0011), 0.6 -> 153 (0b1001_1001)
        let (a, b) = (0.2, 0.6);
        let q = |v: u8| v as f64 / 255.0;
        assert_eq!(eval(ImageOp::Not, a, b), q(!51));
        assert_eq!(eval(ImageOp::Or, a, b), q(51 | 153));
        assert_eq!(eval(ImageOp::And, a, b), q(51 & 153));
        assert_eq!(eval(ImageOp::Xor, a, b), q(51 ^ 153));
        assert_eq!(eval(ImageOp::Nor, a, b), q(!(51 | 153)));
        assert_eq!(eval(ImageOp::Nand, a, b), q(!(51 & 153)));
        assert_eq!(eval(ImageOp::Xnor, a, b), q(!(51 ^ 153)));
    }

    #[test]
    fn test_composition_table() {
        let (a, b) = (0.6, 0.3);
        assert_relative_eq!(eval(ImageOp::ColorBurn, a, b), 1.0 - (0.4f64 / 0.3).min(1.0));
        assert_relative_eq!(eval(ImageOp::LinearBurn, a, b), -0.1, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::Screen, a, b), 1.0 - 0.4 * 0.7, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::ColorDodge, a, b), 0.6 / 0.7, epsilon = 1e-12);
        assert_relative_eq!(
            eval(ImageOp::Overlay, a, b),
            1.0 - (1.0 - 2.0 * 0.1) * 0.7,
            epsilon = 1e-12
        );
        assert_relative_eq!(eval(ImageOp::Overlay, 0.25, b), 2.0 * 0.25 * 0.3, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::SoftLight, a, b), 0.6 * 0.8, epsilon = 1e-12);
        assert_relative_eq!(
            eval(ImageOp::SoftLight, a, 0.9),
            1.0 - 0.4 * (1.0 - 0.4),
            epsilon = 1e-12
        );
        assert_relative_eq!(eval(ImageOp::HardLight, a, b), 2.0 * 0.6 * 0.3, epsilon = 1e-12);
        assert_relative_eq!(
            eval(ImageOp::HardLight, a, 0.9),
            1.0 - 0.4 * (1.0 - 0.8),
            epsilon = 1e-12
        );
        assert_relative_eq!(eval(ImageOp::VividLight, a, b), 1.0 - (0.4f64 / 0.6).min(1.0), epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::VividLight, a, 0.9), 1.0, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::LinearLight, a, b), 0.2, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::LinearLight, a, 0.9), 1.0, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::PinLight, a, b), 0.6, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::PinLight, 0.1, 0.9), 0.8, epsilon = 1e-12);
        assert_relative_eq!(
            eval(ImageOp::Exclusion, a, b),
            0.5 - 2.0 * 0.1 * -0.2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_soft_light_upper_half() {
        // Screen of `a` with `b - 0.5` above the midpoint.
        assert_relative_eq!(eval(ImageOp::SoftLight, 0.5, 0.8), 0.65, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::SoftLight, 0.0, 1.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(eval(ImageOp::SoftLight, 1.0, 0.75), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_composition_stays_in_range() {
        let grid: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        for op in ImageOp::ALL.iter().filter(|o| o.is_composition()) {
            if *op == ImageOp::LinearBurn {
                continue;
            }
            for &a in &grid {
                for &b in &grid {
                    let v = eval(*op, a, b);
                    assert!((-1e-12..=1.0 + 1e-12).contains(&v), "{op} {a} {b} -> {v}");
                }
            }
        }
    }
}
