//! Fixed-point math utilities for deterministic simulation.
//!
//! All battle math uses fixed-point arithmetic so that two runs with the
//! same inputs produce bit-identical results on every platform. Positions
//! are expressed in cell units: the center of cell `(x, y)` is the point
//! `(x, y)`.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

use crate::grid::Cell;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// A full turn in degrees.
pub const FULL_TURN: Fixed = Fixed::const_from_int(360);

/// Half a turn in degrees.
pub const HALF_TURN: Fixed = Fixed::const_from_int(180);

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as human-friendly decimals.
///
/// Used by RON tuning files where `2.5` reads better than raw bits. The
/// conversion happens once at load time, never inside the simulation.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// The position of a cell's center.
    #[must_use]
    pub fn from_cell(cell: Cell) -> Self {
        Self::from_ints(cell.x, cell.y)
    }

    /// The cell containing this position (nearest cell center).
    #[must_use]
    pub fn to_cell(self) -> Cell {
        let half = Fixed::ONE / 2;
        Cell::new(
            (self.x + half).floor().to_num::<i32>(),
            (self.y + half).floor().to_num::<i32>(),
        )
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Scale by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Move toward `target` by at most `step`, landing exactly on the target
    /// when it is within reach.
    #[must_use]
    pub fn step_toward(self, target: Self, step: Fixed) -> Self {
        let diff = target - self;
        let len = diff.length();
        if len <= step || len == Fixed::ZERO {
            return target;
        }
        self + diff.scale(step / len)
    }
}

/// Exact square root of a non-negative fixed-point number (floored to the
/// last fractional bit).
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    // sqrt(bits / 2^32) * 2^32 == isqrt(bits << 32)
    let scaled = (value.to_bits() as u128) << 32;
    Fixed::from_bits(isqrt_u128(scaled) as i64)
}

fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = 1u128 << ((128 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Arc tangent of `z` in `[0, 1]`, in degrees.
fn atan_unit_degrees(z: Fixed) -> Fixed {
    // atan(z) ~ 45z - z(z - 1)(14.02 + 3.80z), max error below 0.1 degree
    let c0 = Fixed::from_num(1402) / 100;
    let c1 = Fixed::from_num(380) / 100;
    Fixed::from_num(45) * z - z * (z - Fixed::ONE) * (c0 + c1 * z)
}

/// Heading of a direction vector in degrees, `[0, 360)`.
///
/// 0 degrees points along +x; angles grow toward +y. A zero vector has
/// heading 0.
#[must_use]
pub fn heading_of(delta: Vec2Fixed) -> Fixed {
    let ax = delta.x.abs();
    let ay = delta.y.abs();
    if ax == Fixed::ZERO && ay == Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut angle = if ax >= ay {
        atan_unit_degrees(ay / ax)
    } else {
        Fixed::from_num(90) - atan_unit_degrees(ax / ay)
    };

    if delta.x < Fixed::ZERO {
        angle = HALF_TURN - angle;
    }
    if delta.y < Fixed::ZERO {
        angle = FULL_TURN - angle;
    }
    normalize_angle(angle)
}

/// Wrap an angle into `[0, 360)`.
#[must_use]
pub fn normalize_angle(angle: Fixed) -> Fixed {
    let mut a = angle % FULL_TURN;
    if a < Fixed::ZERO {
        a += FULL_TURN;
    }
    a
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
#[must_use]
pub fn shortest_turn(from: Fixed, to: Fixed) -> Fixed {
    let mut diff = normalize_angle(to - from);
    if diff > HALF_TURN {
        diff -= FULL_TURN;
    }
    diff
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_vec2_distance_squared() {
        let dist_sq = v(3, 0).distance_squared(v(0, 4));
        // 3² + 4² = 25
        assert_eq!(dist_sq, Fixed::from_num(25));
    }

    #[test]
    fn test_sqrt_is_exact_for_squares() {
        assert_eq!(fixed_sqrt(Fixed::from_num(1)), Fixed::ONE);
        assert_eq!(fixed_sqrt(Fixed::from_num(25)), Fixed::from_num(5));
        assert_eq!(fixed_sqrt(Fixed::from_num(10_000)), Fixed::from_num(100));
        assert_eq!(v(10, 10).distance(v(11, 10)), Fixed::ONE);
    }

    #[test]
    fn test_sqrt_of_two_is_close() {
        let root = fixed_sqrt(Fixed::from_num(2));
        let err = (root * root - Fixed::from_num(2)).abs();
        assert!(err < Fixed::ONE / 100_000, "error too large: {err:?}");
    }

    #[test]
    fn test_cell_round_trip() {
        let cell = Cell::new(7, 3);
        assert_eq!(Vec2Fixed::from_cell(cell).to_cell(), cell);

        let near = Vec2Fixed::new(Fixed::from_num(7) + Fixed::ONE / 4, Fixed::from_num(3));
        assert_eq!(near.to_cell(), cell);
    }

    #[test]
    fn test_headings_on_axes() {
        assert_eq!(heading_of(v(1, 0)), Fixed::ZERO);
        assert_eq!(heading_of(v(0, 1)), Fixed::from_num(90));
        assert_eq!(heading_of(v(-1, 0)), Fixed::from_num(180));
        assert_eq!(heading_of(v(0, -1)), Fixed::from_num(270));
    }

    #[test]
    fn test_heading_diagonal_is_close() {
        let h = heading_of(v(1, 1));
        assert!((h - Fixed::from_num(45)).abs() < Fixed::ONE / 10);
        let h = heading_of(v(-2, -2));
        assert!((h - Fixed::from_num(225)).abs() < Fixed::ONE / 10);
    }

    #[test]
    fn test_shortest_turn_wraps() {
        assert_eq!(
            shortest_turn(Fixed::from_num(350), Fixed::from_num(10)),
            Fixed::from_num(20)
        );
        assert_eq!(
            shortest_turn(Fixed::from_num(10), Fixed::from_num(350)),
            Fixed::from_num(-20)
        );
    }

    #[test]
    fn test_step_toward_lands_on_target() {
        let start = v(0, 0);
        let target = v(3, 4);
        let mid = start.step_toward(target, Fixed::from_num(2));
        assert!((mid.distance(start) - Fixed::from_num(2)).abs() < Fixed::ONE / 1000);
        assert_eq!(mid.step_toward(target, Fixed::from_num(10)), target);
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }
}
