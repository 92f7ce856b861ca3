//! The four-element lattice describing a single opmask bit.

use std::fmt;

/// What might a single mask bit be at run-time?
///
/// The discriminant is a 2-bit possibility mask: bit 0 is set if the value can be false, bit 1 if
/// it can be true. `meet` is then a bitwise OR and `join` a bitwise AND.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LogicValue {
    /// No value is possible (e.g. unreachable code).
    Empty = 0b00,
    False = 0b01,
    True = 0b10,
    /// Either value is possible.
    Unrestricted = 0b11,
}

static_assertions::assert_eq_size!(LogicValue, u8);

const BY_BITS: [LogicValue; 4] = [
    LogicValue::Empty,
    LogicValue::False,
    LogicValue::True,
    LogicValue::Unrestricted,
];

impl LogicValue {
    /// All four elements, in discriminant order.
    pub const ALL: [LogicValue; 4] = BY_BITS;

    fn from_bits(bits: u8) -> Self {
        BY_BITS[usize::from(bits & 0b11)]
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bool(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }

    /// The singleton value of this element, if there is one.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::False => Some(false),
            Self::True => Some(true),
            Self::Empty | Self::Unrestricted => None,
        }
    }

    pub fn can_be_false(self) -> bool {
        self.bits() & 0b01 != 0
    }

    pub fn can_be_true(self) -> bool {
        self.bits() & 0b10 != 0
    }

    pub fn has_values(self) -> bool {
        self != Self::Empty
    }

    /// The union of the possibilities of `self` and `other`.
    pub fn meet(self, other: Self) -> Self {
        Self::from_bits(self.bits() | other.bits())
    }

    /// The intersection of the possibilities of `self` and `other`.
    pub fn join(self, other: Self) -> Self {
        Self::from_bits(self.bits() & other.bits())
    }

    pub fn not(self) -> Self {
        // Swapping the two possibility bits maps false to true and fixes empty/unrestricted.
        let b = self.bits();
        Self::from_bits((b & 0b01) << 1 | (b & 0b10) >> 1)
    }

    /// Apply `f` to every pair of possible values.
    fn lift2(self, other: Self, f: impl Fn(bool, bool) -> bool) -> Self {
        let mut bits = 0;
        for x in [false, true] {
            if !self.possible(x) {
                continue;
            }
            for y in [false, true] {
                if other.possible(y) {
                    bits |= Self::from_bool(f(x, y)).bits();
                }
            }
        }
        Self::from_bits(bits)
    }

    fn possible(self, b: bool) -> bool {
        if b {
            self.can_be_true()
        } else {
            self.can_be_false()
        }
    }

    pub fn and(self, other: Self) -> Self {
        self.lift2(other, |x, y| x && y)
    }

    pub fn or(self, other: Self) -> Self {
        self.lift2(other, |x, y| x || y)
    }

    pub fn xor(self, other: Self) -> Self {
        self.lift2(other, |x, y| x ^ y)
    }
}

impl fmt::Display for LogicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::False => "false",
            Self::True => "true",
            Self::Unrestricted => "unrestricted",
        };
        write!(f, "{s}")
    }
}
