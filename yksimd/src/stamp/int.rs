//! Integer stamps: a signed range plus known bits.

use crate::arbbitint::{ArbBitInt, mask, max_signed, min_signed, sign_extend};
use std::fmt;

/// The possible values of a `bitw`-bit integer.
///
/// A value `v` is described by the stamp iff `lo <= v <= hi` (signed) and, viewing `v` as `bitw`
/// bits, `v & !may_set == 0` and `v & must_set == must_set`. Constructors normalise so that equal
/// descriptions compare equal where it matters: every empty stamp of a given width is the same
/// value, and an exact range always carries exact bits.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IntStamp {
    bitw: u32,
    lo: i64,
    hi: i64,
    may_set: u64,
    must_set: u64,
}

impl IntStamp {
    pub fn new(bitw: u32, lo: i64, hi: i64, may_set: u64, must_set: u64) -> Self {
        assert!(bitw > 0 && bitw <= 64, "unsupported bit width {bitw}");
        let m = mask(bitw);
        let (may_set, must_set) = (may_set & m, must_set & m);
        if lo > hi
            || lo < min_signed(bitw)
            || hi > max_signed(bitw)
            || must_set & !may_set != 0
        {
            return Self::empty(bitw);
        }
        if lo == hi {
            let v = lo as u64 & m;
            if v & must_set != must_set || v & !may_set != 0 {
                return Self::empty(bitw);
            }
            return Self {
                bitw,
                lo,
                hi,
                may_set: v,
                must_set: v,
            };
        }
        Self {
            bitw,
            lo,
            hi,
            may_set,
            must_set,
        }
    }

    pub fn unrestricted(bitw: u32) -> Self {
        Self::new(bitw, min_signed(bitw), max_signed(bitw), mask(bitw), 0)
    }

    pub fn empty(bitw: u32) -> Self {
        Self {
            bitw,
            lo: max_signed(bitw),
            hi: min_signed(bitw),
            may_set: 0,
            must_set: mask(bitw),
        }
    }

    /// The stamp `[lo, hi]` with conservatively derived known bits.
    pub fn range(bitw: u32, lo: i64, hi: i64) -> Self {
        let may = if lo >= 0 && lo <= hi {
            // Nothing above the highest set bit of `hi` can be set.
            (hi as u64).checked_next_power_of_two().map_or(u64::MAX, |x| {
                if x == hi as u64 { (x << 1).wrapping_sub(1) } else { x - 1 }
            })
        } else {
            mask(bitw)
        };
        let must = if hi < 0 { 1u64 << (bitw - 1) } else { 0 };
        Self::new(bitw, lo, hi, may, must)
    }

    /// The stamp described by known bits alone, with the tightest range they imply.
    pub fn from_bits(bitw: u32, may_set: u64, must_set: u64) -> Self {
        let m = mask(bitw);
        let (may_set, must_set) = (may_set & m, must_set & m);
        let sign = 1u64 << (bitw - 1);
        let (lo, hi) = if must_set & sign != 0 {
            (sign_extend(must_set, bitw), sign_extend(may_set, bitw))
        } else if may_set & sign == 0 {
            (must_set as i64, may_set as i64)
        } else {
            (
                sign_extend(must_set | sign, bitw),
                (may_set & !sign) as i64,
            )
        };
        Self::new(bitw, lo, hi, may_set, must_set)
    }

    pub fn from_constant(c: &ArbBitInt) -> Self {
        let v = c.to_sign_ext_i64();
        Self::new(c.bitw(), v, v, c.to_zero_ext_u64(), c.to_zero_ext_u64())
    }

    pub fn bitw(&self) -> u32 {
        self.bitw
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn may_set(&self) -> u64 {
        self.may_set
    }

    pub fn must_set(&self) -> u64 {
        self.must_set
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::unrestricted(self.bitw)
    }

    pub fn as_constant(&self) -> Option<ArbBitInt> {
        (self.lo == self.hi).then(|| ArbBitInt::from_i64(self.bitw, self.lo))
    }

    /// Is `v` (interpreted as a signed `bitw`-bit value) described by this stamp?
    pub fn contains(&self, v: i64) -> bool {
        let u = v as u64 & mask(self.bitw);
        self.lo <= v && v <= self.hi && u & !self.may_set == 0 && u & self.must_set == self.must_set
    }

    /// The unsigned range `[lo, hi]` of this stamp.
    pub fn unsigned_range(&self) -> (u64, u64) {
        if self.lo >= 0 || self.hi < 0 {
            let m = mask(self.bitw);
            (self.lo as u64 & m, self.hi as u64 & m)
        } else {
            (self.must_set, self.may_set)
        }
    }

    fn check_bitw(&self, other: &Self) {
        assert_eq!(
            self.bitw, other.bitw,
            "incompatible stamps: i{} and i{}",
            self.bitw, other.bitw
        );
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.check_bitw(other);
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Self::new(
            self.bitw,
            self.lo.min(other.lo),
            self.hi.max(other.hi),
            self.may_set | other.may_set,
            self.must_set & other.must_set,
        )
    }

    pub fn join(&self, other: &Self) -> Self {
        self.check_bitw(other);
        if self.is_empty() || other.is_empty() {
            return Self::empty(self.bitw);
        }
        Self::new(
            self.bitw,
            self.lo.max(other.lo),
            self.hi.min(other.hi),
            self.may_set & other.may_set,
            self.must_set | other.must_set,
        )
    }
}

impl fmt::Display for IntStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "i{}<empty>", self.bitw)
        } else if let Some(c) = self.as_constant() {
            write!(f, "i{}[{c}]", self.bitw)
        } else if self.is_unrestricted() {
            write!(f, "i{}", self.bitw)
        } else {
            write!(f, "i{}[{}..{}]", self.bitw, self.lo, self.hi)
        }
    }
}
