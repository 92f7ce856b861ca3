//! An integer of an arbitrary, dynamic, bit width.
//!
//! Integer lanes can be anywhere from 1 to 64 bits wide. This type hides the underlying
//! representation and forces the user to decide between zero and sign extension whenever they
//! want a Rust-level integer back.

use std::fmt;

/// Return a `u64` with the low `bitw` bits set.
pub(crate) fn mask(bitw: u32) -> u64 {
    debug_assert!(bitw > 0 && bitw <= 64);
    if bitw == 64 {
        u64::MAX
    } else {
        (1u64 << bitw) - 1
    }
}

/// Sign extend the low `bitw` bits of `val` to an `i64`.
pub(crate) fn sign_extend(val: u64, bitw: u32) -> i64 {
    debug_assert!(bitw > 0 && bitw <= 64);
    let shift = 64 - bitw;
    ((val << shift) as i64) >> shift
}

/// The smallest signed value representable in `bitw` bits.
pub(crate) fn min_signed(bitw: u32) -> i64 {
    sign_extend(1u64 << (bitw - 1), bitw)
}

/// The largest signed value representable in `bitw` bits.
pub(crate) fn max_signed(bitw: u32) -> i64 {
    (mask(bitw) >> 1) as i64
}

/// An integer `bitw` bits wide.
///
/// The stored value never has bits set above `bitw`, so equality and hashing can be derived.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ArbBitInt {
    bitw: u32,
    val: u64,
}

impl ArbBitInt {
    /// Create a new `ArbBitInt` that is `bitw` bits wide and has the value `val`. Any bits of
    /// `val` above `bitw` are ignored.
    pub fn from_u64(bitw: u32, val: u64) -> Self {
        assert!(bitw > 0 && bitw <= 64, "unsupported bit width {bitw}");
        Self {
            bitw,
            val: val & mask(bitw),
        }
    }

    /// Create a new `ArbBitInt` from the two's complement representation of `val`.
    pub fn from_i64(bitw: u32, val: i64) -> Self {
        Self::from_u64(bitw, val as u64)
    }

    pub fn zero(bitw: u32) -> Self {
        Self::from_u64(bitw, 0)
    }

    /// Create a new `ArbBitInt` with all `bitw` bits set (i.e. `-1`).
    pub fn all_bits_set(bitw: u32) -> Self {
        Self::from_u64(bitw, u64::MAX)
    }

    pub fn bitw(&self) -> u32 {
        self.bitw
    }

    pub fn to_sign_ext_i64(&self) -> i64 {
        sign_extend(self.val, self.bitw)
    }

    pub fn to_zero_ext_u64(&self) -> u64 {
        self.val
    }

    pub fn is_zero(&self) -> bool {
        self.val == 0
    }

    pub fn is_all_bits_set(&self) -> bool {
        self.val == mask(self.bitw)
    }

    /// Is the most significant bit set?
    pub fn is_negative(&self) -> bool {
        self.val >> (self.bitw - 1) & 1 == 1
    }

    fn with(&self, val: u64) -> Self {
        Self::from_u64(self.bitw, val)
    }

    fn check_bitw(&self, other: &Self) {
        assert_eq!(self.bitw, other.bitw, "bit width mismatch");
    }

    pub fn wrapping_add(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val.wrapping_add(other.val))
    }

    pub fn wrapping_sub(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val.wrapping_sub(other.val))
    }

    pub fn wrapping_mul(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val.wrapping_mul(other.val))
    }

    pub fn wrapping_neg(&self) -> Self {
        self.with(self.val.wrapping_neg())
    }

    /// Signed division, or `None` if `other` is zero. `MIN / -1` wraps to `MIN`.
    pub fn checked_sdiv(&self, other: &Self) -> Option<Self> {
        self.check_bitw(other);
        if other.is_zero() {
            return None;
        }
        let (lhs, rhs) = (self.to_sign_ext_i64(), other.to_sign_ext_i64());
        Some(Self::from_i64(self.bitw, lhs.wrapping_div(rhs)))
    }

    /// Signed remainder, or `None` if `other` is zero.
    pub fn checked_srem(&self, other: &Self) -> Option<Self> {
        self.check_bitw(other);
        if other.is_zero() {
            return None;
        }
        let (lhs, rhs) = (self.to_sign_ext_i64(), other.to_sign_ext_i64());
        Some(Self::from_i64(self.bitw, lhs.wrapping_rem(rhs)))
    }

    pub fn bitand(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val & other.val)
    }

    pub fn bitor(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val | other.val)
    }

    pub fn bitxor(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val ^ other.val)
    }

    pub fn bitneg(&self) -> Self {
        self.with(!self.val)
    }

    pub fn smin(&self, other: &Self) -> Self {
        self.check_bitw(other);
        if self.to_sign_ext_i64() <= other.to_sign_ext_i64() {
            self.clone()
        } else {
            other.clone()
        }
    }

    pub fn smax(&self, other: &Self) -> Self {
        self.check_bitw(other);
        if self.to_sign_ext_i64() >= other.to_sign_ext_i64() {
            self.clone()
        } else {
            other.clone()
        }
    }

    pub fn umin(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val.min(other.val))
    }

    pub fn umax(&self, other: &Self) -> Self {
        self.check_bitw(other);
        self.with(self.val.max(other.val))
    }

    /// Left shift by `bits % self.bitw()`.
    pub fn shl(&self, bits: u32) -> Self {
        self.with(self.val << (bits % self.bitw))
    }

    /// Arithmetic right shift by `bits % self.bitw()`.
    pub fn ashr(&self, bits: u32) -> Self {
        Self::from_i64(self.bitw, self.to_sign_ext_i64() >> (bits % self.bitw))
    }

    /// Logical right shift by `bits % self.bitw()`.
    pub fn lshr(&self, bits: u32) -> Self {
        self.with(self.val >> (bits % self.bitw))
    }

    /// Sign extend to `to_bitw` bits.
    ///
    /// # Panics
    ///
    /// If `to_bitw` is smaller than `self.bitw()`.
    pub fn sign_extend(&self, to_bitw: u32) -> Self {
        assert!(to_bitw >= self.bitw);
        Self::from_i64(to_bitw, self.to_sign_ext_i64())
    }

    /// Zero extend to `to_bitw` bits.
    ///
    /// # Panics
    ///
    /// If `to_bitw` is smaller than `self.bitw()`.
    pub fn zero_extend(&self, to_bitw: u32) -> Self {
        assert!(to_bitw >= self.bitw);
        Self::from_u64(to_bitw, self.val)
    }

    /// Truncate to `to_bitw` bits.
    ///
    /// # Panics
    ///
    /// If `to_bitw` is larger than `self.bitw()`.
    pub fn truncate(&self, to_bitw: u32) -> Self {
        assert!(to_bitw <= self.bitw);
        Self::from_u64(to_bitw, self.val)
    }

    /// Reverse the order of the bytes.
    ///
    /// # Panics
    ///
    /// If `self.bitw()` is not a multiple of 8.
    pub fn swap_bytes(&self) -> Self {
        assert_eq!(self.bitw % 8, 0, "cannot byte swap an i{}", self.bitw);
        self.with(self.val.swap_bytes() >> (64 - self.bitw))
    }
}

impl fmt::Display for ArbBitInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sign_ext_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn limits() {
        assert_eq!(min_signed(8), -128);
        assert_eq!(max_signed(8), 127);
        assert_eq!(min_signed(1), -1);
        assert_eq!(max_signed(1), 0);
        assert_eq!(min_signed(64), i64::MIN);
        assert_eq!(max_signed(64), i64::MAX);
    }

    #[test]
    fn swap_bytes() {
        assert_eq!(
            ArbBitInt::from_u64(32, 0x11223344).swap_bytes(),
            ArbBitInt::from_u64(32, 0x44332211)
        );
        assert_eq!(
            ArbBitInt::from_u64(16, 0xabcd).swap_bytes(),
            ArbBitInt::from_u64(16, 0xcdab)
        );
    }

    #[test]
    fn division() {
        let x = ArbBitInt::from_i64(8, -128);
        assert_eq!(x.checked_sdiv(&ArbBitInt::from_i64(8, -1)), Some(x.clone()));
        assert_eq!(x.checked_sdiv(&ArbBitInt::zero(8)), None);
        assert_eq!(
            ArbBitInt::from_i64(8, -7).checked_srem(&ArbBitInt::from_i64(8, 2)),
            Some(ArbBitInt::from_i64(8, -1))
        );
    }

    proptest! {
        #[test]
        fn arbbitint_8bit(x in any::<i8>(), y in any::<i8>()) {
            let (a, b) = (ArbBitInt::from_i64(8, x as i64), ArbBitInt::from_i64(8, y as i64));
            assert_eq!(a.to_sign_ext_i64(), x as i64);
            assert_eq!(a.wrapping_add(&b).to_sign_ext_i64(), x.wrapping_add(y) as i64);
            assert_eq!(a.wrapping_sub(&b).to_sign_ext_i64(), x.wrapping_sub(y) as i64);
            assert_eq!(a.wrapping_mul(&b).to_sign_ext_i64(), x.wrapping_mul(y) as i64);
            assert_eq!(a.bitand(&b).to_sign_ext_i64(), (x & y) as i64);
            assert_eq!(a.bitor(&b).to_sign_ext_i64(), (x | y) as i64);
            assert_eq!(a.bitxor(&b).to_sign_ext_i64(), (x ^ y) as i64);
            assert_eq!(a.smin(&b).to_sign_ext_i64(), x.min(y) as i64);
            assert_eq!(a.umax(&b).to_zero_ext_u64(), (x as u8).max(y as u8) as u64);
            assert_eq!(a.shl(y as u8 as u32).to_sign_ext_i64(), x.wrapping_shl(y as u8 as u32) as i64);
            assert_eq!(a.ashr(y as u8 as u32).to_sign_ext_i64(), x.wrapping_shr(y as u8 as u32) as i64);
            assert_eq!(
                a.lshr(y as u8 as u32).to_zero_ext_u64(),
                (x as u8).wrapping_shr(y as u8 as u32) as u64
            );
            assert_eq!(a.sign_extend(32).to_sign_ext_i64(), x as i64);
            assert_eq!(a.zero_extend(32).to_zero_ext_u64(), x as u8 as u64);
        }

        #[test]
        fn arbbitint_64bit(x in any::<i64>(), y in any::<i64>()) {
            let (a, b) = (ArbBitInt::from_i64(64, x), ArbBitInt::from_i64(64, y));
            assert_eq!(a.wrapping_add(&b).to_sign_ext_i64(), x.wrapping_add(y));
            assert_eq!(a.wrapping_neg().to_sign_ext_i64(), x.wrapping_neg());
            assert_eq!(a.truncate(16).to_sign_ext_i64(), x as i16 as i64);
            assert_eq!(a.swap_bytes().to_sign_ext_i64(), x.swap_bytes());
            assert_eq!(a.is_negative(), x < 0);
        }
    }
}
