use std::fmt;

/// The possible values of a 32 or 64 bit IEEE float: a (possibly empty) range plus whether NaN is
/// possible. 32-bit values are stored widened to `f64`, which is exact.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatStamp {
    bitw: u32,
    lo: f64,
    hi: f64,
    may_be_nan: bool,
}

impl FloatStamp {
    pub fn new(bitw: u32, lo: f64, hi: f64, may_be_nan: bool) -> Self {
        assert!(bitw == 32 || bitw == 64, "unsupported float width {bitw}");
        // An empty range always has the same representation. `!(lo <= hi)` also catches NaN
        // bounds.
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        let (lo, hi) = if !(lo <= hi) {
            (f64::INFINITY, f64::NEG_INFINITY)
        } else {
            (lo, hi)
        };
        Self {
            bitw,
            lo,
            hi,
            may_be_nan,
        }
    }

    pub fn unrestricted(bitw: u32) -> Self {
        Self::new(bitw, f64::NEG_INFINITY, f64::INFINITY, true)
    }

    pub fn empty(bitw: u32) -> Self {
        Self::new(bitw, f64::INFINITY, f64::NEG_INFINITY, false)
    }

    pub fn from_f64(bitw: u32, v: f64) -> Self {
        if v.is_nan() {
            Self::new(bitw, f64::INFINITY, f64::NEG_INFINITY, true)
        } else {
            Self::new(bitw, v, v, false)
        }
    }

    pub fn bitw(&self) -> u32 {
        self.bitw
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn may_be_nan(&self) -> bool {
        self.may_be_nan
    }

    fn range_is_empty(&self) -> bool {
        self.lo > self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.range_is_empty() && !self.may_be_nan
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::unrestricted(self.bitw)
    }

    /// The single value described by this stamp, if there is one. `0.0` and `-0.0` are distinct
    /// values.
    pub fn as_constant(&self) -> Option<f64> {
        if self.range_is_empty() {
            self.may_be_nan.then_some(f64::NAN)
        } else if !self.may_be_nan && self.lo.to_bits() == self.hi.to_bits() {
            Some(self.lo)
        } else {
            None
        }
    }

    fn check_bitw(&self, other: &Self) {
        assert_eq!(
            self.bitw, other.bitw,
            "incompatible stamps: f{} and f{}",
            self.bitw, other.bitw
        );
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.check_bitw(other);
        let (lo, hi) = if self.range_is_empty() {
            (other.lo, other.hi)
        } else if other.range_is_empty() {
            (self.lo, self.hi)
        } else {
            (self.lo.min(other.lo), self.hi.max(other.hi))
        };
        Self::new(self.bitw, lo, hi, self.may_be_nan || other.may_be_nan)
    }

    pub fn join(&self, other: &Self) -> Self {
        self.check_bitw(other);
        Self::new(
            self.bitw,
            self.lo.max(other.lo),
            self.hi.min(other.hi),
            self.may_be_nan && other.may_be_nan,
        )
    }
}

impl fmt::Display for FloatStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = if self.bitw == 32 { "float" } else { "double" };
        if self.is_empty() {
            write!(f, "{ty}<empty>")
        } else if self.is_unrestricted() {
            write!(f, "{ty}")
        } else if let Some(c) = self.as_constant() {
            write!(f, "{ty}[{c}]")
        } else {
            let nan = if self.may_be_nan { ",nan" } else { "" };
            write!(f, "{ty}[{}..{}{nan}]", self.lo, self.hi)
        }
    }
}
