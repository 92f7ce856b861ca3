//! Stamps: abstract values describing what an IR node might be at run-time.
//!
//! Stamps form a lattice. `meet` is the conservative merge used where control flow joins (the
//! union of possibilities); `join` combines independently known facts (the intersection of
//! possibilities). Every kind of stamp has an empty element (no possible values) and an
//! unrestricted element (any value of the right shape).

use crate::constant::Constant;
use std::fmt;
use strum::EnumDiscriminants;

mod float;
mod int;
mod logic;
mod ptr;
mod simd;

pub use float::FloatStamp;
pub use int::IntStamp;
pub use logic::LogicValue;
pub use ptr::PtrStamp;
pub use simd::SimdStamp;

#[derive(Clone, Debug, EnumDiscriminants, PartialEq)]
#[strum_discriminants(name(StampKind))]
pub enum Stamp {
    Int(IntStamp),
    Float(FloatStamp),
    Ptr(PtrStamp),
    Logic(LogicValue),
    Simd(SimdStamp),
}

impl Stamp {
    pub fn kind(&self) -> StampKind {
        StampKind::from(self)
    }

    pub fn is_simd(&self) -> bool {
        matches!(self, Self::Simd(_))
    }

    /// The bit width of a scalar stamp. Logic values are 1 bit wide.
    ///
    /// # Panics
    ///
    /// If `self` is a vector stamp.
    pub fn bitw(&self) -> u32 {
        match self {
            Self::Int(x) => x.bitw(),
            Self::Float(x) => x.bitw(),
            Self::Ptr(_) => 64,
            Self::Logic(_) => 1,
            Self::Simd(_) => panic!("bitw of a vector stamp"),
        }
    }

    /// How many bytes a scalar of this stamp occupies in memory.
    pub fn byte_size(&self) -> usize {
        self.bitw().div_ceil(8) as usize
    }

    /// Can `self` and `other` describe the same values? Scalars must be of the same kind and
    /// width; vectors must additionally have the same length.
    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Simd(x), Self::Simd(y)) => x.len() == y.len() && x.elem().is_compatible(y.elem()),
            (Self::Simd(_), _) | (_, Self::Simd(_)) => false,
            (x, y) => x.kind() == y.kind() && x.bitw() == y.bitw(),
        }
    }

    fn check_compatible(&self, other: &Self) {
        assert!(
            self.is_compatible(other),
            "incompatible stamps: {self} and {other}"
        );
    }

    /// The stamp of the same shape as `self` that admits every value.
    pub fn unrestricted(&self) -> Self {
        match self {
            Self::Int(x) => Self::Int(IntStamp::unrestricted(x.bitw())),
            Self::Float(x) => Self::Float(FloatStamp::unrestricted(x.bitw())),
            Self::Ptr(_) => Self::Ptr(PtrStamp::unrestricted()),
            Self::Logic(_) => Self::Logic(LogicValue::Unrestricted),
            Self::Simd(x) => Self::Simd(x.unrestricted()),
        }
    }

    /// The stamp of the same shape as `self` that admits no value.
    pub fn empty(&self) -> Self {
        match self {
            Self::Int(x) => Self::Int(IntStamp::empty(x.bitw())),
            Self::Float(x) => Self::Float(FloatStamp::empty(x.bitw())),
            Self::Ptr(_) => Self::Ptr(PtrStamp::empty()),
            Self::Logic(_) => Self::Logic(LogicValue::Empty),
            Self::Simd(x) => Self::Simd(x.empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Int(x) => x.is_empty(),
            Self::Float(x) => x.is_empty(),
            Self::Ptr(x) => x.is_empty(),
            Self::Logic(x) => !x.has_values(),
            Self::Simd(x) => x.is_empty(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == self.unrestricted()
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.check_compatible(other);
        match (self, other) {
            (Self::Int(x), Self::Int(y)) => Self::Int(x.meet(y)),
            (Self::Float(x), Self::Float(y)) => Self::Float(x.meet(y)),
            (Self::Ptr(x), Self::Ptr(y)) => Self::Ptr(x.meet(y)),
            (Self::Logic(x), Self::Logic(y)) => Self::Logic(x.meet(*y)),
            (Self::Simd(x), Self::Simd(y)) => Self::Simd(x.meet(y)),
            _ => unreachable!(),
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        self.check_compatible(other);
        match (self, other) {
            (Self::Int(x), Self::Int(y)) => Self::Int(x.join(y)),
            (Self::Float(x), Self::Float(y)) => Self::Float(x.join(y)),
            (Self::Ptr(x), Self::Ptr(y)) => Self::Ptr(x.join(y)),
            (Self::Logic(x), Self::Logic(y)) => Self::Logic(x.join(*y)),
            (Self::Simd(x), Self::Simd(y)) => Self::Simd(x.join(y)),
            _ => unreachable!(),
        }
    }

    /// If this stamp describes exactly one value, return it.
    pub fn as_constant(&self) -> Option<Constant> {
        match self {
            Self::Int(x) => x.as_constant().map(Constant::Int),
            Self::Float(x) => x.as_constant().map(|v| {
                if x.bitw() == 32 {
                    Constant::Float(v as f32)
                } else {
                    Constant::Double(v)
                }
            }),
            Self::Ptr(x) => x.as_constant().map(Constant::Ptr),
            Self::Logic(x) => x.as_bool().map(Constant::Logic),
            Self::Simd(x) => x.as_constant().map(Constant::Simd),
        }
    }

    /// The most precise stamp describing `c`.
    pub fn from_constant(c: &Constant) -> Self {
        match c {
            Constant::Int(x) => Self::Int(IntStamp::from_constant(x)),
            Constant::Float(x) => Self::Float(FloatStamp::from_f64(32, f64::from(*x))),
            Constant::Double(x) => Self::Float(FloatStamp::from_f64(64, *x)),
            Constant::Ptr(x) => Self::Ptr(PtrStamp::from_constant(*x)),
            Constant::Logic(x) => Self::Logic(LogicValue::from_bool(*x)),
            Constant::Simd(x) => Self::Simd(SimdStamp::from_constant(x)),
        }
    }

    /// The zero value for a scalar of this stamp's shape: integer 0, float 0.0, null, or false.
    pub fn zero_constant(&self) -> Constant {
        match self {
            Self::Int(x) => Constant::Int(crate::arbbitint::ArbBitInt::zero(x.bitw())),
            Self::Float(x) if x.bitw() == 32 => Constant::Float(0.0),
            Self::Float(_) => Constant::Double(0.0),
            Self::Ptr(_) => Constant::Ptr(0),
            Self::Logic(_) => Constant::Logic(false),
            Self::Simd(_) => panic!("zero constant of a vector stamp"),
        }
    }

    pub fn as_simd(&self) -> Option<&SimdStamp> {
        match self {
            Self::Simd(x) => Some(x),
            _ => None,
        }
    }

    /// The number of lanes: 1 for scalars.
    pub fn lanes(&self) -> usize {
        match self {
            Self::Simd(x) => x.len(),
            _ => 1,
        }
    }

    /// The stamp of one lane: `self` for scalars.
    pub fn lane_stamp(&self) -> &Stamp {
        match self {
            Self::Simd(x) => x.elem(),
            _ => self,
        }
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{x}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Ptr(x) => write!(f, "{x}"),
            Self::Logic(x) => write!(f, "logic[{x}]"),
            Self::Simd(x) => write!(f, "{x}"),
        }
    }
}

impl From<IntStamp> for Stamp {
    fn from(x: IntStamp) -> Self {
        Self::Int(x)
    }
}

impl From<FloatStamp> for Stamp {
    fn from(x: FloatStamp) -> Self {
        Self::Float(x)
    }
}

impl From<PtrStamp> for Stamp {
    fn from(x: PtrStamp) -> Self {
        Self::Ptr(x)
    }
}

impl From<LogicValue> for Stamp {
    fn from(x: LogicValue) -> Self {
        Self::Logic(x)
    }
}

impl From<SimdStamp> for Stamp {
    fn from(x: SimdStamp) -> Self {
        Self::Simd(x)
    }
}
