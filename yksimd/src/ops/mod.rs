//! Scalar operator tables and their elementwise lifting to vectors.
//!
//! Every stamp kind that supports arithmetic has an [OpTable] which knows how to fold constants
//! and stamps for each operator. [op_table] returns the right table for a stamp: for vector
//! stamps this is the [lift]ed table of the lane's scalar table.

use crate::{
    arbbitint::ArbBitInt,
    constant::Constant,
    stamp::{LogicValue, Stamp},
};
use parking_lot::RwLock;
use std::{collections::HashMap, fmt::Display, sync::LazyLock};

mod float;
mod int;
mod logic;
mod simd;

pub use simd::SimdOps;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Sqrt,
    ReverseBytes,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Min,
    Max,
    UMin,
    UMax,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TernaryOp {
    /// `a * b + c` with a single rounding.
    Fma,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ShiftOp {
    Shl,
    /// Arithmetic shift right.
    Shr,
    /// Logical shift right.
    UShr,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum IntConvertOp {
    ZeroExtend,
    SignExtend,
    Narrow,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum FloatConvertOp {
    #[strum(serialize = "sitofp")]
    SIToFP,
    #[strum(serialize = "fptosi")]
    FPToSI,
    #[strum(serialize = "fpext")]
    FPExt,
    #[strum(serialize = "fptrunc")]
    FPTrunc,
}

/// Comparison predicates. On floats, the signed predicates are ordered comparisons (false if
/// either operand is NaN) and `Ne` is unordered.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Pred {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl Pred {
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Sgt | Self::Sge | Self::Slt | Self::Sle)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::Ugt | Self::Uge | Self::Ult | Self::Ule)
    }

    fn cmp_ord<T: PartialOrd>(self, x: T, y: T) -> bool {
        match self {
            Self::Eq => x == y,
            Self::Ne => x != y,
            Self::Ugt | Self::Sgt => x > y,
            Self::Uge | Self::Sge => x >= y,
            Self::Ult | Self::Slt => x < y,
            Self::Ule | Self::Sle => x <= y,
        }
    }

    /// Evaluate `x self y`.
    ///
    /// # Panics
    ///
    /// If the operands are of different shapes, are vectors, or `self` is not defined on them.
    pub fn fold(self, x: &Constant, y: &Constant) -> bool {
        match (x, y) {
            (Constant::Int(x), Constant::Int(y)) => {
                assert_eq!(x.bitw(), y.bitw());
                if self.is_unsigned() {
                    self.cmp_ord(x.to_zero_ext_u64(), y.to_zero_ext_u64())
                } else {
                    self.cmp_ord(x.to_sign_ext_i64(), y.to_sign_ext_i64())
                }
            }
            (Constant::Float(x), Constant::Float(y)) => {
                self.check_float();
                self.cmp_ord(*x, *y)
            }
            (Constant::Double(x), Constant::Double(y)) => {
                self.check_float();
                self.cmp_ord(*x, *y)
            }
            (Constant::Ptr(x), Constant::Ptr(y)) if !self.is_signed() => self.cmp_ord(*x, *y),
            (Constant::Logic(x), Constant::Logic(y)) if matches!(self, Self::Eq | Self::Ne) => {
                self.cmp_ord(*x, *y)
            }
            _ => panic!("cannot fold {x} {self} {y}"),
        }
    }

    fn check_float(self) {
        assert!(!self.is_unsigned(), "{self} is not a float comparison");
    }

    /// Decide `x self y` for every pair of values the stamps describe, if the answer is always
    /// the same.
    pub fn try_fold_stamps(self, x: &Stamp, y: &Stamp) -> Option<bool> {
        if x.is_empty() || y.is_empty() {
            return None;
        }
        if let (Some(cx), Some(cy)) = (x.as_constant(), y.as_constant()) {
            return Some(self.fold(&cx, &cy));
        }
        match (x, y) {
            (Stamp::Int(x), Stamp::Int(y)) => {
                let (xlo, xhi, ylo, yhi) = if self.is_unsigned() {
                    let (xlo, xhi) = x.unsigned_range();
                    let (ylo, yhi) = y.unsigned_range();
                    (i128::from(xlo), i128::from(xhi), i128::from(ylo), i128::from(yhi))
                } else {
                    (
                        i128::from(x.lo()),
                        i128::from(x.hi()),
                        i128::from(y.lo()),
                        i128::from(y.hi()),
                    )
                };
                let bits_disjoint = (x.must_set() & !y.may_set()) | (y.must_set() & !x.may_set()) != 0;
                self.fold_ranges(xlo, xhi, ylo, yhi, bits_disjoint)
            }
            (Stamp::Float(x), Stamp::Float(y)) => {
                self.check_float();
                if x.may_be_nan() || y.may_be_nan() {
                    return None;
                }
                self.fold_ranges(x.lo(), x.hi(), y.lo(), y.hi(), false)
            }
            (Stamp::Ptr(x), Stamp::Ptr(y)) => {
                let disjoint =
                    x.is_always_null() && y.is_non_null() || x.is_non_null() && y.is_always_null();
                match (self, disjoint) {
                    (Self::Eq, true) => Some(false),
                    (Self::Ne, true) => Some(true),
                    _ => None,
                }
            }
            (Stamp::Logic(x), Stamp::Logic(y)) => {
                let disjoint = x.join(*y) == LogicValue::Empty;
                match (self, disjoint) {
                    (Self::Eq, true) => Some(false),
                    (Self::Ne, true) => Some(true),
                    _ => None,
                }
            }
            _ => panic!("cannot compare {x} {self} {y}"),
        }
    }

    fn fold_ranges<T: PartialOrd>(self, xlo: T, xhi: T, ylo: T, yhi: T, disjoint: bool) -> Option<bool> {
        let disjoint = disjoint || xhi < ylo || yhi < xlo;
        match self {
            Self::Eq if disjoint => Some(false),
            Self::Ne if disjoint => Some(true),
            Self::Eq | Self::Ne => None,
            Self::Ult | Self::Slt if xhi < ylo => Some(true),
            Self::Ult | Self::Slt if xlo >= yhi => Some(false),
            Self::Ule | Self::Sle if xhi <= ylo => Some(true),
            Self::Ule | Self::Sle if xlo > yhi => Some(false),
            Self::Ugt | Self::Sgt if xlo > yhi => Some(true),
            Self::Ugt | Self::Sgt if xhi <= ylo => Some(false),
            Self::Uge | Self::Sge if xlo >= yhi => Some(true),
            Self::Uge | Self::Sge if xhi < ylo => Some(false),
            _ => None,
        }
    }
}

/// Identifies a scalar operator table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OpTableId {
    Int,
    Float,
    Logic,
    /// A table lifted from a scalar table.
    Simd,
}

fn unsupported(id: OpTableId, what: impl Display) -> ! {
    panic!("{id:?} operator table has no case for {what}")
}

/// Constant and stamp folding for one kind of value.
///
/// Each method that takes operands expects them to be of the shape the table is for. The
/// `*_const` methods return `None` when the result is not a well-defined constant (e.g. integer
/// division by zero). Operators a table does not define panic.
pub trait OpTable: Send + Sync {
    fn id(&self) -> OpTableId;

    fn unary_const(&self, op: UnaryOp, _x: &Constant) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn unary_stamp(&self, op: UnaryOp, _x: &Stamp) -> Stamp {
        unsupported(self.id(), op)
    }

    fn binary_const(&self, op: BinaryOp, _x: &Constant, _y: &Constant) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn binary_stamp(&self, op: BinaryOp, _x: &Stamp, _y: &Stamp) -> Stamp {
        unsupported(self.id(), op)
    }

    /// The constant `n` of shape `s` such that `x op n == x` for all `x`, if there is one.
    fn binary_neutral(&self, _op: BinaryOp, _s: &Stamp) -> Option<Constant> {
        None
    }

    /// The constant of shape `s` which `x op x` always equals, if there is one.
    fn binary_zero(&self, _op: BinaryOp, _s: &Stamp) -> Option<Constant> {
        None
    }

    fn is_associative(&self, _op: BinaryOp) -> bool {
        false
    }

    fn is_commutative(&self, _op: BinaryOp) -> bool {
        false
    }

    /// Is `c` the neutral element of `op`?
    fn is_neutral(&self, op: BinaryOp, c: &Constant) -> bool {
        self.binary_neutral(op, &Stamp::from_constant(c))
            .is_some_and(|n| n == *c)
    }

    fn ternary_const(
        &self,
        op: TernaryOp,
        _a: &Constant,
        _b: &Constant,
        _c: &Constant,
    ) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn ternary_stamp(&self, op: TernaryOp, _a: &Stamp, _b: &Stamp, _c: &Stamp) -> Stamp {
        unsupported(self.id(), op)
    }

    /// Shift `x` by `amount`, which is masked to the lane width.
    fn shift_const(&self, op: ShiftOp, _x: &Constant, _amount: &Constant) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn shift_stamp(&self, op: ShiftOp, _x: &Stamp, _amount: &Stamp) -> Stamp {
        unsupported(self.id(), op)
    }

    fn int_convert_const(&self, op: IntConvertOp, _x: &Constant, _to_bitw: u32) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn int_convert_stamp(&self, op: IntConvertOp, _x: &Stamp, _to_bitw: u32) -> Stamp {
        unsupported(self.id(), op)
    }

    fn float_convert_const(
        &self,
        op: FloatConvertOp,
        _x: &Constant,
        _to_bitw: u32,
    ) -> Option<Constant> {
        unsupported(self.id(), op)
    }

    fn float_convert_stamp(&self, op: FloatConvertOp, _x: &Stamp, _to_bitw: u32) -> Stamp {
        unsupported(self.id(), op)
    }

    /// Reinterpret the bits of `x` as a value of shape `to`.
    fn reinterpret_const(&self, _to: &Stamp, _x: &Constant) -> Option<Constant> {
        unsupported(self.id(), "reinterpret")
    }

    fn reinterpret_stamp(&self, _to: &Stamp, _x: &Stamp) -> Stamp {
        unsupported(self.id(), "reinterpret")
    }
}

/// If `c` is a constant, its stamp; otherwise the result of `f`.
fn const_or(c: Option<Constant>, f: impl FnOnce() -> Stamp) -> Stamp {
    match c {
        Some(c) => Stamp::from_constant(&c),
        None => f(),
    }
}

fn as_int(c: &Constant) -> &ArbBitInt {
    match c {
        Constant::Int(x) => x,
        _ => panic!("{c} is not an integer"),
    }
}

/// Lifted tables, keyed by the scalar table's identity. Entries are leaked: there are at most as
/// many as there are scalar tables.
static LIFTED: LazyLock<RwLock<HashMap<OpTableId, &'static SimdOps>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Return the elementwise lifting of `elem` to vectors. Each distinct scalar table is lifted at
/// most once per process; concurrent first uses may build a table twice, but only one is ever
/// published.
pub fn lift(elem: &'static dyn OpTable) -> &'static SimdOps {
    let id = elem.id();
    assert_ne!(id, OpTableId::Simd, "cannot lift a vector operator table");
    if let Some(x) = LIFTED.read().get(&id) {
        return *x;
    }
    let new: &'static SimdOps = Box::leak(Box::new(SimdOps::new(elem)));
    *LIFTED.write().entry(id).or_insert(new)
}

static INT_OPS: int::IntOps = int::IntOps;
static FLOAT_OPS: float::FloatOps = float::FloatOps;
static LOGIC_OPS: logic::LogicOps = logic::LogicOps;

/// The operator table for values described by `stamp`.
///
/// # Panics
///
/// For pointer stamps, which have no arithmetic.
pub fn op_table(stamp: &Stamp) -> &'static dyn OpTable {
    match stamp {
        Stamp::Int(_) => &INT_OPS,
        Stamp::Float(_) => &FLOAT_OPS,
        Stamp::Logic(_) => &LOGIC_OPS,
        Stamp::Ptr(_) => panic!("no operator table for {stamp}"),
        Stamp::Simd(x) => lift(op_table(x.elem())),
    }
}

/// The stamp of `x` reinterpreted as `to`. A change in lane count moves bits across lanes and is
/// never folded.
pub fn reinterpret_stamp(to: &Stamp, x: &Stamp) -> Stamp {
    if to.is_simd() != x.is_simd() || to.lanes() != x.lanes() {
        return to.unrestricted();
    }
    match x {
        Stamp::Ptr(p) if p.is_always_null() => match to {
            Stamp::Int(i) => Stamp::from_constant(&Constant::Int(ArbBitInt::zero(i.bitw()))),
            _ => to.unrestricted(),
        },
        Stamp::Ptr(_) => to.unrestricted(),
        _ => op_table(x).reinterpret_stamp(to, x),
    }
}

/// Constant reinterpretation of `x` as `to`, under the same restrictions as [reinterpret_stamp].
pub fn reinterpret_const(to: &Stamp, x: &Constant) -> Option<Constant> {
    let xs = Stamp::from_constant(x);
    if to.is_simd() != xs.is_simd() || to.lanes() != xs.lanes() {
        return None;
    }
    match x {
        Constant::Ptr(p) => match to {
            Stamp::Int(i) if i.bitw() == 64 => {
                Some(Constant::Int(ArbBitInt::from_u64(64, *p as u64)))
            }
            _ => None,
        },
        _ => op_table(&xs).reinterpret_const(to, x),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        constant::{SimdConstant, test::ints},
        stamp::{FloatStamp, IntStamp, SimdStamp},
    };
    use std::thread;

    fn v4(xs: &[i64]) -> Constant {
        Constant::Simd(ints(32, xs))
    }

    #[test]
    fn lifted_add() {
        let s = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(32)), 4));
        let t = op_table(&s);
        assert_eq!(t.id(), OpTableId::Simd);
        assert_eq!(
            t.binary_const(BinaryOp::Add, &v4(&[1, 2, 3, 4]), &v4(&[10, 20, 30, 40])),
            Some(v4(&[11, 22, 33, 44]))
        );
    }

    #[test]
    fn lift_is_cached() {
        let s = Stamp::Int(IntStamp::unrestricted(8));
        let handles = (0..4)
            .map(|_| {
                thread::spawn(|| {
                    let s = Stamp::Int(IntStamp::unrestricted(8));
                    lift(op_table(&s)) as *const SimdOps as usize
                })
            })
            .collect::<Vec<_>>();
        let first = lift(op_table(&s)) as *const SimdOps as usize;
        for h in handles {
            assert_eq!(h.join().unwrap(), first);
        }
    }

    #[test]
    fn lifted_neutral_and_zero() {
        let s = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(32)), 4));
        let t = op_table(&s);
        assert_eq!(
            t.binary_neutral(BinaryOp::Mul, &s),
            Some(v4(&[1, 1, 1, 1]))
        );
        assert_eq!(t.binary_zero(BinaryOp::Xor, &s), Some(v4(&[0, 0, 0, 0])));
        assert_eq!(t.binary_zero(BinaryOp::Add, &s), None);
        assert!(t.is_neutral(BinaryOp::Add, &v4(&[0, 0, 0, 0])));
        assert!(!t.is_neutral(BinaryOp::Add, &v4(&[0, 1, 0, 0])));
        assert!(t.is_associative(BinaryOp::Add));
        assert!(t.is_commutative(BinaryOp::Mul));
        assert!(!t.is_commutative(BinaryOp::Sub));
    }

    #[test]
    fn lifted_shift_by_scalar_and_vector() {
        let s = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(32)), 4));
        let t = op_table(&s);
        let x = v4(&[1, 2, 3, 4]);
        assert_eq!(
            t.shift_const(ShiftOp::Shl, &x, &Constant::Int(ArbBitInt::from_u64(32, 1))),
            Some(v4(&[2, 4, 6, 8]))
        );
        assert_eq!(
            t.shift_const(ShiftOp::Shl, &x, &v4(&[0, 1, 2, 33])),
            Some(v4(&[1, 4, 12, 8]))
        );
    }

    #[test]
    #[should_panic(expected = "lane count mismatch")]
    fn lifted_length_mismatch() {
        let s = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(32)), 4));
        op_table(&s).binary_const(BinaryOp::Add, &v4(&[1, 2, 3, 4]), &v4(&[1, 2]));
    }

    #[test]
    fn lifted_reinterpret() {
        let s = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(32)), 2));
        let t = op_table(&s);
        let to = Stamp::Simd(SimdStamp::broadcast(&Stamp::Float(FloatStamp::unrestricted(32)), 2));
        let x = Constant::Simd(ints(32, &[0x3f800000, 0]));
        assert_eq!(
            t.reinterpret_const(&to, &x),
            Some(Constant::Simd(SimdConstant::new(vec![
                Constant::Float(1.0),
                Constant::Float(0.0)
            ])))
        );
        // One 64-bit lane into two 32-bit lanes is not folded.
        let wide = Stamp::Simd(SimdStamp::broadcast(&Stamp::Int(IntStamp::unrestricted(64)), 1));
        let one = Stamp::from_constant(&Constant::Simd(ints(64, &[5])));
        assert_eq!(op_table(&wide).reinterpret_stamp(&s, &one), s);
        assert_eq!(
            op_table(&wide).reinterpret_const(&s, &Constant::Simd(ints(64, &[5]))),
            None
        );
    }

    #[test]
    fn pred_folding() {
        let i = |x| Constant::Int(ArbBitInt::from_i64(8, x));
        assert!(Pred::Slt.fold(&i(-1), &i(0)));
        assert!(!Pred::Ult.fold(&i(-1), &i(0)));
        assert!(!Pred::Slt.fold(&Constant::Double(f64::NAN), &Constant::Double(0.0)));
        assert!(Pred::Ne.fold(&Constant::Double(f64::NAN), &Constant::Double(f64::NAN)));

        let r = |lo, hi| Stamp::Int(IntStamp::range(8, lo, hi));
        assert_eq!(Pred::Eq.try_fold_stamps(&r(0, 3), &r(4, 9)), Some(false));
        assert_eq!(Pred::Ne.try_fold_stamps(&r(0, 3), &r(4, 9)), Some(true));
        assert_eq!(Pred::Sle.try_fold_stamps(&r(0, 4), &r(4, 9)), Some(true));
        assert_eq!(Pred::Slt.try_fold_stamps(&r(0, 4), &r(4, 9)), None);
        assert_eq!(Pred::Ugt.try_fold_stamps(&r(-2, -1), &r(0, 9)), Some(true));
        let odd = Stamp::Int(IntStamp::from_bits(8, 0xff, 1));
        let even = Stamp::Int(IntStamp::from_bits(8, 0xfe, 0));
        assert_eq!(Pred::Eq.try_fold_stamps(&odd, &even), Some(false));
        assert_eq!(
            Pred::Eq.try_fold_stamps(
                &Stamp::Logic(LogicValue::True),
                &Stamp::Logic(LogicValue::Unrestricted)
            ),
            None
        );
    }
}
