//! Elementwise lifting of a scalar operator table to vectors.

use super::{
    BinaryOp, FloatConvertOp, IntConvertOp, OpTable, OpTableId, ShiftOp, TernaryOp, UnaryOp,
};
use crate::{
    constant::{Constant, SimdConstant},
    stamp::{SimdStamp, Stamp},
};

/// A vector operator table applying `elem` independently to each lane.
pub struct SimdOps {
    elem: &'static dyn OpTable,
}

fn simd_const(c: &Constant) -> &SimdConstant {
    match c {
        Constant::Simd(x) => x,
        _ => panic!("{c} is not a vector constant"),
    }
}

fn simd_stamp(s: &Stamp) -> &SimdStamp {
    match s {
        Stamp::Simd(x) => x,
        _ => panic!("{s} is not a vector stamp"),
    }
}

fn check_lanes(x: usize, y: usize) {
    assert_eq!(x, y, "lane count mismatch: {x} and {y}");
}

/// Apply `f` to each lane, failing if any lane fails.
fn map_consts(len: usize, f: impl Fn(usize) -> Option<Constant>) -> Option<Constant> {
    (0..len)
        .map(f)
        .collect::<Option<Vec<_>>>()
        .map(|x| Constant::Simd(SimdConstant::new(x)))
}

fn map_stamps(len: usize, f: impl Fn(usize) -> Stamp) -> Stamp {
    Stamp::Simd(SimdStamp::new((0..len).map(f).collect()))
}

/// A shift amount is either per lane or a scalar shared by every lane.
fn amount_const(amount: &Constant, i: usize) -> &Constant {
    match amount {
        Constant::Simd(x) => x.get(i),
        x => x,
    }
}

fn amount_stamp(amount: &Stamp, i: usize) -> &Stamp {
    match amount {
        Stamp::Simd(x) => x.comp(i),
        x => x,
    }
}

impl SimdOps {
    pub(super) fn new(elem: &'static dyn OpTable) -> Self {
        Self { elem }
    }

    /// The scalar table this table was lifted from.
    pub fn elem(&self) -> &'static dyn OpTable {
        self.elem
    }

    /// Can `x` be reinterpreted as `to` lane by lane?
    fn lanewise_reinterpret(to: &SimdStamp, len: usize, from_elem: &Stamp) -> bool {
        let to_elem = to.elem();
        to.len() == len
            && (to_elem.bitw() == from_elem.bitw()
                || matches!(to_elem, Stamp::Logic(_))
                || matches!(from_elem, Stamp::Logic(_)))
    }
}

impl OpTable for SimdOps {
    fn id(&self) -> OpTableId {
        OpTableId::Simd
    }

    fn unary_const(&self, op: UnaryOp, x: &Constant) -> Option<Constant> {
        let x = simd_const(x);
        map_consts(x.len(), |i| self.elem.unary_const(op, x.get(i)))
    }

    fn unary_stamp(&self, op: UnaryOp, x: &Stamp) -> Stamp {
        let x = simd_stamp(x);
        map_stamps(x.len(), |i| self.elem.unary_stamp(op, x.comp(i)))
    }

    fn binary_const(&self, op: BinaryOp, x: &Constant, y: &Constant) -> Option<Constant> {
        let (x, y) = (simd_const(x), simd_const(y));
        check_lanes(x.len(), y.len());
        map_consts(x.len(), |i| self.elem.binary_const(op, x.get(i), y.get(i)))
    }

    fn binary_stamp(&self, op: BinaryOp, x: &Stamp, y: &Stamp) -> Stamp {
        let (x, y) = (simd_stamp(x), simd_stamp(y));
        check_lanes(x.len(), y.len());
        map_stamps(x.len(), |i| self.elem.binary_stamp(op, x.comp(i), y.comp(i)))
    }

    fn binary_neutral(&self, op: BinaryOp, s: &Stamp) -> Option<Constant> {
        let s = simd_stamp(s);
        map_consts(s.len(), |i| self.elem.binary_neutral(op, s.comp(i)))
    }

    fn binary_zero(&self, op: BinaryOp, s: &Stamp) -> Option<Constant> {
        let s = simd_stamp(s);
        map_consts(s.len(), |i| self.elem.binary_zero(op, s.comp(i)))
    }

    fn is_associative(&self, op: BinaryOp) -> bool {
        self.elem.is_associative(op)
    }

    fn is_commutative(&self, op: BinaryOp) -> bool {
        self.elem.is_commutative(op)
    }

    fn ternary_const(
        &self,
        op: TernaryOp,
        a: &Constant,
        b: &Constant,
        c: &Constant,
    ) -> Option<Constant> {
        let (a, b, c) = (simd_const(a), simd_const(b), simd_const(c));
        check_lanes(a.len(), b.len());
        check_lanes(a.len(), c.len());
        map_consts(a.len(), |i| {
            self.elem.ternary_const(op, a.get(i), b.get(i), c.get(i))
        })
    }

    fn ternary_stamp(&self, op: TernaryOp, a: &Stamp, b: &Stamp, c: &Stamp) -> Stamp {
        let (a, b, c) = (simd_stamp(a), simd_stamp(b), simd_stamp(c));
        check_lanes(a.len(), b.len());
        check_lanes(a.len(), c.len());
        map_stamps(a.len(), |i| {
            self.elem.ternary_stamp(op, a.comp(i), b.comp(i), c.comp(i))
        })
    }

    fn shift_const(&self, op: ShiftOp, x: &Constant, amount: &Constant) -> Option<Constant> {
        let x = simd_const(x);
        if let Constant::Simd(a) = amount {
            check_lanes(x.len(), a.len());
        }
        map_consts(x.len(), |i| {
            self.elem.shift_const(op, x.get(i), amount_const(amount, i))
        })
    }

    fn shift_stamp(&self, op: ShiftOp, x: &Stamp, amount: &Stamp) -> Stamp {
        let x = simd_stamp(x);
        if let Stamp::Simd(a) = amount {
            check_lanes(x.len(), a.len());
        }
        map_stamps(x.len(), |i| {
            self.elem.shift_stamp(op, x.comp(i), amount_stamp(amount, i))
        })
    }

    fn int_convert_const(&self, op: IntConvertOp, x: &Constant, to_bitw: u32) -> Option<Constant> {
        let x = simd_const(x);
        map_consts(x.len(), |i| self.elem.int_convert_const(op, x.get(i), to_bitw))
    }

    fn int_convert_stamp(&self, op: IntConvertOp, x: &Stamp, to_bitw: u32) -> Stamp {
        let x = simd_stamp(x);
        map_stamps(x.len(), |i| self.elem.int_convert_stamp(op, x.comp(i), to_bitw))
    }

    fn float_convert_const(
        &self,
        op: FloatConvertOp,
        x: &Constant,
        to_bitw: u32,
    ) -> Option<Constant> {
        let x = simd_const(x);
        map_consts(x.len(), |i| self.elem.float_convert_const(op, x.get(i), to_bitw))
    }

    fn float_convert_stamp(&self, op: FloatConvertOp, x: &Stamp, to_bitw: u32) -> Stamp {
        let x = simd_stamp(x);
        map_stamps(x.len(), |i| self.elem.float_convert_stamp(op, x.comp(i), to_bitw))
    }

    /// Lanes are folded one by one when they line up. Reinterpretations which move bits across
    /// lane boundaries are not folded.
    fn reinterpret_const(&self, to: &Stamp, x: &Constant) -> Option<Constant> {
        let (to, x) = (simd_stamp(to), simd_const(x));
        let from_elem = Stamp::from_constant(x.get(0));
        if !Self::lanewise_reinterpret(to, x.len(), &from_elem) {
            return None;
        }
        map_consts(x.len(), |i| self.elem.reinterpret_const(to.comp(i), x.get(i)))
    }

    fn reinterpret_stamp(&self, to: &Stamp, x: &Stamp) -> Stamp {
        let (tos, xs) = (simd_stamp(to), simd_stamp(x));
        if !Self::lanewise_reinterpret(tos, xs.len(), xs.elem()) {
            return to.unrestricted();
        }
        map_stamps(xs.len(), |i| self.elem.reinterpret_stamp(tos.comp(i), xs.comp(i)))
    }
}
