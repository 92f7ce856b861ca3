//! Arithmetic rules: constant folding through the (lifted) operator tables and simple algebraic
//! identities.

use super::{Rewrite, constant};
use crate::{
    graph::{
        Binary, FloatConvert, Graph, IntConvert, NodeIdx, Op, Reinterpret, Shift, Ternary, Unary,
    },
    ops::{self, BinaryOp, IntConvertOp, UnaryOp, op_table},
    stamp::Stamp,
};

fn const_of(g: &Graph, idx: NodeIdx) -> Option<crate::constant::Constant> {
    g.as_constant(idx).cloned()
}

/// Does any lane of `s` hold a logic value? Reinterpretations through such stamps are not bit
/// preserving.
fn has_logic_lanes(s: &Stamp) -> bool {
    matches!(s.lane_stamp(), Stamp::Logic(_))
}

/// `op` applied twice is the identity.
fn is_involution(op: UnaryOp) -> bool {
    matches!(op, UnaryOp::Neg | UnaryOp::Not | UnaryOp::ReverseBytes)
}

pub(super) fn unary(g: &Graph, x: &Unary) -> Option<Rewrite> {
    if let Some(c) = const_of(g, x.val) {
        return op_table(g.stamp(x.val)).unary_const(x.op, &c).map(constant);
    }
    if let Op::Unary(Unary { op, val }) = g.op(x.val)
        && *op == x.op
        && is_involution(x.op)
    {
        return Some(Rewrite::Equiv(*val));
    }
    None
}

pub(super) fn binary(g: &Graph, x: &Binary) -> Option<Rewrite> {
    let table = op_table(g.stamp(x.lhs));
    let (lc, rc) = (const_of(g, x.lhs), const_of(g, x.rhs));
    match (lc, rc) {
        (Some(l), Some(r)) => table.binary_const(x.op, &l, &r).map(constant),
        (Some(_), None) if table.is_commutative(x.op) => {
            // Constants go on the right.
            Some(Rewrite::Rewritten(Op::Binary(Binary {
                op: x.op,
                lhs: x.rhs,
                rhs: x.lhs,
            })))
        }
        (_, Some(r)) if table.is_neutral(x.op, &r) => Some(Rewrite::Equiv(x.lhs)),
        _ if x.lhs == x.rhs && matches!(x.op, BinaryOp::And | BinaryOp::Or) => {
            Some(Rewrite::Equiv(x.lhs))
        }
        _ if x.lhs == x.rhs => table.binary_zero(x.op, g.stamp(x.lhs)).map(constant),
        _ => None,
    }
}

pub(super) fn ternary(g: &Graph, x: &Ternary) -> Option<Rewrite> {
    let a = const_of(g, x.a)?;
    let b = const_of(g, x.b)?;
    let c = const_of(g, x.c)?;
    op_table(g.stamp(x.a))
        .ternary_const(x.op, &a, &b, &c)
        .map(constant)
}

pub(super) fn shift(g: &Graph, x: &Shift) -> Option<Rewrite> {
    let amount = const_of(g, x.amount)?;
    if let Some(val) = const_of(g, x.val) {
        return op_table(g.stamp(x.val))
            .shift_const(x.op, &val, &amount)
            .map(constant);
    }
    let zero = match &amount {
        crate::constant::Constant::Simd(s) => s.is_all_zeros(),
        c => c.as_int().is_some_and(|i| i.is_zero()),
    };
    zero.then_some(Rewrite::Equiv(x.val))
}

pub(super) fn int_convert(g: &Graph, x: &IntConvert) -> Option<Rewrite> {
    if let Some(c) = const_of(g, x.val) {
        return op_table(g.stamp(x.val))
            .int_convert_const(x.op, &c, x.to_bitw)
            .map(constant);
    }
    let from = g.stamp(x.val).lane_stamp().bitw();
    if from == x.to_bitw {
        return Some(Rewrite::Equiv(x.val));
    }
    // narrow(extend(y)) back to y's width.
    if x.op == IntConvertOp::Narrow
        && let Op::IntConvert(IntConvert { op, val, .. }) = g.op(x.val)
        && matches!(op, IntConvertOp::SignExtend | IntConvertOp::ZeroExtend)
        && g.stamp(*val).lane_stamp().bitw() == x.to_bitw
    {
        return Some(Rewrite::Equiv(*val));
    }
    None
}

pub(super) fn float_convert(g: &Graph, x: &FloatConvert) -> Option<Rewrite> {
    let c = const_of(g, x.val)?;
    op_table(g.stamp(x.val))
        .float_convert_const(x.op, &c, x.to_bitw)
        .map(constant)
}

pub(super) fn reinterpret(g: &Graph, x: &Reinterpret) -> Option<Rewrite> {
    if let Some(c) = const_of(g, x.val) {
        return ops::reinterpret_const(&x.to, &c).map(constant);
    }
    let from = g.stamp(x.val);
    if from.unrestricted() == x.to.unrestricted() {
        return Some(Rewrite::Equiv(x.val));
    }
    if let Op::Reinterpret(Reinterpret { val: inner, .. }) = g.op(x.val)
        && !has_logic_lanes(from)
        && !has_logic_lanes(g.stamp(*inner))
        && !has_logic_lanes(&x.to)
    {
        return Some(Rewrite::Rewritten(Op::Reinterpret(Reinterpret {
            val: *inner,
            to: x.to.unrestricted(),
        })));
    }
    None
}

#[cfg(test)]
mod test {
    use crate::{
        arbbitint::ArbBitInt,
        canon::test::canon,
        constant::{Constant, test::ints},
        graph::{test::*, *},
        ops::{BinaryOp, IntConvertOp, ShiftOp, UnaryOp},
        stamp::{FloatStamp, Stamp},
    };

    #[test]
    fn fold_vector_add() {
        let mut g = graph();
        let x = g.push_const(Constant::Simd(ints(32, &[1, 2, 3, 4])));
        let y = g.push_const(Constant::Simd(ints(32, &[10, 20, 30, 40])));
        let add = g.push(Binary {
            op: BinaryOp::Add,
            lhs: x,
            rhs: y,
        });
        canon(&mut g);
        assert_eq!(
            g.as_constant(add),
            Some(&Constant::Simd(ints(32, &[11, 22, 33, 44])))
        );
    }

    #[test]
    fn identities() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let not = g.push(Unary {
            op: UnaryOp::Not,
            val: x,
        });
        let notnot = g.push(Unary {
            op: UnaryOp::Not,
            val: not,
        });
        let xor = g.push(Binary {
            op: BinaryOp::Xor,
            lhs: x,
            rhs: x,
        });
        let and = g.push(Binary {
            op: BinaryOp::And,
            lhs: x,
            rhs: x,
        });
        let one = g.push_const(Constant::Simd(ints(32, &[1, 1, 1, 1])));
        let mul = g.push(Binary {
            op: BinaryOp::Mul,
            lhs: one,
            rhs: x,
        });
        canon(&mut g);
        assert_eq!(g.equiv(notnot), x);
        assert_eq!(
            g.as_constant(xor),
            Some(&Constant::Simd(ints(32, &[0, 0, 0, 0])))
        );
        assert_eq!(g.equiv(and), x);
        assert_eq!(g.equiv(mul), x);
    }

    #[test]
    fn sub_is_not_commuted() {
        let mut g = graph();
        let x = g.push_param(i32s());
        let c = g.push_const(Constant::Int(ArbBitInt::from_i64(32, 0)));
        let sub = g.push(Binary {
            op: BinaryOp::Sub,
            lhs: c,
            rhs: x,
        });
        let stats = canon(&mut g);
        assert_eq!(stats.rewrites, 0);
        assert!(matches!(g.op(sub), Op::Binary(Binary { lhs, .. }) if *lhs == c));
    }

    #[test]
    fn float_self_ops_kept() {
        let mut g = graph();
        let x = g.push_param(Stamp::Float(FloatStamp::unrestricted(64)));
        let sub = g.push(Binary {
            op: BinaryOp::Sub,
            lhs: x,
            rhs: x,
        });
        canon(&mut g);
        // NaN - NaN is NaN.
        assert!(matches!(g.op(sub), Op::Binary(_)));
    }

    #[test]
    fn shifts_and_converts() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let zero = g.push_const(Constant::Int(ArbBitInt::from_i64(32, 0)));
        let shl = g.push(Shift {
            op: ShiftOp::Shl,
            val: x,
            amount: zero,
        });
        let ext = g.push(IntConvert {
            op: IntConvertOp::SignExtend,
            val: x,
            to_bitw: 64,
        });
        let narrow = g.push(IntConvert {
            op: IntConvertOp::Narrow,
            val: ext,
            to_bitw: 32,
        });
        let same = g.push(IntConvert {
            op: IntConvertOp::Narrow,
            val: x,
            to_bitw: 32,
        });
        canon(&mut g);
        assert_eq!(g.equiv(shl), x);
        assert_eq!(g.equiv(narrow), x);
        assert_eq!(g.equiv(same), x);
    }

    #[test]
    fn reinterprets() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let f = v(&Stamp::Float(FloatStamp::unrestricted(32)), 4);
        let a = g.push(Reinterpret {
            val: x,
            to: f.clone(),
        });
        let b = g.push(Reinterpret {
            val: a,
            to: v(&i32s(), 4),
        });
        let same = g.push(Reinterpret { val: x, to: v(&i32s(), 4) });
        let c = g.push_const(Constant::Simd(ints(32, &[0x3f800000; 4])));
        let fc = g.push(Reinterpret { val: c, to: f });
        canon(&mut g);
        assert_eq!(g.equiv(b), x);
        assert_eq!(g.equiv(same), x);
        let Some(Constant::Simd(k)) = g.as_constant(fc) else {
            panic!()
        };
        assert_eq!(k.get(2), &Constant::Float(1.0));
    }
}
