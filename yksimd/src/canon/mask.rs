//! Rules for comparisons and the operators which consume masks.

use super::{Rewrite, constant};
use crate::{
    constant::{Constant, SimdConstant},
    graph::{Compare, Compress, Graph, MaskTest, MaskedLoad, Op, OpT, ToBitMask, Unary},
    ops::UnaryOp,
    stamp::Stamp,
};

/// Comparisons fold whenever every lane's result is known, which includes the case of two
/// constant operands.
pub(super) fn compare(g: &Graph, x: &Compare) -> Option<Rewrite> {
    x.infer_stamp(g).as_constant().map(constant)
}

pub(super) fn mask_test(g: &Graph, x: &MaskTest) -> Option<Rewrite> {
    if let Stamp::Logic(l) = x.infer_stamp(g)
        && let Some(b) = l.as_bool()
    {
        return Some(constant(Constant::Logic(b)));
    }
    let mut nots = 0;
    let mut cur = x.val;
    while let Op::Unary(Unary {
        op: UnaryOp::Not,
        val,
    }) = g.op(cur)
    {
        nots += 1;
        cur = *val;
    }
    if nots == 0 {
        return None;
    }
    let test = if nots % 2 == 1 { x.test.flip() } else { x.test };
    Some(Rewrite::Rewritten(Op::MaskTest(MaskTest { val: cur, test })))
}

pub(super) fn to_bit_mask(g: &Graph, x: &ToBitMask) -> Option<Rewrite> {
    x.infer_stamp(g).as_constant().map(constant)
}

/// Compressing with every lane selected moves nothing.
pub(super) fn compress(g: &Graph, x: &Compress) -> Option<Rewrite> {
    match g.stamp(x.mask).as_constant()? {
        Constant::Simd(m) if m.is_all_ones() => Some(Rewrite::Equiv(x.val)),
        _ => None,
    }
}

/// A masked load which selects no lanes reads nothing and produces zeros.
pub(super) fn masked_load(g: &Graph, x: &MaskedLoad) -> Option<Rewrite> {
    if let (Some(Constant::Simd(m)), Stamp::Simd(s)) = (g.stamp(x.mask).as_constant(), &x.stamp)
        && m.is_all_zeros()
    {
        let zero = s.elem().zero_constant();
        return Some(constant(Constant::Simd(SimdConstant::broadcast(&zero, s.len()))));
    }
    todo!("canonicalisation of masked loads")
}

#[cfg(test)]
mod test {
    use crate::{
        arbbitint::ArbBitInt,
        arch::MaskKind,
        canon::test::canon,
        constant::{
            Constant, SimdConstant,
            test::{ints, mask},
        },
        graph::{test::*, *},
        ops::{Pred, UnaryOp},
        stamp::{LogicValue, Stamp},
    };

    fn opmask(len: usize) -> Stamp {
        v(&Stamp::Logic(LogicValue::Unrestricted), len)
    }

    #[test]
    fn compare_folds_to_either_mask_kind() {
        let mut g = graph();
        let x = g.push_const(Constant::Simd(ints(32, &[1, 5, 3, 7])));
        let y = g.push_const(Constant::Simd(ints(32, &[2, 2, 3, 9])));
        let om = g.push(Compare {
            pred: Pred::Slt,
            lhs: x,
            rhs: y,
            mask: MaskKind::Opmask,
        });
        let bm = g.push(Compare {
            pred: Pred::Slt,
            lhs: x,
            rhs: y,
            mask: MaskKind::Bitmask,
        });
        let a = g.push_const(Constant::Int(ArbBitInt::from_i64(8, -1)));
        let b = g.push_const(Constant::Int(ArbBitInt::from_i64(8, 1)));
        let scalar = g.push(Compare {
            pred: Pred::Ult,
            lhs: a,
            rhs: b,
            mask: MaskKind::Opmask,
        });
        canon(&mut g);
        assert_eq!(
            g.as_constant(om),
            Some(&Constant::Simd(mask(&[true, false, false, true])))
        );
        assert_eq!(
            g.as_constant(bm),
            Some(&Constant::Simd(ints(32, &[-1, 0, 0, -1])))
        );
        assert_eq!(g.as_constant(scalar), Some(&Constant::Logic(false)));
    }

    #[test]
    fn compare_unknown_lanes_kept() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_const(Constant::Simd(ints(32, &[2, 2, 3, 9])));
        let c = g.push_compare(Pred::Eq, x, y);
        canon(&mut g);
        assert!(matches!(g.op(c), Op::Compare(_)));
    }

    #[test]
    fn mask_test_strips_negations() {
        for (n, expect) in [(1, MaskTestKind::AllZeros), (2, MaskTestKind::AllOnes), (3, MaskTestKind::AllZeros)] {
            let mut g = graph();
            let m = g.push_param(opmask(8));
            let mut val = m;
            for _ in 0..n {
                val = g.push(Unary {
                    op: UnaryOp::Not,
                    val,
                });
            }
            let t = g.push(MaskTest {
                val,
                test: MaskTestKind::AllOnes,
            });
            canon(&mut g);
            assert!(
                matches!(g.op(t), Op::MaskTest(MaskTest { val, test }) if *val == m && *test == expect),
                "{n}: {}",
                g.describe(t)
            );
        }
    }

    #[test]
    fn mask_test_folds() {
        let mut g = graph();
        let ones = g.push_const(Constant::Simd(SimdConstant::broadcast(&Constant::Logic(true), 4)));
        let mixed = g.push_const(Constant::Simd(mask(&[true, false, true, true])));
        let all_ones = g.push(MaskTest {
            val: ones,
            test: MaskTestKind::AllOnes,
        });
        let all_zeros = g.push(MaskTest {
            val: ones,
            test: MaskTestKind::AllZeros,
        });
        let not_ones = g.push(MaskTest {
            val: mixed,
            test: MaskTestKind::AllOnes,
        });
        canon(&mut g);
        assert_eq!(g.as_constant(all_ones), Some(&Constant::Logic(true)));
        assert_eq!(g.as_constant(all_zeros), Some(&Constant::Logic(false)));
        assert_eq!(g.as_constant(not_ones), Some(&Constant::Logic(false)));
    }

    #[test]
    fn bit_mask_folds() {
        let mut g = graph();
        let m = g.push_const(Constant::Simd(mask(&[true, false, true, false])));
        let b = g.push(ToBitMask { val: m });
        let p = g.push_param(opmask(4));
        let q = g.push(ToBitMask { val: p });
        canon(&mut g);
        assert_eq!(
            g.as_constant(b),
            Some(&Constant::Int(ArbBitInt::from_u64(64, 10)))
        );
        assert!(matches!(g.op(q), Op::ToBitMask(_)));
    }

    #[test]
    fn compress() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let all = g.push_const(Constant::Simd(SimdConstant::broadcast(&Constant::Logic(true), 4)));
        let some = g.push_param(opmask(4));
        let c = g.push(Compress { val: x, mask: all });
        let d = g.push(Compress { val: x, mask: some });
        canon(&mut g);
        assert_eq!(g.equiv(c), x);
        assert!(g.stamp(d).is_unrestricted());
    }

    #[test]
    fn masked_load_of_no_lanes() {
        let mut g = graph();
        let addr = g.push_param(Stamp::Ptr(crate::stamp::PtrStamp::non_null()));
        let none = g.push_const(Constant::Simd(mask(&[false, false, false, false])));
        let l = g.push(MaskedLoad {
            addr,
            mask: none,
            stamp: v(&i32s(), 4),
        });
        canon(&mut g);
        assert_eq!(
            g.as_constant(l),
            Some(&Constant::Simd(ints(32, &[0, 0, 0, 0])))
        );
    }

    #[test]
    #[should_panic(expected = "not yet implemented")]
    fn masked_load_unimplemented() {
        let mut g = graph();
        let addr = g.push_param(Stamp::Ptr(crate::stamp::PtrStamp::non_null()));
        let m = g.push_param(opmask(4));
        g.push(MaskedLoad {
            addr,
            mask: m,
            stamp: v(&i32s(), 4),
        });
        canon(&mut g);
    }
}
