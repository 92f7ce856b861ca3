//! Rules for lane selection, under either a constant selector ([Blend]) or a run-time mask
//! ([MaskBlend]).

use super::{Rewrite, constant};
use crate::{
    arch::MaskKind,
    constant::Constant,
    graph::{Blend, Graph, MaskBlend, NodeIdx, Op, OpT, Reinterpret, Unary},
    ops::{IntConvertOp, UnaryOp},
    stamp::Stamp,
};

pub(super) fn blend(g: &Graph, x: &Blend) -> Option<Rewrite> {
    if x.lhs == x.rhs || x.selector.iter().all(|s| !*s) {
        return Some(Rewrite::Equiv(x.lhs));
    }
    if x.selector.iter().all(|s| *s) {
        return Some(Rewrite::Equiv(x.rhs));
    }
    match (g.as_constant(x.lhs)?, g.as_constant(x.rhs)?) {
        (Constant::Simd(l), Constant::Simd(r)) => Some(constant(Constant::Simd(
            crate::constant::SimdConstant::blend(l, r, &x.selector),
        ))),
        _ => None,
    }
}

/// Does a reinterpretation from `from` to `to` keep each lane's selecting bit in place? That is
/// the case for lane-by-lane reinterpretations of integer lanes of one width, or between integer
/// lanes and opmask lanes (which read and write the sign bit).
fn preserves_selection(from: &Stamp, to: &Stamp) -> bool {
    if !from.is_simd() || !to.is_simd() || from.lanes() != to.lanes() {
        return false;
    }
    match (from.lane_stamp(), to.lane_stamp()) {
        (Stamp::Int(x), Stamp::Int(y)) => x.bitw() == y.bitw(),
        (Stamp::Int(_), Stamp::Logic(_)) | (Stamp::Logic(_), Stamp::Int(_)) => true,
        _ => false,
    }
}

fn is_opmask(s: &Stamp) -> bool {
    matches!(s.lane_stamp(), Stamp::Logic(_))
}

pub(super) fn mask_blend(g: &mut Graph, x: &MaskBlend) -> Option<Rewrite> {
    if x.lhs == x.rhs {
        return Some(Rewrite::Equiv(x.lhs));
    }
    if let Some(Constant::Simd(m)) = g.stamp(x.mask).as_constant() {
        return Some(Rewrite::Rewritten(Op::Blend(Blend {
            lhs: x.lhs,
            rhs: x.rhs,
            selector: m.vals().iter().map(Constant::lane_is_set).collect(),
        })));
    }
    // On bitmask targets an opmask reinterpreted from integer lanes selects as those lanes do.
    let bitmasks = g.arch().mask_kind(g.stamp(x.lhs).lane_stamp()) == MaskKind::Bitmask;
    if bitmasks
        && let Op::Reinterpret(Reinterpret { val, .. }) = g.op(x.mask)
        && preserves_selection(g.stamp(*val), g.stamp(x.mask))
        && is_opmask(g.stamp(x.mask))
    {
        return Some(Rewrite::Rewritten(Op::MaskBlend(MaskBlend {
            lhs: x.lhs,
            rhs: x.rhs,
            mask: *val,
        })));
    }

    // Peel narrows and reinterprets, counting the negations between them.
    let mut wrappers = Vec::new();
    let mut nots = 0;
    let mut cur = x.mask;
    loop {
        match g.op(cur) {
            Op::Unary(Unary {
                op: UnaryOp::Not,
                val,
            }) => {
                nots += 1;
                cur = *val;
            }
            Op::IntConvert(c) if c.op == IntConvertOp::Narrow => {
                let val = c.val;
                wrappers.push(Op::IntConvert(c.clone()));
                cur = val;
            }
            Op::Reinterpret(r) if preserves_selection(g.stamp(r.val), g.stamp(cur)) => {
                let val = r.val;
                if !(bitmasks && is_opmask(&r.to)) {
                    wrappers.push(Op::Reinterpret(r.clone()));
                }
                cur = val;
            }
            _ => break,
        }
    }
    if nots == 0 {
        return None;
    }
    let mask = wrappers.into_iter().rev().fold(cur, |inner: NodeIdx, mut w| {
        w.map_operands(&mut |_| inner);
        g.push(w)
    });
    let (lhs, rhs) = if nots % 2 == 1 {
        (x.rhs, x.lhs)
    } else {
        (x.lhs, x.rhs)
    };
    Some(Rewrite::Rewritten(Op::MaskBlend(MaskBlend { lhs, rhs, mask })))
}

#[cfg(test)]
mod test {
    use crate::{
        arch::FixedVectorArch,
        canon::test::{canon, confluent},
        constant::{
            Constant,
            test::{ints, mask},
        },
        graph::{test::*, *},
        ops::{IntConvertOp, UnaryOp},
        stamp::{IntStamp, LogicValue, Stamp},
    };
    use std::sync::Arc;

    fn narrow(val: NodeIdx, to_bitw: u32) -> IntConvert {
        IntConvert {
            op: IntConvertOp::Narrow,
            val,
            to_bitw,
        }
    }

    fn not(g: &mut Graph, x: NodeIdx) -> NodeIdx {
        g.push(Unary {
            op: UnaryOp::Not,
            val: x,
        })
    }

    #[test]
    fn constant_selector() {
        let mut g = graph();
        let a = g.push_param(v(&i32s(), 4));
        let b = g.push_param(v(&i32s(), 4));
        let same = g.push(Blend {
            lhs: a,
            rhs: a,
            selector: [true, false, true, false].into_iter().collect(),
        });
        let left = g.push(Blend {
            lhs: a,
            rhs: b,
            selector: [false; 4].into_iter().collect(),
        });
        let right = g.push(Blend {
            lhs: a,
            rhs: b,
            selector: [true; 4].into_iter().collect(),
        });
        canon(&mut g);
        assert_eq!(g.equiv(same), a);
        assert_eq!(g.equiv(left), a);
        assert_eq!(g.equiv(right), b);
    }

    #[test]
    fn constant_mask_becomes_selector() {
        let mut g = graph();
        let a = g.push_param(v(&i32s(), 4));
        let b = g.push_param(v(&i32s(), 4));
        let om = g.push_const(Constant::Simd(mask(&[true, false, false, true])));
        let bm = g.push_const(Constant::Simd(ints(32, &[0, -1, 0, -1])));
        let x = g.push(MaskBlend { lhs: a, rhs: b, mask: om });
        let y = g.push(MaskBlend { lhs: a, rhs: b, mask: bm });
        canon(&mut g);
        assert!(
            matches!(g.op(x), Op::Blend(Blend { selector, .. }) if selector.as_slice() == [true, false, false, true])
        );
        assert!(
            matches!(g.op(y), Op::Blend(Blend { selector, .. }) if selector.as_slice() == [false, true, false, true])
        );
    }

    #[test]
    fn negations_swap_operands() {
        for n in 1..=4 {
            let desc = confluent(|g| {
                let a = g.push_param(v(&Stamp::Int(IntStamp::unrestricted(8)), 4));
                let b = g.push_param(v(&Stamp::Int(IntStamp::unrestricted(8)), 4));
                let m = g.push_param(v(&i32s(), 4));
                let mut sel = m;
                for _ in 0..n {
                    sel = not(g, sel);
                }
                let sel = g.push(narrow(sel, 8));
                g.push(MaskBlend { lhs: a, rhs: b, mask: sel })
            });
            let (first, second) = if n % 2 == 1 { ("%1", "%0") } else { ("%0", "%1") };
            assert!(
                desc.starts_with(&format!("mask_blend {first}:param <4 x i8>, {second}:param <4 x i8>, narrow %2:param")),
                "{n}: {desc}"
            );
        }
    }

    #[test]
    fn opmask_targets_keep_opmask_selectors() {
        let mut g = Graph::new(Arc::new(FixedVectorArch::from_name("avx512").unwrap()));
        let a = g.push_param(v(&i32s(), 4));
        let b = g.push_param(v(&i32s(), 4));
        let m = g.push_param(v(&i32s(), 4));
        let om = g.push(Reinterpret {
            val: m,
            to: v(&Stamp::Logic(LogicValue::Unrestricted), 4),
        });
        let plain = g.push(MaskBlend { lhs: a, rhs: b, mask: om });
        let nm = not(&mut g, om);
        let negated = g.push(MaskBlend { lhs: a, rhs: b, mask: nm });
        canon(&mut g);
        assert!(matches!(g.op(plain), Op::MaskBlend(MaskBlend { mask, .. }) if *mask == om));
        let Op::MaskBlend(MaskBlend { lhs, rhs, mask }) = g.op(negated) else {
            panic!("{}", g.describe(negated))
        };
        assert_eq!((*lhs, *rhs), (b, a));
        assert!(matches!(g.op(*mask), Op::Reinterpret(Reinterpret { val, .. }) if *val == m));
    }

    #[test]
    fn look_through_opmask_reinterpret() {
        let mut g = graph();
        let a = g.push_param(v(&i32s(), 4));
        let b = g.push_param(v(&i32s(), 4));
        let m = g.push_param(v(&i32s(), 4));
        let om = g.push(Reinterpret {
            val: m,
            to: v(&Stamp::Logic(LogicValue::Unrestricted), 4),
        });
        let nm = not(&mut g, om);
        let x = g.push(MaskBlend { lhs: a, rhs: b, mask: nm });
        canon(&mut g);
        assert_eq!(
            g.describe(x),
            "mask_blend %1:param <4 x i32>, %0:param <4 x i32>, %2:param <4 x i32>"
        );
    }
}
