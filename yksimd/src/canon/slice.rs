//! Rules for the operators which build and take apart vectors: broadcast, cut and insert.

use super::{Rewrite, constant, scalarise};
use crate::{
    config::CanonConfig,
    constant::{Constant, SimdConstant},
    graph::{
        Blend, Broadcast, Concat, Const, Cut, Graph, Insert, NodeIdx, Op, OpT, Permute,
        cut_suppresses_folding,
    },
    stamp::Stamp,
};

pub(super) fn broadcast(g: &Graph, x: &Broadcast) -> Option<Rewrite> {
    match g.as_constant(x.val)? {
        Constant::Simd(_) => None,
        c => Some(constant(Constant::Simd(SimdConstant::broadcast(c, x.len)))),
    }
}

/// A rewrite to the `len` lanes of `val` starting at `offset`, which may be all of `val`. A
/// single lane of a vector is a scalar, so it stays a cut even when `val` has one lane.
fn cut_of(g: &Graph, val: NodeIdx, offset: usize, len: usize) -> Rewrite {
    let lanes = g.stamp(val).lanes();
    if !g.stamp(val).is_simd() || (offset == 0 && len == lanes && len > 1) {
        assert!(
            offset == 0 && len == lanes,
            "cut [{offset}, {}) out of range of %{}",
            offset + len,
            usize::from(val)
        );
        Rewrite::Equiv(val)
    } else {
        Rewrite::Rewritten(Op::Cut(Cut { val, offset, len }))
    }
}

/// Narrow a cut of the oversized constant `c` to a cut of a register-sized window of it, if the
/// cut itself fits in a register.
fn clamp_oversized(
    g: &mut Graph,
    c: &SimdConstant,
    offset: usize,
    len: usize,
) -> Option<Rewrite> {
    let max = g.arch().max_vector_length(&Stamp::from_constant(c.get(0)));
    if len > max {
        return None;
    }
    let start = offset.min(c.len() - max);
    let window = g.push_const(Constant::Simd(c.cut(start, max)));
    Some(Rewrite::Rewritten(Op::Cut(Cut {
        val: window,
        offset: offset - start,
        len,
    })))
}

pub(super) fn cut(g: &mut Graph, x: &Cut, config: &CanonConfig) -> Option<Rewrite> {
    let (offset, len) = (x.offset, x.len);
    if offset == 0 && len == g.stamp(x.val).lanes() && len > 1 {
        return Some(Rewrite::Equiv(x.val));
    }
    match g.op(x.val).clone() {
        Op::Const(Const {
            val: Constant::Simd(c),
        }) => {
            if cut_suppresses_folding(g, x.val, offset) {
                return clamp_oversized(g, &c, offset, len);
            }
            if len == 1 {
                Some(constant(c.get(offset).clone()))
            } else {
                Some(constant(Constant::Simd(c.cut(offset, len))))
            }
        }
        Op::Cut(inner) => Some(Rewrite::Rewritten(Op::Cut(Cut {
            val: inner.val,
            offset: inner.offset + offset,
            len,
        }))),
        Op::Broadcast(b) if len == 1 => Some(Rewrite::Equiv(b.val)),
        Op::Broadcast(b) => Some(Rewrite::Rewritten(Op::Broadcast(Broadcast { val: b.val, len }))),
        Op::Concat(Concat { lhs, rhs }) => {
            let split = g.stamp(lhs).lanes();
            if offset + len <= split {
                Some(cut_of(g, lhs, offset, len))
            } else if offset >= split {
                Some(cut_of(g, rhs, offset - split, len))
            } else {
                None
            }
        }
        Op::Permute(Permute { val, mapping }) => {
            let run = &mapping[offset..offset + len];
            let first = usize::try_from(run[0]).ok()?;
            let contiguous = run
                .iter()
                .enumerate()
                .all(|(i, m)| usize::try_from(*m) == Ok(first + i));
            contiguous.then(|| cut_of(g, val, first, len))
        }
        Op::Blend(Blend { lhs, rhs, selector }) => {
            let blen = selector.len();
            assert!(
                g.stamp(lhs).lanes() == blen && g.stamp(rhs).lanes() == blen,
                "blend operands must have the blend's length {blen}"
            );
            let run = &selector[offset..offset + len];
            if run.iter().all(|s| *s == run[0]) {
                let chosen = if run[0] { rhs } else { lhs };
                Some(cut_of(g, chosen, offset, len))
            } else {
                None
            }
        }
        Op::Insert(Insert {
            vec,
            val,
            offset: at,
        }) => {
            let n = g.stamp(val).lanes();
            if offset == at && len == n {
                Some(cut_of(g, val, 0, len))
            } else if offset + len <= at || offset >= at + n {
                // The cut doesn't overlap the inserted lanes.
                Some(cut_of(g, vec, offset, len))
            } else {
                None
            }
        }
        Op::Binary(_) | Op::Phi(_) if len == 1 && config.scalarise => {
            scalarise::scalarise(g, x.val, offset)
        }
        _ => None,
    }
}

pub(super) fn insert(g: &Graph, x: &Insert) -> Option<Rewrite> {
    x.infer_stamp(g)
        .as_constant()
        .map(constant)
}
