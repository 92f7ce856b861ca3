//! Scalarisation: replace a single-lane cut of a vector computation by the same computation done
//! on scalars.
//!
//! This only fires when the vector computation is used by nothing other than itself and
//! single-lane cuts, so that the vector nodes become dead once every lane has been scalarised.

use super::Rewrite;
use crate::{
    constant::Constant,
    graph::{Binary, Const, Cut, Graph, NodeIdx, Op, OpT, Phi},
    ops::BinaryOp,
    stamp::Stamp,
};
use std::collections::{HashMap, HashSet};

/// Can `op` be recomputed one lane at a time?
fn is_lanewise(op: &Op) -> bool {
    match op {
        Op::Binary(Binary { op, .. }) => matches!(op, BinaryOp::Add | BinaryOp::Mul),
        Op::Phi(_) | Op::Cut(_) => true,
        _ => false,
    }
}

/// The closure of lane-wise nodes upstream of `root`, if every node in it is only used inside
/// the closure or by single-lane cuts.
fn closure(g: &Graph, root: NodeIdx) -> Option<HashSet<NodeIdx>> {
    let mut seen = HashSet::new();
    let mut todo = vec![g.equiv(root)];
    while let Some(idx) = todo.pop() {
        if !seen.insert(idx) {
            continue;
        }
        for x in g.op(idx).operands() {
            let x = g.equiv(x);
            if g.stamp(x).is_simd() && is_lanewise(g.op(x)) {
                todo.push(x);
            }
        }
    }
    let only_lane_uses = seen.iter().all(|idx| {
        g.users(*idx).iter().all(|u| {
            seen.contains(u) || matches!(g.op(*u), Op::Cut(Cut { len: 1, .. }))
        })
    });
    only_lane_uses.then_some(seen)
}

pub(super) fn scalarise(g: &mut Graph, val: NodeIdx, offset: usize) -> Option<Rewrite> {
    let val = g.equiv(val);
    match g.op(val) {
        Op::Binary(Binary {
            op: BinaryOp::Add | BinaryOp::Mul,
            ..
        })
        | Op::Phi(_) => (),
        _ => return None,
    }
    closure(g, val)?;
    let mut phis = HashMap::new();
    Some(Rewrite::Equiv(lane(g, val, offset, &mut phis)))
}

/// Build the scalar computing lane `offset` of `idx`. `phis` maps a vector phi and lane to its
/// scalar phi, which is created before its inputs are scalarised so that cycles terminate.
fn lane(
    g: &mut Graph,
    idx: NodeIdx,
    offset: usize,
    phis: &mut HashMap<(NodeIdx, usize), NodeIdx>,
) -> NodeIdx {
    let idx = g.equiv(idx);
    if !g.stamp(idx).is_simd() {
        return idx;
    }
    match g.op(idx).clone() {
        Op::Cut(Cut { val, offset: o, .. }) => lane(g, val, o + offset, phis),
        Op::Broadcast(b) => b.val,
        Op::Const(Const {
            val: Constant::Simd(c),
        }) => g.push_const(c.get(offset).clone()),
        Op::Binary(Binary { op, lhs, rhs }) if matches!(op, BinaryOp::Add | BinaryOp::Mul) => {
            let lhs = lane(g, lhs, offset, phis);
            let rhs = lane(g, rhs, offset, phis);
            g.push(Binary { op, lhs, rhs })
        }
        Op::Phi(Phi { inputs, stamp }) => {
            if let Some(x) = phis.get(&(idx, offset)) {
                return *x;
            }
            let lane_stamp = match &stamp {
                Stamp::Simd(s) => s.comp(offset).clone(),
                s => s.clone(),
            };
            let phi = g.push_phi(lane_stamp);
            phis.insert((idx, offset), phi);
            let inputs = inputs
                .iter()
                .map(|x| lane(g, *x, offset, phis))
                .collect::<Vec<_>>();
            g.set_phi_inputs(phi, &inputs);
            phi
        }
        _ => g.push(Cut {
            val: idx,
            offset,
            len: 1,
        }),
    }
}

#[cfg(test)]
mod test {
    use crate::{
        canon::{
            Canonicaliser,
            test::{canon, confluent},
        },
        config::CanonConfig,
        constant::{Constant, test::ints},
        graph::{test::*, *},
        ops::BinaryOp,
    };

    /// A loop-carried `acc = phi [init, acc + step]` whose lane 2 is the only thing used.
    fn accumulate(g: &mut Graph) -> (NodeIdx, NodeIdx) {
        let init = g.push_const(Constant::Simd(ints(32, &[0, 0, 0, 0])));
        let step = g.push_param(v(&i32s(), 4));
        let acc = g.push_phi(v(&i32s(), 4));
        let next = g.push(Binary {
            op: BinaryOp::Add,
            lhs: acc,
            rhs: step,
        });
        g.set_phi_inputs(acc, &[init, next]);
        let out = g.push(Cut {
            val: acc,
            offset: 2,
            len: 1,
        });
        (acc, out)
    }

    #[test]
    fn through_loop_phi() {
        let desc = confluent(|g| accumulate(g).1);
        assert_eq!(
            desc,
            "@0:phi [const 0i32, add phi@0, cut %1:param <4 x i32>[2..3]]"
        );
    }

    #[test]
    fn scalar_phi_stamp() {
        let mut g = graph();
        let (_, out) = accumulate(&mut g);
        canon(&mut g);
        let out = g.equiv(out);
        assert!(matches!(g.op(out), Op::Phi(_)));
        assert_eq!(g.stamp(out), &i32s());
    }

    #[test]
    fn disabled() {
        let mut g = graph();
        let (acc, out) = accumulate(&mut g);
        Canonicaliser::new(CanonConfig {
            scalarise: false,
            ..CanonConfig::default()
        })
        .run(&mut g)
        .unwrap();
        assert!(matches!(g.op(out), Op::Cut(Cut { val, .. }) if *val == acc));
    }

    #[test]
    fn vector_uses_block_scalarisation() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_param(v(&i32s(), 4));
        let add = g.push(Binary {
            op: BinaryOp::Add,
            lhs: x,
            rhs: y,
        });
        g.push(Unary {
            op: crate::ops::UnaryOp::Neg,
            val: add,
        });
        let out = g.push(Cut {
            val: add,
            offset: 0,
            len: 1,
        });
        canon(&mut g);
        assert!(matches!(g.op(out), Op::Cut(_)));
    }

    #[test]
    fn through_arithmetic() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let s = g.push_param(i32s());
        let b = g.push(Broadcast { val: s, len: 4 });
        let c = g.push_const(Constant::Simd(ints(32, &[1, 2, 3, 4])));
        let mul = g.push(Binary {
            op: BinaryOp::Mul,
            lhs: x,
            rhs: b,
        });
        let add = g.push(Binary {
            op: BinaryOp::Add,
            lhs: mul,
            rhs: c,
        });
        let out = g.push(Cut {
            val: add,
            offset: 1,
            len: 1,
        });
        canon(&mut g);
        assert_eq!(
            g.describe(out),
            "add mul cut %0:param <4 x i32>[1..2], %1:param i32, const 2i32"
        );
    }
}
