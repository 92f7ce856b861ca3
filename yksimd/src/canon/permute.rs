use super::{Rewrite, constant};
use crate::{
    constant::Constant,
    graph::{Broadcast, Graph, Op, Permute, PermuteVar, Reinterpret, Unary},
    ops::UnaryOp,
    stamp::Stamp,
};
use smallvec::SmallVec;

fn is_identity(mapping: &[i32], len: usize) -> bool {
    mapping.len() == len
        && mapping
            .iter()
            .enumerate()
            .all(|(i, m)| usize::try_from(*m) == Ok(i))
}

fn is_reversal(mapping: &[i32], len: usize) -> bool {
    mapping.len() == len
        && mapping
            .iter()
            .enumerate()
            .all(|(i, m)| usize::try_from(*m) == Ok(len - 1 - i))
}

pub(super) fn permute(g: &mut Graph, x: &Permute) -> Option<Rewrite> {
    let src_len = g.stamp(x.val).lanes();
    if is_identity(&x.mapping, src_len) {
        return Some(Rewrite::Equiv(x.val));
    }
    let zero_fill = x.mapping.iter().any(|m| *m < 0);
    match g.op(x.val).clone() {
        Op::Permute(inner) => {
            let mapping = x
                .mapping
                .iter()
                .map(|m| match usize::try_from(*m) {
                    Ok(i) => inner.mapping[i],
                    Err(_) => -1,
                })
                .collect();
            Some(Rewrite::Rewritten(Op::Permute(Permute {
                val: inner.val,
                mapping,
            })))
        }
        Op::Broadcast(b) if !zero_fill => Some(Rewrite::Rewritten(Op::Broadcast(Broadcast {
            val: b.val,
            len: x.mapping.len(),
        }))),
        Op::Const(c) if !zero_fill => match c.val {
            Constant::Simd(c) => Some(constant(Constant::Simd(c.permute(&x.mapping)))),
            _ => None,
        },
        Op::Reinterpret(Reinterpret { val: word, .. }) => {
            // Reversing the bytes of an integer viewed as a vector of bytes is a byte swap.
            let byte_lanes = matches!(g.stamp(x.val).lane_stamp(), Stamp::Int(s) if s.bitw() == 8);
            let fits = matches!(g.stamp(word), Stamp::Int(s) if s.bitw() as usize == 8 * src_len);
            if !(byte_lanes && fits && is_reversal(&x.mapping, src_len)) {
                return None;
            }
            let to = g.stamp(x.val).unrestricted();
            let swapped = g.push(Unary {
                op: UnaryOp::ReverseBytes,
                val: word,
            });
            Some(Rewrite::Rewritten(Op::Reinterpret(Reinterpret {
                val: swapped,
                to,
            })))
        }
        _ => None,
    }
}

pub(super) fn permute_var(g: &Graph, x: &PermuteVar) -> Option<Rewrite> {
    let src_len = g.stamp(x.val).lanes();
    if let Some(Constant::Simd(idxs)) = g.as_constant(x.indices) {
        let mapping = idxs
            .vals()
            .iter()
            .map(|c| {
                let i = c
                    .as_int()
                    .unwrap_or_else(|| panic!("permute index {c} is not an integer"))
                    .to_sign_ext_i64();
                assert!(i < src_len as i64, "permute index {i} out of range of {src_len} lanes");
                i32::try_from(i.max(-1)).unwrap_or(-1)
            })
            .collect::<SmallVec<_>>();
        return Some(Rewrite::Rewritten(Op::Permute(Permute {
            val: x.val,
            mapping,
        })));
    }
    if let Op::Broadcast(b) = g.op(x.val) {
        let Stamp::Simd(idxs) = g.stamp(x.indices) else {
            return None;
        };
        // Negative indices zero-fill, so every index must be known to be in range.
        let in_range = idxs
            .comps()
            .iter()
            .all(|i| matches!(i, Stamp::Int(s) if s.lo() >= 0));
        if !in_range {
            return None;
        }
        return Some(if idxs.len() == src_len {
            Rewrite::Equiv(x.val)
        } else {
            Rewrite::Rewritten(Op::Broadcast(Broadcast {
                val: b.val,
                len: idxs.len(),
            }))
        });
    }
    None
}
