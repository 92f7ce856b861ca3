//! A minimal arena IR for vector computations.
//!
//! Nodes live in an [IndexVec] and are addressed by [NodeIdx]. A node is never removed: when it is
//! rewritten into an existing node it is instead forwarded, and [Graph::equiv] must be used to
//! find a node's current equivalent. Operands are resolved through [Graph::equiv] whenever they
//! are read.

use crate::{
    arbbitint::ArbBitInt,
    arch::{MaskKind, VectorArch},
    constant::Constant,
    ops::{
        self, BinaryOp, FloatConvertOp, IntConvertOp, Pred, ShiftOp, TernaryOp, UnaryOp, op_table,
    },
    stamp::{IntStamp, LogicValue, SimdStamp, Stamp},
};
use enum_dispatch::enum_dispatch;
use index_vec::IndexVec;
use smallvec::{SmallVec, smallvec};
use std::{cell::RefCell, collections::HashMap, fmt, sync::Arc};
use strum::EnumDiscriminants;

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
}

fn name(idx: NodeIdx) -> String {
    format!("%{}", usize::from(idx))
}

fn list<T: fmt::Display>(xs: impl IntoIterator<Item = T>) -> String {
    xs.into_iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The trait every [Op] conforms to.
#[enum_dispatch]
pub trait OpT: fmt::Debug {
    /// This operation's operands, in order.
    fn operands(&self) -> SmallVec<[NodeIdx; 3]>;

    /// Apply `f` to each operand, mutating `self` with the result.
    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx);

    /// Compute this operation's stamp from the current stamps of its operands.
    fn infer_stamp(&self, g: &Graph) -> Stamp;

    /// Pretty print `self`, using `f` to print operands.
    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String;
}

#[enum_dispatch(OpT)]
#[derive(Clone, Debug, EnumDiscriminants)]
#[strum_discriminants(name(OpKind), derive(Hash, strum::Display))]
pub enum Op {
    Param,
    Const,
    Unary,
    Binary,
    Ternary,
    Shift,
    IntConvert,
    FloatConvert,
    Reinterpret,
    Compare,
    Broadcast,
    Cut,
    Insert,
    Concat,
    Permute,
    PermuteVar,
    Blend,
    MaskBlend,
    MaskTest,
    ToBitMask,
    Compress,
    Phi,
    MaskedLoad,
}

impl Op {
    pub fn kind(&self) -> OpKind {
        OpKind::from(self)
    }
}

/// The stamp of `s`, viewed as a vector: scalars are vectors of length 1.
fn as_vector(s: &Stamp) -> SimdStamp {
    match s {
        Stamp::Simd(x) => x.clone(),
        x => SimdStamp::broadcast(x, 1),
    }
}

fn simd_operand<'a>(g: &'a Graph, idx: NodeIdx, what: &str) -> &'a SimdStamp {
    match g.stamp(idx) {
        Stamp::Simd(x) => x,
        s => panic!("{what} of a non-vector {}: {s}", name(idx)),
    }
}

/// An input to the graph.
#[derive(Clone, Debug)]
pub struct Param {
    pub stamp: Stamp,
}

impl OpT for Param {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        SmallVec::new()
    }

    fn map_operands(&mut self, _f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {}

    fn infer_stamp(&self, _g: &Graph) -> Stamp {
        self.stamp.clone()
    }

    fn render(&self, _f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("param {}", self.stamp)
    }
}

#[derive(Clone, Debug)]
pub struct Const {
    pub val: Constant,
}

impl OpT for Const {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        SmallVec::new()
    }

    fn map_operands(&mut self, _f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {}

    fn infer_stamp(&self, _g: &Graph) -> Stamp {
        Stamp::from_constant(&self.val)
    }

    fn render(&self, _f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("const {}", self.val)
    }
}

#[derive(Clone, Debug)]
pub struct Unary {
    pub op: UnaryOp,
    pub val: NodeIdx,
}

impl OpT for Unary {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let s = g.stamp(self.val);
        op_table(s).unary_stamp(self.op, s)
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {}", self.op, f(self.val))
    }
}

#[derive(Clone, Debug)]
pub struct Binary {
    pub op: BinaryOp,
    pub lhs: NodeIdx,
    pub rhs: NodeIdx,
}

impl OpT for Binary {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.lhs, self.rhs]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.lhs = f(self.lhs);
        self.rhs = f(self.rhs);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let (x, y) = (g.stamp(self.lhs), g.stamp(self.rhs));
        op_table(x).binary_stamp(self.op, x, y)
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {}, {}", self.op, f(self.lhs), f(self.rhs))
    }
}

#[derive(Clone, Debug)]
pub struct Ternary {
    pub op: TernaryOp,
    pub a: NodeIdx,
    pub b: NodeIdx,
    pub c: NodeIdx,
}

impl OpT for Ternary {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.a, self.b, self.c]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.a = f(self.a);
        self.b = f(self.b);
        self.c = f(self.c);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let a = g.stamp(self.a);
        op_table(a).ternary_stamp(self.op, a, g.stamp(self.b), g.stamp(self.c))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {}, {}, {}", self.op, f(self.a), f(self.b), f(self.c))
    }
}

#[derive(Clone, Debug)]
pub struct Shift {
    pub op: ShiftOp,
    pub val: NodeIdx,
    /// Either a scalar shared by every lane or a vector of per-lane amounts.
    pub amount: NodeIdx,
}

impl OpT for Shift {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val, self.amount]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
        self.amount = f(self.amount);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let x = g.stamp(self.val);
        op_table(x).shift_stamp(self.op, x, g.stamp(self.amount))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {}, {}", self.op, f(self.val), f(self.amount))
    }
}

#[derive(Clone, Debug)]
pub struct IntConvert {
    pub op: IntConvertOp,
    pub val: NodeIdx,
    pub to_bitw: u32,
}

impl OpT for IntConvert {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let x = g.stamp(self.val);
        op_table(x).int_convert_stamp(self.op, x, self.to_bitw)
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {} to i{}", self.op, f(self.val), self.to_bitw)
    }
}

#[derive(Clone, Debug)]
pub struct FloatConvert {
    pub op: FloatConvertOp,
    pub val: NodeIdx,
    pub to_bitw: u32,
}

impl OpT for FloatConvert {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let x = g.stamp(self.val);
        op_table(x).float_convert_stamp(self.op, x, self.to_bitw)
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("{} {} to {}", self.op, f(self.val), self.to_bitw)
    }
}

/// Reinterpret the bits of `val` as a value of shape `to`. Only the shape of `to` matters.
#[derive(Clone, Debug)]
pub struct Reinterpret {
    pub val: NodeIdx,
    pub to: Stamp,
}

impl OpT for Reinterpret {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        ops::reinterpret_stamp(&self.to, g.stamp(self.val))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("reinterpret {} as {}", f(self.val), self.to.unrestricted())
    }
}

/// Compare `lhs` and `rhs`. Vector comparisons produce a mask in the representation `mask`.
#[derive(Clone, Debug)]
pub struct Compare {
    pub pred: Pred,
    pub lhs: NodeIdx,
    pub rhs: NodeIdx,
    pub mask: MaskKind,
}

/// The stamp of one lane of a comparison result.
fn compare_lane(mask: MaskKind, lane: &Stamp, r: Option<bool>, empty: bool) -> Stamp {
    match mask {
        MaskKind::Opmask if empty => Stamp::Logic(LogicValue::Empty),
        MaskKind::Opmask => Stamp::Logic(r.map_or(LogicValue::Unrestricted, LogicValue::from_bool)),
        MaskKind::Bitmask => {
            let bitw = lane.bitw();
            Stamp::Int(match r {
                _ if empty => IntStamp::empty(bitw),
                Some(true) => IntStamp::range(bitw, -1, -1),
                Some(false) => IntStamp::range(bitw, 0, 0),
                None => IntStamp::range(bitw, -1, 0),
            })
        }
    }
}

impl OpT for Compare {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.lhs, self.rhs]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.lhs = f(self.lhs);
        self.rhs = f(self.rhs);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let (x, y) = (g.stamp(self.lhs), g.stamp(self.rhs));
        match (x, y) {
            (Stamp::Simd(xs), Stamp::Simd(ys)) => {
                assert_eq!(xs.len(), ys.len(), "compare of mismatched lengths: {x} and {y}");
                Stamp::Simd(SimdStamp::new(
                    xs.comps()
                        .iter()
                        .zip(ys.comps())
                        .map(|(a, b)| {
                            let empty = a.is_empty() || b.is_empty();
                            compare_lane(self.mask, a, self.pred.try_fold_stamps(a, b), empty)
                        })
                        .collect(),
                ))
            }
            (Stamp::Simd(_), _) | (_, Stamp::Simd(_)) => {
                panic!("compare of a vector and a scalar: {x} and {y}")
            }
            _ => {
                if x.is_empty() || y.is_empty() {
                    return Stamp::Logic(LogicValue::Empty);
                }
                Stamp::Logic(
                    self.pred
                        .try_fold_stamps(x, y)
                        .map_or(LogicValue::Unrestricted, LogicValue::from_bool),
                )
            }
        }
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        let mask = match self.mask {
            MaskKind::Opmask => "opmask",
            MaskKind::Bitmask => "bitmask",
        };
        format!("{} {}, {} ({mask})", self.pred, f(self.lhs), f(self.rhs))
    }
}

/// Replicate the scalar `val` across `len` lanes.
#[derive(Clone, Debug)]
pub struct Broadcast {
    pub val: NodeIdx,
    pub len: usize,
}

impl OpT for Broadcast {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let s = g.stamp(self.val);
        assert!(!s.is_simd(), "broadcast of a vector {s}");
        Stamp::Simd(SimdStamp::broadcast(s, self.len))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("broadcast {} x {}", f(self.val), self.len)
    }
}

/// Extract the `len` lanes of `val` starting at `offset`. A length-1 cut is a scalar.
#[derive(Clone, Debug)]
pub struct Cut {
    pub val: NodeIdx,
    pub offset: usize,
    pub len: usize,
}

/// Does `cut` take a non-zero offset into a constant longer than the target can hold in one
/// register? Such constants are synthetic and must not be folded piecewise.
pub(crate) fn cut_suppresses_folding(g: &Graph, val: NodeIdx, offset: usize) -> bool {
    match g.as_constant(val) {
        Some(Constant::Simd(c)) => {
            let elem = Stamp::from_constant(c.get(0));
            offset != 0 && c.len() > g.arch().max_vector_length(&elem)
        }
        _ => false,
    }
}

impl OpT for Cut {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let s = simd_operand(g, self.val, "cut");
        let cut = s.cut(self.offset, self.len);
        if self.len == 1 {
            cut.comp(0).clone()
        } else {
            let no_fold = cut.no_fold() || cut_suppresses_folding(g, self.val, self.offset);
            Stamp::Simd(cut.with_no_fold(no_fold))
        }
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!(
            "cut {}[{}..{}]",
            f(self.val),
            self.offset,
            self.offset + self.len
        )
    }
}

/// Replace the lanes of `vec` starting at `offset` with `val`, a scalar or a vector.
#[derive(Clone, Debug)]
pub struct Insert {
    pub vec: NodeIdx,
    pub val: NodeIdx,
    pub offset: usize,
}

impl OpT for Insert {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.vec, self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.vec = f(self.vec);
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let v = simd_operand(g, self.vec, "insert");
        Stamp::Simd(v.insert(self.offset, g.stamp(self.val)))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("insert {}[{}] = {}", f(self.vec), self.offset, f(self.val))
    }
}

#[derive(Clone, Debug)]
pub struct Concat {
    pub lhs: NodeIdx,
    pub rhs: NodeIdx,
}

impl OpT for Concat {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.lhs, self.rhs]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.lhs = f(self.lhs);
        self.rhs = f(self.rhs);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        Stamp::Simd(as_vector(g.stamp(self.lhs)).concat(&as_vector(g.stamp(self.rhs))))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("concat {}, {}", f(self.lhs), f(self.rhs))
    }
}

/// Output lane `i` is lane `mapping[i]` of `val`, or zero if `mapping[i]` is negative.
#[derive(Clone, Debug)]
pub struct Permute {
    pub val: NodeIdx,
    pub mapping: SmallVec<[i32; 16]>,
}

impl OpT for Permute {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        Stamp::Simd(simd_operand(g, self.val, "permute").permute(&self.mapping))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("permute {} [{}]", f(self.val), list(&self.mapping))
    }
}

/// Output lane `i` is lane `indices[i]` of `val`, where `indices` is an integer vector computed
/// at run-time. Negative indices produce zero.
#[derive(Clone, Debug)]
pub struct PermuteVar {
    pub val: NodeIdx,
    pub indices: NodeIdx,
}

impl OpT for PermuteVar {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val, self.indices]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
        self.indices = f(self.indices);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let src = simd_operand(g, self.val, "permute");
        let idxs = simd_operand(g, self.indices, "permute indices");
        let elem = src.elem();
        Stamp::Simd(SimdStamp::new(
            idxs.comps()
                .iter()
                .map(|idx| {
                    let Stamp::Int(idx) = idx else {
                        panic!("permute indices must be integers, not {idx}");
                    };
                    let mut acc = elem.empty();
                    if idx.lo() < 0 {
                        acc = acc.meet(&elem.unrestricted());
                    }
                    for i in 0..src.len() {
                        if idx.contains(i as i64) {
                            acc = acc.meet(src.comp(i));
                        }
                    }
                    acc
                })
                .collect(),
        ))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("permute_var {}, {}", f(self.val), f(self.indices))
    }
}

/// Lane `i` is `lhs`'s if `selector[i]` is false, otherwise `rhs`'s.
#[derive(Clone, Debug)]
pub struct Blend {
    pub lhs: NodeIdx,
    pub rhs: NodeIdx,
    pub selector: SmallVec<[bool; 16]>,
}

impl OpT for Blend {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.lhs, self.rhs]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.lhs = f(self.lhs);
        self.rhs = f(self.rhs);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        Stamp::Simd(SimdStamp::blend(
            simd_operand(g, self.lhs, "blend"),
            simd_operand(g, self.rhs, "blend"),
            &self.selector,
        ))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        let sel = self
            .selector
            .iter()
            .map(|x| if *x { '1' } else { '0' })
            .collect::<String>();
        format!("blend {}, {} [{sel}]", f(self.lhs), f(self.rhs))
    }
}

/// Lane `i` is `rhs`'s if lane `i` of `mask` is set, otherwise `lhs`'s. `mask` is either an
/// opmask or an integer vector whose sign bits select.
#[derive(Clone, Debug)]
pub struct MaskBlend {
    pub lhs: NodeIdx,
    pub rhs: NodeIdx,
    pub mask: NodeIdx,
}

impl OpT for MaskBlend {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.lhs, self.rhs, self.mask]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.lhs = f(self.lhs);
        self.rhs = f(self.rhs);
        self.mask = f(self.mask);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let x = simd_operand(g, self.lhs, "blend");
        let y = simd_operand(g, self.rhs, "blend");
        let m = simd_operand(g, self.mask, "blend mask");
        assert!(
            x.len() == y.len() && x.len() == m.len(),
            "blend of mismatched lengths: {x}, {y}, {m}"
        );
        Stamp::Simd(SimdStamp::new(
            (0..x.len())
                .map(|i| {
                    let sel = match m.comp(i) {
                        Stamp::Logic(l) => *l,
                        Stamp::Int(s) if s.is_empty() => LogicValue::Empty,
                        Stamp::Int(s) if s.lo() >= 0 => LogicValue::False,
                        Stamp::Int(s) if s.hi() < 0 => LogicValue::True,
                        Stamp::Int(_) => LogicValue::Unrestricted,
                        s => panic!("{s} cannot be a blend mask lane"),
                    };
                    match sel {
                        LogicValue::Empty => x.comp(i).empty(),
                        LogicValue::False => x.comp(i).clone(),
                        LogicValue::True => y.comp(i).clone(),
                        LogicValue::Unrestricted => x.comp(i).meet(y.comp(i)),
                    }
                })
                .collect(),
        ))
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!(
            "mask_blend {}, {}, {}",
            f(self.lhs),
            f(self.rhs),
            f(self.mask)
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MaskTestKind {
    AllOnes,
    AllZeros,
}

impl MaskTestKind {
    pub fn flip(self) -> Self {
        match self {
            Self::AllOnes => Self::AllZeros,
            Self::AllZeros => Self::AllOnes,
        }
    }
}

/// Is every lane of `val` set ([MaskTestKind::AllOnes]) or clear ([MaskTestKind::AllZeros])?
#[derive(Clone, Debug)]
pub struct MaskTest {
    pub val: NodeIdx,
    pub test: MaskTestKind,
}

impl OpT for MaskTest {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let v = simd_operand(g, self.val, "mask test");
        let mut acc = LogicValue::True;
        for c in v.comps() {
            let set = match c {
                Stamp::Logic(l) => *l,
                Stamp::Int(s) => match s.as_constant() {
                    _ if s.is_empty() => LogicValue::Empty,
                    Some(x) if x.is_all_bits_set() => LogicValue::True,
                    Some(x) if x.is_zero() => LogicValue::False,
                    _ => LogicValue::Unrestricted,
                },
                s => panic!("{s} cannot be a mask lane"),
            };
            acc = acc.and(match self.test {
                MaskTestKind::AllOnes => set,
                MaskTestKind::AllZeros => set.not(),
            });
        }
        Stamp::Logic(acc)
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("mask_test {} {}", self.test, f(self.val))
    }
}

/// Pack one bit per lane of `val` into an `i64`, lane 0 most significant.
#[derive(Clone, Debug)]
pub struct ToBitMask {
    pub val: NodeIdx,
}

impl OpT for ToBitMask {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let v = simd_operand(g, self.val, "to_bit_mask");
        if let Some(c) = v.as_constant() {
            return Stamp::Int(IntStamp::from_constant(&ArbBitInt::from_u64(
                64,
                c.to_bit_mask(),
            )));
        }
        if v.len() < 63 {
            Stamp::Int(IntStamp::range(64, 0, (1i64 << v.len()) - 1))
        } else {
            Stamp::Int(IntStamp::unrestricted(64))
        }
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("to_bit_mask {}", f(self.val))
    }
}

/// Pack the lanes of `val` selected by the opmask `mask` towards lane 0.
#[derive(Clone, Debug)]
pub struct Compress {
    pub val: NodeIdx,
    pub mask: NodeIdx,
}

impl OpT for Compress {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.val, self.mask]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.val = f(self.val);
        self.mask = f(self.mask);
    }

    fn infer_stamp(&self, g: &Graph) -> Stamp {
        let v = simd_operand(g, self.val, "compress");
        let m = simd_operand(g, self.mask, "compress mask");
        assert!(m.is_opmask(), "compress mask must be an opmask, not {m}");
        assert_eq!(v.len(), m.len(), "compress of mismatched lengths: {v} and {m}");
        Stamp::Simd(v.unrestricted())
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("compress {}, {}", f(self.val), f(self.mask))
    }
}

/// A merge point. The stamp is declared by the phi's creator.
#[derive(Clone, Debug)]
pub struct Phi {
    pub inputs: SmallVec<[NodeIdx; 2]>,
    pub stamp: Stamp,
}

impl OpT for Phi {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        self.inputs.iter().copied().collect()
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        for x in self.inputs.iter_mut() {
            *x = f(*x);
        }
    }

    fn infer_stamp(&self, _g: &Graph) -> Stamp {
        self.stamp.clone()
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!("phi [{}]", list(self.inputs.iter().map(|x| f(*x))))
    }
}

/// Load the lanes selected by `mask` from `addr`. Unselected lanes are zero.
#[derive(Clone, Debug)]
pub struct MaskedLoad {
    pub addr: NodeIdx,
    pub mask: NodeIdx,
    pub stamp: Stamp,
}

impl OpT for MaskedLoad {
    fn operands(&self) -> SmallVec<[NodeIdx; 3]> {
        smallvec![self.addr, self.mask]
    }

    fn map_operands(&mut self, f: &mut dyn FnMut(NodeIdx) -> NodeIdx) {
        self.addr = f(self.addr);
        self.mask = f(self.mask);
    }

    fn infer_stamp(&self, _g: &Graph) -> Stamp {
        self.stamp.clone()
    }

    fn render(&self, f: &dyn Fn(NodeIdx) -> String) -> String {
        format!(
            "masked_load {}, {} : {}",
            f(self.addr),
            f(self.mask),
            self.stamp
        )
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub op: Op,
    pub stamp: Stamp,
}

/// True if the two stamps are equal including their folding flags.
fn stamp_identical(x: &Stamp, y: &Stamp) -> bool {
    x == y && x.as_simd().map(|s| s.no_fold()) == y.as_simd().map(|s| s.no_fold())
}

pub struct Graph {
    nodes: IndexVec<NodeIdx, Node>,
    /// `Some(y)` if the node has been replaced by `y`.
    forwarding: IndexVec<NodeIdx, Option<NodeIdx>>,
    arch: Arc<dyn VectorArch>,
}

impl Graph {
    pub fn new(arch: Arc<dyn VectorArch>) -> Self {
        Self {
            nodes: IndexVec::new(),
            forwarding: IndexVec::new(),
            arch,
        }
    }

    pub fn arch(&self) -> &dyn VectorArch {
        &*self.arch
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add `op`, resolving its operands to their current equivalents, and return its index.
    pub fn push(&mut self, op: impl Into<Op>) -> NodeIdx {
        let mut op = op.into();
        op.map_operands(&mut |x| self.equiv(x));
        let stamp = op.infer_stamp(self);
        self.forwarding.push(None);
        self.nodes.push(Node { op, stamp })
    }

    pub fn push_param(&mut self, stamp: Stamp) -> NodeIdx {
        self.push(Param { stamp })
    }

    pub fn push_const(&mut self, val: Constant) -> NodeIdx {
        self.push(Const { val })
    }

    /// Compare `lhs` and `rhs`, with vector results in the target's mask representation for the
    /// operands' lanes.
    pub fn push_compare(&mut self, pred: Pred, lhs: NodeIdx, rhs: NodeIdx) -> NodeIdx {
        let mask = self.arch.mask_kind(self.stamp(lhs).lane_stamp());
        self.push(Compare {
            pred,
            lhs,
            rhs,
            mask,
        })
    }

    /// Add a phi with no inputs yet: see [Graph::set_phi_inputs].
    pub fn push_phi(&mut self, stamp: Stamp) -> NodeIdx {
        self.push(Phi {
            inputs: SmallVec::new(),
            stamp,
        })
    }

    /// # Panics
    ///
    /// If `phi` is not a phi or an input's stamp is not compatible with the phi's.
    pub fn set_phi_inputs(&mut self, phi: NodeIdx, inputs: &[NodeIdx]) {
        let phi = self.equiv(phi);
        let inputs = inputs.iter().map(|x| self.equiv(*x)).collect::<SmallVec<_>>();
        for x in &inputs {
            assert!(
                self.stamp(*x).is_compatible(&self.nodes[phi].stamp),
                "phi input {} has stamp {}, not compatible with {}",
                name(*x),
                self.stamp(*x),
                self.nodes[phi].stamp
            );
        }
        match &mut self.nodes[phi].op {
            Op::Phi(p) => p.inputs = inputs,
            op => panic!("{} is not a phi: {op:?}", name(phi)),
        }
    }

    /// The op at `idx`, which will not have been forwarded.
    pub fn op(&self, idx: NodeIdx) -> &Op {
        &self.nodes[self.equiv(idx)].op
    }

    pub fn stamp(&self, idx: NodeIdx) -> &Stamp {
        &self.nodes[self.equiv(idx)].stamp
    }

    /// If `idx` is a constant node, its value.
    pub fn as_constant(&self, idx: NodeIdx) -> Option<&Constant> {
        match self.op(idx) {
            Op::Const(Const { val }) => Some(val),
            _ => None,
        }
    }

    /// The node `idx` has been replaced by, following chains of replacements.
    pub fn equiv(&self, mut idx: NodeIdx) -> NodeIdx {
        while let Some(x) = self.forwarding[idx] {
            idx = x;
        }
        idx
    }

    pub fn is_live(&self, idx: NodeIdx) -> bool {
        self.forwarding[idx].is_none()
    }

    /// Iterate over the nodes which have not been forwarded.
    pub fn iter_live(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.nodes.indices().filter(|x| self.is_live(*x))
    }

    /// The live nodes which have `idx` as an operand.
    pub fn users(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let idx = self.equiv(idx);
        self.iter_live()
            .filter(|x| {
                self.nodes[*x]
                    .op
                    .operands()
                    .iter()
                    .any(|y| self.equiv(*y) == idx)
            })
            .collect()
    }

    /// Replace the op at `idx` with `op`, recomputing its stamp.
    pub fn replace_op(&mut self, idx: NodeIdx, op: Op) {
        let idx = self.equiv(idx);
        let mut op = op;
        op.map_operands(&mut |x| self.equiv(x));
        let stamp = op.infer_stamp(self);
        self.nodes[idx] = Node { op, stamp };
    }

    /// Forward every use of `old` to `new`.
    ///
    /// # Panics
    ///
    /// If the stamps of `old` and `new` are incompatible.
    pub fn replace_uses(&mut self, old: NodeIdx, new: NodeIdx) {
        let (old, new) = (self.equiv(old), self.equiv(new));
        if old == new {
            return;
        }
        assert!(
            self.stamp(old).is_compatible(self.stamp(new)),
            "cannot replace {} ({}) with {} ({})",
            name(old),
            self.stamp(old),
            name(new),
            self.stamp(new)
        );
        self.forwarding[old] = Some(new);
    }

    /// Resolve every live node's operands and recompute its stamp. Returns true if anything
    /// changed.
    pub fn refresh(&mut self) -> bool {
        let mut changed = false;
        for i in 0..self.nodes.len() {
            let idx = NodeIdx::new(i);
            if !self.is_live(idx) {
                continue;
            }
            let mut op = self.nodes[idx].op.clone();
            let before = op.operands();
            op.map_operands(&mut |x| self.equiv(x));
            if op.operands() != before {
                changed = true;
            }
            let stamp = op.infer_stamp(self);
            if !stamp_identical(&stamp, &self.nodes[idx].stamp) {
                changed = true;
            }
            self.nodes[idx] = Node { op, stamp };
        }
        changed
    }

    /// Render the tree rooted at `idx` without node indices (other than of parameters), so
    /// that equivalent graphs built in different orders describe identically. Phis reached
    /// again through a cycle are printed by their order of first appearance.
    pub fn describe(&self, idx: NodeIdx) -> String {
        self.describe_rec(idx, &RefCell::new(HashMap::new()))
    }

    fn describe_rec(&self, idx: NodeIdx, seen: &RefCell<HashMap<NodeIdx, usize>>) -> String {
        let idx = self.equiv(idx);
        let op = self.op(idx);
        match op {
            Op::Param(_) => format!("{}:{}", name(idx), op.render(&name)),
            Op::Phi(_) => {
                let n = {
                    let mut seen = seen.borrow_mut();
                    if let Some(n) = seen.get(&idx) {
                        return format!("phi@{n}");
                    }
                    let n = seen.len();
                    seen.insert(idx, n);
                    n
                };
                format!(
                    "@{n}:{}",
                    op.render(&|x| self.describe_rec(x, seen))
                )
            }
            _ => op.render(&|x| self.describe_rec(x, seen)),
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for idx in self.iter_live() {
            let node = &self.nodes[idx];
            let op = node.op.render(&|x| name(self.equiv(x)));
            writeln!(f, "{}: {} = {op}", name(idx), node.stamp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        arch::FixedVectorArch,
        constant::test::{ints, mask},
        stamp::FloatStamp,
    };

    pub(crate) fn graph() -> Graph {
        Graph::new(Arc::new(FixedVectorArch::default()))
    }

    pub(crate) fn i32s() -> Stamp {
        Stamp::Int(IntStamp::unrestricted(32))
    }

    pub(crate) fn v(elem: &Stamp, len: usize) -> Stamp {
        Stamp::Simd(SimdStamp::broadcast(elem, len))
    }

    #[test]
    fn push_and_stamps() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let c = g.push_const(Constant::Simd(ints(32, &[1, 2, 3, 4])));
        let add = g.push(Binary {
            op: BinaryOp::Add,
            lhs: x,
            rhs: c,
        });
        assert_eq!(g.stamp(add), &v(&i32s(), 4));
        let cut = g.push(Cut {
            val: c,
            offset: 1,
            len: 2,
        });
        assert_eq!(
            g.stamp(cut).as_constant(),
            Some(Constant::Simd(ints(32, &[2, 3])))
        );
        let one = g.push(Cut {
            val: c,
            offset: 3,
            len: 1,
        });
        assert_eq!(
            g.stamp(one),
            &Stamp::from_constant(&Constant::Int(ArbBitInt::from_i64(32, 4)))
        );
        assert_eq!(g.users(c), vec![add, cut, one]);
    }

    #[test]
    fn forwarding() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_param(v(&i32s(), 4));
        let n = g.push(Unary {
            op: UnaryOp::Not,
            val: x,
        });
        g.replace_uses(x, y);
        assert_eq!(g.equiv(x), y);
        assert!(!g.is_live(x));
        assert!(g.refresh());
        assert_eq!(g.op(n).operands().as_slice(), &[y]);
        assert!(!g.refresh());
    }

    #[test]
    #[should_panic(expected = "cannot replace")]
    fn replace_incompatible() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_param(v(&i32s(), 8));
        g.replace_uses(x, y);
    }

    #[test]
    fn oversized_constant_cut() {
        let mut g = graph();
        // AVX2 holds 8 i32 lanes.
        let c = g.push_const(Constant::Simd(ints(32, &(0..16).collect::<Vec<_>>())));
        let lo = g.push(Cut {
            val: c,
            offset: 0,
            len: 8,
        });
        let hi = g.push(Cut {
            val: c,
            offset: 8,
            len: 8,
        });
        assert!(g.stamp(lo).as_constant().is_some());
        assert_eq!(g.stamp(hi).as_constant(), None);
        assert_eq!(g.stamp(hi), &Stamp::from_constant(&Constant::Simd(ints(32, &(8..16).collect::<Vec<_>>()))));
    }

    #[test]
    fn compare_stamps() {
        let mut g = graph();
        let r = Stamp::Int(IntStamp::range(32, 0, 10));
        let x = g.push_param(v(&r, 4));
        let c = g.push_const(Constant::Simd(ints(32, &[20, 20, 5, 20])));
        let bm = g.push(Compare {
            pred: Pred::Slt,
            lhs: x,
            rhs: c,
            mask: MaskKind::Bitmask,
        });
        let Stamp::Simd(s) = g.stamp(bm) else { panic!() };
        assert_eq!(s.comp(0), &Stamp::Int(IntStamp::range(32, -1, -1)));
        assert_eq!(s.comp(2), &Stamp::Int(IntStamp::range(32, -1, 0)));
        let om = g.push(Compare {
            pred: Pred::Slt,
            lhs: x,
            rhs: c,
            mask: MaskKind::Opmask,
        });
        let Stamp::Simd(s) = g.stamp(om) else { panic!() };
        assert!(s.is_opmask());
        assert_eq!(s.comp(0), &Stamp::Logic(LogicValue::True));
        assert_eq!(s.comp(2), &Stamp::Logic(LogicValue::Unrestricted));
    }

    #[test]
    fn compare_defaults_to_target_mask() {
        for (arch, expect) in [("avx2", MaskKind::Bitmask), ("avx512", MaskKind::Opmask)] {
            let mut g = Graph::new(Arc::new(FixedVectorArch::from_name(arch).unwrap()));
            let x = g.push_param(v(&i32s(), 4));
            let y = g.push_param(v(&i32s(), 4));
            let c = g.push_compare(Pred::Eq, x, y);
            assert!(
                matches!(g.op(c), Op::Compare(Compare { mask, .. }) if *mask == expect),
                "{arch}"
            );
            assert_eq!(
                g.stamp(c).as_simd().unwrap().is_opmask(),
                expect == MaskKind::Opmask
            );
        }
    }

    #[test]
    fn permute_var_stamp() {
        let mut g = graph();
        let src = g.push_const(Constant::Simd(ints(32, &[10, 20, 30, 40])));
        let idx = g.push_param(v(&Stamp::Int(IntStamp::range(32, 1, 2)), 2));
        let p = g.push(PermuteVar {
            val: src,
            indices: idx,
        });
        let Stamp::Simd(s) = g.stamp(p) else { panic!() };
        assert_eq!(s.len(), 2);
        let Stamp::Int(lane) = s.comp(0) else { panic!() };
        assert_eq!((lane.lo(), lane.hi()), (20, 30));
        let none = g.push_param(v(&Stamp::Int(IntStamp::range(32, 7, 9)), 2));
        let p = g.push(PermuteVar {
            val: src,
            indices: none,
        });
        assert!(g.stamp(p).is_empty());
    }

    #[test]
    fn mask_blend_stamp() {
        let mut g = graph();
        let x = g.push_const(Constant::Simd(ints(8, &[1, 2])));
        let y = g.push_const(Constant::Simd(ints(8, &[3, 4])));
        let m = g.push_const(Constant::Simd(mask(&[false, true])));
        let b = g.push(MaskBlend { lhs: x, rhs: y, mask: m });
        assert_eq!(
            g.stamp(b).as_constant(),
            Some(Constant::Simd(ints(8, &[1, 4])))
        );
    }

    #[test]
    #[should_panic(expected = "compress mask must be an opmask")]
    fn compress_needs_opmask() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        g.push(Compress { val: x, mask: x });
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn insert_out_of_range() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_param(v(&i32s(), 2));
        g.push(Insert {
            vec: x,
            val: y,
            offset: 3,
        });
    }

    #[test]
    #[should_panic(expected = "incompatible stamps")]
    fn insert_incompatible() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let y = g.push_param(Stamp::Float(FloatStamp::unrestricted(32)));
        g.push(Insert {
            vec: x,
            val: y,
            offset: 0,
        });
    }

    #[test]
    fn describe_cycles() {
        let mut g = graph();
        let x = g.push_param(v(&i32s(), 4));
        let phi = g.push_phi(v(&i32s(), 4));
        let add = g.push(Binary {
            op: BinaryOp::Add,
            lhs: phi,
            rhs: x,
        });
        g.set_phi_inputs(phi, &[x, add]);
        assert_eq!(
            g.describe(add),
            "add @0:phi [%0:param <4 x i32>, add phi@0, %0:param <4 x i32>], %0:param <4 x i32>"
        );
        assert!(g.to_string().contains("%1: <4 x i32> = phi [%0, %2]"));
    }
}
