//! Canonicalisation of vector computations.
//!
//! Each operator has a local rewrite rule, reached through [canonicalise], which inspects a node
//! and its operands and proposes a [Rewrite]. The [Canonicaliser] applies rules to every live node
//! of a [Graph] until a round makes no change.
//!
//! A rule must only propose rewrites which are strictly simpler than, or closer to canonical form
//! than, the node it is given: otherwise the driver would not terminate.

use crate::{
    CompilationError,
    config::CanonConfig,
    graph::{Graph, NodeIdx, Op, OpKind, OpT},
    log::{IRPhase, Log, Verbosity, log_ir, should_log_ir},
};
use std::collections::HashMap;

mod arith;
mod blend;
mod mask;
mod permute;
mod scalarise;
mod slice;

/// The result of a successful rule.
#[derive(Debug)]
pub enum Rewrite {
    /// The node is equivalent to an existing node: forward all uses to it.
    Equiv(NodeIdx),
    /// Replace the node's operation.
    Rewritten(Op),
}

/// Try to canonicalise the node at `idx`, returning `None` if no rule applies.
pub fn canonicalise(g: &mut Graph, idx: NodeIdx, config: &CanonConfig) -> Option<Rewrite> {
    let mut op = g.op(idx).clone();
    op.map_operands(&mut |x| g.equiv(x));
    match op {
        Op::Param(_) | Op::Const(_) | Op::Phi(_) | Op::Concat(_) => None,
        Op::Unary(x) => arith::unary(g, &x),
        Op::Binary(x) => arith::binary(g, &x),
        Op::Ternary(x) => arith::ternary(g, &x),
        Op::Shift(x) => arith::shift(g, &x),
        Op::IntConvert(x) => arith::int_convert(g, &x),
        Op::FloatConvert(x) => arith::float_convert(g, &x),
        Op::Reinterpret(x) => arith::reinterpret(g, &x),
        Op::Compare(x) => mask::compare(g, &x),
        Op::Broadcast(x) => slice::broadcast(g, &x),
        Op::Cut(x) => slice::cut(g, &x, config),
        Op::Insert(x) => slice::insert(g, &x),
        Op::Permute(x) => permute::permute(g, &x),
        Op::PermuteVar(x) => permute::permute_var(g, &x),
        Op::Blend(x) => blend::blend(g, &x),
        Op::MaskBlend(x) => blend::mask_blend(g, &x),
        Op::MaskTest(x) => mask::mask_test(g, &x),
        Op::ToBitMask(x) => mask::to_bit_mask(g, &x),
        Op::Compress(x) => mask::compress(g, &x),
        Op::MaskedLoad(x) => mask::masked_load(g, &x),
    }
}

/// A rewrite to a constant node.
fn constant(c: crate::constant::Constant) -> Rewrite {
    Rewrite::Rewritten(Op::Const(crate::graph::Const { val: c }))
}

/// The order in which the driver visits nodes in each round.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VisitOrder {
    #[default]
    Forward,
    Reverse,
}

#[derive(Clone, Debug, Default)]
pub struct CanonStats {
    /// How many rounds were run, including the final one which made no change.
    pub rounds: usize,
    /// How many rewrites were applied in total.
    pub rewrites: usize,
    /// Rewrites applied, keyed by the kind of the node rewritten.
    pub per_kind: HashMap<OpKind, usize>,
}

/// Runs [canonicalise] over a graph to a fixpoint.
pub struct Canonicaliser {
    config: CanonConfig,
    log: Log,
    order: VisitOrder,
}

impl Canonicaliser {
    /// A canonicaliser which only logs errors.
    pub fn new(config: CanonConfig) -> Self {
        Self {
            config,
            log: Log::default(),
            order: VisitOrder::default(),
        }
    }

    /// A canonicaliser configured from `YKD_SIMD_*` and logging according to `YKD_LOG`.
    pub fn from_env() -> Result<Self, CompilationError> {
        Ok(Self {
            config: CanonConfig::from_env()?,
            log: Log::new()?,
            order: VisitOrder::default(),
        })
    }

    pub fn with_order(mut self, order: VisitOrder) -> Self {
        self.order = order;
        self
    }

    pub fn config(&self) -> &CanonConfig {
        &self.config
    }

    /// Rewrite `g` until no rule applies.
    ///
    /// # Errors
    ///
    /// [CompilationError::LimitExceeded] if no fixpoint is reached within
    /// [CanonConfig::max_rounds] rounds. `g` is left valid but not canonical.
    pub fn run(&self, g: &mut Graph) -> Result<CanonStats, CompilationError> {
        if should_log_ir(IRPhase::PreCanon) {
            log_ir(&format!(
                "--- Begin simd-pre-canon ---\n{g}--- End simd-pre-canon ---\n"
            ));
        }
        let mut stats = CanonStats::default();
        loop {
            if stats.rounds == self.config.max_rounds {
                self.log.log(
                    Verbosity::Warning,
                    &format!("no fixpoint after {} rounds", stats.rounds),
                );
                return Err(CompilationError::LimitExceeded(format!(
                    "canonicalisation did not reach a fixpoint within {} rounds",
                    self.config.max_rounds
                )));
            }
            stats.rounds += 1;
            let mut changed = self.round(g, &mut stats);
            changed |= g.refresh();
            if !changed {
                break;
            }
        }
        if should_log_ir(IRPhase::PostCanon) {
            log_ir(&format!(
                "--- Begin simd-post-canon ---\n{g}--- End simd-post-canon ---\n"
            ));
        }
        Ok(stats)
    }

    /// Visit every node which existed at the start of the round. Returns true if any rewrite was
    /// applied.
    fn round(&self, g: &mut Graph, stats: &mut CanonStats) -> bool {
        let mut idxs = g.iter_live().collect::<Vec<_>>();
        if self.order == VisitOrder::Reverse {
            idxs.reverse();
        }
        let mut changed = false;
        for idx in idxs {
            if !g.is_live(idx) {
                continue;
            }
            let Some(rw) = canonicalise(g, idx, &self.config) else {
                continue;
            };
            let kind = g.op(idx).kind();
            if self.log.enabled(Verbosity::Rewrite) {
                let to = match &rw {
                    Rewrite::Equiv(x) => format!("%{}", usize::from(*x)),
                    Rewrite::Rewritten(op) => op.render(&|x| format!("%{}", usize::from(x))),
                };
                let from = g.op(idx).render(&|x| format!("%{}", usize::from(g.equiv(x))));
                self.log.log(
                    Verbosity::Rewrite,
                    &format!("%{}: {from} => {to}", usize::from(idx)),
                );
            }
            match rw {
                Rewrite::Equiv(x) => g.replace_uses(idx, x),
                Rewrite::Rewritten(op) => g.replace_op(idx, op),
            }
            stats.rewrites += 1;
            *stats.per_kind.entry(kind).or_insert(0) += 1;
            changed = true;
        }
        changed
    }
}
