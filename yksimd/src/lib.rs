//! SIMD stamps, constants, and canonicalisation for yk's vector IR.
//!
//! This crate describes vector values in three layers:
//!
//! 1. [stamp]: abstract values ("stamps") forming a lattice. A [stamp::SimdStamp] is a
//!    fixed-length tuple of scalar stamps, all of the same kind.
//! 2. [constant]: concrete values, including [constant::SimdConstant].
//! 3. [ops]: scalar operator tables and their elementwise lifting to vectors.
//!
//! On top of these, [graph] is a small arena-based IR substrate and [canon] contains the rewrite
//! rules for the vector operators (broadcast, cut, insert, permute, blend, ...) together with a
//! fixpoint driver.

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::comparison_chain)]

pub mod arbbitint;
pub mod arch;
pub mod canon;
pub mod config;
pub mod constant;
mod errors;
pub mod graph;
mod log;
pub mod ops;
pub mod stamp;

pub use errors::CompilationError;
