//! Vector stamps.

use super::Stamp;
use crate::{
    CompilationError,
    constant::{Constant, SimdConstant},
    ops::Pred,
};
use std::fmt;

/// A fixed-length tuple of scalar stamps, all of the same kind and width.
///
/// `no_fold` suppresses [SimdStamp::as_constant] without affecting the lattice: it is ignored by
/// equality and is sticky under `meet` and `join`.
#[derive(Clone, Debug)]
pub struct SimdStamp {
    comps: Vec<Stamp>,
    no_fold: bool,
}

impl PartialEq for SimdStamp {
    fn eq(&self, other: &Self) -> bool {
        self.comps == other.comps
    }
}

impl SimdStamp {
    /// # Panics
    ///
    /// If `comps` is empty, contains a vector stamp, or mixes component kinds or widths.
    pub fn new(comps: Vec<Stamp>) -> Self {
        assert!(!comps.is_empty(), "empty vector stamp");
        let first = &comps[0];
        assert!(!first.is_simd(), "nested vector stamp {first}");
        for c in &comps[1..] {
            assert!(
                c.is_compatible(first),
                "incompatible stamps: {first} and {c} in one vector"
            );
        }
        Self {
            comps,
            no_fold: false,
        }
    }

    pub fn broadcast(elem: &Stamp, len: usize) -> Self {
        Self::new(vec![elem.clone(); len])
    }

    pub fn from_constant(c: &SimdConstant) -> Self {
        Self::new(c.vals().iter().map(Stamp::from_constant).collect())
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn comp(&self, i: usize) -> &Stamp {
        &self.comps[i]
    }

    pub fn comps(&self) -> &[Stamp] {
        &self.comps
    }

    /// The first component, which is representative of every component's shape.
    pub fn elem(&self) -> &Stamp {
        &self.comps[0]
    }

    /// Is every lane a logic value?
    pub fn is_opmask(&self) -> bool {
        matches!(self.elem(), Stamp::Logic(_))
    }

    pub fn no_fold(&self) -> bool {
        self.no_fold
    }

    pub fn with_no_fold(mut self, no_fold: bool) -> Self {
        self.no_fold = no_fold;
        self
    }

    pub fn unrestricted(&self) -> Self {
        Self::broadcast(&self.elem().unrestricted(), self.len()).with_no_fold(self.no_fold)
    }

    pub fn empty(&self) -> Self {
        Self::broadcast(&self.elem().empty(), self.len()).with_no_fold(self.no_fold)
    }

    pub fn is_empty(&self) -> bool {
        self.comps.iter().any(|x| x.is_empty())
    }

    fn check_len(&self, other: &Self, what: &str) {
        assert_eq!(
            self.len(),
            other.len(),
            "{what} of vectors of different lengths: {self} and {other}"
        );
    }

    fn zip_with(&self, other: &Self, f: impl Fn(&Stamp, &Stamp) -> Stamp) -> Self {
        Self::new(
            self.comps
                .iter()
                .zip(other.comps.iter())
                .map(|(x, y)| f(x, y))
                .collect(),
        )
        .with_no_fold(self.no_fold || other.no_fold)
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.check_len(other, "meet");
        self.zip_with(other, Stamp::meet)
    }

    pub fn join(&self, other: &Self) -> Self {
        self.check_len(other, "join");
        self.zip_with(other, Stamp::join)
    }

    /// `self`'s lanes followed by `other`'s.
    pub fn concat(&self, other: &Self) -> Self {
        Self::new(self.comps.iter().chain(other.comps.iter()).cloned().collect())
            .with_no_fold(self.no_fold || other.no_fold)
    }

    /// The `len` lanes starting at `offset`.
    pub fn cut(&self, offset: usize, len: usize) -> Self {
        assert!(
            len > 0 && offset + len <= self.len(),
            "cut [{offset}, {}) out of range of {self}",
            offset + len
        );
        Self::new(self.comps[offset..offset + len].to_vec()).with_no_fold(self.no_fold)
    }

    fn check_halvable(&self) {
        assert!(
            self.len() >= 2 && self.len().is_power_of_two(),
            "cannot halve {self}"
        );
    }

    pub fn lower_half(&self) -> Self {
        self.check_halvable();
        self.cut(0, self.len() / 2)
    }

    pub fn upper_half(&self) -> Self {
        self.check_halvable();
        self.cut(self.len() / 2, self.len() / 2)
    }

    /// Output lane `i` takes input lane `mapping[i]`. A negative entry produces a zero at
    /// run-time, which is described by the lane kind's unrestricted stamp.
    pub fn permute(&self, mapping: &[i32]) -> Self {
        Self::new(
            mapping
                .iter()
                .map(|&i| match usize::try_from(i) {
                    Ok(i) => {
                        assert!(i < self.len(), "permute index {i} out of range of {self}");
                        self.comps[i].clone()
                    }
                    Err(_) => self.elem().unrestricted(),
                })
                .collect(),
        )
        .with_no_fold(self.no_fold)
    }

    /// Lane `i` is `lhs`'s when `selector[i]` is false, otherwise `rhs`'s.
    pub fn blend(lhs: &Self, rhs: &Self, selector: &[bool]) -> Self {
        lhs.check_len(rhs, "blend");
        assert_eq!(lhs.len(), selector.len(), "blend selector length mismatch");
        Self::new(
            selector
                .iter()
                .enumerate()
                .map(|(i, &s)| if s { rhs.comp(i) } else { lhs.comp(i) }.clone())
                .collect(),
        )
        .with_no_fold(lhs.no_fold || rhs.no_fold)
    }

    /// Replace the lanes starting at `offset` with `val`, which may be a scalar or a vector.
    pub fn insert(&self, offset: usize, val: &Stamp) -> Self {
        let new = match val {
            Stamp::Simd(x) => x.comps.clone(),
            x => vec![x.clone()],
        };
        assert!(
            offset + new.len() <= self.len(),
            "insert of {val} at {offset} out of range of {self}"
        );
        let mut comps = self.comps.clone();
        comps.splice(offset..offset + new.len(), new);
        Self::new(comps).with_no_fold(self.no_fold)
    }

    /// If every lane is a single value, and folding hasn't been suppressed, the vector constant.
    pub fn as_constant(&self) -> Option<SimdConstant> {
        if self.no_fold {
            return None;
        }
        self.comps
            .iter()
            .map(|x| x.as_constant())
            .collect::<Option<Vec<_>>>()
            .map(SimdConstant::new)
    }

    /// Evaluate `pred` lane by lane over `x` and `y`: if every lane is known to give the same
    /// answer, return it.
    pub fn try_constant_fold(pred: Pred, x: &Self, y: &Self) -> Option<bool> {
        x.check_len(y, "compare");
        let mut res = None;
        for (a, b) in x.comps.iter().zip(y.comps.iter()) {
            let r = pred.try_fold_stamps(a, b)?;
            match res {
                None => res = Some(r),
                Some(prev) if prev != r => return None,
                Some(_) => (),
            }
        }
        res
    }

    /// Read a constant of this shape from the front of `buf`.
    ///
    /// # Panics
    ///
    /// If `self` is an opmask.
    pub fn read_constant(&self, buf: &mut &[u8]) -> Result<SimdConstant, CompilationError> {
        assert!(!self.is_opmask(), "cannot deserialize an opmask {self}");
        let mut vals = Vec::with_capacity(self.len());
        for c in &self.comps {
            vals.push(Constant::read(c, buf)?);
        }
        Ok(SimdConstant::new(vals))
    }
}

impl fmt::Display for SimdStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.elem();
        if self.comps.iter().all(|x| x == first) {
            write!(f, "<{} x {first}>", self.len())
        } else {
            write!(
                f,
                "<{}>",
                self.comps
                    .iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }
}
