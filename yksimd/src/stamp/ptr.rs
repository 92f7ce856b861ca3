use std::fmt;

/// The possible values of a pointer, tracked only as far as nullness.
///
/// Both flags set means no value is possible.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PtrStamp {
    always_null: bool,
    non_null: bool,
}

impl PtrStamp {
    pub fn new(always_null: bool, non_null: bool) -> Self {
        Self {
            always_null,
            non_null,
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(false, false)
    }

    pub fn empty() -> Self {
        Self::new(true, true)
    }

    pub fn null() -> Self {
        Self::new(true, false)
    }

    pub fn non_null() -> Self {
        Self::new(false, true)
    }

    pub fn from_constant(addr: usize) -> Self {
        if addr == 0 {
            Self::null()
        } else {
            Self::non_null()
        }
    }

    pub fn is_always_null(&self) -> bool {
        self.always_null && !self.non_null
    }

    pub fn is_non_null(&self) -> bool {
        self.non_null && !self.always_null
    }

    pub fn is_empty(&self) -> bool {
        self.always_null && self.non_null
    }

    /// Only null is representable as a constant: other addresses are not tracked.
    pub fn as_constant(&self) -> Option<usize> {
        self.is_always_null().then_some(0)
    }

    pub fn meet(&self, other: &Self) -> Self {
        Self::new(
            self.always_null && other.always_null,
            self.non_null && other.non_null,
        )
    }

    pub fn join(&self, other: &Self) -> Self {
        Self::new(
            self.always_null || other.always_null,
            self.non_null || other.non_null,
        )
    }
}

impl fmt::Display for PtrStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.always_null, self.non_null) {
            (true, true) => write!(f, "ptr<empty>"),
            (true, false) => write!(f, "ptr[null]"),
            (false, true) => write!(f, "ptr[nonnull]"),
            (false, false) => write!(f, "ptr"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lattice() {
        let all = [
            PtrStamp::empty(),
            PtrStamp::null(),
            PtrStamp::non_null(),
            PtrStamp::unrestricted(),
        ];
        for a in &all {
            assert_eq!(a.meet(&PtrStamp::empty()), *a);
            assert_eq!(a.join(&PtrStamp::unrestricted()), *a);
            assert!(a.join(&PtrStamp::empty()).is_empty());
            for b in &all {
                assert_eq!(a.meet(b), b.meet(a));
                assert_eq!(a.join(b), b.join(a));
            }
        }
        assert_eq!(
            PtrStamp::null().meet(&PtrStamp::non_null()),
            PtrStamp::unrestricted()
        );
        assert_eq!(PtrStamp::from_constant(0).as_constant(), Some(0));
        assert_eq!(PtrStamp::from_constant(8).as_constant(), None);
    }
}
