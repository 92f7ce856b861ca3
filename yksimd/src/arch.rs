//! The target's vector capabilities, as far as canonicalisation needs to know them.

use crate::{CompilationError, stamp::Stamp};
use std::env;

/// How does the target represent a vector of booleans?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaskKind {
    /// One bit per lane in a dedicated mask register (e.g. AVX-512 `k` registers).
    Opmask,
    /// A vector whose lanes are all ones or all zeros.
    Bitmask,
}

pub trait VectorArch: Send + Sync {
    /// How is a mask over lanes of shape `elem` represented?
    fn mask_kind(&self, elem: &Stamp) -> MaskKind;

    /// The most lanes of shape `elem` that fit in one vector register.
    fn max_vector_length(&self, elem: &Stamp) -> usize;

    /// The distance in bytes between consecutive lanes of shape `elem`.
    fn vector_stride(&self, elem: &Stamp) -> usize;
}

/// A target with one vector register size for every element type.
#[derive(Clone, Debug)]
pub struct FixedVectorArch {
    max_vector_bytes: usize,
    opmasks: bool,
}

impl FixedVectorArch {
    pub fn new(max_vector_bytes: usize, opmasks: bool) -> Self {
        assert!(max_vector_bytes.is_power_of_two());
        Self {
            max_vector_bytes,
            opmasks,
        }
    }

    /// Named targets, as accepted by `YKD_SIMD_ARCH`.
    pub fn from_name(name: &str) -> Result<Self, CompilationError> {
        match name {
            "sse" | "neon" => Ok(Self::new(16, false)),
            "avx2" => Ok(Self::new(32, false)),
            "avx512" => Ok(Self::new(64, true)),
            _ => Err(CompilationError::General(format!(
                "Invalid YKD_SIMD_ARCH value '{name}': expected one of sse, avx2, avx512, neon"
            ))),
        }
    }

    /// Read the target from `YKD_SIMD_ARCH`, defaulting to AVX2.
    pub fn from_env() -> Result<Self, CompilationError> {
        match env::var("YKD_SIMD_ARCH") {
            Ok(x) => Self::from_name(&x),
            Err(_) => Ok(Self::default()),
        }
    }
}

impl Default for FixedVectorArch {
    fn default() -> Self {
        Self::new(32, false)
    }
}

impl VectorArch for FixedVectorArch {
    fn mask_kind(&self, _elem: &Stamp) -> MaskKind {
        if self.opmasks {
            MaskKind::Opmask
        } else {
            MaskKind::Bitmask
        }
    }

    fn max_vector_length(&self, elem: &Stamp) -> usize {
        match elem {
            // Opmask registers hold 64 lanes.
            Stamp::Logic(_) if self.opmasks => 64,
            _ => self.max_vector_bytes / self.vector_stride(elem),
        }
    }

    fn vector_stride(&self, elem: &Stamp) -> usize {
        elem.lane_stamp().byte_size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stamp::{IntStamp, LogicValue};

    #[test]
    fn named() {
        let i32s = Stamp::Int(IntStamp::unrestricted(32));
        let avx2 = FixedVectorArch::from_name("avx2").unwrap();
        assert_eq!(avx2.max_vector_length(&i32s), 8);
        assert_eq!(avx2.mask_kind(&i32s), MaskKind::Bitmask);
        let avx512 = FixedVectorArch::from_name("avx512").unwrap();
        assert_eq!(avx512.max_vector_length(&i32s), 16);
        assert_eq!(avx512.mask_kind(&i32s), MaskKind::Opmask);
        assert_eq!(
            avx512.max_vector_length(&Stamp::Logic(LogicValue::Unrestricted)),
            64
        );
        assert_eq!(FixedVectorArch::from_name("sse").unwrap().vector_stride(&i32s), 4);
        assert!(matches!(
            FixedVectorArch::from_name("mmx"),
            Err(CompilationError::General(_))
        ));
    }
}
