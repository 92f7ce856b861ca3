//! Canonicaliser configuration from `YKD_SIMD_*` environment variables.

use crate::CompilationError;
use std::env;

#[derive(Clone, Debug)]
pub struct CanonConfig {
    /// Give up after this many rounds without reaching a fixpoint.
    pub max_rounds: usize,
    /// Rewrite length-1 cuts of vector computations into scalar computations.
    pub scalarise: bool,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            max_rounds: 64,
            scalarise: true,
        }
    }
}

impl CanonConfig {
    /// Read `YKD_SIMD_MAX_ROUNDS` and `YKD_SIMD_SCALARISE`, falling back to the defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self, CompilationError> {
        Self::from_vars(
            env::var("YKD_SIMD_MAX_ROUNDS").ok().as_deref(),
            env::var("YKD_SIMD_SCALARISE").ok().as_deref(),
        )
    }

    fn from_vars(max_rounds: Option<&str>, scalarise: Option<&str>) -> Result<Self, CompilationError> {
        let mut config = Self::default();
        if let Some(x) = max_rounds {
            config.max_rounds = x.parse::<usize>().map_err(|e| {
                CompilationError::General(format!("Invalid YKD_SIMD_MAX_ROUNDS value '{x}': {e}"))
            })?;
        }
        if let Some(x) = scalarise {
            config.scalarise = match x {
                "0" => false,
                "1" => true,
                _ => {
                    return Err(CompilationError::General(format!(
                        "YKD_SIMD_SCALARISE must be 0 or 1, not '{x}'"
                    )));
                }
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vars() {
        let c = CanonConfig::from_vars(None, None).unwrap();
        assert_eq!(c.max_rounds, 64);
        assert!(c.scalarise);
        let c = CanonConfig::from_vars(Some("3"), Some("0")).unwrap();
        assert_eq!(c.max_rounds, 3);
        assert!(!c.scalarise);
        assert!(CanonConfig::from_vars(Some("-1"), None).is_err());
        assert!(CanonConfig::from_vars(None, Some("yes")).is_err());
    }
}
