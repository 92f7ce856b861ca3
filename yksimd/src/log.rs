//! The implementation of the `YKD_LOG` and `YKD_LOG_IR` environment variables.
//!
//! IR logging is only meaningfully available when the `ykd` feature is enabled: otherwise we
//! expose no-op functions.

use crate::CompilationError;
use std::{env, fs::File, io::Write, path::PathBuf};
use strum::{EnumCount, FromRepr};

/// How verbose should the canonicaliser's logging be?
#[repr(u8)]
#[derive(Copy, Clone, Debug, EnumCount, FromRepr, PartialEq, PartialOrd)]
pub(crate) enum Verbosity {
    /// Disable logging entirely.
    Disabled,
    /// Log errors.
    Error,
    /// Log warnings.
    Warning,
    /// Log every individual rewrite.
    Rewrite,
}

#[derive(Debug)]
pub(crate) struct Log {
    level: Verbosity,
    /// `None` means stderr.
    path: Option<PathBuf>,
}

impl Log {
    pub(crate) fn new() -> Result<Self, CompilationError> {
        match env::var("YKD_LOG") {
            Ok(s) => Self::parse(&s),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse(s: &str) -> Result<Self, CompilationError> {
        let (path, level) = match s.split(':').collect::<Vec<_>>()[..] {
            [path, level] => {
                if path == "-" {
                    (None, level)
                } else {
                    let path = PathBuf::from(path);
                    // Truncate any previous log so that later appends start from empty.
                    File::create(&path).ok();
                    (Some(path), level)
                }
            }
            [level] => (None, level),
            [..] => {
                return Err(CompilationError::General(
                    "YKD_LOG must be of the format `[<path|->:]<level>`".into(),
                ));
            }
        };
        let level = level
            .parse::<u8>()
            .map_err(|e| CompilationError::General(format!("Invalid YKD_LOG level '{s}': {e}")))?;
        let max_level = Verbosity::COUNT - 1;
        let level = Verbosity::from_repr(level).ok_or_else(|| {
            CompilationError::General(format!("YKD_LOG level {level} exceeds maximum {max_level}"))
        })?;
        Ok(Self { path, level })
    }

    /// Is a message at `level` going to be written anywhere?
    pub(crate) fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Disabled && level <= self.level
    }

    /// Log `msg` with the [Verbosity] level `level`.
    ///
    /// # Panics
    ///
    /// If `level == Verbosity::Disabled`.
    pub(crate) fn log(&self, level: Verbosity, msg: &str) {
        if level <= self.level {
            let prefix = match level {
                Verbosity::Disabled => panic!(),
                Verbosity::Error => "yk-simd-error",
                Verbosity::Warning => "yk-simd-warning",
                Verbosity::Rewrite => "yk-simd-rewrite",
            };
            match &self.path {
                Some(p) => {
                    let s = format!("{prefix}: {msg}\n");
                    File::options()
                        .append(true)
                        .open(p)
                        .map(|mut x| x.write(s.as_bytes()))
                        .ok();
                }
                None => eprintln!("{prefix}: {msg}"),
            }
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            path: None,
            level: Verbosity::Error,
        }
    }
}

#[derive(Eq, Hash, PartialEq)]
pub(crate) enum IRPhase {
    /// The graph before the canonicaliser runs.
    PreCanon,
    /// The graph once the canonicaliser has reached a fixpoint.
    PostCanon,
}

#[cfg(not(feature = "ykd"))]
mod internals {
    use super::IRPhase;
    pub(crate) fn should_log_ir(_: IRPhase) -> bool {
        false
    }
    pub(crate) fn log_ir(_: &str) {}
}

#[cfg(feature = "ykd")]
mod internals {
    use super::IRPhase;
    use crate::CompilationError;
    use std::{collections::HashSet, env, fs::File, io::Write, sync::LazyLock};

    static LOG_IR: LazyLock<Option<(String, HashSet<IRPhase>)>> = LazyLock::new(|| {
        let x = env::var("YKD_LOG_IR").ok()?;
        let (path, phases) = match x.split(':').collect::<Vec<_>>().as_slice() {
            [path, phases] => (*path, *phases),
            [phases] => ("-", *phases),
            _ => panic!("YKD_LOG_IR must be of the format '[<path>:]<phase_1>[,...,<phase_n>]'"),
        };
        let mut log_phases = HashSet::new();
        for x in phases.split(',') {
            match IRPhase::from_str(x) {
                Ok(p) => {
                    log_phases.insert(p);
                }
                Err(e) => panic!("{e}"),
            }
        }
        if path != "-" {
            File::create(path).ok();
        }
        Some((path.to_string(), log_phases))
    });

    impl IRPhase {
        fn from_str(s: &str) -> Result<Self, CompilationError> {
            match s {
                "simd-pre-canon" => Ok(Self::PreCanon),
                "simd-post-canon" => Ok(Self::PostCanon),
                _ => Err(CompilationError::General(format!(
                    "Invalid YKD_LOG_IR value: {s}"
                ))),
            }
        }
    }

    pub(crate) fn should_log_ir(phase: IRPhase) -> bool {
        LOG_IR
            .as_ref()
            .is_some_and(|(_, phases)| phases.contains(&phase))
    }

    pub(crate) fn log_ir(s: &str) {
        match LOG_IR.as_ref().map(|(p, _)| p.as_str()) {
            Some("-") => eprint!("{s}"),
            Some(x) => {
                File::options()
                    .append(true)
                    .open(x)
                    .map(|mut x| x.write(s.as_bytes()))
                    .ok();
            }
            None => (),
        }
    }
}

pub(crate) use internals::{log_ir, should_log_ir};
