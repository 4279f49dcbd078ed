use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

pub type MixResult<T> = Result<T, MixError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    NotFactorizable,
    TreeInfeasible,
    SolverInfeasible,
    SolverUnknown,
    Io,
    Serde,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

#[derive(Debug)]
pub enum MixError {
    /// Malformed external input: ratios/factors mismatch, unknown mode,
    /// unreadable scenario file. Fatal at single-run scope, no solve attempted.
    InvalidConfig {
        message: ErrString,
    },
    /// `factorize(sum, max_mixer_size)` found no decomposition into factors
    /// in `(1, max_mixer_size]`.
    NotFactorizable {
        message: ErrString,
    },
    /// The forest builder's level-0 postcondition failed. Given factors are
    /// validated first, this indicates a programming error, not bad input.
    TreeInfeasible {
        message: ErrString,
    },
    /// The backend proved no plan exists under the given constraints.
    SolverInfeasible {
        message: ErrString,
    },
    /// The backend terminated without a proof either way (budget exhausted)
    /// and no feasible incumbent was captured.
    SolverUnknown {
        message: ErrString,
    },

    Io {
        source: std::io::Error,
    },
    Serde {
        message: ErrString,
    },

    Context {
        context: ErrorContext,
        source: Box<MixError>,
    },
}

impl MixError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::NotFactorizable { .. } => ErrorCode::NotFactorizable,
            Self::TreeInfeasible { .. } => ErrorCode::TreeInfeasible,
            Self::SolverInfeasible { .. } => ErrorCode::SolverInfeasible,
            Self::SolverUnknown { .. } => ErrorCode::SolverUnknown,
            Self::Io { .. } => ErrorCode::Io,
            Self::Serde { .. } => ErrorCode::Serde,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    /// Solver errors are recovered at batch scope; everything else is fatal
    /// for the run that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::SolverInfeasible | ErrorCode::SolverUnknown
        )
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        MixError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
        }
    }
}

impl Display for MixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "Invalid configuration: {}", message),
            Self::NotFactorizable { message } => write!(f, "Not factorizable: {}", message),
            Self::TreeInfeasible { message } => write!(f, "Tree infeasible: {}", message),
            Self::SolverInfeasible { message } => write!(f, "Solver infeasible: {}", message),
            Self::SolverUnknown { message } => write!(f, "Solver unknown: {}", message),
            Self::Io { source } => write!(f, "Io error: {}", source),
            Self::Serde { message } => write!(f, "Serde error: {}", message),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for MixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MixError {
    fn from(source: std::io::Error) -> Self {
        MixError::Io { source }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

// Ergonomic Result extensions (context)
pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> MixResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> MixResult<T>;
}

impl<T, E: Into<MixError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> MixResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> MixResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

// Macros: err, bail, ensure
#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! mix_err {
    (InvalidConfig: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::InvalidConfig { message: format!($fmt, $($arg),*).into() })
    };
    (NotFactorizable: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::NotFactorizable { message: format!($fmt, $($arg),*).into() })
    };
    (TreeInfeasible: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::TreeInfeasible { message: format!($fmt, $($arg),*).into() })
    };
    (SolverInfeasible: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::SolverInfeasible { message: format!($fmt, $($arg),*).into() })
    };
    (SolverUnknown: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::SolverUnknown { message: format!($fmt, $($arg),*).into() })
    };
    (Serde: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::MixError::Serde { message: format!($fmt, $($arg),*).into() })
    };
}

#[macro_export]
macro_rules! mix_bail {
    ($($tt:tt)+) => { return Err($crate::mix_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::mix_bail!($($tt)+); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_variants() {
        let err = mix_err!(NotFactorizable: "sum {} with mixer size {}", 19, 5);
        assert_eq!(err.code(), ErrorCode::NotFactorizable);
        assert!(err.to_string().contains("19"));
    }

    #[test]
    fn solver_errors_are_recoverable() {
        assert!(mix_err!(SolverInfeasible: "no plan").is_recoverable());
        assert!(mix_err!(SolverUnknown: "budget").is_recoverable());
        assert!(!mix_err!(InvalidConfig: "bad mode").is_recoverable());
    }

    #[test]
    fn context_wraps_source() {
        fn inner() -> MixResult<()> {
            mix_bail!(InvalidConfig: "ratios sum 17, factors product 18")
        }

        let err = inner().context("validating target 'Target 2'").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Context);
        let rendered = err.to_string();
        assert!(rendered.contains("Target 2"));
        assert!(rendered.contains("Caused by"));
    }
}
