use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

pub type RecurveResult<T> = Result<T, RecurveError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NotImplemented,
    OutOfMemory,
    Internal,
    ThreadPool,
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

/// Failures surfaced by the kernels. The policy is no retry and no partial
/// results: any error aborts the invocation before outputs are produced.
#[derive(Debug)]
pub enum RecurveError {
    InvalidArgument {
        message: ErrString,
    },
    NotImplemented {
        message: ErrString,
    },
    OutOfMemory {
        message: ErrString,
    },
    Internal {
        message: ErrString,
    },
    ThreadPool {
        message: ErrString,
    },

    Context {
        context: ErrorContext,
        source: Box<RecurveError>,
    },
}

impl RecurveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::NotImplemented { .. } => ErrorCode::NotImplemented,
            Self::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            Self::Internal { .. } => ErrorCode::Internal,
            Self::ThreadPool { .. } => ErrorCode::ThreadPool,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    /// The code of the innermost non-context error.
    pub fn root_code(&self) -> ErrorCode {
        match self {
            Self::Context { source, .. } => source.root_code(),
            other => other.code(),
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        RecurveError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
        }
    }
}

impl Display for RecurveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
            Self::NotImplemented { message } => write!(f, "Not implemented: {}", message),
            Self::OutOfMemory { message } => write!(f, "Out of memory: {}", message),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
            Self::ThreadPool { message } => write!(f, "Thread pool error: {}", message),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for RecurveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
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
    fn context(self, msg: impl Into<String>) -> RecurveResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> RecurveResult<T>;
}

impl<T, E: Into<RecurveError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> RecurveResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> RecurveResult<T> {
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
macro_rules! recurve_err {
    (InvalidArgument: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::RecurveError::InvalidArgument { message: format!($fmt, $($arg),*).into() })
    };
    (NotImplemented: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::RecurveError::NotImplemented { message: format!($fmt, $($arg),*).into() })
    };
    (OutOfMemory: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::RecurveError::OutOfMemory { message: format!($fmt, $($arg),*).into() })
    };
    (Internal: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::RecurveError::Internal { message: format!($fmt, $($arg),*).into() })
    };
    (ThreadPool: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::RecurveError::ThreadPool { message: format!($fmt, $($arg),*).into() })
    };
}

#[macro_export]
macro_rules! recurve_bail {
    ($($tt:tt)+) => { return Err($crate::recurve_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::recurve_bail!($($tt)+); }
    };
}
