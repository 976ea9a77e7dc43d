//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = anyhow::Result<T, E>;

/// Failure raised by descriptor construction, statement assembly or the session.
///
/// Expected outcomes such as a vetoed write or an update that changed nothing are
/// not errors; they are reported through [`crate::Outcome`] and
/// [`crate::UpdateOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// The entity declaration is malformed. Raised on first use of the type.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller broke an argument contract (blank name, unknown property,
    /// misaligned values).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The operation is not available for the entity or dialect.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A value could not be converted to or from its storage representation.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The session collaborator failed. Propagated unchanged.
    #[error(transparent)]
    Session(#[from] anyhow::Error),
}

impl Error {
    /// Returns `true` for errors caused by a malformed entity declaration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` for argument contract violations.
    #[must_use]
    pub const fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }
}

impl From<sea_query::error::Error> for Error {
    fn from(err: sea_query::error::Error) -> Self {
        Self::Argument(err.to_string())
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! config_error {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Config(format!($fmt, $($arg)*))
    };
    ($desc:expr $(,)?) => {
        $crate::Error::Config(format!($desc))
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! argument_error {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Argument(format!($fmt, $($arg)*))
    };
    ($desc:expr $(,)?) => {
        $crate::Error::Argument(format!($desc))
    };
}
