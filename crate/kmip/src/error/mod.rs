use std::num::TryFromIntError;

use thiserror::Error;

use crate::ttlv::TtlvError;

pub(crate) mod result;

#[derive(Error, Debug)]
pub enum KmipError {
    #[error("Conversion Error: {0}")]
    ConversionError(String),

    #[error("{0}")]
    Default(String),

    #[error("Invalid KMIP message: {0}")]
    InvalidMessage(String),

    /// The server answered a batch item with a non-success result status.
    /// Holds the result reason name and the result message.
    #[error("{0}: {1}")]
    OperationFailed(String, String),

    #[error("TTLV error: {0}")]
    Ttlv(String),

    #[error("Unsupported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<TtlvError> for KmipError {
    fn from(e: TtlvError) -> Self {
        Self::Ttlv(e.to_string())
    }
}

impl From<TryFromIntError> for KmipError {
    fn from(e: TryFromIntError) -> Self {
        Self::ConversionError(e.to_string())
    }
}

/// Construct a KMIP error from a string.
#[macro_export]
macro_rules! kmip_error {
    ($msg:literal) => {
        $crate::KmipError::Default(::core::format_args!($msg).to_string())
    };
    ($err:expr $(,)?) => ({
        $crate::KmipError::Default($err.to_string())
    });
    ($fmt:expr, $($arg:tt)*) => {
        $crate::KmipError::Default(::core::format_args!($fmt, $($arg)*).to_string())
    };
}

/// Return early with an error if a condition is not satisfied.
#[macro_export]
macro_rules! kmip_bail {
    ($msg:literal) => {
        return ::core::result::Result::Err($crate::kmip_error!($msg))
    };
    ($err:expr $(,)?) => {
        return ::core::result::Result::Err($err)
    };
    ($fmt:expr, $($arg:tt)*) => {
        return ::core::result::Result::Err($crate::kmip_error!($fmt, $($arg)*))
    };
}
