use std::io;

use okms_kmip::{KmipError, ttlv::TtlvError};
use thiserror::Error;

pub(crate) mod result;

#[derive(Error, Debug)]
pub enum KmsClientError {
    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("Invalid conversion: {0}")]
    Conversion(String),

    #[error("{0}")]
    Default(String),

    #[error("{0}")]
    Kmip(KmipError),

    #[error("Not Supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    PemError(#[from] pem::PemError),

    #[error("REST Request Failed: {0}")]
    RequestFailed(String),

    #[error("REST Response Conversion Failed: {0}")]
    ResponseFailed(String),

    #[error("TTLV Error: {0}")]
    TtlvError(String),

    #[error(transparent)]
    UrlError(#[from] url::ParseError),
}

impl From<TtlvError> for KmsClientError {
    fn from(e: TtlvError) -> Self {
        Self::TtlvError(e.to_string())
    }
}

impl From<KmipError> for KmsClientError {
    fn from(e: KmipError) -> Self {
        Self::Kmip(e)
    }
}

impl From<std::num::TryFromIntError> for KmsClientError {
    fn from(e: std::num::TryFromIntError) -> Self {
        Self::Conversion(e.to_string())
    }
}

impl From<reqwest::Error> for KmsClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Default(format!("{e}: Details: {e:?}"))
    }
}

impl From<reqwest::header::InvalidHeaderValue> for KmsClientError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        Self::Default(e.to_string())
    }
}

impl From<io::Error> for KmsClientError {
    fn from(e: io::Error) -> Self {
        Self::Default(e.to_string())
    }
}

impl From<openssl::error::ErrorStack> for KmsClientError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Default(format!("OpenSSL: {e}"))
    }
}

impl From<native_tls::Error> for KmsClientError {
    fn from(e: native_tls::Error) -> Self {
        Self::Default(format!("TLS: {e}"))
    }
}

impl From<serde_json::Error> for KmsClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFailed(e.to_string())
    }
}

/// Construct a client error from a string.
#[macro_export]
macro_rules! client_error {
    ($msg:literal) => {
        $crate::KmsClientError::Default(::core::format_args!($msg).to_string())
    };
    ($err:expr $(,)?) => ({
        $crate::KmsClientError::Default($err.to_string())
    });
    ($fmt:expr, $($arg:tt)*) => {
        $crate::KmsClientError::Default(::core::format_args!($fmt, $($arg)*).to_string())
    };
}

/// Return early with an error if a condition is not satisfied.
#[macro_export]
macro_rules! client_bail {
    ($msg:literal) => {
        return ::core::result::Result::Err($crate::client_error!($msg))
    };
    ($err:expr $(,)?) => {
        return ::core::result::Result::Err($err)
    };
    ($fmt:expr, $($arg:tt)*) => {
        return ::core::result::Result::Err($crate::client_error!($fmt, $($arg)*))
    };
}

/// Return early with an error if a condition is not satisfied.
#[macro_export]
macro_rules! client_ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return ::core::result::Result::Err($crate::client_error!($msg));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return ::core::result::Result::Err($crate::client_error!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use okms_kmip::KmipError;

    use super::KmsClientError;

    #[test]
    fn test_client_error_interpolation() {
        let var = 42;
        let err = client_error!("interpolate {var}");
        assert_eq!("interpolate 42", err.to_string());

        let err = bail();
        assert_eq!("interpolate 43", err.unwrap_err().to_string());
    }

    #[test]
    fn test_kmip_errors_keep_their_message() {
        let err = KmsClientError::from(KmipError::OperationFailed(
            "ItemNotFound".to_owned(),
            "no such object".to_owned(),
        ));
        assert_eq!(err.to_string(), "ItemNotFound: no such object");
    }

    fn bail() -> Result<(), KmsClientError> {
        let var = 43;
        if true {
            client_bail!("interpolate {var}");
        }
        Ok(())
    }
}
