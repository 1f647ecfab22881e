use std::fmt::Display;

#[derive(Debug)]
pub struct TtlvError {
    pub error: String,
}

impl TtlvError {
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self {
            error: s.to_owned(),
        }
    }
}

impl Display for TtlvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for TtlvError {}

impl From<std::io::Error> for TtlvError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Self::new("Truncated TTLV input");
        }
        Self::new(&err.to_string())
    }
}

impl From<&str> for TtlvError {
    fn from(s: &str) -> Self {
        Self { error: s.into() }
    }
}

impl From<String> for TtlvError {
    fn from(s: String) -> Self {
        Self { error: s }
    }
}

impl From<std::string::FromUtf8Error> for TtlvError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::new(&format!("Invalid UTF-8 text string: {err}"))
    }
}

impl From<time::error::ComponentRange> for TtlvError {
    fn from(err: time::error::ComponentRange) -> Self {
        Self::new(&err.to_string())
    }
}
