//! Input and output arguments.
//!
//! An input argument is read from a file when written `@path`, from stdin
//! when written `-`, and is taken literally otherwise. A leading `\@` stands
//! for a literal `@`. An output argument is a file path, or `-` for stdout.

use std::{
    convert::Infallible,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::PathBuf,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    cli_bail,
    config::expand_tilde,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

/// Size limit of keys and small payloads read from an input argument
pub const MAX_INPUT_SIZE: u64 = 8192;
/// Size limit of objects registered through KMIP
pub const MAX_KMIP_INPUT_SIZE: u64 = 16_000;

static STDIN_USED: AtomicBool = AtomicBool::new(false);
static STDOUT_USED: AtomicBool = AtomicBool::new(false);

fn take_stdin() -> KmsCliResult<io::Stdin> {
    if STDIN_USED.swap(true, Ordering::SeqCst) {
        cli_bail!("Cannot read stdin more than once");
    }
    Ok(io::stdin())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(String),
    Literal(String),
}

impl FromStr for Input {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "-" {
            Self::Stdin
        } else if let Some(path) = s.strip_prefix('@') {
            Self::File(path.to_owned())
        } else if let Some(rest) = s.strip_prefix("\\@") {
            Self::Literal(format!("@{rest}"))
        } else {
            Self::Literal(s.to_owned())
        })
    }
}

impl Input {
    /// A reader over the input, with its size when it is known
    pub fn open(&self) -> KmsCliResult<(Box<dyn Read>, Option<u64>)> {
        Ok(match self {
            Self::Stdin => (Box::new(take_stdin()?), None),
            Self::File(path) => {
                let path = expand_tilde(path)?;
                let file =
                    File::open(&path).with_context(|| format!("Failed to open {path}"))?;
                let size = file.metadata().ok().map(|m| m.len());
                (Box::new(BufReader::new(file)), size)
            }
            Self::Literal(text) => (Box::new(io::Cursor::new(text.clone().into_bytes())), None),
        })
    }

    /// Read the whole input, failing when it exceeds `limit` bytes
    pub fn read_all_max(&self, limit: u64) -> KmsCliResult<Vec<u8>> {
        let (reader, _) = self.open()?;
        read_all_max(reader, limit)
    }

    /// Read the whole input as UTF-8 text, within `limit` bytes
    pub fn read_string_max(&self, limit: u64) -> KmsCliResult<String> {
        Ok(String::from_utf8(self.read_all_max(limit)?)?)
    }
}

pub fn read_all_max(reader: impl Read, limit: u64) -> KmsCliResult<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        cli_bail!("Input data is too large");
    }
    Ok(data)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Output {
    #[default]
    Stdout,
    File(String),
}

impl FromStr for Output {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "-" {
            Self::Stdout
        } else {
            Self::File(s.to_owned())
        })
    }
}

impl Output {
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Open the output, truncating an existing file. Files are buffered,
    /// callers must flush
    pub fn create(&self) -> KmsCliResult<Box<dyn Write>> {
        Ok(match self {
            Self::Stdout => {
                if STDOUT_USED.swap(true, Ordering::SeqCst) {
                    cli_bail!("Cannot write to stdout more than once");
                }
                Box::new(io::stdout())
            }
            Self::File(path) => {
                let path = PathBuf::from(expand_tilde(path)?);
                Box::new(BufWriter::new(
                    File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                ))
            }
        })
    }

    /// Write `data` to the output in one go
    pub fn write_all(&self, data: &[u8]) -> KmsCliResult<()> {
        let mut writer = self.create()?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Input, Output, read_all_max};

    #[test]
    fn test_parse_input() {
        assert_eq!("-".parse::<Input>().unwrap(), Input::Stdin);
        assert_eq!(
            "@data.bin".parse::<Input>().unwrap(),
            Input::File("data.bin".to_owned())
        );
        assert_eq!(
            "\\@home".parse::<Input>().unwrap(),
            Input::Literal("@home".to_owned())
        );
        assert_eq!(
            "hello".parse::<Input>().unwrap(),
            Input::Literal("hello".to_owned())
        );
        assert_eq!("-".parse::<Output>().unwrap(), Output::Stdout);
        assert!("out.bin".parse::<Output>().unwrap().is_file());
    }

    #[test]
    fn test_read_limit() {
        assert_eq!(read_all_max(&b"1234"[..], 4).unwrap(), b"1234");
        let err = read_all_max(&b"12345"[..], 4).unwrap_err();
        assert_eq!(err.to_string(), "Input data is too large");
    }

    #[test]
    fn test_read_file_and_literal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "from file").unwrap();
        let input = Input::File(path.to_string_lossy().into_owned());
        assert_eq!(input.read_string_max(100).unwrap(), "from file");
        let (_, size) = input.open().unwrap();
        assert_eq!(size, Some(9));
        assert_eq!(
            Input::Literal("abc".to_owned()).read_all_max(3).unwrap(),
            b"abc"
        );
    }

    #[test]
    fn test_write_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "previous content").unwrap();
        let output = Output::File(path.to_string_lossy().into_owned());
        output.write_all(b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_streamed_writes_land_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.bin");
        let output = Output::File(path.to_string_lossy().into_owned());
        let mut writer = output.create().unwrap();
        for frame in 0_u8..64 {
            writer.write_all(&[frame; 100]).unwrap();
        }
        writer.flush().unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 6400);
        assert_eq!(written[6399], 63);
    }
}
