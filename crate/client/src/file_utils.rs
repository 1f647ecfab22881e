use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use crate::error::{
    KmsClientError,
    result::{KmsClientResult, KmsClientResultHelper},
};

/// Read all bytes from a file
pub fn read_bytes_from_file(file: &impl AsRef<Path>) -> KmsClientResult<Vec<u8>> {
    let mut buffer = Vec::new();
    File::open(file)
        .with_context(|| format!("could not open the file {}", file.as_ref().display()))?
        .read_to_end(&mut buffer)
        .with_context(|| format!("could not read the file {}", file.as_ref().display()))?;

    Ok(buffer)
}

/// Read a file, failing when it holds more than `limit` bytes
pub fn read_bytes_from_file_max(file: &impl AsRef<Path>, limit: u64) -> KmsClientResult<Vec<u8>> {
    let len = fs::metadata(file)
        .with_context(|| format!("could not stat the file {}", file.as_ref().display()))?
        .len();
    if len > limit {
        return Err(KmsClientError::Default("Input data is too large".to_owned()));
    }
    read_bytes_from_file(file)
}

/// Write all bytes to a file
pub fn write_bytes_to_file(bytes: &[u8], file: &impl AsRef<Path>) -> KmsClientResult<()> {
    fs::write(file, bytes).with_context(|| {
        format!(
            "failed writing {} bytes to {}",
            bytes.len(),
            file.as_ref().display()
        )
    })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{read_bytes_from_file, read_bytes_from_file_max, write_bytes_to_file};

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_bytes_to_file(b"hello", &path).unwrap();
        assert_eq!(read_bytes_from_file(&path).unwrap(), b"hello");
        assert_eq!(read_bytes_from_file_max(&path, 5).unwrap(), b"hello");
        let err = read_bytes_from_file_max(&path, 4).unwrap_err();
        assert_eq!(err.to_string(), "Input data is too large");
    }

    #[test]
    fn test_missing_file_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = read_bytes_from_file(&path).unwrap_err();
        assert!(err.to_string().starts_with("could not open the file"), "{err}");
    }
}
