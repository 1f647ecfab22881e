//! Local streaming encryption with a service-wrapped data key.
//!
//! Layout of a stream:
//!
//! ```text
//! "OKMSDK01" | block size (u32 BE) | wrapped key length (u32 BE) | wrapped key
//! frame*     = nonce (12) | ciphertext (<= block size) | tag (16)
//! ```
//!
//! Frames are AES-256-GCM encrypted. The nonce is 4 random bytes followed
//! by the big-endian frame counter. Each frame is authenticated together
//! with the caller's context, the counter and a final flag, so that
//! reordered, dropped or truncated frames fail to decrypt.

use std::io::{self, BufRead, BufReader, Read, Write};

use openssl::{
    rand::rand_bytes,
    symm::{Cipher, decrypt_aead, encrypt_aead},
};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::{
    KmsClientError, client_bail, client_ensure, client_error, error::result::KmsClientResult,
};

pub const MAGIC: &[u8; 8] = b"OKMSDK01";
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

const KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;
const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;
const MAX_WRAPPED_KEY_LENGTH: usize = 64 * 1024;

fn frame_aad(context: &[u8], counter: u64, last: bool) -> Vec<u8> {
    let mut aad = Vec::with_capacity(context.len() + 9);
    aad.extend_from_slice(context);
    aad.extend_from_slice(&counter.to_be_bytes());
    aad.push(u8::from(last));
    aad
}

fn frame_nonce(prefix: &[u8; 4], counter: u64) -> [u8; NONCE_LENGTH] {
    let mut nonce = [0_u8; NONCE_LENGTH];
    nonce[..4].copy_from_slice(prefix);
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn check_key(key: &[u8]) -> KmsClientResult<()> {
    client_ensure!(
        key.len() == KEY_LENGTH,
        "Invalid data key length: expected {KEY_LENGTH} bytes, got {}",
        key.len()
    );
    Ok(())
}

/// Encrypts everything written to it, block by block, into `writer`.
/// [`DataKeyEncryptor::finish`] must be called to write the final frame.
pub struct DataKeyEncryptor<W: Write> {
    writer: W,
    key: Zeroizing<Vec<u8>>,
    context: Vec<u8>,
    block_size: usize,
    nonce_prefix: [u8; 4],
    counter: u64,
    buffer: Zeroizing<Vec<u8>>,
}

impl<W: Write> DataKeyEncryptor<W> {
    pub fn new(
        mut writer: W,
        plain_key: &[u8],
        wrapped_key: &str,
        context: &[u8],
        block_size: usize,
    ) -> KmsClientResult<Self> {
        check_key(plain_key)?;
        client_ensure!(
            block_size > 0 && block_size <= MAX_BLOCK_SIZE,
            "Invalid block size {block_size}"
        );
        let mut nonce_prefix = [0_u8; 4];
        rand_bytes(&mut nonce_prefix)?;

        writer.write_all(MAGIC)?;
        writer.write_all(&u32::try_from(block_size)?.to_be_bytes())?;
        writer.write_all(&u32::try_from(wrapped_key.len())?.to_be_bytes())?;
        writer.write_all(wrapped_key.as_bytes())?;

        Ok(Self {
            writer,
            key: Zeroizing::new(plain_key.to_vec()),
            context: context.to_vec(),
            block_size,
            nonce_prefix,
            counter: 0,
            buffer: Zeroizing::new(Vec::with_capacity(block_size)),
        })
    }

    fn write_frame(&mut self, len: usize, last: bool) -> KmsClientResult<()> {
        let nonce = frame_nonce(&self.nonce_prefix, self.counter);
        let aad = frame_aad(&self.context, self.counter, last);
        let mut tag = [0_u8; TAG_LENGTH];
        let ciphertext = encrypt_aead(
            Cipher::aes_256_gcm(),
            &self.key,
            Some(&nonce),
            &aad,
            &self.buffer[..len],
            &mut tag,
        )?;
        self.writer.write_all(&nonce)?;
        self.writer.write_all(&ciphertext)?;
        self.writer.write_all(&tag)?;
        trace!("frame {} of {len} bytes (last: {last})", self.counter);
        self.buffer.drain(..len);
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| client_error!("Too many frames in data key stream"))?;
        Ok(())
    }

    /// Encrypt the remaining data as the final frame and hand the writer back
    pub fn finish(mut self) -> KmsClientResult<W> {
        let len = self.buffer.len();
        self.write_frame(len, true)?;
        self.writer.flush()?;
        debug!("data key stream closed after {} frame(s)", self.counter);
        Ok(self.writer)
    }
}

impl<W: Write> Write for DataKeyEncryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        // a full block is only known not to be the last one once more data follows
        while self.buffer.len() > self.block_size {
            self.write_frame(self.block_size, false)
                .map_err(io::Error::other)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Reads a data key stream header, then decrypts the frames once the data
/// key has been unwrapped.
pub struct DataKeyDecryptor<R: Read> {
    reader: BufReader<R>,
    block_size: usize,
    wrapped_key: String,
}

impl<R: Read> DataKeyDecryptor<R> {
    pub fn new(reader: R) -> KmsClientResult<Self> {
        let mut reader = BufReader::new(reader);
        let mut magic = [0_u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_e| client_error!("Invalid data key stream: header is too short"))?;
        client_ensure!(
            &magic == MAGIC,
            "Invalid data key stream: bad magic number"
        );
        let block_size = read_u32(&mut reader)?;
        client_ensure!(
            block_size > 0 && block_size <= MAX_BLOCK_SIZE,
            "Invalid data key stream: bad block size {block_size}"
        );
        let key_length = read_u32(&mut reader)?;
        client_ensure!(
            key_length <= MAX_WRAPPED_KEY_LENGTH,
            "Invalid data key stream: wrapped key is too large"
        );
        let mut wrapped_key = vec![0_u8; key_length];
        reader
            .read_exact(&mut wrapped_key)
            .map_err(|_e| client_error!("Invalid data key stream: truncated wrapped key"))?;
        let wrapped_key = String::from_utf8(wrapped_key)
            .map_err(|_e| client_error!("Invalid data key stream: wrapped key is not UTF-8"))?;
        Ok(Self {
            reader,
            block_size,
            wrapped_key,
        })
    }

    /// The service-wrapped data key to unwrap before decrypting
    #[must_use]
    pub fn wrapped_key(&self) -> &str {
        &self.wrapped_key
    }

    /// Decrypt all frames into `writer`, returning the number of plaintext
    /// bytes written
    pub fn decrypt_to<W: Write>(
        mut self,
        plain_key: &[u8],
        context: &[u8],
        writer: &mut W,
    ) -> KmsClientResult<u64> {
        check_key(plain_key)?;
        let cipher = Cipher::aes_256_gcm();
        let mut frame = Zeroizing::new(vec![0_u8; NONCE_LENGTH + self.block_size + TAG_LENGTH]);
        let mut counter = 0_u64;
        let mut written = 0_u64;
        loop {
            let len = read_full(&mut self.reader, &mut frame)?;
            if len == 0 {
                client_bail!("Invalid data key stream: missing final frame");
            }
            client_ensure!(
                len >= NONCE_LENGTH + TAG_LENGTH,
                "Invalid data key stream: truncated frame {counter}"
            );
            let at_end = self.reader.fill_buf()?.is_empty();
            let (nonce, rest) = frame[..len].split_at(NONCE_LENGTH);
            let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LENGTH);

            let decrypt = |last: bool| {
                decrypt_aead(
                    cipher,
                    plain_key,
                    Some(nonce),
                    &frame_aad(context, counter, last),
                    ciphertext,
                    tag,
                )
                .map(Zeroizing::new)
            };
            let plaintext = match decrypt(at_end) {
                Ok(plaintext) => plaintext,
                Err(_) if !at_end && decrypt(true).is_ok() => {
                    client_bail!("Invalid data key stream: data found after the final frame")
                }
                Err(_) if at_end && decrypt(false).is_ok() => {
                    client_bail!("Invalid data key stream: missing final frame")
                }
                Err(_) => client_bail!(
                    "Failed to decrypt frame {counter}: wrong key, context or corrupted data"
                ),
            };
            writer.write_all(&plaintext)?;
            written += plaintext.len() as u64;
            if at_end {
                writer.flush()?;
                debug!("decrypted {} frame(s), {written} bytes", counter + 1);
                return Ok(written);
            }
            counter = counter
                .checked_add(1)
                .ok_or_else(|| client_error!("Too many frames in data key stream"))?;
        }
    }
}

fn read_u32<R: Read>(reader: &mut R) -> KmsClientResult<usize> {
    let mut bytes = [0_u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|_e| client_error!("Invalid data key stream: header is too short"))?;
    usize::try_from(u32::from_be_bytes(bytes)).map_err(KmsClientError::from)
}

/// Fill `buf` as much as the reader allows, returning the length read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut len = 0;
    while len < buf.len() {
        match reader.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(len)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{DataKeyDecryptor, DataKeyEncryptor, MAGIC};

    const KEY: [u8; 32] = [0x42; 32];

    fn encrypt(data: &[u8], block_size: usize) -> Vec<u8> {
        let mut encryptor =
            DataKeyEncryptor::new(Vec::new(), &KEY, "wrapped-key", b"ctx", block_size).unwrap();
        // uneven writes cross block boundaries
        for chunk in data.chunks(7) {
            encryptor.write_all(chunk).unwrap();
        }
        encryptor.finish().unwrap()
    }

    fn decrypt(stream: &[u8], context: &[u8]) -> Result<Vec<u8>, String> {
        let decryptor = DataKeyDecryptor::new(stream).map_err(|e| e.to_string())?;
        assert_eq!(decryptor.wrapped_key(), "wrapped-key");
        let mut out = Vec::new();
        decryptor
            .decrypt_to(&KEY, context, &mut out)
            .map_err(|e| e.to_string())?;
        Ok(out)
    }

    fn header_len() -> usize {
        8 + 4 + 4 + "wrapped-key".len()
    }

    #[test]
    fn test_stream_round_trip() {
        let data: Vec<u8> = (0..100_u8).collect();
        for block_size in [1, 16, 50, 100, 1000] {
            let stream = encrypt(&data, block_size);
            assert_eq!(&stream[..8], MAGIC);
            assert_eq!(decrypt(&stream, b"ctx").unwrap(), data, "block size {block_size}");
        }
    }

    #[test]
    fn test_empty_input_has_a_final_frame() {
        let stream = encrypt(&[], 16);
        assert_eq!(stream.len(), header_len() + 12 + 16);
        assert!(decrypt(&stream, b"ctx").unwrap().is_empty());
    }

    #[test]
    fn test_frame_layout() {
        let stream = encrypt(&[1; 40], 16);
        // 16 + 16 + 8 bytes of plaintext
        assert_eq!(stream.len(), header_len() + 3 * 28 + 40);
        let first_nonce = &stream[header_len()..header_len() + 12];
        assert_eq!(&first_nonce[4..], &0_u64.to_be_bytes());
    }

    #[test]
    fn test_wrong_context_fails() {
        let stream = encrypt(b"some data", 16);
        let err = decrypt(&stream, b"other").unwrap_err();
        assert!(err.contains("Failed to decrypt frame 0"), "{err}");
    }

    #[test]
    fn test_truncation_is_detected() {
        let stream = encrypt(&[3; 64], 16);
        // drop the last frame (16 bytes of plaintext)
        let truncated = &stream[..stream.len() - 44];
        let err = decrypt(truncated, b"ctx").unwrap_err();
        assert!(err.contains("missing final frame"), "{err}");

        let err = decrypt(&stream[..header_len()], b"ctx").unwrap_err();
        assert!(err.contains("missing final frame"), "{err}");
    }

    #[test]
    fn test_data_after_final_frame_is_detected() {
        // a full-size final frame, duplicated
        let mut stream = encrypt(&[3; 16], 16);
        let frame = stream[header_len()..].to_vec();
        stream.extend_from_slice(&frame);
        let err = decrypt(&stream, b"ctx").unwrap_err();
        assert!(err.contains("after the final frame"), "{err}");
    }

    #[test]
    fn test_tampering_is_detected() {
        let mut stream = encrypt(b"attack at dawn", 16);
        let idx = header_len() + 13;
        stream[idx] ^= 1;
        decrypt(&stream, b"ctx").unwrap_err();
    }

    #[test]
    fn test_bad_header() {
        let err = decrypt(b"NOTOKMS!\0\0\0\x10\0\0\0\0", b"").unwrap_err();
        assert!(err.contains("bad magic number"), "{err}");
        let err = decrypt(b"OKMS", b"").unwrap_err();
        assert!(err.contains("too short"), "{err}");
    }

    #[test]
    fn test_key_length_is_checked() {
        DataKeyEncryptor::new(Vec::new(), &[0; 16], "k", b"", 16).err().unwrap();
    }
}
