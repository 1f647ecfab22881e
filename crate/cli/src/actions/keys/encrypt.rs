use std::io::{self, Read, Write};

use base64::{
    engine::general_purpose::STANDARD,
    read::DecoderReader,
    write::EncoderWriter,
};
use clap::Parser;
use okms_client::{DEFAULT_BLOCK_SIZE, DataKey, DataKeyDecryptor, DataKeyEncryptor, KmsRestClient};
use tracing::debug;

use super::parse_key_id;
use crate::{
    actions::{
        args::{Input, MAX_INPUT_SIZE, Output},
        console::Stdout,
        with_progress,
    },
    error::result::{KmsCliResult, KmsCliResultHelper},
};

/// Name given to the data keys generated for local encryption
const DATA_KEY_NAME: &str = "okms-cli";
const DATA_KEY_SIZE: u32 = 256;

/// Encrypt data using a domain key. Without `--dk`, the data is sent to the
/// server and must not exceed 8192 bytes
#[derive(Parser, Debug)]
pub struct EncryptAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Data to encrypt: text, `@file` or `-` for stdin
    #[arg(value_name = "DATA")]
    data: Input,

    /// Where to write the ciphertext. Defaults to stdout
    #[arg(value_name = "OUTPUT")]
    output_file: Option<Output>,

    /// Encrypt locally with a data key wrapped by the domain key
    #[arg(long)]
    dk: bool,

    /// Do not display the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Base64 encode the data key ciphertext
    #[arg(long)]
    base64: bool,

    /// Encryption context
    #[arg(long)]
    context: Option<String>,
}

impl EncryptAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let output = self.output_file.clone().unwrap_or_default();

        if !self.dk {
            let plaintext = self.data.read_string_max(MAX_INPUT_SIZE)?;
            let ciphertext = client
                .encrypt(&id, &plaintext, self.context.as_deref())
                .await?;
            return write_text(&output, stdout, &ciphertext);
        }

        let data_key = client
            .generate_data_key(&id, Some(DATA_KEY_NAME), DATA_KEY_SIZE)
            .await?;
        let (reader, size) = self.data.open()?;
        let (mut reader, bar) = with_progress(
            reader,
            size,
            "Encrypting",
            output.is_file() && !self.no_progress,
        )?;
        let context = self.context.as_deref().unwrap_or_default().as_bytes();
        let writer = output.create()?;
        let mut writer = if self.base64 {
            let encoder = EncoderWriter::new(writer, &STANDARD);
            encrypt_stream(&mut reader, encoder, &data_key, context)?.finish()?
        } else {
            encrypt_stream(&mut reader, writer, &data_key, context)?
        };
        writer.flush()?;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(())
    }
}

fn encrypt_stream<W: Write>(
    reader: &mut impl Read,
    writer: W,
    data_key: &DataKey,
    context: &[u8],
) -> KmsCliResult<W> {
    let plain_key = data_key.plain_key()?;
    let mut encryptor = DataKeyEncryptor::new(
        writer,
        &plain_key,
        &data_key.encrypted,
        context,
        DEFAULT_BLOCK_SIZE,
    )?;
    let copied = io::copy(reader, &mut encryptor)?;
    debug!("{copied} bytes encrypted with a data key");
    Ok(encryptor.finish()?)
}

/// Server side results are text: printed as a JSON string, or written as is
fn write_text(output: &Output, stdout: &Stdout, text: &str) -> KmsCliResult<()> {
    if !output.is_file() && stdout.is_json() {
        return stdout.write(text, String::new);
    }
    output.write_all(text.as_bytes())
}

/// Decrypt data using a domain key
#[derive(Parser, Debug)]
pub struct DecryptAction {
    #[arg(value_name = "KEY-ID")]
    key_id: String,

    /// Data to decrypt: text, `@file` or `-` for stdin
    #[arg(value_name = "DATA")]
    data: Input,

    /// Where to write the plaintext. Defaults to stdout
    #[arg(value_name = "OUTPUT")]
    output_file: Option<Output>,

    /// Decrypt locally a data key encrypted stream
    #[arg(long)]
    dk: bool,

    /// Do not display the progress bar
    #[arg(long)]
    no_progress: bool,

    /// The data key ciphertext is base64 encoded
    #[arg(long)]
    base64: bool,

    /// Encryption context
    #[arg(long)]
    context: Option<String>,
}

impl DecryptAction {
    pub async fn run(&self, client: &KmsRestClient, stdout: &Stdout) -> KmsCliResult<()> {
        let id = parse_key_id(&self.key_id)?;
        let output = self.output_file.clone().unwrap_or_default();

        if !self.dk {
            let ciphertext = self.data.read_string_max(MAX_INPUT_SIZE)?;
            let plaintext = client
                .decrypt(&id, ciphertext.trim(), self.context.as_deref())
                .await?;
            return write_text(&output, stdout, &plaintext);
        }

        let (reader, size) = self.data.open()?;
        let (reader, bar) = with_progress(
            reader,
            size,
            "Decrypting",
            output.is_file() && !self.no_progress,
        )?;
        let reader: Box<dyn Read> = if self.base64 {
            Box::new(DecoderReader::new(reader, &STANDARD))
        } else {
            reader
        };
        let decryptor = DataKeyDecryptor::new(reader)?;
        let plain_key = client
            .decrypt_data_key(&id, decryptor.wrapped_key())
            .await
            .context("Failed to decrypt the data key")?;
        let context = self.context.as_deref().unwrap_or_default().as_bytes();
        let mut writer = output.create()?;
        let written = decryptor.decrypt_to(&plain_key, context, &mut writer)?;
        writer.flush()?;
        debug!("{written} bytes decrypted with a data key");
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::{Engine, engine::general_purpose::STANDARD};
    use okms_client::{DataKey, DataKeyDecryptor};

    use super::encrypt_stream;

    fn data_key() -> DataKey {
        DataKey {
            plain: STANDARD.encode([7_u8; 32]),
            encrypted: "wrapped-by-the-service".to_owned(),
        }
    }

    #[test]
    fn test_encrypt_stream_header_and_content() {
        let mut input = Cursor::new(b"some secret content".to_vec());
        let encrypted = encrypt_stream(&mut input, Vec::new(), &data_key(), b"ctx").unwrap();

        let decryptor = DataKeyDecryptor::new(Cursor::new(encrypted)).unwrap();
        assert_eq!(decryptor.wrapped_key(), "wrapped-by-the-service");
        let mut plaintext = Vec::new();
        decryptor
            .decrypt_to(&[7_u8; 32], b"ctx", &mut plaintext)
            .unwrap();
        assert_eq!(plaintext, b"some secret content");
    }

    #[test]
    fn test_encrypt_stream_wrong_context() {
        let mut input = Cursor::new(b"payload".to_vec());
        let encrypted = encrypt_stream(&mut input, Vec::new(), &data_key(), b"one").unwrap();
        let decryptor = DataKeyDecryptor::new(Cursor::new(encrypted)).unwrap();
        assert!(
            decryptor
                .decrypt_to(&[7_u8; 32], b"two", &mut Vec::new())
                .is_err()
        );
    }
}
