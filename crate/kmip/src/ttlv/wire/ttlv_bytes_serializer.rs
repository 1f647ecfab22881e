use std::io::Write;

use super::padding;
use crate::{
    kmip_1_4::kmip_types::Tag,
    ttlv::{TTLV, TTLValue, TtlvType, error::TtlvError},
};

/// Write a tag as a 3-byte big-endian integer
fn write_tag<W: Write>(writer: &mut W, tag: Tag) -> Result<(), TtlvError> {
    let tag_bytes = tag.to_u32().to_be_bytes();
    // only the lowest 3 bytes go on the wire
    writer.write_all(&tag_bytes[1..])?;
    Ok(())
}

/// Write a type as a 1-byte integer
fn write_type<W: Write>(writer: &mut W, item_type: TtlvType) -> Result<(), TtlvError> {
    writer.write_all(&[item_type.to_byte()])?;
    Ok(())
}

/// Write a length as a 4-byte big-endian integer
fn write_length<W: Write>(writer: &mut W, length: usize) -> Result<(), TtlvError> {
    let l = u32::try_from(length)
        .map_err(|_e| TtlvError::from(format!("Length too large: {length}")))?;
    writer.write_all(&l.to_be_bytes())?;
    Ok(())
}

/// Write variable length bytes followed by their padding
fn write_padded<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), TtlvError> {
    write_length(writer, bytes.len())?;
    writer.write_all(bytes)?;
    writer.write_all(&[0_u8; 8][..padding(bytes.len())])?;
    Ok(())
}

pub struct TTLVBytesSerializer<W> {
    writer: W,
}

impl<W> TTLVBytesSerializer<W>
where
    W: Write,
{
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_ttlv(&mut self, ttlv: &TTLV) -> Result<(), TtlvError> {
        write_tag(&mut self.writer, ttlv.tag)?;
        write_type(&mut self.writer, ttlv.value.ttlv_type())?;

        match &ttlv.value {
            TTLValue::Structure(items) => {
                // the length is only known once the children are encoded
                let mut temp_buffer = Vec::new();
                let mut temp_serializer = TTLVBytesSerializer::new(&mut temp_buffer);
                for item in items {
                    temp_serializer.write_ttlv(item)?;
                }
                write_length(&mut self.writer, temp_buffer.len())?;
                self.writer.write_all(&temp_buffer)?;
            }
            TTLValue::Integer(value) => {
                write_length(&mut self.writer, 4)?;
                self.writer.write_all(&value.to_be_bytes())?;
                self.writer.write_all(&[0; 4])?;
            }
            TTLValue::LongInteger(value) => {
                write_length(&mut self.writer, 8)?;
                self.writer.write_all(&value.to_be_bytes())?;
            }
            TTLValue::BigInteger(value) => {
                if value.is_empty() || value.len() % 8 != 0 {
                    return Err(TtlvError::from(format!(
                        "{}: big integer length must be a non zero multiple of 8, got {}",
                        ttlv.tag,
                        value.len()
                    )));
                }
                write_length(&mut self.writer, value.len())?;
                self.writer.write_all(value)?;
            }
            TTLValue::Enumeration(value) | TTLValue::Interval(value) => {
                write_length(&mut self.writer, 4)?;
                self.writer.write_all(&value.to_be_bytes())?;
                self.writer.write_all(&[0; 4])?;
            }
            TTLValue::Boolean(value) => {
                write_length(&mut self.writer, 8)?;
                let mut buf = [0_u8; 8];
                buf[7] = u8::from(*value);
                self.writer.write_all(&buf)?;
            }
            TTLValue::TextString(value) => {
                write_padded(&mut self.writer, value.as_bytes())?;
            }
            TTLValue::ByteString(value) => {
                write_padded(&mut self.writer, value)?;
            }
            TTLValue::DateTime(value) => {
                write_length(&mut self.writer, 8)?;
                self.writer
                    .write_all(&value.unix_timestamp().to_be_bytes())?;
            }
        }
        Ok(())
    }
}
