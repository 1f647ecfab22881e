mod ttlv_bytes_deserializer;
mod ttlv_bytes_serializer;

pub use ttlv_bytes_deserializer::TTLVBytesDeserializer;
pub use ttlv_bytes_serializer::TTLVBytesSerializer;

/// Number of zero bytes needed to align `len` on 8 bytes
pub(crate) const fn padding(len: usize) -> usize {
    (8 - len % 8) % 8
}
