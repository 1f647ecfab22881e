mod error;
mod serialize;
mod text;
mod ttlv_struct;
mod wire;

pub use error::TtlvError;
pub use ttlv_struct::{TTLV, TTLValue, TtlvType};
pub use wire::{TTLVBytesDeserializer, TTLVBytesSerializer};
