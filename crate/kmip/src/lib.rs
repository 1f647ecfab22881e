#![allow(clippy::upper_case_acronyms)]

pub use error::{
    KmipError,
    result::{KmipResult, KmipResultHelper},
};

mod error;
pub mod kmip_1_4;
pub mod ttlv;
