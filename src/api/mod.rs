//! API Module - control-plane commands and DTOs

mod commands;
pub mod dto;

pub use commands::*;
pub use dto::*;
