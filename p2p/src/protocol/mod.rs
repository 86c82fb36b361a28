pub mod codec;
pub mod commands;

pub use codec::{decode_payload, encode_message, read_frame, write_frame, Frame};
