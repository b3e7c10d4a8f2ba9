// src/core/protocol/mod.rs

pub mod reply_writer;
pub mod request;
pub mod resp_frame;
pub mod resp_value;
pub use reply_writer::ReplyWriter;
pub use request::{RequestCodec, encode_request, split_inline};
pub use resp_frame::{RespFrame, RespFrameCodec};
pub use resp_value::RespValue;
