//! HTTP multipart framing for MJPEG streams

pub mod multipart;

pub use multipart::{encode_part_header, part_header, BOUNDARY, RESPONSE_PREAMBLE};
