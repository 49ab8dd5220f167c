//! MJPEG-over-HTTP wire format
//!
//! ```text
//! HTTP/1.0 200 OK\r\n
//! Content-Type: multipart/x-mixed-replace; boundary=frame\r\n
//! \r\n
//! --frame\r\n                       ┐
//! Content-Type: image/jpeg\r\n      │ one part per frame,
//! Content-Length: <N>\r\n           │ repeated until the
//! \r\n                              │ client goes away
//! <N raw JPEG bytes>                ┘
//! ```
//!
//! There is no closing boundary; the stream ends when the socket closes.

use bytes::{BufMut, BytesMut};

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response head sent once per connection
pub const RESPONSE_PREAMBLE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=frame\r\n\r\n";

/// Content type of every part
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Encode the header block that precedes a frame body
pub fn encode_part_header(content_length: usize, buf: &mut BytesMut) {
    buf.reserve(96);
    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_slice(b"\r\nContent-Type: ");
    buf.put_slice(PART_CONTENT_TYPE.as_bytes());
    buf.put_slice(b"\r\nContent-Length: ");
    buf.put_slice(content_length.to_string().as_bytes());
    buf.put_slice(b"\r\n\r\n");
}

/// Header block for a part as an owned buffer
pub fn part_header(content_length: usize) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_part_header(content_length, &mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_is_exact() {
        assert_eq!(
            RESPONSE_PREAMBLE,
            &b"HTTP/1.0 200 OK\r\n\
               Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
               \r\n"[..]
        );
    }

    #[test]
    fn test_part_header_is_exact() {
        let header = part_header(10);
        assert_eq!(
            &header[..],
            &b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 10\r\n\r\n"[..]
        );
    }

    #[test]
    fn test_encode_appends() {
        let mut buf = BytesMut::from(&b"xx"[..]);
        encode_part_header(0, &mut buf);
        assert!(buf.starts_with(b"xx--frame\r\n"));
        assert!(buf.ends_with(b"Content-Length: 0\r\n\r\n"));
    }
}
