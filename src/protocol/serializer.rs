// Reply encoder

use super::{format_double, Reply};
use bytes::{BufMut, BytesMut};
use tracing::error;

pub struct RespSerializer;

impl RespSerializer {
    /// Serialize a reply tree to RESP bytes.
    pub fn serialize(reply: &Reply) -> Vec<u8> {
        let mut buf = BytesMut::new();
        Self::write_reply(&mut buf, reply);
        buf.to_vec()
    }

    fn write_reply(buf: &mut BytesMut, reply: &Reply) {
        match reply {
            Reply::Nil => {
                buf.put_slice(b"$-1\r\n");
            }
            Reply::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Reply::Error(e) => {
                buf.put_u8(b'-');
                buf.put_slice(e.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Reply::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Reply::BulkString(data) => {
                Self::write_bulk(buf, data);
            }
            Reply::Double(d) => {
                Self::write_bulk(buf, format_double(*d).as_bytes());
            }
            Reply::Array(elements) => {
                buf.put_u8(b'*');
                buf.put_slice(elements.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for element in elements {
                    Self::write_reply(buf, element);
                }
            }
            Reply::Unset => {
                // The dispatcher never hands a cleared slot to the encoder;
                // dropping it keeps the socket off a half-written frame.
                error!("unexpected unset reply discriminant at encode time");
            }
        }
    }

    fn write_bulk(buf: &mut BytesMut, data: &[u8]) {
        buf.put_u8(b'$');
        buf.put_slice(data.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(data);
        buf.put_slice(b"\r\n");
    }
}
