// Request frame decoder

use super::{parse_integer, read_line, RespError, Result};
use bytes::{Bytes, BytesMut};
use std::io::Cursor;

/// One decoded request: the command name followed by its arguments, all kept
/// as opaque byte strings. Nothing is lowercased or reinterpreted here.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    pub args: Vec<Bytes>,
}

impl CommandFrame {
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }
}

pub struct RespParser;

impl RespParser {
    /// Parse a complete request frame from a byte buffer.
    ///
    /// Accepts the multi-bulk form (`*N` of `$len` bulk strings) and the
    /// inline form (a whitespace-separated line).
    pub fn parse(buf: &[u8]) -> Result<CommandFrame> {
        let mut cursor = Cursor::new(buf);
        Self::parse_frame(&mut cursor)
    }

    fn parse_frame(cursor: &mut Cursor<&[u8]>) -> Result<CommandFrame> {
        if cursor.position() >= cursor.get_ref().len() as u64 {
            return Err(RespError::Incomplete);
        }

        let type_byte = cursor.get_ref()[cursor.position() as usize];
        if type_byte == b'*' {
            cursor.set_position(cursor.position() + 1);
            Self::parse_multi_bulk(cursor)
        } else {
            Self::parse_inline(cursor)
        }
    }

    /// Parse a multi-bulk request: *2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n
    fn parse_multi_bulk(cursor: &mut Cursor<&[u8]>) -> Result<CommandFrame> {
        let line = read_line(cursor)?;
        let len = parse_integer(line)?;

        if len < -1 {
            return Err(RespError::InvalidMultiBulkLength);
        }
        if len <= 0 {
            // Null or empty arrays carry no command; the dispatcher ignores them.
            return Ok(CommandFrame::new(Vec::new()));
        }

        let mut args = Vec::with_capacity(len as usize);
        for _ in 0..len {
            args.push(Self::parse_bulk_item(cursor)?);
        }
        Ok(CommandFrame::new(args))
    }

    /// Parse one $len\r\ndata\r\n element of a multi-bulk request.
    fn parse_bulk_item(cursor: &mut Cursor<&[u8]>) -> Result<Bytes> {
        if cursor.position() >= cursor.get_ref().len() as u64 {
            return Err(RespError::Incomplete);
        }

        let type_byte = cursor.get_ref()[cursor.position() as usize];
        cursor.set_position(cursor.position() + 1);
        if type_byte != b'$' {
            return Err(RespError::InvalidProtocol(format!(
                "Expected bulk string, got type byte: {}",
                type_byte as char
            )));
        }

        let line = read_line(cursor)?;
        let len = parse_integer(line)?;
        if len < 0 {
            return Err(RespError::InvalidBulkStringLength);
        }

        let len = len as usize;
        let start = cursor.position() as usize;
        let end = start + len;

        if end + 2 > cursor.get_ref().len() {
            return Err(RespError::Incomplete);
        }
        if cursor.get_ref()[end..end + 2] != *b"\r\n" {
            return Err(RespError::InvalidProtocol(
                "Missing CRLF after bulk string".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&cursor.get_ref()[start..end]);
        cursor.set_position((end + 2) as u64);
        Ok(data)
    }

    /// Parse an inline request: a single whitespace-separated line.
    fn parse_inline(cursor: &mut Cursor<&[u8]>) -> Result<CommandFrame> {
        let line = read_line(cursor)?;
        let line = std::str::from_utf8(line)
            .map_err(|_| RespError::InvalidProtocol("Invalid inline command".to_string()))?;

        let args = line
            .split_whitespace()
            .map(|token| Bytes::copy_from_slice(token.as_bytes()))
            .collect();
        Ok(CommandFrame::new(args))
    }

    /// Check if the buffer holds a complete request frame; returns its length.
    pub fn check_complete(buf: &BytesMut) -> Result<Option<usize>> {
        let mut cursor = Cursor::new(&buf[..]);
        match Self::parse_frame(&mut cursor) {
            Ok(_) => Ok(Some(cursor.position() as usize)),
            Err(RespError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
