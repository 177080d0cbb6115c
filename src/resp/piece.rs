//! Reply-side RESP frames and their serialization.
//!
//! A tagged sum type replaces the class-hierarchy dispatch the original
//! used: one `match` in `size()` and one in `write_into()`, no virtual
//! calls, and `size()` can be inlined by the compiler at every call site.

use bytes::{BufMut, Bytes, BytesMut};

/// A single RESP reply node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    SimpleString(String),
    Error(String),
    Integer(i64),
    /// `None` encodes the RESP null bulk string (`$-1\r\n`).
    BulkString(Option<Bytes>),
    Array(Vec<Piece>),
}

impl Piece {
    pub fn ok() -> Piece {
        Piece::SimpleString("OK".to_string())
    }

    pub fn nil() -> Piece {
        Piece::BulkString(None)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Piece {
        Piece::BulkString(Some(data.into()))
    }

    pub fn error(msg: impl Into<String>) -> Piece {
        Piece::Error(msg.into())
    }

    /// Exact number of bytes `write_into` will produce for this piece.
    pub fn size(&self) -> usize {
        match self {
            Piece::SimpleString(s) => 1 + s.len() + 2,
            Piece::Error(s) => 1 + s.len() + 2,
            Piece::Integer(n) => 1 + decimal_len(*n) + 2,
            Piece::BulkString(None) => 5, // $-1\r\n
            Piece::BulkString(Some(b)) => 1 + decimal_len_usize(b.len()) + 2 + b.len() + 2,
            Piece::Array(items) => {
                let header = 1 + decimal_len_usize(items.len()) + 2;
                header + items.iter().map(Piece::size).sum::<usize>()
            }
        }
    }

    /// Append the canonical RESP encoding of `self` to `buf`.
    pub fn write_into(&self, buf: &mut BytesMut) {
        match self {
            Piece::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Piece::Error(s) => {
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Piece::Integer(n) => {
                buf.put_u8(b':');
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Piece::BulkString(None) => {
                buf.put_slice(b"$-1\r\n");
            }
            Piece::BulkString(Some(b)) => {
                buf.put_u8(b'$');
                buf.put_slice(b.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(b);
                buf.put_slice(b"\r\n");
            }
            Piece::Array(items) => {
                buf.put_u8(b'*');
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.write_into(buf);
                }
            }
        }
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.write_into(&mut buf);
        buf.freeze()
    }
}

fn decimal_len(n: i64) -> usize {
    n.to_string().len()
}

fn decimal_len_usize(n: usize) -> usize {
    n.to_string().len()
}
