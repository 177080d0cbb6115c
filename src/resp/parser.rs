//! Incremental RESP request parser.
//!
//! Two nested state machines — one for a single bulk string, one for the
//! outer array — consume bytes one at a time and survive across calls to
//! `feed`. The parser never backtracks and never buffers more than the
//! bytes belonging to the field currently in progress, so memory use is
//! bounded by the configured length caps regardless of how the input is
//! chunked.

use std::fmt;

use bytes::{Bytes, BytesMut};

use super::req::Request;

/// Length caps from spec §4.4.1; both default to 65535.
#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub max_bulk_len: usize,
    pub max_array_len: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        ParserLimits {
            max_bulk_len: 65535,
            max_array_len: 65535,
        }
    }
}

/// A malformed request. Per spec §7 the connection is unrecoverable once
/// this occurs — the caller sends one RESP error reply and closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

impl From<&str> for ParseError {
    fn from(s: &str) -> ParseError {
        ParseError(s.to_string())
    }
}

/// Progress through a single bulk string (`$<len>\r\n<data>\r\n`).
enum BulkState {
    TypeChar,
    LenFirstDigit,
    Len { len: usize },
    LenCr { len: usize },
    Data { buf: BytesMut, remaining: usize },
    ValueCr { buf: BytesMut },
    ValueLf { buf: BytesMut },
}

/// Progress through the outer request array
/// (`*<len>\r\n` followed by exactly `len` bulk strings).
enum ArrayState {
    ArrayChar,
    ArrayLenFirstDigit,
    ArrayLen { len: usize },
    ArrayCr { len: usize },
    Strings { remaining: usize, words: Vec<Bytes>, inner: BulkState },
}

pub struct RequestParser {
    state: ArrayState,
    limits: ParserLimits,
}

enum StepResult {
    Continue,
    RequestDone(Request),
}

impl RequestParser {
    pub fn new() -> RequestParser {
        RequestParser::with_limits(ParserLimits::default())
    }

    pub fn with_limits(limits: ParserLimits) -> RequestParser {
        RequestParser {
            state: ArrayState::ArrayChar,
            limits,
        }
    }

    /// Feed an arbitrary fragment of bytes, returning every `Request`
    /// completed while consuming it. Partial state survives until the next
    /// call. Splitting the same overall byte string into any partition and
    /// feeding the parts in order yields the same sequence of requests (or
    /// the same error) as feeding it whole.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Request>, ParseError> {
        let mut out = Vec::new();
        for &byte in bytes {
            match self.step(byte)? {
                StepResult::Continue => {}
                StepResult::RequestDone(req) => out.push(req),
            }
        }
        Ok(out)
    }

    fn step(&mut self, byte: u8) -> Result<StepResult, ParseError> {
        let max_array_len = self.limits.max_array_len;
        let max_bulk_len = self.limits.max_bulk_len;

        match &mut self.state {
            ArrayState::ArrayChar => {
                if byte != b'*' {
                    return Err(ParseError(format!(
                        "protocol error: expected '*', got '{}'",
                        byte as char
                    )));
                }
                self.state = ArrayState::ArrayLenFirstDigit;
                Ok(StepResult::Continue)
            }
            ArrayState::ArrayLenFirstDigit => {
                let digit = digit_of(byte)?;
                if digit > max_array_len {
                    return Err(ParseError("protocol error: invalid multibulk length".into()));
                }
                self.state = ArrayState::ArrayLen { len: digit };
                Ok(StepResult::Continue)
            }
            ArrayState::ArrayLen { len } => {
                if byte == b'\r' {
                    let len = *len;
                    self.state = ArrayState::ArrayCr { len };
                    return Ok(StepResult::Continue);
                }
                let digit = digit_of(byte)?;
                let next = len
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| ParseError("protocol error: invalid multibulk length".into()))?;
                if next > max_array_len {
                    return Err(ParseError("protocol error: invalid multibulk length".into()));
                }
                *len = next;
                Ok(StepResult::Continue)
            }
            ArrayState::ArrayCr { len } => {
                // consuming this LF completes the array header; a zero-length
                // array has no bulk strings left to read and is complete
                // right here, with no further byte required
                if byte != b'\n' {
                    return Err(ParseError("protocol error: expected '\\n'".into()));
                }
                let remaining = *len;
                if remaining == 0 {
                    self.state = ArrayState::ArrayChar;
                    return Ok(StepResult::RequestDone(Request::new(Vec::new())));
                }
                self.state = ArrayState::Strings {
                    remaining,
                    words: Vec::with_capacity(remaining),
                    inner: BulkState::TypeChar,
                };
                Ok(StepResult::Continue)
            }
            ArrayState::Strings { remaining, words, inner } => {
                match step_bulk(inner, byte, max_bulk_len)? {
                    Some(value) => {
                        words.push(value);
                        *remaining -= 1;
                        if *remaining == 0 {
                            let words = std::mem::take(words);
                            self.state = ArrayState::ArrayChar;
                            Ok(StepResult::RequestDone(Request::new(words)))
                        } else {
                            *inner = BulkState::TypeChar;
                            Ok(StepResult::Continue)
                        }
                    }
                    None => Ok(StepResult::Continue),
                }
            }
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        RequestParser::new()
    }
}

fn digit_of(byte: u8) -> Result<usize, ParseError> {
    if byte.is_ascii_digit() {
        Ok((byte - b'0') as usize)
    } else {
        Err(ParseError(format!(
            "protocol error: expected digit, got '{}'",
            byte as char
        )))
    }
}

/// Advance a single bulk string's state machine by one byte. Returns
/// `Ok(Some(value))` once the trailing CRLF after the data is consumed.
fn step_bulk(state: &mut BulkState, byte: u8, max_bulk_len: usize) -> Result<Option<Bytes>, ParseError> {
    match state {
        BulkState::TypeChar => {
            if byte != b'$' {
                return Err(ParseError(format!(
                    "protocol error: expected '$', got '{}'",
                    byte as char
                )));
            }
            *state = BulkState::LenFirstDigit;
            Ok(None)
        }
        BulkState::LenFirstDigit => {
            let digit = digit_of(byte)?;
            if digit > max_bulk_len {
                return Err(ParseError("protocol error: invalid bulk length".into()));
            }
            *state = BulkState::Len { len: digit };
            Ok(None)
        }
        BulkState::Len { len } => {
            if byte == b'\r' {
                let len = *len;
                *state = BulkState::LenCr { len };
                return Ok(None);
            }
            let digit = digit_of(byte)?;
            let next = len
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| ParseError("protocol error: invalid bulk length".into()))?;
            if next > max_bulk_len {
                return Err(ParseError("protocol error: invalid bulk length".into()));
            }
            *len = next;
            Ok(None)
        }
        BulkState::LenCr { len } => {
            if byte != b'\n' {
                return Err(ParseError("protocol error: expected '\\n'".into()));
            }
            let len = *len;
            if len == 0 {
                *state = BulkState::ValueCr { buf: BytesMut::new() };
            } else {
                *state = BulkState::Data {
                    buf: BytesMut::with_capacity(len),
                    remaining: len,
                };
            }
            Ok(None)
        }
        BulkState::Data { buf, remaining } => {
            buf.extend_from_slice(&[byte]);
            *remaining -= 1;
            if *remaining == 0 {
                let buf = std::mem::take(buf);
                *state = BulkState::ValueCr { buf };
            }
            Ok(None)
        }
        BulkState::ValueCr { buf } => {
            if byte != b'\r' {
                return Err(ParseError("protocol error: expected CR after bulk data".into()));
            }
            let buf = std::mem::take(buf);
            *state = BulkState::ValueLf { buf };
            Ok(None)
        }
        BulkState::ValueLf { buf } => {
            if byte != b'\n' {
                return Err(ParseError("protocol error: expected LF after bulk data".into()));
            }
            Ok(Some(std::mem::take(buf).freeze()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(req: &Request) -> Vec<&[u8]> {
        req.words().iter().map(|b| b.as_ref()).collect()
    }

    #[test]
    fn parses_a_single_ping() {
        let mut p = RequestParser::new();
        let reqs = p.feed(b"*1\r\n$4\r\nPING\r\n").unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(words(&reqs[0]), vec![b"PING".as_ref()]);
    }

    #[test]
    fn parses_pipelined_requests_in_one_feed() {
        let mut p = RequestParser::new();
        let reqs = p
            .feed(b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(words(&reqs[1]), vec![b"GET".as_ref(), b"k".as_ref()]);
    }

    #[test]
    fn values_may_contain_cr_lf_and_nul() {
        let mut p = RequestParser::new();
        let reqs = p.feed(b"*1\r\n$4\r\n\r\n\0\n\r\n").unwrap();
        assert_eq!(reqs[0].words()[0].as_ref(), b"\r\n\0\n");
    }

    #[test]
    fn splitting_the_input_anywhere_yields_the_same_requests() {
        let whole = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n".to_vec();
        let mut reference = RequestParser::new();
        let expected = reference.feed(&whole).unwrap();

        for split in 0..=whole.len() {
            let mut p = RequestParser::new();
            let mut got = p.feed(&whole[..split]).unwrap();
            got.extend(p.feed(&whole[split..]).unwrap());
            assert_eq!(got, expected, "split at {split}");
        }
    }

    #[test]
    fn bulk_length_over_cap_is_rejected_before_data() {
        let mut p = RequestParser::with_limits(ParserLimits {
            max_bulk_len: 4,
            max_array_len: 65535,
        });
        let err = p.feed(b"*1\r\n$99999").unwrap_err();
        assert!(err.0.contains("invalid bulk length"));
    }

    #[test]
    fn wrong_type_byte_is_a_protocol_error() {
        let mut p = RequestParser::new();
        assert!(p.feed(b"*1\r\n+PING\r\n").is_err());
    }

    #[test]
    fn empty_array_yields_empty_request() {
        let mut p = RequestParser::new();
        let reqs = p.feed(b"*0\r\n").unwrap();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].is_empty());
    }
}
