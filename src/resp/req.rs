use bytes::Bytes;

/// A fully parsed request: the command name followed by its arguments, as
/// raw byte-strings. The parser never interprets encoding beyond the wire
/// framing — it's the command layer's job to decide what the bytes mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    words: Vec<Bytes>,
}

impl Request {
    pub fn new(words: Vec<Bytes>) -> Request {
        Request { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn command_name(&self) -> Option<&Bytes> {
        self.words.first()
    }

    pub fn args(&self) -> &[Bytes] {
        if self.words.is_empty() {
            &[]
        } else {
            &self.words[1..]
        }
    }

    pub fn words(&self) -> &[Bytes] {
        &self.words
    }
}
