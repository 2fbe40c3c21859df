//! Newline-delimited UTF-8 text on the wire.
//!
//! Outbound: each line gets exactly one terminator appended.
//! Inbound: bytes are decoded as UTF-8, split on CR and LF (so CR, LF and
//! CRLF all terminate a line) and empty pieces are discarded. A multi-byte
//! character cut in half by a read boundary is carried over to the next read;
//! invalid sequences decode to U+FFFD.

/// Terminator appended to outbound lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineTerminator {
    /// `\r\n`
    #[default]
    CrLf,
    /// `\n`
    Lf,
    /// `\r`
    Cr,
}

impl LineTerminator {
    /// The terminator bytes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
            Self::Cr => "\r",
        }
    }

    /// Encode a line with this terminator appended.
    pub fn encode(self, line: &str) -> Vec<u8> {
        let terminator = self.as_str();
        let mut bytes = Vec::with_capacity(line.len() + terminator.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(terminator.as_bytes());
        bytes
    }
}

/// Per-connection inbound decoder.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one read's worth of bytes into its non-empty lines.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = self.decode_text(bytes);
        split_lines(&text)
    }

    /// Flush bytes held back waiting for the rest of a character.
    pub fn finish(&mut self) -> Vec<String> {
        if self.carry.is_empty() {
            return Vec::new();
        }
        let tail = std::mem::take(&mut self.carry);
        split_lines(&String::from_utf8_lossy(&tail))
    }

    /// Number of bytes held back from the previous read.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    fn decode_text(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        let mut text = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

/// Split text on CR/LF, dropping empty pieces.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_single_terminator() {
        assert_eq!(LineTerminator::CrLf.encode("hello"), b"hello\r\n");
        assert_eq!(LineTerminator::Lf.encode(""), b"\n");
        assert_eq!(LineTerminator::Cr.encode("a b"), b"a b\r");
    }

    #[test]
    fn test_decode_tolerates_mixed_terminators() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"one\r\ntwo\nthree\rfour\r\n\r\n");
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_unterminated_text_is_emitted() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.decode(b"partial"), vec!["partial"]);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_split_character_is_carried() {
        let snowman = "☃".as_bytes();
        let mut decoder = LineDecoder::new();

        let mut first = b"hi ".to_vec();
        first.extend_from_slice(&snowman[..1]);
        assert_eq!(decoder.decode(&first), vec!["hi "]);
        assert_eq!(decoder.pending_bytes(), 1);

        let mut second = snowman[1..].to_vec();
        second.extend_from_slice(b"\r\n");
        assert_eq!(decoder.decode(&second), vec!["☃"]);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb\n"), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_finish_flushes_carry() {
        let mut decoder = LineDecoder::new();
        decoder.decode(&"é".as_bytes()[..1]);
        assert_eq!(decoder.finish(), vec!["\u{FFFD}"]);
        assert!(decoder.finish().is_empty());
    }
}
