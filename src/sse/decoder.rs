//! Chunk-boundary-independent line reassembly.

/// Reassembles lines from byte chunks split at arbitrary positions.
///
/// Bytes are buffered until a terminator (`\n`, `\r\n` or a lone `\r`) is
/// seen, and only complete lines are decoded. Terminator bytes never occur
/// inside a UTF-8 multi-byte sequence, so a character split across two chunks
/// is always decoded whole. Invalid UTF-8 inside a line is replaced rather
/// than rejected.
///
/// The output for a given byte stream does not depend on how it was chunked.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of the current, not yet terminated line
    pending: Vec<u8>,
    /// Previous chunk ended on `\r`; a leading `\n` belongs to that terminator
    skip_lf: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    ///
    /// Returned lines never contain `\r` or `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => lines.push(self.take_line()),
                b'\r' => {
                    lines.push(self.take_line());
                    self.skip_lf = true;
                }
                _ => self.pending.push(byte),
            }
        }

        lines
    }

    /// Close the decoder, discarding any unterminated tail.
    ///
    /// Returns the number of bytes dropped. An unterminated fragment is not a
    /// complete frame and is never surfaced as a line.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            tracing::debug!("Discarding {} bytes of unterminated stream tail", dropped);
        }
        self.pending.clear();
        self.skip_lf = false;
        dropped
    }

    /// Bytes currently buffered for an incomplete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_in_chunks(input: &[u8], cuts: &[usize]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            lines.extend(decoder.push(&input[start..cut]));
            start = cut;
        }
        lines.extend(decoder.push(&input[start..]));
        decoder.finish();
        lines
    }

    #[test]
    fn test_single_chunk_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: a\n\ndata: b\n");
        assert_eq!(lines, vec!["data: a", "", "data: b"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_partial_line_is_held() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").is_empty());
        assert_eq!(decoder.pending_len(), 14);
        let lines = decoder.push(b"\"done\"}\n");
        assert_eq!(lines, vec!["data: {\"type\":\"done\"}"]);
    }

    #[test]
    fn test_unterminated_tail_is_discarded() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: one\ndata: two");
        assert_eq!(lines, vec!["data: one"]);
        assert_eq!(decoder.finish(), 9);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_crlf_and_lone_cr() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"a\r\nb\rc\n");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_split_across_chunks_counts_once() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\r"), vec!["a"]);
        assert_eq!(decoder.push(b"\nb\n"), vec!["b"]);
    }

    #[test]
    fn test_multibyte_split_inside_character() {
        let text = "data: {\"content\":\"héllo wörld ✓\"}\n";
        let bytes = text.as_bytes();
        // 'é' is two bytes; cut between them
        let cut = text.find('é').unwrap() + 1;
        let lines = decode_in_chunks(bytes, &[cut]);
        assert_eq!(lines, vec![text.trim_end_matches('\n')]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"ab\xffcd\n");
        assert_eq!(lines, vec!["ab\u{FFFD}cd"]);
    }

    #[test]
    fn test_every_split_point_yields_same_lines() {
        let input = "data: {\"type\":\"token\",\"content\":\"Ünï\"}\r\n\r\n: ping\n\
                     event: token\rdata: {\"content\":\"✓\"}\n\ndata: {\"type\":\"done\"}\n\n"
            .as_bytes();
        let expected = decode_in_chunks(input, &[]);
        assert_eq!(expected.len(), 8);

        for cut in 0..=input.len() {
            assert_eq!(decode_in_chunks(input, &[cut]), expected, "cut at {}", cut);
        }
        for a in 0..=input.len() {
            for b in a..=input.len() {
                assert_eq!(decode_in_chunks(input, &[a, b]), expected, "cuts {} {}", a, b);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = b"data: x\r\n\r\ndata: y\n";
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for byte in input.iter() {
            lines.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["data: x", "", "data: y"]);
        assert!(lines.iter().all(|l| !l.contains('\n') && !l.contains('\r')));
    }
}
