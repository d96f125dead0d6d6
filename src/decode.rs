/// Streaming UTF-8 decoder.
///
/// Holds back an incomplete multi-byte sequence at the end of one read until
/// the next read completes it. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `input` and append the text to `out`.
    pub fn decode(&mut self, input: &[u8], out: &mut String) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(input);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Flush a dangling partial sequence at end of stream.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codepoint_split_across_reads() {
        let text = "카페";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut dec = Utf8Decoder::new();
            let mut out = String::new();
            dec.decode(&bytes[..split], &mut out);
            dec.decode(&bytes[split..], &mut out);
            dec.finish(&mut out);
            assert_eq!(out, text, "split at {split}");
        }
    }

    #[test]
    fn one_byte_at_a_time() {
        let text = "a 한 é b";
        let mut dec = Utf8Decoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            dec.decode(std::slice::from_ref(b), &mut out);
        }
        assert!(!dec.has_pending());
        assert_eq!(out, text);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut dec = Utf8Decoder::new();
        let mut out = String::new();
        dec.decode(b"a\xffb", &mut out);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn truncated_tail_is_flushed() {
        let mut dec = Utf8Decoder::new();
        let mut out = String::new();
        dec.decode(&"é".as_bytes()[..1], &mut out);
        assert!(dec.has_pending());
        assert_eq!(out, "");
        dec.finish(&mut out);
        assert_eq!(out, "\u{FFFD}");
    }
}
