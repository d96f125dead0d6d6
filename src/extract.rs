//! Incremental JSON-object extraction.
//!
//! The search endpoint streams a concatenation of JSON objects, optionally
//! separated by whitespace and optionally wrapped in SSE `data: ` framing.
//! [`extract`] finds every complete top-level `{...}` span at the front of the
//! buffer without parsing it; parsing happens later so that one corrupt span
//! cannot stall the ones behind it.

const DATA_PREFIX: &[u8] = b"data:";
const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Result of one extraction pass over a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<'a> {
    /// Complete object spans, in stream order.
    pub objects: Vec<&'a str>,
    /// Unresolved tail to keep buffered for the next pass.
    pub rest: &'a str,
    /// Byte length of the buffer prefix that may be discarded.
    pub consumed: usize,
    /// A `[DONE]` sentinel was seen; nothing after it was scanned.
    pub done: bool,
}

/// Where the scan between objects stopped.
enum Gap {
    /// An object starts at this offset.
    Object(usize),
    /// A framing token may be cut off here; wait for more input.
    Partial(usize),
    /// A `[DONE]` sentinel ends at this offset.
    Done(usize),
    Exhausted,
}

/// Scan `buf` for complete top-level JSON objects.
///
/// Whitespace, SSE `data:` prefixes and stray characters between objects are
/// consumed. Never fails: an open object at the end of the buffer is simply
/// left in [`Extraction::rest`].
pub fn extract(buf: &str) -> Extraction<'_> {
    let bytes = buf.as_bytes();
    let mut objects = Vec::new();
    let mut pos = 0;
    let mut done = false;

    loop {
        match skip_gap(bytes, pos) {
            Gap::Object(start) => match object_end(bytes, start) {
                Some(end) => {
                    objects.push(&buf[start..end]);
                    pos = end;
                }
                None => {
                    pos = start;
                    break;
                }
            },
            Gap::Partial(at) => {
                pos = at;
                break;
            }
            Gap::Done(end) => {
                pos = end;
                done = true;
                break;
            }
            Gap::Exhausted => {
                pos = bytes.len();
                break;
            }
        }
    }

    Extraction {
        objects,
        rest: &buf[pos..],
        consumed: pos,
        done,
    }
}

fn skip_gap(bytes: &[u8], mut i: usize) -> Gap {
    while i < bytes.len() {
        let tail = &bytes[i..];
        match tail[0] {
            b'{' => return Gap::Object(i),
            b if b.is_ascii_whitespace() => i += 1,
            _ if tail.starts_with(DATA_PREFIX) => i += DATA_PREFIX.len(),
            _ if tail.starts_with(DONE_SENTINEL) => return Gap::Done(i + DONE_SENTINEL.len()),
            _ if is_cut_token(tail) => return Gap::Partial(i),
            _ => {
                tracing::trace!(byte = tail[0], offset = i, "skipping stray byte between objects");
                i += 1;
            }
        }
    }
    Gap::Exhausted
}

fn is_cut_token(tail: &[u8]) -> bool {
    tail.len() < DONE_SENTINEL.len()
        && (DATA_PREFIX.starts_with(tail) || DONE_SENTINEL.starts_with(tail))
}

/// Offset one past the `}` that balances the `{` at `start`, if present.
fn object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
