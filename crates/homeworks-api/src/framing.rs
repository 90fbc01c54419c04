// ── Line framing ──
//
// Turns an arbitrary byte stream into trimmed, non-empty text lines.
// No protocol knowledge lives here: the processor may split one line across
// many reads or pack many lines into one, and the framer must not care.

/// Buffers input and yields a line whenever a `\n` is encountered.
///
/// Bytes are buffered raw and decoded per line, so a multi-byte UTF-8
/// sequence split across reads still decodes correctly. Carriage returns are
/// discarded, surrounding whitespace is trimmed, and blank lines are
/// suppressed.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Append `bytes` and return a lazy iterator over the complete lines.
    ///
    /// Lines are removed from the buffer as the iterator yields them. If the
    /// iterator is dropped early, the remaining complete lines stay buffered
    /// and are yielded first on the next call, so every line is emitted
    /// exactly once and in arrival order.
    pub fn ingest(&mut self, bytes: &[u8]) -> Lines<'_> {
        self.buffer.extend_from_slice(bytes);
        Lines {
            buffer: &mut self.buffer,
            start: 0,
        }
    }

    /// Bytes received since the last line feed.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any partial line (used when a fresh connection starts).
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Iterator returned by [`LineFramer::ingest`].
pub struct Lines<'a> {
    buffer: &'a mut Vec<u8>,
    start: usize,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let rest = self.buffer.get(self.start..)?;
            let end = rest.iter().position(|&b| b == b'\n')?;
            let line = clean_line(rest.get(..end)?);
            self.start += end + 1;
            if !line.is_empty() {
                return Some(line);
            }
        }
    }
}

impl Drop for Lines<'_> {
    fn drop(&mut self) {
        self.buffer.drain(..self.start);
    }
}

fn clean_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let stripped: String = text.chars().filter(|&c| c != '\r').collect();
    stripped.trim().to_string()
}
