//! Delimiter-based stream framing
//!
//! TCP delivers the robot's envelopes as an arbitrary byte stream: one read
//! may carry half a message, or several. [`MessageFramer`] accumulates the
//! bytes and yields one message per occurrence of the literal closing tag,
//! in arrival order. No XML depth tracking is done.
//!
//! ```text
//! read #1: "<WWKS ...><A/></WW"          -> (nothing, 18 bytes pending)
//! read #2: "KS>\n<WWKS ...><B/></WWKS>\n" -> "<WWKS ...><A/></WWKS>", "<WWKS ...><B/></WWKS>"
//! ```

use crate::core::envelope::CLOSING_TAG;

/// Accumulates inbound bytes and splits them into complete messages
#[derive(Debug)]
pub struct MessageFramer {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
    /// Offset before which the buffer is known not to contain the delimiter
    scan_from: usize,
    max_buffered_bytes: Option<usize>,
}

impl MessageFramer {
    /// Create a framer splitting on `delimiter`
    pub fn new(delimiter: impl AsRef<[u8]>) -> Self {
        Self {
            buffer: Vec::with_capacity(8192),
            delimiter: delimiter.as_ref().to_vec(),
            scan_from: 0,
            max_buffered_bytes: None,
        }
    }

    /// Create a framer for WWKS envelopes
    pub fn wwks() -> Self {
        Self::new(CLOSING_TAG)
    }

    /// Cap the number of unterminated bytes (`None` = unbounded)
    pub fn with_limit(mut self, max_buffered_bytes: Option<usize>) -> Self {
        self.max_buffered_bytes = max_buffered_bytes;
        self
    }

    /// Append received bytes and iterate over the messages they complete
    pub fn push(&mut self, data: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(data);
        Frames { framer: self }
    }

    /// Extract the next complete message, if the buffer holds one
    ///
    /// Leading whitespace (the newline terminating the previous envelope)
    /// is dropped. Invalid UTF-8 is replaced rather than rejected.
    pub fn next_message(&mut self) -> Option<String> {
        if self.delimiter.is_empty() {
            return None;
        }

        let Some(found) = find(&self.buffer[self.scan_from..], &self.delimiter) else {
            self.scan_from = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
            return None;
        };

        let end = self.scan_from + found + self.delimiter.len();
        let frame: Vec<u8> = self.buffer.drain(..end).collect();
        self.scan_from = 0;

        let start = frame
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(frame.len());
        Some(String::from_utf8_lossy(&frame[start..]).into_owned())
    }

    /// Bytes waiting for a closing tag
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The unterminated remainder
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the unterminated remainder is larger than the configured cap
    pub fn exceeds_limit(&self) -> bool {
        self.max_buffered_bytes
            .is_some_and(|limit| self.buffer.len() > limit)
    }

    /// Configured cap, if any
    pub fn limit(&self) -> Option<usize> {
        self.max_buffered_bytes
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan_from = 0;
    }
}

/// Iterator over the messages completed by one [`MessageFramer::push`]
pub struct Frames<'a> {
    framer: &'a mut MessageFramer,
}

impl Iterator for Frames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_message()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn envelope(body: &str) -> String {
        format!("<WWKS Version=\"2.0\" TimeStamp=\"2024-01-01T00:00:00Z\">{body}</WWKS>")
    }

    #[test]
    fn test_single_message() {
        let mut framer = MessageFramer::wwks();
        let msg = envelope("<StatusResponse Id=\"1\"/>");
        let frames: Vec<_> = framer.push(format!("{msg}\n").as_bytes()).collect();
        assert_eq!(frames, vec![msg]);
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn test_two_messages_in_one_read() {
        let mut framer = MessageFramer::wwks();
        let a = envelope("<A/>");
        let b = envelope("<B/>");
        let frames: Vec<_> = framer.push(format!("{a}\n{b}\n").as_bytes()).collect();
        assert_eq!(frames, vec![a, b]);
    }

    #[test]
    fn test_partial_then_complete() {
        let mut framer = MessageFramer::wwks();
        let msg = envelope("<HelloResponse/>");
        let (head, tail) = msg.split_at(msg.len() - 3);

        assert_eq!(framer.push(head.as_bytes()).count(), 0);
        assert_eq!(framer.buffered(), head.len());

        let frames: Vec<_> = framer.push(tail.as_bytes()).collect();
        assert_eq!(frames, vec![msg]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_delimiter_split_across_every_byte() {
        let mut framer = MessageFramer::wwks();
        let msg = envelope("<X/>");
        let mut frames = Vec::new();
        for byte in msg.as_bytes() {
            frames.extend(framer.push(std::slice::from_ref(byte)));
        }
        assert_eq!(frames, vec![msg]);
    }

    #[test]
    fn test_trailing_bytes_stay_buffered() {
        let mut framer = MessageFramer::wwks();
        let msg = envelope("<A/>");
        let input = format!("{msg}\n<WWKS Version=\"2.0\"><B");
        assert_eq!(framer.push(input.as_bytes()).count(), 1);
        assert_eq!(framer.pending(), b"\n<WWKS Version=\"2.0\"><B");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut framer = MessageFramer::wwks();
        let mut input = b"<WWKS><A Name=\"".to_vec();
        input.push(0xFF);
        input.extend_from_slice(b"\"/></WWKS>");
        let frames: Vec<_> = framer.push(&input).collect();
        assert_eq!(frames, vec!["<WWKS><A Name=\"\u{FFFD}\"/></WWKS>".to_string()]);
    }

    #[test]
    fn test_limit() {
        let mut framer = MessageFramer::wwks().with_limit(Some(16));
        assert_eq!(framer.push(b"<WWKS><Pending>").count(), 0);
        assert!(!framer.exceeds_limit());
        assert_eq!(framer.push(b"more").count(), 0);
        assert!(framer.exceeds_limit());

        let mut unbounded = MessageFramer::wwks();
        assert_eq!(unbounded.push(&[b'x'; 100_000]).count(), 0);
        assert!(!unbounded.exceeds_limit());
    }

    #[test]
    fn test_limit_applies_to_remainder_only() {
        let mut framer = MessageFramer::wwks().with_limit(Some(8));
        let msg = envelope("<LongBodyThatIsBiggerThanTheLimit/>");
        assert_eq!(framer.push(msg.as_bytes()).count(), 1);
        assert!(!framer.exceeds_limit());
    }

    #[test]
    fn test_custom_delimiter() {
        let mut framer = MessageFramer::new("</Env>");
        let frames: Vec<_> = framer.push(b"<Env>1</Env><Env>2</Env>").collect();
        assert_eq!(frames, vec!["<Env>1</Env>", "<Env>2</Env>"]);
    }

    #[test]
    fn test_empty_delimiter_never_frames() {
        let mut framer = MessageFramer::new("");
        assert_eq!(framer.push(b"<WWKS></WWKS>").count(), 0);
    }

    fn bodies() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[A-Za-z0-9 =\"<>]{0,40}", 1..8)
    }

    proptest! {
        #[test]
        fn chunked_stream_yields_every_message_once(
            bodies in bodies(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
        ) {
            let messages: Vec<String> = bodies
                .iter()
                .map(|b| envelope(b))
                .collect();
            let stream: Vec<u8> = messages
                .iter()
                .flat_map(|m| format!("{m}\n").into_bytes())
                .collect();

            let mut offsets: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
            offsets.push(0);
            offsets.push(stream.len());
            offsets.sort_unstable();
            offsets.dedup();

            let mut framer = MessageFramer::wwks();
            let mut emitted = Vec::new();
            for pair in offsets.windows(2) {
                emitted.extend(framer.push(&stream[pair[0]..pair[1]]));
                prop_assert!(find(framer.pending(), CLOSING_TAG.as_bytes()).is_none());
            }

            prop_assert_eq!(emitted, messages);
            prop_assert_eq!(framer.pending(), b"\n");
        }
    }
}
