//! Incremental re-segmentation of the Cohere stream into `OpenAI`-style chunks.
//!
//! The upstream streams newline-delimited JSON records, but the transport
//! delivers bytes in chunks whose boundaries are unrelated to record
//! boundaries. [`LineResegmenter`] owns the carry-over buffer and turns raw
//! bytes back into whole records; [`ChunkEmitter`] turns each record into
//! at most one delta chunk plus, on completion, the terminal chunk.
//!
//! Usage:
//!   let mut resegmenter = LineResegmenter::new();
//!   let mut emitter = ChunkEmitter::new("command-r", created);
//!   for delivery in transport_chunks {
//!       resegmenter.feed(&delivery);
//!       for record in resegmenter.drain() {
//!           for chunk in emitter.process_record(&record) {
//!               // frame and forward
//!           }
//!       }
//!   }

use bytes::Bytes;

use super::cohere_types::StreamRecord;
use super::openai_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use super::COMPLETION_ID;

/// Accumulates upstream bytes and re-segments them into complete
/// newline-delimited JSON records.
///
/// Buffering happens at the byte level so a UTF-8 sequence split across two
/// delivery chunks is reassembled before it is ever decoded.
#[derive(Debug, Default)]
pub struct LineResegmenter {
    pending: Vec<u8>,
}

impl LineResegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one transport delivery chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Walk the buffered newline-separated candidates in order, yielding
    /// every record that parses.
    ///
    /// The walk stops at the first non-empty candidate that fails to parse:
    /// that candidate is the tail, either a record still missing bytes or a
    /// line that will never parse, and it stays buffered for the next
    /// drain. Empty candidates (consecutive newlines) are skipped. After
    /// the walk the buffer holds exactly the final candidate's raw bytes if
    /// the walk stalled, and nothing otherwise.
    pub fn drain(&mut self) -> Vec<StreamRecord> {
        let candidates: Vec<&[u8]> = self.pending.split(|&b| b == b'\n').collect();

        let mut records = Vec::new();
        let mut stalled = false;
        for candidate in &candidates {
            if candidate.is_empty() {
                continue;
            }
            match serde_json::from_slice::<StreamRecord>(candidate) {
                Ok(record) => records.push(record),
                Err(_) => {
                    stalled = true;
                    break;
                }
            }
        }

        // Everything up to the tail has been consumed; only the final
        // candidate can still be completed by future bytes.
        let pending = if stalled {
            candidates.last().map(|c| c.to_vec()).unwrap_or_default()
        } else {
            Vec::new()
        };
        self.pending = pending;

        records
    }

    /// Bytes currently held back awaiting completion.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Emits `OpenAI`-style chunks for parsed upstream records.
///
/// Stateful only in the terminal latch: once the upstream signals
/// completion the terminal chunk is emitted exactly once and every later
/// record is ignored.
#[derive(Debug)]
pub struct ChunkEmitter {
    model: String,
    created: u64,
    finished: bool,
}

impl ChunkEmitter {
    pub fn new(model: &str, created: u64) -> Self {
        Self {
            model: model.to_string(),
            created,
            finished: false,
        }
    }

    /// Zero, one, or two chunks per record: a text delta when the record
    /// carries text, then the terminal chunk when it signals completion.
    pub fn process_record(&mut self, record: &StreamRecord) -> Vec<ChatCompletionChunk> {
        if self.finished {
            return Vec::new();
        }

        let mut chunks = Vec::new();

        if let Some(text) = record.text.as_deref().filter(|t| !t.is_empty()) {
            chunks.push(self.delta_chunk(text));
        }

        if record.is_finished == Some(true) {
            chunks.push(self.terminal_chunk());
            self.finished = true;
        }

        chunks
    }

    /// Whether the terminal chunk has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn delta_chunk(&self, text: &str) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                // The role rides on every delta chunk, not only the first.
                role: Some("assistant".to_string()),
                content: Some(text.to_string()),
            },
            None,
        )
    }

    fn terminal_chunk(&self) -> ChatCompletionChunk {
        self.chunk(ChunkDelta::default(), Some("stop".to_string()))
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: COMPLETION_ID.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// Frame one chunk in the text-event-stream convention: the literal
/// `data: ` prefix, the compact JSON encoding, and a blank-line terminator.
/// No other sentinel (no `[DONE]`) is ever written.
pub fn frame(chunk: &ChatCompletionChunk) -> Bytes {
    let json = serde_json::to_string(chunk).unwrap_or_default();
    Bytes::from(format!("data: {json}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_RECORDS: &[u8] = b"{\"text\":\"a\",\"is_finished\":false}\n{\"text\":\"b\",\"is_finished\":true}\n";

    fn record(text: Option<&str>, is_finished: Option<bool>) -> StreamRecord {
        StreamRecord {
            text: text.map(String::from),
            is_finished,
        }
    }

    #[test]
    fn test_whole_delivery_parses_both_records() {
        let mut r = LineResegmenter::new();
        r.feed(TWO_RECORDS);

        let records = r.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text.as_deref(), Some("a"));
        assert_eq!(records[1].text.as_deref(), Some("b"));
        assert_eq!(records[1].is_finished, Some(true));
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time_yields_same_records() {
        let mut r = LineResegmenter::new();
        let mut records = Vec::new();

        for &b in TWO_RECORDS {
            r.feed(&[b]);
            records.extend(r.drain());
        }

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text.as_deref(), Some("a"));
        assert_eq!(records[1].text.as_deref(), Some("b"));
    }

    #[test]
    fn test_arbitrary_halves_yield_same_records() {
        for split in 1..TWO_RECORDS.len() {
            let mut r = LineResegmenter::new();
            let mut records = Vec::new();

            r.feed(&TWO_RECORDS[..split]);
            records.extend(r.drain());
            r.feed(&TWO_RECORDS[split..]);
            records.extend(r.drain());

            assert_eq!(records.len(), 2, "split at byte {split}");
            assert_eq!(records[0].text.as_deref(), Some("a"), "split at byte {split}");
            assert_eq!(records[1].text.as_deref(), Some("b"), "split at byte {split}");
        }
    }

    #[test]
    fn test_partial_tail_is_retained_and_completed() {
        let mut r = LineResegmenter::new();
        r.feed(b"{\"text\":\"a\"}\n{\"te");

        let records = r.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(r.pending_len(), b"{\"te".len());

        r.feed(b"xt\":\"b\"}\n");
        let records = r.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text.as_deref(), Some("b"));
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_consecutive_newlines_are_skipped() {
        let mut r = LineResegmenter::new();
        r.feed(b"{\"text\":\"a\"}\n\n\n{\"text\":\"b\"}\n");

        let records = r.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_split_utf8_sequence_survives_the_boundary() {
        let line = "{\"text\":\"héllo\"}\n".as_bytes();
        // Split in the middle of the two-byte 'é'.
        let split = line.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut r = LineResegmenter::new();
        r.feed(&line[..split]);
        assert!(r.drain().is_empty());

        r.feed(&line[split..]);
        let records = r.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text.as_deref(), Some("héllo"));
    }

    #[test]
    fn test_malformed_tail_stays_buffered() {
        let mut r = LineResegmenter::new();
        r.feed(b"{\"text\":\"a\"}\nnot json");

        let records = r.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(r.pending_len(), "not json".len());

        // Retried verbatim on the next drain; still not a record.
        assert!(r.drain().is_empty());
        assert_eq!(r.pending_len(), "not json".len());
    }

    #[test]
    fn test_emitter_text_delta_carries_role() {
        let mut e = ChunkEmitter::new("command-r", 7);

        let chunks = e.process_record(&record(Some("hi"), Some(false)));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].created, 7);

        let choice = &chunks[0].choices[0];
        assert_eq!(choice.delta.role.as_deref(), Some("assistant"));
        assert_eq!(choice.delta.content.as_deref(), Some("hi"));
        assert_eq!(choice.finish_reason, None);
    }

    #[test]
    fn test_emitter_skips_empty_text() {
        let mut e = ChunkEmitter::new("command-r", 0);
        assert!(e.process_record(&record(Some(""), None)).is_empty());
        assert!(e.process_record(&record(None, Some(false))).is_empty());
    }

    #[test]
    fn test_terminal_chunk_emitted_exactly_once() {
        let mut e = ChunkEmitter::new("command-r", 0);

        let chunks = e.process_record(&record(Some("done"), Some(true)));
        assert_eq!(chunks.len(), 2);

        let terminal = &chunks[1].choices[0];
        assert!(terminal.delta.role.is_none());
        assert!(terminal.delta.content.is_none());
        assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
        assert!(e.is_finished());

        // Nothing follows the terminal chunk.
        assert!(e.process_record(&record(Some("late"), None)).is_empty());
        assert!(e.process_record(&record(None, Some(true))).is_empty());
    }

    #[test]
    fn test_frame_shape() {
        let mut e = ChunkEmitter::new("command-r", 0);
        let chunks = e.process_record(&record(Some("x"), None));

        let framed = frame(&chunks[0]);
        let text = std::str::from_utf8(&framed).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));
        assert!(!text.contains("[DONE]"));
    }
}
