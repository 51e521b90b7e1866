//! Incremental decoder for the `data: {json}\n\n` event stream returned by
//! streaming chat completions.
//!
//! Bytes arrive in arbitrary chunks. An event is only parsed once its
//! blank-line terminator has arrived; the unterminated tail stays buffered
//! byte-for-byte until the next chunk.

use crate::progress::Signal;
use serde::Deserialize;
use std::io::{self, Write};
use tracing::{debug, trace};

const DATA_FIELD: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Longest event terminator (`\r\n\r\n`).
const MAX_DELIMITER_LEN: usize = 4;

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Text(String),
    Done,
    Ignored,
}

#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    /// Index in `buffer` before which no terminator can start.
    scan_from: usize,
    saw_content: bool,
    done_markers: usize,
    text: String,
    first_content: Option<Signal>,
}

impl StreamDecoder {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `signal` as soon as the first fragment is decoded, before
    /// anything is written.
    pub fn with_signal(signal: Signal) -> Self {
        Self {
            first_content: Some(signal),
            ..Self::default()
        }
    }

    /// Appends `chunk` and returns the text of every event it completed,
    /// in arrival order. Nothing is written anywhere.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        let mut consumed = 0;
        while let Some((start, len)) = find_delimiter(&self.buffer, self.scan_from) {
            let event = parse_event(&self.buffer[consumed..start]);
            match event {
                Event::Text(text) if !text.is_empty() => fragments.push(text),
                Event::Done => {
                    trace!("Stream terminal marker received");
                    self.done_markers += 1;
                }
                _ => {}
            }
            consumed = start + len;
            self.scan_from = consumed;
        }

        if !fragments.is_empty() {
            if let Some(signal) = &self.first_content {
                signal.fire();
            }
        }

        self.buffer.drain(..consumed);
        self.scan_from = self
            .buffer
            .len()
            .saturating_sub(MAX_DELIMITER_LEN - 1);
        fragments
    }

    /// Writes fragments to `out`, flushing after each one.
    pub fn emit<W: Write>(&mut self, fragments: &[String], out: &mut W) -> io::Result<()> {
        for fragment in fragments {
            self.saw_content = true;
            out.write_all(fragment.as_bytes())?;
            out.flush()?;
            self.text.push_str(fragment);
        }
        Ok(())
    }

    /// [`decode`](Self::decode) followed by [`emit`](Self::emit). Returns the
    /// number of fragments written.
    #[cfg(test)]
    pub fn feed<W: Write>(&mut self, chunk: &[u8], out: &mut W) -> io::Result<usize> {
        let fragments = self.decode(chunk);
        self.emit(&fragments, out)?;
        Ok(fragments.len())
    }

    pub fn saw_content(&self) -> bool {
        self.saw_content
    }

    #[cfg(test)]
    pub fn done_markers(&self) -> usize {
        self.done_markers
    }

    pub fn is_done(&self) -> bool {
        self.done_markers > 0
    }

    /// Bytes received but not yet terminated.
    #[cfg(test)]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Everything emitted so far.
    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Finds the first `\n\n` or `\r\n\r\n` at or after `from`.
fn find_delimiter(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

fn parse_event(raw: &[u8]) -> Event {
    let Ok(raw) = std::str::from_utf8(raw) else {
        debug!("Skipping stream event with invalid UTF-8");
        return Event::Ignored;
    };

    let mut data: Option<String> = None;
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(value) = line.strip_prefix(DATA_FIELD) else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    let Some(payload) = data else {
        return Event::Ignored;
    };

    if payload.trim() == DONE_MARKER {
        return Event::Done;
    }

    match serde_json::from_str::<StreamResponse>(&payload) {
        Ok(parsed) => parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .map(Event::Text)
            .unwrap_or(Event::Ignored),
        Err(e) => {
            debug!("Skipping malformed stream payload: {}", e);
            Event::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HI_BODY: &[u8] =
        b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    fn run(chunks: &[&[u8]]) -> (StreamDecoder, String) {
        let mut decoder = StreamDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk, &mut out).unwrap();
        }
        (decoder, String::from_utf8(out).unwrap())
    }

    #[test]
    fn whole_body_emits_once() {
        let (decoder, out) = run(&[HI_BODY]);
        assert_eq!(out, "Hi");
        assert_eq!(decoder.done_markers(), 1);
        assert!(decoder.saw_content());
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn one_byte_chunks_emit_once() {
        let chunks: Vec<&[u8]> = HI_BODY.chunks(1).collect();
        let (decoder, out) = run(&chunks);
        assert_eq!(out, "Hi");
        assert_eq!(decoder.done_markers(), 1);
    }

    #[test]
    fn every_split_point_emits_once() {
        for split in 0..=HI_BODY.len() {
            let (head, tail) = HI_BODY.split_at(split);
            let (decoder, out) = run(&[head, tail]);
            assert_eq!(out, "Hi", "split at {}", split);
            assert_eq!(decoder.done_markers(), 1, "split at {}", split);
        }
    }

    #[test]
    fn pseudo_random_splits_emit_once() {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..200 {
            let mut chunks = Vec::new();
            let mut rest = HI_BODY;
            while !rest.is_empty() {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let take = (seed % 9 + 1) as usize;
                let (head, tail) = rest.split_at(take.min(rest.len()));
                chunks.push(head);
                rest = tail;
            }
            let (decoder, out) = run(&chunks);
            assert_eq!(out, "Hi");
            assert_eq!(decoder.done_markers(), 1);
        }
    }

    #[test]
    fn nothing_is_emitted_before_the_terminator() {
        let mut decoder = StreamDecoder::new();
        let mut out = Vec::new();
        let event = delta("Hello");
        let (payload, terminator) = event.as_bytes().split_at(event.len() - 2);

        assert_eq!(decoder.feed(payload, &mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert!(!decoder.saw_content());
        assert_eq!(decoder.pending(), payload);

        assert_eq!(decoder.feed(terminator, &mut out).unwrap(), 1);
        assert_eq!(out, b"Hello");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn trailing_partial_event_is_kept_verbatim() {
        let mut decoder = StreamDecoder::new();
        let first = delta("one");
        let partial = "data: {\"choices\":[{\"delta\":{\"con";
        let chunk = format!("{}{}", first, partial);

        let fragments = decoder.decode(chunk.as_bytes());
        assert_eq!(fragments, vec!["one".to_string()]);
        assert_eq!(decoder.pending(), partial.as_bytes());

        let fragments = decoder.decode(b"tent\":\"two\"}}]}\n\n");
        assert_eq!(fragments, vec!["two".to_string()]);
    }

    #[test]
    fn fragments_keep_arrival_order() {
        let body = format!("{}{}{}data: [DONE]\n\n", delta("a"), delta("b"), delta("c"));
        let (decoder, out) = run(&[body.as_bytes()]);
        assert_eq!(out, "abc");
        assert_eq!(decoder.text(), "abc");
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let body = format!("{}data: {{not json\n\n{}", delta("before"), delta(" after"));
        let (decoder, out) = run(&[body.as_bytes()]);
        assert_eq!(out, "before after");
        assert!(!decoder.is_done());
    }

    #[test]
    fn empty_and_missing_content_emit_nothing() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{}}]}\n\n",
            "data: {\"choices\":[]}\n\n",
            "data: {\"choices\":[{\"finish_reason\":\"stop\",\"delta\":{\"content\":null}}]}\n\n",
        );
        let (decoder, out) = run(&[body.as_bytes()]);
        assert!(out.is_empty());
        assert!(!decoder.saw_content());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let body = format!(": keep-alive\n\nevent: message\n{}", delta("ok"));
        let (_, out) = run(&[body.as_bytes()]);
        assert_eq!(out, "ok");
    }

    #[test]
    fn crlf_framing_is_accepted() {
        let body = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n";
        for split in 0..=body.len() {
            let (head, tail) = body.split_at(split);
            let (decoder, out) = run(&[head, tail]);
            assert_eq!(out, "Hi", "split at {}", split);
            assert_eq!(decoder.done_markers(), 1, "split at {}", split);
        }
    }

    #[test]
    fn multibyte_text_split_across_chunks() {
        let event = delta("héllo wörld");
        let bytes = event.as_bytes();
        let e_acute = event.find('é').unwrap();
        let (head, tail) = bytes.split_at(e_acute + 1);
        let (_, out) = run(&[head, tail]);
        assert_eq!(out, "héllo wörld");
    }

    #[test]
    fn first_content_signal_fires_once() {
        let signal = Signal::new();
        let mut decoder = StreamDecoder::with_signal(signal.clone());
        let mut out = Vec::new();

        decoder.feed(b"data: [DONE]\n\n", &mut out).unwrap();
        assert!(!signal.is_fired());

        decoder.feed(delta("x").as_bytes(), &mut out).unwrap();
        assert!(signal.is_fired());
        assert!(!signal.fire(), "already fired by the decoder");

        decoder.feed(delta("y").as_bytes(), &mut out).unwrap();
        assert_eq!(decoder.into_text(), "xy");
    }

    #[test]
    fn signal_fires_on_decode_before_output() {
        let signal = Signal::new();
        let mut decoder = StreamDecoder::with_signal(signal.clone());

        let fragments = decoder.decode(delta("x").as_bytes());
        assert!(signal.is_fired());
        assert!(!decoder.saw_content());

        let mut out = Vec::new();
        decoder.emit(&fragments, &mut out).unwrap();
        assert_eq!(out, b"x");
        assert!(decoder.saw_content());
    }
}
