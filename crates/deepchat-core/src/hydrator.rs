//! Incremental splitting of a streamed response into thinking and response
//! channels.
//!
//! Models that expose their reasoning emit it between `<think>` and
//! `</think>` sentinels, and either sentinel can arrive split across any
//! number of token fragments. The hydrator buffers every fragment and
//! re-derives both channels from the full buffer on each append, so a marker
//! straddling a fragment boundary is never mis-parsed. Buffers are bounded by
//! one chat response, so the linear rescan stays cheap.

use tracing::error;

/// Literal opening the thinking segment. Matching is case-sensitive.
pub const THINK_START: &str = "<think>";
/// Literal closing the thinking segment.
pub const THINK_END: &str = "</think>";

/// Splitter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Outside a thinking segment, or the segment has been closed.
    #[default]
    Normal,
    /// A start marker with non-empty trailing content has been seen and the
    /// end marker has not arrived yet.
    Thinking,
}

/// Splits an append-only token stream into thinking and response text.
///
/// One hydrator serves exactly one generation: create it when the generation
/// starts, feed every fragment to [`append`](Self::append), and read the two
/// channels after each call. Both channels are a pure function of the
/// accumulated buffer, so the same fragments in the same order always produce
/// the same output no matter how they were chunked.
///
/// At most one thinking segment is recognized per hydrator lifetime. Once the
/// end marker has been observed the mode returns to [`Mode::Normal`]
/// permanently and any further markers are plain response text.
#[derive(Debug, Clone, Default)]
pub struct MessageHydrator {
    buffer: String,
    mode: Mode,
    thinking: String,
    response: String,
}

impl MessageHydrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment and re-derive both channels.
    ///
    /// Never fails: missing or unbalanced markers are defined states, not
    /// errors. An empty fragment is a no-op.
    pub fn append(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.buffer.push_str(fragment);
        self.rescan();
    }

    /// The thinking channel for the current or most recent thinking segment.
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// The response channel: everything outside the marker pair.
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_thinking(&self) -> bool {
        self.mode == Mode::Thinking
    }

    /// The full accumulated buffer, pre-split. Used for archival once the
    /// generation completes.
    pub fn raw_buffer(&self) -> &str {
        &self.buffer
    }

    /// Clear all state back to a freshly constructed hydrator.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.mode = Mode::Normal;
        self.thinking.clear();
        self.response.clear();
    }

    fn rescan(&mut self) {
        match Self::split(&self.buffer) {
            Some((mode, thinking, response)) => {
                self.mode = mode;
                self.thinking = thinking;
                self.response = response;
            }
            None => {
                // Unreachable with ASCII markers, but the contract is to
                // sacrifice partial progress rather than corrupt output.
                error!(buffer_len = self.buffer.len(), "hydrator rescan fault, clearing state");
                self.reset();
            }
        }
    }

    /// Derive `(mode, thinking, response)` from the full buffer.
    ///
    /// Returns `None` only if an index fell outside the buffer, which the
    /// caller treats as an internal fault.
    fn split(buffer: &str) -> Option<(Mode, String, String)> {
        let Some(start_idx) = buffer.find(THINK_START) else {
            // No start marker: the entire buffer is response text.
            return Some((Mode::Normal, String::new(), buffer.to_string()));
        };

        let content_start = start_idx.checked_add(THINK_START.len())?;

        let Some(end_idx) = buffer.find(THINK_END) else {
            // Open segment: everything after the start marker is the
            // candidate thinking text. Content before the start marker is
            // never surfaced as response text.
            let candidate = buffer.get(content_start..)?;
            if candidate.trim().is_empty() {
                return Some((Mode::Normal, String::new(), String::new()));
            }
            return Some((Mode::Thinking, candidate.to_string(), String::new()));
        };

        let response_start = end_idx.checked_add(THINK_END.len())?;
        let response = buffer.get(response_start..)?.to_string();

        if end_idx < content_start {
            // Degenerate: the end marker closed the segment before any
            // thinking content existed. Response begins right after it.
            return Some((Mode::Normal, String::new(), response));
        }

        let thinking = buffer.get(content_start..end_idx)?.to_string();
        Some((Mode::Normal, thinking, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrate(fragments: &[&str]) -> MessageHydrator {
        let mut h = MessageHydrator::new();
        for f in fragments {
            h.append(f);
        }
        h
    }

    #[test]
    fn test_no_marker_is_all_response() {
        let h = hydrate(&["Hello, ", "world!"]);
        assert_eq!(h.response(), "Hello, world!");
        assert_eq!(h.thinking(), "");
        assert_eq!(h.mode(), Mode::Normal);
    }

    #[test]
    fn test_end_marker_without_start_is_response() {
        let h = hydrate(&["done</think> now"]);
        assert_eq!(h.response(), "done</think> now");
        assert_eq!(h.thinking(), "");
        assert_eq!(h.mode(), Mode::Normal);
    }

    #[test]
    fn test_complete_pair() {
        let h = hydrate(&["<think>let me see</think>The answer is 4."]);
        assert_eq!(h.thinking(), "let me see");
        assert_eq!(h.response(), "The answer is 4.");
        assert_eq!(h.mode(), Mode::Normal);
    }

    #[test]
    fn test_marker_split_across_fragments() {
        let h = hydrate(&["<thi", "nk>hello</think>world"]);
        assert_eq!(h.thinking(), "hello");
        assert_eq!(h.response(), "world");
    }

    #[test]
    fn test_split_at_every_boundary() {
        let full = "<think>some thoughts here</think>and the reply";
        let whole = hydrate(&[full]);
        for i in 0..=full.len() {
            if !full.is_char_boundary(i) {
                continue;
            }
            let h = hydrate(&[&full[..i], &full[i..]]);
            assert_eq!(h.thinking(), whole.thinking(), "split at {}", i);
            assert_eq!(h.response(), whole.response(), "split at {}", i);
        }
    }

    #[test]
    fn test_empty_append_is_idempotent() {
        let mut h = hydrate(&["<think>partial"]);
        let thinking = h.thinking().to_string();
        let response = h.response().to_string();
        for _ in 0..5 {
            h.append("");
        }
        assert_eq!(h.thinking(), thinking);
        assert_eq!(h.response(), response);
        assert_eq!(h.raw_buffer(), "<think>partial");
    }

    #[test]
    fn test_open_segment_streams_thinking() {
        let h = hydrate(&["<think>partial thoughts"]);
        assert_eq!(h.thinking(), "partial thoughts");
        assert_eq!(h.response(), "");
        assert_eq!(h.mode(), Mode::Thinking);
    }

    #[test]
    fn test_degenerate_empty_segment() {
        let h = hydrate(&["<think></think>world"]);
        assert_eq!(h.thinking(), "");
        assert_eq!(h.response(), "world");
        assert_eq!(h.mode(), Mode::Normal);
    }

    #[test]
    fn test_whitespace_only_candidate_stays_normal() {
        let h = hydrate(&["<think>", "  \n"]);
        assert_eq!(h.mode(), Mode::Normal);
        assert_eq!(h.thinking(), "");
        assert_eq!(h.response(), "");
    }

    #[test]
    fn test_incremental_whitespace_preserved() {
        let h = hydrate(&["<think>", "step one\n", "step two"]);
        assert_eq!(h.thinking(), "step one\nstep two");
    }

    #[test]
    fn test_prefix_before_start_marker_discarded() {
        let h = hydrate(&["noise <think>reasoning</think>reply"]);
        assert_eq!(h.thinking(), "reasoning");
        assert_eq!(h.response(), "reply");
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let h = hydrate(&["<THINK>loud</THINK>quiet"]);
        assert_eq!(h.thinking(), "");
        assert_eq!(h.response(), "<THINK>loud</THINK>quiet");
    }

    #[test]
    fn test_markers_after_close_are_response_text() {
        let h = hydrate(&["<think>a</think>b<think>c</think>d"]);
        assert_eq!(h.thinking(), "a");
        assert_eq!(h.response(), "b<think>c</think>d");
        assert_eq!(h.mode(), Mode::Normal);
    }

    #[test]
    fn test_end_marker_before_start_marker() {
        let h = hydrate(&["</think>x<think>y"]);
        assert_eq!(h.thinking(), "");
        assert_eq!(h.response(), "x<think>y");
    }

    #[test]
    fn test_thinking_settles_after_partial_end_marker() {
        let mut h = MessageHydrator::new();
        h.append("<think>almost done</thi");
        assert_eq!(h.mode(), Mode::Thinking);
        assert_eq!(h.thinking(), "almost done</thi");
        h.append("nk> final");
        assert_eq!(h.mode(), Mode::Normal);
        assert_eq!(h.thinking(), "almost done");
        assert_eq!(h.response(), " final");
    }

    #[test]
    fn test_raw_buffer_accumulates_everything() {
        let h = hydrate(&["<think>a", "</think>", "b"]);
        assert_eq!(h.raw_buffer(), "<think>a</think>b");
    }

    #[test]
    fn test_reset_behaves_like_fresh_instance() {
        let mut h = hydrate(&["<think>old</think>stale"]);
        h.reset();
        assert_eq!(h.raw_buffer(), "");
        assert_eq!(h.mode(), Mode::Normal);
        h.append("fresh start");
        let fresh = hydrate(&["fresh start"]);
        assert_eq!(h.thinking(), fresh.thinking());
        assert_eq!(h.response(), fresh.response());
        assert_eq!(h.raw_buffer(), fresh.raw_buffer());
    }

    #[test]
    fn test_unicode_content_survives_splitting() {
        let full = "<think>héllo wörld 思考</think>réponse 🎉";
        for i in 0..=full.len() {
            if !full.is_char_boundary(i) {
                continue;
            }
            let h = hydrate(&[&full[..i], &full[i..]]);
            assert_eq!(h.thinking(), "héllo wörld 思考", "split at {}", i);
            assert_eq!(h.response(), "réponse 🎉", "split at {}", i);
        }
    }

    #[test]
    fn test_channels_recomputable_from_raw_buffer() {
        let h = hydrate(&["<thi", "nk>abc</th", "ink>def"]);
        let mut replay = MessageHydrator::new();
        replay.append(h.raw_buffer());
        assert_eq!(replay.thinking(), h.thinking());
        assert_eq!(replay.response(), h.response());
    }
}
