//! Terminal renderer for the two hydrated channels.
//!
//! Receives whole-value updates and prints only what the user has not seen
//! yet: the unseen suffix when the new value extends the printed one, a
//! fresh-line reprint when it does not (which only happens when a leading
//! prefix is discarded or a generation is abandoned). A trailing fragment
//! that could still grow into a sentinel marker is withheld so half a marker
//! never flickers on screen.

use std::io::{self, Write};

use crossterm::style::Stylize;

use deepchat_core::{HydratedUpdate, THINK_END, THINK_START};

/// How many bytes of `s` are safe to show: everything except a trailing
/// proper prefix of either sentinel marker.
fn visible_len(s: &str) -> usize {
    let max_hold = THINK_END.len() - 1;
    for k in (1..=max_hold.min(s.len())).rev() {
        let cut = s.len() - k;
        if !s.is_char_boundary(cut) {
            continue;
        }
        let tail = &s[cut..];
        // Only a proper prefix can still grow into a marker; a complete
        // marker in the text is ordinary characters here.
        if (tail.len() < THINK_START.len() && THINK_START.starts_with(tail))
            || THINK_END.starts_with(tail)
        {
            return cut;
        }
    }
    s.len()
}

/// What to print so that `shown` becomes `target`. A non-extension
/// replacement reprints the new value on a fresh line.
fn advance(shown: &mut String, target: &str) -> String {
    let out = if let Some(suffix) = target.strip_prefix(shown.as_str()) {
        suffix.to_string()
    } else if target.is_empty() {
        "\n".to_string()
    } else {
        format!("\n{}", target)
    };
    shown.clear();
    shown.push_str(target);
    out
}

pub struct StreamRenderer {
    thinking_shown: String,
    response_shown: String,
    header_printed: bool,
    separator_printed: bool,
    last: HydratedUpdate,
    use_color: bool,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::with_color(atty::is(atty::Stream::Stdout))
    }

    pub fn with_color(use_color: bool) -> Self {
        Self {
            thinking_shown: String::new(),
            response_shown: String::new(),
            header_printed: false,
            separator_printed: false,
            last: HydratedUpdate::default(),
            use_color,
        }
    }

    /// Display one whole-value update.
    pub fn apply(&mut self, update: &HydratedUpdate) {
        let (thinking_out, response_out) = self.step(update);
        if !thinking_out.is_empty() {
            print!("{}", self.dim(&thinking_out));
        }
        if !response_out.is_empty() {
            print!("{}", response_out);
        }
        let _ = io::stdout().flush();
    }

    /// Flush anything still withheld and end the output block.
    pub fn finish(&mut self) {
        let thinking = self.last.thinking.clone();
        let tail = advance(&mut self.thinking_shown, &thinking);
        if !tail.is_empty() && !thinking.is_empty() {
            print!("{}", self.dim(&tail));
        }
        let response = self.last.response.clone();
        let tail = advance(&mut self.response_shown, &response);
        if !tail.is_empty() && !response.is_empty() {
            print!("{}", tail);
        }
        println!();
        let _ = io::stdout().flush();
    }

    /// Compute what to print for this update. Split from `apply` so the
    /// logic is testable without a terminal.
    fn step(&mut self, update: &HydratedUpdate) -> (String, String) {
        self.last = update.clone();

        let mut thinking_out = String::new();
        let mut response_out = String::new();

        // Once the response channel carries text the thinking segment is
        // closed and nothing more is withheld from it.
        let thinking_visible = if update.response.is_empty() {
            &update.thinking[..visible_len(&update.thinking)]
        } else {
            update.thinking.as_str()
        };

        if !thinking_visible.is_empty() && !self.header_printed {
            self.header_printed = true;
            thinking_out.push_str("thinking\n");
        }
        if self.header_printed {
            thinking_out.push_str(&advance(&mut self.thinking_shown, thinking_visible));
        }

        let response_visible = &update.response[..visible_len(&update.response)];
        if !response_visible.is_empty() && self.header_printed && !self.separator_printed {
            self.separator_printed = true;
            response_out.push_str("\n\n");
        }
        if !response_visible.is_empty() || !self.response_shown.is_empty() {
            response_out.push_str(&advance(&mut self.response_shown, response_visible));
        }

        (thinking_out, response_out)
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color {
            format!("{}", s.dark_grey())
        } else {
            s.to_string()
        }
    }
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::new()
    }
}
