//! Output rendering for the chat client.
//!
//! All user-facing output goes through the [`Renderer`] trait.  The terminal
//! implementation styles lines with ANSI escape codes and runs every message
//! body through [`format_markdown`].

use std::io::{self, Stdout, Write};

use crate::types::Message;

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for code blocks).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text.
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for gray text (message ids, quotes).
const ANSI_GRAY: &str = "\x1b[90m";

/// ANSI escape code for cyan text (inline code, names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (edits).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (confirmations).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (errors, deletions).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (headings).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Author badge for other users' messages.
const ANSI_BADGE_OTHER: &str = "\x1b[46;30m";

/// Author badge for the session's own messages.
const ANSI_BADGE_SELF: &str = "\x1b[42;30m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print one chat message.  `own` marks messages sent by this session.
    fn print_message(&mut self, author: &str, message: &Message, own: bool);

    /// Print the notice for an edited message.
    fn print_message_update(&mut self, short_id: &str, content: &str);

    /// Print the notice for a deleted message.
    fn print_message_delete(&mut self, short_id: &str);

    /// Print a section heading.
    fn print_heading(&mut self, title: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a confirmation.
    fn print_success(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Switch styling on or off.
    fn set_color(&mut self, use_color: bool);
}

/// Terminal renderer with optional ANSI styling.
pub struct TerminalRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl TerminalRenderer {
    /// Creates a new TerminalRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new TerminalRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TerminalRenderer {
    fn print_message(&mut self, author: &str, message: &Message, own: bool) {
        let id = self.styled(ANSI_GRAY, &format!("[{}]", message.short_id()));
        let badge = self.styled(
            if own { ANSI_BADGE_SELF } else { ANSI_BADGE_OTHER },
            &format!(" {author} "),
        );
        let body = format_markdown(message.text(), self.use_color);
        let notes = annotations(message);
        let notes = if notes.is_empty() {
            notes
        } else {
            self.styled(ANSI_GRAY, &notes)
        };
        println!("\n{id} {badge} {body}{notes}");
        self.flush();
    }

    fn print_message_update(&mut self, short_id: &str, content: &str) {
        let body = format_markdown(content, self.use_color);
        let line = format!("[Message {short_id} updated] {body}");
        println!("\n{}", self.styled(&format!("{ANSI_ITALIC}{ANSI_YELLOW}"), &line));
        self.flush();
    }

    fn print_message_delete(&mut self, short_id: &str) {
        let line = format!("[Message {short_id} deleted]");
        println!("\n{}", self.styled(&format!("{ANSI_ITALIC}{ANSI_RED}"), &line));
        self.flush();
    }

    fn print_heading(&mut self, title: &str) {
        println!(
            "{}",
            self.styled(&format!("{ANSI_BOLD}{ANSI_MAGENTA}"), &format!("--- {title} ---"))
        );
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
        self.flush();
    }

    fn print_success(&mut self, text: &str) {
        println!("{}", self.styled(ANSI_GREEN, text));
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.styled(ANSI_RED, error));
    }

    fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }
}

/// Trailing notes for attachments, replies and reactions.
fn annotations(message: &Message) -> String {
    let mut notes = Vec::new();
    if !message.replies.is_empty() {
        let targets: Vec<String> = message
            .replies
            .iter()
            .map(|id| format!("[{}]", crate::types::short_id(id)))
            .collect();
        notes.push(format!("reply to {}", targets.join(", ")));
    }
    match message.attachments.len() {
        0 => {}
        1 => notes.push("1 attachment".to_string()),
        n => notes.push(format!("{n} attachments")),
    }
    for (emoji, users) in &message.reactions {
        notes.push(format!("{emoji} {}", users.len()));
    }
    if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    }
}

/// Inline markers in match order, with their styles.
const INLINE_MARKERS: &[(&str, &str)] = &[
    ("**", ANSI_BOLD),
    ("__", ANSI_BOLD),
    ("`", ANSI_CYAN),
    ("*", ANSI_ITALIC),
];

/// Renders the markdown subset chat bodies use: `> quotes`, `# headings`,
/// fenced code blocks, `**bold**`, `*italic*` and `` `code` ``.  Without
/// color the markers are stripped and quotes keep their curly quotes.
pub fn format_markdown(text: &str, use_color: bool) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(style(ANSI_DIM, line, use_color));
        } else if let Some(quote) = line.strip_prefix("> ") {
            let quote = format!("\u{201c}{}\u{201d}", format_inline(quote, use_color));
            lines.push(style(&format!("{ANSI_ITALIC}{ANSI_GRAY}"), &quote, use_color));
        } else if let Some(heading) = strip_heading(line) {
            lines.push(style(ANSI_BOLD, heading, use_color));
        } else {
            lines.push(format_inline(line, use_color));
        }
    }
    lines.join("\n").trim().to_string()
}

fn strip_heading(line: &str) -> Option<&str> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if (1..=6).contains(&hashes) {
        line[hashes..].strip_prefix(' ')
    } else {
        None
    }
}

fn format_inline(line: &str, use_color: bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(ch) = rest.chars().next() {
        let span = INLINE_MARKERS.iter().find_map(|(marker, ansi)| {
            let body = rest.strip_prefix(marker)?;
            let end = body.find(marker).filter(|end| *end > 0)?;
            Some((*marker, *ansi, end))
        });
        if let Some((marker, ansi, end)) = span {
            let inner = &rest[marker.len()..marker.len() + end];
            let inner = if marker == "`" {
                inner.to_string()
            } else {
                format_inline(inner, use_color)
            };
            out.push_str(&style(ansi, &inner, use_color));
            rest = &rest[marker.len() * 2 + end..];
            continue;
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn style(ansi: &str, text: &str, use_color: bool) -> String {
    if use_color {
        format!("{ansi}{text}{ANSI_RESET}")
    } else {
        text.to_string()
    }
}
