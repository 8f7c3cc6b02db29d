//! Operator feedback: a granted/denied indicator plus a few short lines

/// Lines a feedback display can show at once
pub const MAX_LINES: usize = 4;

pub trait Feedback: Send + Sync {
    /// Fire-and-forget; implementations must not fail the caller.
    fn present(&self, granted: bool, lines: &[String]);
}

/// Prints feedback to stderr and mirrors it into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleFeedback;

impl ConsoleFeedback {
    fn render(granted: bool, lines: &[String]) -> String {
        let marker = if granted { "[GRANTED]" } else { "[DENIED]" };
        let shown: Vec<&str> = lines.iter().take(MAX_LINES).map(String::as_str).collect();
        format!("{marker} {}", shown.join(" | "))
    }
}

impl Feedback for ConsoleFeedback {
    fn present(&self, granted: bool, lines: &[String]) {
        let rendered = Self::render(granted, lines);
        if granted {
            tracing::info!(feedback = %rendered, "feedback");
        } else {
            tracing::warn!(feedback = %rendered, "feedback");
        }
        eprintln!("{rendered}");
    }
}
