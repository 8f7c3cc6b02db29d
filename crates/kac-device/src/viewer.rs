//! Text viewer for recovered UTF-8 plaintext

use std::path::PathBuf;

use anyhow::{Context, Result};

pub trait TextViewer: Send + Sync {
    /// Show `text` under `title`. Errors are reported, never fatal to the caller.
    fn view(&self, title: &str, text: &str) -> Result<()>;
}

/// Prints the first page of wrapped text and exports the full text to
/// `<export_dir>/<title>`, keeping only filename-safe characters of the title.
#[derive(Debug, Clone)]
pub struct ExportViewer {
    export_dir: PathBuf,
    columns: usize,
    page_lines: usize,
}

impl ExportViewer {
    pub fn new(export_dir: impl Into<PathBuf>, columns: usize, page_lines: usize) -> Self {
        Self {
            export_dir: export_dir.into(),
            columns: columns.max(1),
            page_lines: page_lines.max(1),
        }
    }

    pub fn export_path(&self, title: &str) -> PathBuf {
        let safe: String = title
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        match safe.trim_start_matches('.') {
            "" => self.export_dir.join("text.txt"),
            name => self.export_dir.join(name),
        }
    }
}

impl TextViewer for ExportViewer {
    fn view(&self, title: &str, text: &str) -> Result<()> {
        let lines = wrap_text(text, self.columns);
        let (page, footer) = page(&lines, 0, self.page_lines);

        println!("{}", title.chars().take(self.columns).collect::<String>());
        for line in page {
            println!("{line}");
        }
        println!("{footer}");

        std::fs::create_dir_all(&self.export_dir)
            .with_context(|| format!("creating export dir: {}", self.export_dir.display()))?;
        let path = self.export_path(title);
        std::fs::write(&path, text).with_context(|| format!("exporting to {}", path.display()))?;
        tracing::info!(path = %path.display(), "exported plaintext preview");
        Ok(())
    }
}

/// Greedy word wrap to `columns` characters. Words longer than a line are
/// split; blank source lines are kept.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut out = Vec::new();

    for para in text.lines() {
        let mut line = String::new();
        let mut len = 0;
        for word in para.split_whitespace() {
            let word_len = word.chars().count();
            if len > 0 && len + 1 + word_len <= columns {
                line.push(' ');
                line.push_str(word);
                len += 1 + word_len;
                continue;
            }
            if len > 0 {
                out.push(std::mem::take(&mut line));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(columns).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    out.push(piece);
                } else {
                    len = chunk.len();
                    line = piece;
                }
            }
        }
        if len > 0 || para.trim().is_empty() {
            out.push(line);
        }
    }

    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Lines `start..start + page_lines` and a `first-last/total` footer.
pub fn page(lines: &[String], start: usize, page_lines: usize) -> (&[String], String) {
    let total = lines.len();
    let start = start.min(total.saturating_sub(1));
    let end = (start + page_lines).min(total);
    (&lines[start..end], format!("{}-{}/{}", start + 1, end, total))
}
