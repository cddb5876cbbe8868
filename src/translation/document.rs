/*!
 * Document model for line-oriented book text.
 *
 * A `Document` is the decoded source artifact as an ordered list of lines.
 * Blank lines are first-class: they are kept verbatim and never translated.
 */

use serde::{Deserialize, Serialize};

/// Decoded text of a job's source artifact
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Document {
    /// Split text into lines. A final line break ends the last line
    /// rather than starting an empty one.
    pub fn from_text(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.ends_with('\n'),
        }
    }

    pub fn from_lines(lines: Vec<String>, trailing_newline: bool) -> Self {
        Self {
            lines,
            trailing_newline,
        }
    }

    /// Join hard-wrapped lines into paragraphs.
    ///
    /// Consecutive non-blank lines become one line joined by single spaces;
    /// blank lines stay where they are.
    pub fn unwrap_paragraphs(self) -> Self {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut paragraph: Option<String> = None;

        for line in self.lines {
            if is_blank(&line) {
                if let Some(text) = paragraph.take() {
                    lines.push(text);
                }
                lines.push(line);
                continue;
            }

            let trimmed = line.trim();
            match paragraph.as_mut() {
                Some(text) => {
                    text.push(' ');
                    text.push_str(trimmed);
                }
                None => paragraph = Some(trimmed.to_string()),
            }
        }
        if let Some(text) = paragraph {
            lines.push(text);
        }

        Self {
            lines,
            trailing_newline: self.trailing_newline,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A line is blank when nothing but whitespace remains after trimming
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// What a chunk carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkContent {
    /// Verbatim blank line, passed through untranslated
    Blank(String),
    /// Text to translate
    Text(String),
}

/// A bounded span of one line's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the source line
    pub line_index: usize,
    /// Left-to-right ordinal within the line
    pub position: usize,
    /// Payload
    pub content: ChunkContent,
}

impl Chunk {
    pub fn text(line_index: usize, position: usize, text: impl Into<String>) -> Self {
        Self {
            line_index,
            position,
            content: ChunkContent::Text(text.into()),
        }
    }

    pub fn blank(line_index: usize, original: impl Into<String>) -> Self {
        Self {
            line_index,
            position: 0,
            content: ChunkContent::Blank(original.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.content, ChunkContent::Blank(_))
    }
}

/// Outcome of dispatching one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub line_index: usize,
    pub position: usize,
    pub text: String,
}

/// Translated lines in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedDocument {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl TranslatedDocument {
    pub fn new(lines: Vec<String>, trailing_newline: bool) -> Self {
        Self {
            lines,
            trailing_newline,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Final document text
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fromText_withTrailingNewline_shouldNotAddEmptyLine() {
        let doc = Document::from_text("Hello world.\n\nGoodbye.\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.lines()[1], "");
        assert!(doc.trailing_newline());
    }

    #[test]
    fn test_fromText_withCrlfAndBom_shouldStripBoth() {
        let doc = Document::from_text("\u{feff}One\r\nTwo");
        assert_eq!(doc.lines(), &["One".to_string(), "Two".to_string()]);
        assert!(!doc.trailing_newline());
    }

    #[test]
    fn test_unwrapParagraphs_shouldJoinWrappedLinesAndKeepBlanks() {
        let doc = Document::from_text("It was a dark\n  and stormy night.\n\nThe end.\n").unwrap_paragraphs();
        assert_eq!(
            doc.lines(),
            &["It was a dark and stormy night.".to_string(), String::new(), "The end.".to_string()]
        );
    }

    #[test]
    fn test_unwrapParagraphs_shouldKeepConsecutiveBlankLines() {
        let doc = Document::from_text("a\n\n  \nb").unwrap_paragraphs();
        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.lines()[2], "  ");
    }

    #[test]
    fn test_render_shouldRestoreTrailingNewline() {
        let translated = TranslatedDocument::new(vec!["a".into(), "".into(), "b".into()], true);
        assert_eq!(translated.render(), "a\n\nb\n");
        let translated = TranslatedDocument::new(vec!["a".into()], false);
        assert_eq!(translated.render(), "a");
    }
}
