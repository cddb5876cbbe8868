/*!
 * Splits a document into translation-sized chunks.
 *
 * Chunks come out in document line order and, within a line, left to right.
 * Dispatch may finish them in any order; the reassembler relies on the
 * `(line_index, position)` pair to put them back.
 */

use std::sync::Arc;

use super::document::{Chunk, Document, is_blank};

/// Splits text into the atomic units a model counts against its input limit
pub trait Tokenizer: Send + Sync + std::fmt::Debug {
    /// Split text into tokens
    fn encode(&self, text: &str) -> Vec<String>;

    /// Turn a run of tokens back into text
    fn decode(&self, tokens: &[String]) -> String;
}

/// Longest run of letters kept together as one token
const MAX_WORD_CHARS: usize = 24;

/// Word-level tokenizer.
///
/// Whitespace-separated words are tokens. Scripts written without spaces
/// between words (CJK, Thai, Lao, Khmer, Myanmar) count one token per
/// character cluster, and very long words are cut every `MAX_WORD_CHARS`
/// clusters, so every line can be split under the model's input limit.
/// A token that starts a new word carries a leading space, which `decode`
/// drops at the start of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            for (index, piece) in word_pieces(word).into_iter().enumerate() {
                if index == 0 && !tokens.is_empty() {
                    tokens.push(format!(" {}", piece));
                } else {
                    tokens.push(piece.to_string());
                }
            }
        }
        tokens
    }

    fn decode(&self, tokens: &[String]) -> String {
        tokens.concat().trim_start().to_string()
    }
}

/// Split one word into tokens
fn word_pieces(word: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    let mut run_clusters = 0;

    for (start, end) in clusters(word) {
        let unspaced = word[start..end].chars().next().is_some_and(is_unspaced_script);
        if unspaced {
            if let Some((run_start, run_end)) = run.take() {
                pieces.push(&word[run_start..run_end]);
            }
            run_clusters = 0;
            pieces.push(&word[start..end]);
            continue;
        }

        run = Some(run.map_or((start, end), |(run_start, _)| (run_start, end)));
        run_clusters += 1;
        if run_clusters == MAX_WORD_CHARS {
            if let Some((run_start, run_end)) = run.take() {
                pieces.push(&word[run_start..run_end]);
            }
            run_clusters = 0;
        }
    }

    if let Some((run_start, run_end)) = run {
        pieces.push(&word[run_start..run_end]);
    }
    pieces
}

/// Byte ranges of character clusters: a base character plus any combining marks after it
fn clusters(text: &str) -> Vec<(usize, usize)> {
    let mut starts: Vec<usize> = Vec::new();
    for (offset, c) in text.char_indices() {
        if starts.is_empty() || !is_combining_mark(c) {
            starts.push(offset);
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| (start, starts.get(i + 1).copied().unwrap_or(text.len())))
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F
            | 0x0E31
            | 0x0E34..=0x0E3A
            | 0x0E47..=0x0E4E
            | 0x0EB1
            | 0x0EB4..=0x0EBC
            | 0x0EC8..=0x0ECD
            | 0x102B..=0x103E
            | 0x1056..=0x1059
            | 0x105E..=0x1060
            | 0x1062..=0x1064
            | 0x1067..=0x106D
            | 0x1071..=0x1074
            | 0x1082..=0x108D
            | 0x108F
            | 0x109A..=0x109D
            | 0x17B4..=0x17D3
            | 0x17DD
            | 0x1AB0..=0x1AFF
            | 0x200D
            | 0x20D0..=0x20FF
            | 0x3099..=0x309A
            | 0xFE00..=0xFE0F
            | 0xFE20..=0xFE2F
            | 0xE0100..=0xE01EF
    )
}

/// Scripts that do not separate words with spaces
fn is_unspaced_script(c: char) -> bool {
    matches!(
        c as u32,
        0x0E00..=0x0E7F         // Thai
            | 0x0E80..=0x0EFF   // Lao
            | 0x1000..=0x109F   // Myanmar
            | 0x1780..=0x17FF   // Khmer
            | 0x2E80..=0x2FDF   // CJK radicals
            | 0x3000..=0x303F   // CJK punctuation
            | 0x3040..=0x30FF   // Hiragana, Katakana
            | 0x31F0..=0x31FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF   // Fullwidth forms
            | 0x20000..=0x2FA1F
    )
}

/// Line-preserving chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    max_units: usize,
}

impl Chunker {
    /// Create a chunker; `max_units` is clamped to at least one token
    pub fn new(tokenizer: Arc<dyn Tokenizer>, max_units: usize) -> Self {
        Self {
            tokenizer,
            max_units: max_units.max(1),
        }
    }

    pub fn with_whitespace_tokenizer(max_units: usize) -> Self {
        Self::new(Arc::new(WhitespaceTokenizer), max_units)
    }

    pub fn max_units(&self) -> usize {
        self.max_units
    }

    /// Split every line of the document into chunks
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(document.line_count());

        for (line_index, line) in document.lines().iter().enumerate() {
            if is_blank(line) {
                chunks.push(Chunk::blank(line_index, line.as_str()));
                continue;
            }

            let tokens = self.tokenizer.encode(line);
            for (position, run) in tokens.chunks(self.max_units).enumerate() {
                chunks.push(Chunk::text(line_index, position, self.tokenizer.decode(run)));
            }
        }

        chunks
    }

    /// Token count of a text under this chunker's tokenizer
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode(text).len()
    }
}
