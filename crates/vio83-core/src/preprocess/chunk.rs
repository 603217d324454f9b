//! Semantic Chunking
//!
//! Splits cleaned text into chunks bounded by a token budget, carrying the
//! active section title. A section heading (markdown `#`, `CAPITOLO N.`,
//! `1.2.3 Title`, short ALL-CAPS line) flushes the current chunk and opens a
//! new section; consecutive chunks overlap by a configured number of
//! characters so no sentence is stranded at a boundary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A contiguous span of a document's cleaned text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// `{doc_id}_chunk_{index:04}`
    pub chunk_id: String,
    /// Cleaned text of the chunk, including the overlap prefix
    pub content: String,
    /// The same span before cleaning
    pub raw_content: String,
    /// Language of the parent document
    pub language: String,
    /// Section heading active when the chunk was flushed, possibly empty
    pub section_title: String,
    /// Characters in `content`
    pub char_count: usize,
    /// Whitespace-separated words in `content`
    pub word_count: usize,
    /// Approximate tokens, `char_count / 4`
    pub tokens_approx: usize,
    /// Position within the document
    pub index: usize,
    /// Total chunks in the document
    pub total_chunks: usize,
}

/// One unit of chunker input: a cleaned line plus its pre-cleaning form.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Cleaned line
    pub cleaned: String,
    /// Raw line the cleaned one came from
    pub raw: String,
}

/// Chunker limits, expressed in tokens (4 chars per token).
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    /// Maximum tokens per chunk
    pub max_tokens: usize,
    /// Overlap carried into the next chunk, in tokens
    pub overlap_tokens: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 64,
        }
    }
}

static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+)$").unwrap());
static CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(capitolo|chapter)\s+[0-9IVXLC]+\.?\s*(.*)$").unwrap());
static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+){0,3}\.?\s+(\p{Lu}.{0,80})$").unwrap());

/// Recognize a section heading line and return its title text.
pub fn section_title(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = MARKDOWN_HEADING.captures(line) {
        return Some(caps[1].trim().to_string());
    }
    if let Some(caps) = CHAPTER_HEADING.captures(line) {
        let rest = caps[2].trim();
        return Some(if rest.is_empty() {
            line.to_string()
        } else {
            rest.to_string()
        });
    }
    if let Some(caps) = NUMBERED_HEADING.captures(line) {
        return Some(caps[1].trim().to_string());
    }
    // Short ALL-CAPS line with at least one letter
    if line.len() <= 60
        && line.chars().any(|c| c.is_alphabetic())
        && line
            .chars()
            .all(|c| !c.is_alphabetic() || c.is_uppercase())
        && line.split_whitespace().count() <= 8
    {
        return Some(line.to_string());
    }

    None
}

/// Chunk a sequence of segments.
///
/// `language` is stamped on every chunk; ids are assigned as
/// `{doc_id}_chunk_{index:04}` once the total is known.
pub fn chunk_segments(
    segments: &[Segment],
    doc_id: &str,
    language: &str,
    limits: ChunkLimits,
) -> Vec<Chunk> {
    let mut builder = ChunkBuilder::new(limits.max_tokens * 4, limits.overlap_tokens * 4);
    for segment in segments {
        if let Some(title) = section_title(&segment.cleaned) {
            builder.start_section(title);
            continue;
        }
        builder.push_paragraph(&segment.cleaned, &segment.raw);
    }
    builder.flush();

    let total = builder.chunks.len();
    builder
        .chunks
        .into_iter()
        .enumerate()
        .map(|(index, partial)| {
            let char_count = partial.content.chars().count();
            let word_count = partial.content.split_whitespace().count();
            Chunk {
                chunk_id: format!("{doc_id}_chunk_{index:04}"),
                char_count,
                word_count,
                tokens_approx: char_count / 4,
                content: partial.content,
                raw_content: partial.raw,
                language: language.to_string(),
                section_title: partial.section,
                index,
                total_chunks: total,
            }
        })
        .collect()
}

struct PartialChunk {
    content: String,
    raw: String,
    section: String,
}

/// Accumulates paragraphs into chunks. `current` always starts with the
/// overlap carried from the previous flush; `seed_chars` records how much of
/// it is overlap so an overlap-only buffer is never emitted as a chunk.
struct ChunkBuilder {
    max_chars: usize,
    overlap_chars: usize,
    chunks: Vec<PartialChunk>,
    current: String,
    current_chars: usize,
    seed_chars: usize,
    current_raw: String,
    section: String,
    carry: String,
}

impl ChunkBuilder {
    fn new(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(16),
            overlap_chars,
            chunks: Vec::new(),
            current: String::new(),
            current_chars: 0,
            seed_chars: 0,
            current_raw: String::new(),
            section: String::new(),
            carry: String::new(),
        }
    }

    fn has_body(&self) -> bool {
        self.current_chars > self.seed_chars
    }

    /// Move the pending overlap into the empty buffer.
    fn seed(&mut self) {
        if self.current.is_empty() && !self.carry.is_empty() {
            self.current = std::mem::take(&mut self.carry);
            self.current_chars = self.current.chars().count();
            self.seed_chars = self.current_chars;
        }
    }

    fn append(&mut self, text: &str, separator: char) {
        if !self.current.is_empty() {
            self.current.push(separator);
            self.current_chars += 1;
        }
        self.current.push_str(text);
        self.current_chars += text.chars().count();
    }

    fn start_section(&mut self, title: String) {
        self.flush();
        // Overlap does not cross a section boundary
        self.carry.clear();
        self.section = title;
    }

    fn push_paragraph(&mut self, cleaned: &str, raw: &str) {
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return;
        }

        if cleaned.chars().count() > self.max_chars {
            self.flush();
            self.push_oversized(cleaned, raw);
            return;
        }

        self.seed();
        if self.has_body() && self.current_chars + 1 + cleaned.chars().count() > self.max_chars {
            self.flush();
            self.seed();
        }
        self.append(cleaned, '\n');
        self.push_raw(raw);
    }

    /// Split a paragraph larger than the budget at word boundaries; a single
    /// unbreakable run is emitted as one oversized chunk.
    fn push_oversized(&mut self, cleaned: &str, raw: &str) {
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        if words.len() <= 1 {
            self.seed();
            self.append(cleaned, '\n');
            self.push_raw(raw);
            self.flush();
            return;
        }

        for word in words {
            self.seed();
            if self.has_body() && self.current_chars + 1 + word.chars().count() > self.max_chars {
                self.flush();
                self.seed();
            }
            self.append(word, ' ');
            self.push_raw(raw);
        }
        self.flush();
    }

    fn push_raw(&mut self, raw: &str) {
        let raw = raw.trim();
        // A raw line that fed several cleaned lines or pieces is recorded once
        if !raw.is_empty() && !self.current_raw.ends_with(raw) {
            if !self.current_raw.is_empty() {
                self.current_raw.push('\n');
            }
            self.current_raw.push_str(raw);
        }
    }

    fn flush(&mut self) {
        if !self.has_body() {
            self.current.clear();
            self.current_chars = 0;
            self.seed_chars = 0;
            self.current_raw.clear();
            return;
        }

        let content = std::mem::take(&mut self.current);
        self.current_chars = 0;
        self.seed_chars = 0;

        // Overlap for the next chunk: the last overlap_chars characters
        if self.overlap_chars > 0 {
            let chars: Vec<char> = content.chars().collect();
            let start = chars.len().saturating_sub(self.overlap_chars);
            self.carry = chars[start..].iter().collect();
        }

        self.chunks.push(PartialChunk {
            content,
            raw: std::mem::take(&mut self.current_raw),
            section: self.section.clone(),
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Segment {
        Segment {
            cleaned: text.to_string(),
            raw: text.to_string(),
        }
    }

    #[test]
    fn test_section_title_patterns() {
        assert_eq!(section_title("# Introduction").as_deref(), Some("Introduction"));
        assert_eq!(section_title("## Deep Dive ").as_deref(), Some("Deep Dive"));
        assert_eq!(
            section_title("CAPITOLO 3. La Struttura").as_deref(),
            Some("La Struttura")
        );
        assert_eq!(
            section_title("1.2.3 Thermodynamic Limits").as_deref(),
            Some("Thermodynamic Limits")
        );
        assert_eq!(section_title("RESULTS").as_deref(), Some("RESULTS"));
        assert_eq!(section_title("An ordinary sentence here."), None);
        assert_eq!(section_title(""), None);
    }

    #[test]
    fn test_long_paragraph_split_with_overlap() {
        // 6000-char paragraph under a single markdown heading
        let word = "abcdefg ";
        let body: String = word.repeat(750);
        assert!(body.len() >= 6000);

        let segments = vec![seg("# Introduction"), seg(body.trim())];
        let limits = ChunkLimits {
            max_tokens: 512,
            overlap_tokens: 64,
        };
        let chunks = chunk_segments(&segments, "deadbeefdeadbeef", "en", limits);

        assert!(chunks.len() >= 2, "got {} chunks", chunks.len());
        assert_eq!(chunks[0].section_title, "Introduction");
        assert_eq!(chunks[0].chunk_id, "deadbeefdeadbeef_chunk_0000");
        assert_eq!(chunks[0].total_chunks, chunks.len());
        assert!(chunks[0].char_count <= 512 * 4);

        // Each following chunk starts with the previous chunk's 256-char tail
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let tail: String = prev[prev.len().saturating_sub(256)..].iter().collect();
            assert!(
                pair[1].content.starts_with(&tail),
                "chunk {} does not begin with the previous overlap",
                pair[1].index
            );
        }
    }

    #[test]
    fn test_small_paragraphs_accumulate() {
        let segments: Vec<Segment> =
            (0..10).map(|i| seg(&format!("Paragraph number {i}."))).collect();
        let chunks = chunk_segments(&segments, "d", "en", ChunkLimits::default());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Paragraph number 9."));
    }

    #[test]
    fn test_section_boundary_flushes() {
        let segments = vec![
            seg("First section body text."),
            seg("# Second"),
            seg("Second section body text."),
        ];
        let chunks = chunk_segments(&segments, "d", "en", ChunkLimits::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section_title, "");
        assert_eq!(chunks[1].section_title, "Second");
        // No overlap across the section boundary
        assert!(chunks[1].content.starts_with("Second section"));
    }

    #[test]
    fn test_unbreakable_run_oversized() {
        let giant = "x".repeat(5000);
        let chunks = chunk_segments(
            &[seg(&giant)],
            "d",
            "en",
            ChunkLimits {
                max_tokens: 128,
                overlap_tokens: 16,
            },
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].char_count >= 5000);
    }

    #[test]
    fn test_empty_input() {
        let chunks = chunk_segments(&[], "d", "en", ChunkLimits::default());
        assert!(chunks.is_empty());
        let chunks = chunk_segments(&[seg("  ")], "d", "en", ChunkLimits::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_coverage_accounting() {
        // Combined chunk chars minus overlaps equal the source length plus
        // the newline joins, within one overlap of tolerance
        let paragraphs: Vec<Segment> = (0..40)
            .map(|i| seg(&format!("Sentence {i} with a moderate amount of text in it.")))
            .collect();
        let limits = ChunkLimits {
            max_tokens: 64,
            overlap_tokens: 8,
        };
        let chunks = chunk_segments(&paragraphs, "d", "en", limits);
        assert!(chunks.len() > 1);

        let overlap_chars = limits.overlap_tokens * 4;
        let combined: usize = chunks.iter().map(|c| c.char_count).sum();
        let minus_overlaps = combined - overlap_chars * (chunks.len() - 1);
        let source: usize = paragraphs.iter().map(|p| p.cleaned.chars().count()).sum();
        let joins = paragraphs.len() - 1;
        let diff = (minus_overlaps as i64 - (source + joins) as i64).unsigned_abs() as usize;
        assert!(diff <= overlap_chars + chunks.len(), "diff {diff}");
    }

    #[test]
    fn test_counts() {
        let chunks = chunk_segments(
            &[seg("four words right here")],
            "d",
            "en",
            ChunkLimits::default(),
        );
        assert_eq!(chunks[0].word_count, 4);
        assert_eq!(chunks[0].char_count, 21);
        assert_eq!(chunks[0].tokens_approx, 5);
    }
}
