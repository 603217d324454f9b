//! Preprocessing Pipeline
//!
//! Turns extracted text into normalized, language-tagged, chunked output:
//! clean, detect language, extract structured metadata, chunk semantically.
//! Empty or whitespace-only input produces zero chunks.

mod chunk;
mod clean;
mod language;
mod metadata;

pub use chunk::{chunk_segments, section_title, Chunk, ChunkLimits, Segment};
pub use clean::{clean_text, CleanOptions};
pub use language::{detect_language, stopwords, DetectedLanguage};
pub use metadata::{
    extract_author, extract_doi, extract_isbn, extract_metadata, extract_year, ExtractedMetadata,
};

use crate::ids::doc_id_from_source;

/// Preprocessor configuration.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Chunk budget and overlap
    pub limits: ChunkLimits,
    /// Cleaning knobs
    pub clean: CleanOptions,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            limits: ChunkLimits::default(),
            clean: CleanOptions::default(),
        }
    }
}

/// Everything the pipeline learned about one document.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Document id the chunks are keyed under
    pub doc_id: String,
    /// Detected language
    pub language: DetectedLanguage,
    /// Metadata recovered from the opening text
    pub metadata: ExtractedMetadata,
    /// The chunks, in document order
    pub chunks: Vec<Chunk>,
}

/// The preprocessing pipeline.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Preprocessor with default limits (512-token chunks, 64-token overlap).
    pub fn new() -> Self {
        Self::default()
    }

    /// Preprocessor with explicit configuration.
    pub fn with_config(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline.
    ///
    /// `doc_id` defaults to a hash of `filename`, falling back to a hash of
    /// the text itself. Returns zero chunks for input that cleans to empty.
    pub fn process(&self, text: &str, doc_id: Option<&str>, filename: Option<&str>) -> PreprocessResult {
        let doc_id = match doc_id {
            Some(id) => id.to_string(),
            None => doc_id_from_source(filename.unwrap_or(text)),
        };

        let segments = self.segments(text);
        let cleaned_whole: String = segments
            .iter()
            .map(|s| s.cleaned.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned_whole.trim().is_empty() {
            return PreprocessResult {
                doc_id,
                language: DetectedLanguage {
                    code: "unknown".to_string(),
                    confidence: 0.0,
                },
                metadata: ExtractedMetadata::default(),
                chunks: Vec::new(),
            };
        }

        let language = detect_language(&cleaned_whole);
        let metadata = extract_metadata(text);
        let chunks = chunk_segments(&segments, &doc_id, &language.code, self.config.limits);

        PreprocessResult {
            doc_id,
            language,
            metadata,
            chunks,
        }
    }

    /// Clean a whole text with this preprocessor's options.
    pub fn clean(&self, text: &str) -> String {
        clean_text(text, &self.config.clean)
    }

    /// Split raw text into (cleaned, raw) line segments. Cleaning is applied
    /// per line so every chunk can carry its pre-cleaning form; a raw line
    /// that cleans into several lines yields several segments sharing it.
    fn segments(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        for raw_line in text.lines() {
            let cleaned = clean_text(raw_line, &self.config.clean);
            for cleaned_line in cleaned.lines() {
                let trimmed = cleaned_line.trim();
                if !trimmed.is_empty() {
                    segments.push(Segment {
                        cleaned: trimmed.to_string(),
                        raw: raw_line.trim().to_string(),
                    });
                }
            }
        }
        segments
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_zero_chunks() {
        let pre = Preprocessor::new();
        assert!(pre.process("", None, None).chunks.is_empty());
        assert!(pre.process("   \n\t  ", None, None).chunks.is_empty());
    }

    #[test]
    fn test_basic_document() {
        let pre = Preprocessor::new();
        let text = "# Results\nThe experiment was repeated and the results were \
                    consistent with the theory that was proposed in the paper.";
        let result = pre.process(text, Some("abcd1234abcd1234"), None);

        assert_eq!(result.doc_id, "abcd1234abcd1234");
        assert_eq!(result.language.code, "en");
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].section_title, "Results");
        assert_eq!(result.chunks[0].chunk_id, "abcd1234abcd1234_chunk_0000");
    }

    #[test]
    fn test_deterministic() {
        let pre = Preprocessor::new();
        let text = "Some repeatable content with enough words for the detector to work on.";
        let a = pre.process(text, Some("x"), None);
        let b = pre.process(text, Some("x"), None);
        assert_eq!(a.language, b.language);
        assert_eq!(a.chunks.len(), b.chunks.len());
        for (ca, cb) in a.chunks.iter().zip(b.chunks.iter()) {
            assert_eq!(ca.content, cb.content);
        }
    }

    #[test]
    fn test_doc_id_from_filename() {
        let pre = Preprocessor::new();
        let a = pre.process("the content of the file is here", None, Some("a.txt"));
        let b = pre.process("the content of the file is here", None, Some("a.txt"));
        assert_eq!(a.doc_id, b.doc_id);
        assert_eq!(a.doc_id.len(), 16);
    }

    #[test]
    fn test_raw_content_preserved() {
        let pre = Preprocessor::new();
        let text = "The laser[12] was aligned &amp; calibrated with the beam from the source.";
        let result = pre.process(text, Some("x"), None);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].content.contains("laser was aligned & calibrated"));
        assert!(result.chunks[0].raw_content.contains("laser[12]"));
    }

    #[test]
    fn test_metadata_flows_through() {
        let pre = Preprocessor::new();
        let text = "A Study of Things\nby Ada Lovelace\nPublished 1843.\n\
                    The analytical engine weaves algebraic patterns just as the \
                    Jacquard loom weaves flowers and leaves for the mill.";
        let result = pre.process(text, Some("x"), None);
        assert_eq!(result.metadata.author.as_deref(), Some("Ada Lovelace"));
        assert_eq!(result.metadata.year, Some(1843));
    }
}
