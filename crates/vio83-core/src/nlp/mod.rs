//! NLP Pipeline
//!
//! Level-selected text analysis: entities, keywords, extractive summary,
//! sentiment, counts. Three strengths exist; the pipeline picks the
//! strongest available at construction and falls back silently per call:
//!
//! - **Level 1 (regex)** - bounded-regex entities, TF keywords
//! - **Level 2 (stemmed)** - stem-normalized keywords, chunked NE tagger
//! - **Level 3 (model)** - entities from a trained [`NerModel`], resolved
//!   per language with a multilingual fallback
//!
//! Output is not bit-identical across levels; callers get whatever the
//! strongest working level produces.

pub(crate) mod lexicons;
pub(crate) mod regex_level;
pub(crate) mod stem_level;

pub use lexicons::{score_sentiment, SentimentLabel};
pub use regex_level::{extract_entities, extract_keywords, split_sentences, summarize};
pub use stem_level::{extract_entities_chunked, extract_keywords_stemmed};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::preprocess::{clean_text, detect_language, CleanOptions};

/// Keywords returned per analysis.
const KEYWORD_LIMIT: usize = 10;

/// Summary budget in sentences / characters.
const SUMMARY_SENTENCES: usize = 3;
const SUMMARY_MAX_CHARS: usize = 500;

// ============================================================================
// TYPES
// ============================================================================

/// A named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Surface form
    pub name: String,
    /// Entity type tag (PERSON, ORG, DATE, ...)
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// Analysis strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLevel {
    /// Bounded regex extraction
    Regex = 1,
    /// Stem-normalized keywords, chunked NE tagger
    Stemmed = 2,
    /// Trained NER model
    Model = 3,
}

/// Everything `analyze` produces for one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlpResult {
    /// Cleaned text the analysis ran on
    pub cleaned: String,
    /// Detected language code
    pub language: String,
    /// Detection confidence in [0, 1]
    pub language_confidence: f32,
    /// Named entities
    pub entities: Vec<Entity>,
    /// Ranked keywords, at most ten
    pub keywords: Vec<String>,
    /// Extractive summary, at most 500 chars
    pub summary: String,
    /// Sentiment in [-1, 1]
    pub sentiment_score: f32,
    /// positive / negative / neutral
    pub sentiment_label: SentimentLabel,
    /// Whitespace-separated words
    pub word_count: usize,
    /// Sentences found by the splitter
    pub sentence_count: usize,
    /// Coarse topics (top keywords)
    pub topics: Vec<String>,
    /// Level that actually produced the result
    pub level: AnalysisLevel,
}

// ============================================================================
// MODEL SEAM (LEVEL 3)
// ============================================================================

/// A trained NER model plugged in from outside the crate.
pub trait NerModel: Send + Sync {
    /// Model identifier, e.g. "xx_ent_wiki_sm"
    fn name(&self) -> &str;
    /// Extract entities; an `Err` makes the pipeline fall back a level for
    /// this call.
    fn entities(&self, text: &str) -> std::result::Result<Vec<Entity>, String>;
}

/// Registry of NER models by name, with per-language resolution.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn NerModel>>,
}

/// Preferred model names per language, strongest first.
fn language_model_names(language: &str) -> &'static [&'static str] {
    match language {
        "en" => &["en_core_web_lg", "en_core_web_sm"],
        "it" => &["it_core_news_lg", "it_core_news_sm"],
        "fr" => &["fr_core_news_sm"],
        "de" => &["de_core_news_sm"],
        "es" => &["es_core_news_sm"],
        "pt" => &["pt_core_news_sm"],
        _ => &[],
    }
}

/// Name of the multilingual fallback model.
const MULTILINGUAL_MODEL: &str = "xx_ent_wiki_sm";

impl ModelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name.
    pub fn register(&mut self, model: Arc<dyn NerModel>) {
        self.models.insert(model.name().to_string(), model);
    }

    /// Resolve the best model for a language: the per-language list first,
    /// then the multilingual model.
    pub fn resolve(&self, language: &str) -> Option<Arc<dyn NerModel>> {
        for name in language_model_names(language) {
            if let Some(model) = self.models.get(*name) {
                return Some(Arc::clone(model));
            }
        }
        self.models.get(MULTILINGUAL_MODEL).map(Arc::clone)
    }

    /// Whether any model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// The level-selecting NLP pipeline.
pub struct NlpPipeline {
    level: AnalysisLevel,
    models: ModelRegistry,
    clean_options: CleanOptions,
}

impl Default for NlpPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl NlpPipeline {
    /// Pipeline without trained models: level 2 is the strongest available.
    pub fn new() -> Self {
        Self {
            level: AnalysisLevel::Stemmed,
            models: ModelRegistry::new(),
            clean_options: CleanOptions::default(),
        }
    }

    /// Pipeline with a model registry; selects level 3 when the registry is
    /// non-empty.
    pub fn with_models(models: ModelRegistry) -> Self {
        let level = if models.is_empty() {
            AnalysisLevel::Stemmed
        } else {
            AnalysisLevel::Model
        };
        Self {
            level,
            models,
            clean_options: CleanOptions::default(),
        }
    }

    /// The strongest level this pipeline will attempt.
    pub fn level(&self) -> AnalysisLevel {
        self.level
    }

    /// Analyze a text at the strongest level available, falling back
    /// silently on per-call failure.
    pub fn analyze(&self, text: &str) -> NlpResult {
        let cleaned = clean_text(text, &self.clean_options);
        let detected = detect_language(&cleaned);
        let language = detected.code.clone();

        let (entities, keywords, level) = self.entities_and_keywords(&cleaned, &language);

        let summary = summarize(&cleaned, SUMMARY_SENTENCES, SUMMARY_MAX_CHARS);
        let lower = cleaned.to_lowercase();
        let (sentiment_score, sentiment_label) = score_sentiment(lower.split_whitespace());
        let word_count = cleaned.split_whitespace().count();
        let sentence_count = split_sentences(&cleaned).len();
        let topics = keywords.iter().take(3).cloned().collect();

        NlpResult {
            cleaned,
            language,
            language_confidence: detected.confidence,
            entities,
            keywords,
            summary,
            sentiment_score,
            sentiment_label,
            word_count,
            sentence_count,
            topics,
            level,
        }
    }

    fn entities_and_keywords(
        &self,
        cleaned: &str,
        language: &str,
    ) -> (Vec<Entity>, Vec<String>, AnalysisLevel) {
        if self.level >= AnalysisLevel::Model {
            if let Some(model) = self.models.resolve(language) {
                match model.entities(cleaned) {
                    Ok(entities) => {
                        let keywords =
                            extract_keywords_stemmed(cleaned, language, KEYWORD_LIMIT);
                        return (entities, keywords, AnalysisLevel::Model);
                    }
                    Err(e) => {
                        tracing::debug!(model = model.name(), "NER model failed, falling back: {e}");
                    }
                }
            }
        }

        if self.level >= AnalysisLevel::Stemmed {
            let entities = extract_entities_chunked(cleaned);
            let keywords = extract_keywords_stemmed(cleaned, language, KEYWORD_LIMIT);
            if !entities.is_empty() || !keywords.is_empty() {
                return (entities, keywords, AnalysisLevel::Stemmed);
            }
        }

        (
            extract_entities(cleaned),
            extract_keywords(cleaned, language, KEYWORD_LIMIT),
            AnalysisLevel::Regex,
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_basic() {
        let pipeline = NlpPipeline::new();
        let result = pipeline.analyze(
            "The excellent experiment was led by Lise Meitner. The results of the \
             experiment were significant and the experiment is considered robust.",
        );

        assert_eq!(result.language, "en");
        assert!(result.entities.iter().any(|e| e.name == "Lise Meitner"));
        assert!(result.keywords.contains(&"experiment".to_string()));
        assert!(!result.summary.is_empty());
        assert_eq!(result.sentiment_label, SentimentLabel::Positive);
        assert!(result.word_count > 10);
        assert!(result.sentence_count >= 2);
        assert_eq!(result.level, AnalysisLevel::Stemmed);
    }

    #[test]
    fn test_keyword_cap() {
        let pipeline = NlpPipeline::new();
        let text: String = (0..50).map(|i| format!("uniqueword{i} ")).collect();
        let result = pipeline.analyze(&text);
        assert!(result.keywords.len() <= 10);
    }

    #[test]
    fn test_empty_text() {
        let pipeline = NlpPipeline::new();
        let result = pipeline.analyze("");
        assert_eq!(result.language, "unknown");
        assert!(result.entities.is_empty());
        assert_eq!(result.word_count, 0);
    }

    struct FailingModel;
    impl NerModel for FailingModel {
        fn name(&self) -> &str {
            "en_core_web_sm"
        }
        fn entities(&self, _text: &str) -> std::result::Result<Vec<Entity>, String> {
            Err("model exploded".to_string())
        }
    }

    struct StubModel;
    impl NerModel for StubModel {
        fn name(&self) -> &str {
            "en_core_web_sm"
        }
        fn entities(&self, _text: &str) -> std::result::Result<Vec<Entity>, String> {
            Ok(vec![Entity {
                name: "Stub Entity".to_string(),
                entity_type: "ORG".to_string(),
            }])
        }
    }

    #[test]
    fn test_model_level_selected() {
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(StubModel));
        let pipeline = NlpPipeline::with_models(registry);
        assert_eq!(pipeline.level(), AnalysisLevel::Model);

        let result = pipeline.analyze("The analysis uses the model for the english text today.");
        assert_eq!(result.level, AnalysisLevel::Model);
        assert_eq!(result.entities[0].name, "Stub Entity");
    }

    #[test]
    fn test_model_failure_falls_back() {
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(FailingModel));
        let pipeline = NlpPipeline::with_models(registry);
        assert_eq!(pipeline.level(), AnalysisLevel::Model);

        let result = pipeline.analyze(
            "The model has failed but the pipeline keeps working on the english text.",
        );
        assert!(result.level < AnalysisLevel::Model);
    }

    #[test]
    fn test_multilingual_fallback_resolution() {
        struct Multi;
        impl NerModel for Multi {
            fn name(&self) -> &str {
                MULTILINGUAL_MODEL
            }
            fn entities(&self, _t: &str) -> std::result::Result<Vec<Entity>, String> {
                Ok(vec![])
            }
        }
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(Multi));
        // A language with no dedicated model resolves to the multilingual one
        assert!(registry.resolve("fr").is_some());
    }
}
