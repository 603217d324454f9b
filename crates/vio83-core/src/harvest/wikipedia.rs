//! Wikipedia Adapter
//!
//! Enumerates articles with `list=allpages` (namespace 0, non-redirects,
//! 50 per page) using the `apcontinue` continuation token. Each language
//! instance is its own wiki and is crawled independently under its own
//! progress row.

use async_trait::async_trait;
use serde::Deserialize;

use crate::distill::{Category, Level1Metadata};
use crate::ids::doc_id_from_source;

use super::{user_agent, FetchBatch, HarvestError, HarvestProgress, Result, SourceAdapter};

const PAGE_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct AllPagesResponse {
    #[serde(rename = "continue")]
    continuation: Option<Continuation>,
    query: Option<Query>,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    apcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    allpages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    pageid: u64,
    title: String,
}

/// The Wikipedia allpages adapter for one language instance.
pub struct WikipediaAdapter {
    client: reqwest::Client,
    language: String,
    source_name: String,
}

impl WikipediaAdapter {
    /// Adapter for one language wiki ("en", "it", ...).
    pub fn new(language: impl Into<String>, mailto: &str) -> Result<Self> {
        let language = language.into();
        let source_name = if language == "en" {
            "wikipedia".to_string()
        } else {
            format!("wikipedia_{language}")
        };
        let client = reqwest::Client::builder()
            .user_agent(user_agent(mailto))
            .timeout(super::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            language,
            source_name,
        })
    }

    fn api_url(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.language)
    }

    fn map_page(&self, page: Page) -> Level1Metadata {
        let url = format!(
            "https://{}.wikipedia.org/wiki/{}",
            self.language,
            page.title.replace(' ', "_")
        );
        Level1Metadata {
            doc_id: doc_id_from_source(&format!("wikipedia:{}:{}", self.language, page.pageid)),
            title: page.title,
            language: self.language.clone(),
            category: Category::Reference,
            source_type: "encyclopedia".to_string(),
            reliability: 0.7,
            origin: "wikipedia".to_string(),
            url,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceAdapter for WikipediaAdapter {
    fn name(&self) -> &str {
        &self.source_name
    }

    fn batch_size(&self) -> usize {
        PAGE_LIMIT
    }

    async fn fetch_batch(&self, progress: &HarvestProgress) -> Result<FetchBatch> {
        let limit = PAGE_LIMIT.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("list", "allpages"),
            ("aplimit", limit.as_str()),
            ("apnamespace", "0"),
            ("apfilterredir", "nonredirects"),
            ("format", "json"),
        ];
        if let Some(cursor) = progress.cursor.as_deref() {
            query.push(("apcontinue", cursor));
        }

        let response = self.client.get(self.api_url()).query(&query).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(HarvestError::RateLimited(self.source_name.clone()));
        }
        if !status.is_success() {
            return Err(HarvestError::Server {
                source_name: self.source_name.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: AllPagesResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Parse(format!("wikipedia: {e}")))?;

        let records = parsed
            .query
            .map(|q| q.allpages.into_iter().map(|p| self.map_page(p)).collect())
            .unwrap_or_default();
        let next_cursor = parsed.continuation.and_then(|c| c.apcontinue);

        Ok(FetchBatch {
            records,
            next_cursor,
            next_offset: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_per_language() {
        let en = WikipediaAdapter::new("en", "team@vio83.example").unwrap();
        let it = WikipediaAdapter::new("it", "team@vio83.example").unwrap();
        assert_eq!(en.name(), "wikipedia");
        assert_eq!(it.name(), "wikipedia_it");
    }

    #[test]
    fn test_map_page() {
        let adapter = WikipediaAdapter::new("it", "team@vio83.example").unwrap();
        let record = adapter.map_page(Page {
            pageid: 12345,
            title: "Galileo Galilei".to_string(),
        });

        assert_eq!(record.title, "Galileo Galilei");
        assert_eq!(record.language, "it");
        assert_eq!(record.origin, "wikipedia");
        assert_eq!(record.url, "https://it.wikipedia.org/wiki/Galileo_Galilei");
        assert_eq!(record.doc_id.len(), 16);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "continue": {"apcontinue": "Bologna", "continue": "-||"},
            "query": {"allpages": [
                {"pageid": 1, "ns": 0, "title": "Anzio"},
                {"pageid": 2, "ns": 0, "title": "Bari"}
            ]}
        }"#;
        let parsed: AllPagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.query.unwrap().allpages.len(), 2);
        assert_eq!(
            parsed.continuation.unwrap().apcontinue.as_deref(),
            Some("Bologna")
        );
    }
}
