//! Crossref Adapter
//!
//! Cursor-based pagination over `/works`: `cursor=*` on the first call,
//! then the server-provided `next-cursor` verbatim, 100 rows per page.
//! Offset paging exists but is capped at the 10 000th record server-side,
//! so this adapter pages by cursor end-to-end and never falls back to
//! offsets for deep crawls.

use async_trait::async_trait;
use serde::Deserialize;

use crate::distill::{Category, Level1Metadata};
use crate::ids::doc_id_from_source;

use super::{user_agent, FetchBatch, HarvestError, HarvestProgress, Result, SourceAdapter};

const API_URL: &str = "https://api.crossref.org/works";
const ROWS: usize = 100;

/// Server-side ceiling for offset paging; kept as documentation of why the
/// adapter is cursor-only.
pub const OFFSET_PAGING_CEILING: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(rename = "next-cursor")]
    next_cursor: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    publisher: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    #[serde(rename = "ISSN", default)]
    issn: Vec<String>,
    issued: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

/// The Crossref works adapter.
pub struct CrossrefAdapter {
    client: reqwest::Client,
    mailto: String,
}

impl CrossrefAdapter {
    /// Adapter identifying itself with `mailto` for the polite pool.
    pub fn new(mailto: impl Into<String>) -> Result<Self> {
        let mailto = mailto.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent(&mailto))
            .timeout(super::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, mailto })
    }

    fn map_item(item: Item) -> Option<Level1Metadata> {
        let doi = item.doi?;
        let title = item.title.into_iter().next().unwrap_or_default();
        if title.is_empty() {
            return None;
        }

        let author = item
            .author
            .iter()
            .take(3)
            .map(|a| {
                match (&a.given, &a.family) {
                    (Some(given), Some(family)) => format!("{given} {family}"),
                    (None, Some(family)) => family.clone(),
                    (Some(given), None) => given.clone(),
                    (None, None) => String::new(),
                }
            })
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let year = item
            .issued
            .and_then(|d| d.date_parts.into_iter().next())
            .and_then(|parts| parts.into_iter().next())
            .flatten();
        let peer_reviewed = item.item_type.as_deref() == Some("journal-article");

        Some(
            Level1Metadata {
                doc_id: doc_id_from_source(&doi),
                title,
                author,
                year,
                category: Category::General,
                source_type: item.item_type.unwrap_or_else(|| "journal-article".to_string()),
                issn: item.issn.into_iter().next(),
                publisher: item.publisher.unwrap_or_default(),
                reliability: if peer_reviewed { 0.8 } else { 0.6 },
                peer_reviewed,
                origin: "crossref".to_string(),
                url: format!("https://doi.org/{doi}"),
                doi: Some(doi),
                ..Default::default()
            }
            .normalized(),
        )
    }
}

#[async_trait]
impl SourceAdapter for CrossrefAdapter {
    fn name(&self) -> &str {
        "crossref"
    }

    fn batch_size(&self) -> usize {
        ROWS
    }

    async fn fetch_batch(&self, progress: &HarvestProgress) -> Result<FetchBatch> {
        let cursor = progress.cursor.as_deref().unwrap_or("*");

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("rows", ROWS.to_string().as_str()),
                ("cursor", cursor),
                ("mailto", self.mailto.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(HarvestError::RateLimited("crossref".to_string()));
        }
        if !status.is_success() {
            return Err(HarvestError::Server {
                source_name: "crossref".to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: CrossrefResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Parse(format!("crossref: {e}")))?;

        let records: Vec<Level1Metadata> = parsed
            .message
            .items
            .into_iter()
            .filter_map(Self::map_item)
            .collect();
        // An empty page with a live cursor still ends the feed
        let next_cursor = if records.is_empty() {
            None
        } else {
            parsed.message.next_cursor
        };

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
    fn test_map_item() {
        let json = r#"{
            "DOI": "10.1037/0003-066X.59.1.29",
            "title": ["How the Mind Works"],
            "author": [{"given": "Steven", "family": "Pinker"}],
            "publisher": "APA",
            "type": "journal-article",
            "ISSN": ["0003-066X"],
            "issued": {"date-parts": [[2004, 1]]}
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        let record = CrossrefAdapter::map_item(item).unwrap();

        assert_eq!(record.title, "How the Mind Works");
        assert_eq!(record.author, "Steven Pinker");
        assert_eq!(record.year, Some(2004));
        assert_eq!(record.doi.as_deref(), Some("10.1037/0003-066x.59.1.29"));
        assert_eq!(record.issn.as_deref(), Some("0003-066X"));
        assert!(record.peer_reviewed);
        assert_eq!(record.origin, "crossref");
    }

    #[test]
    fn test_map_item_without_doi_dropped() {
        let item: Item = serde_json::from_str(r#"{"title": ["No DOI"]}"#).unwrap();
        assert!(CrossrefAdapter::map_item(item).is_none());
    }

    #[test]
    fn test_offset_ceiling_documented() {
        assert_eq!(OFFSET_PAGING_CEILING, 10_000);
    }
}
