//! OpenAlex Adapter
//!
//! Cursor-based pagination over `/works`: the initial cursor is `*`, each
//! response carries `meta.next_cursor`, pages hold 200 records. The
//! `mailto` parameter is mandatory for the polite pool; omitting it lowers
//! throughput.

use async_trait::async_trait;
use serde::Deserialize;

use crate::distill::{Category, Level1Metadata};
use crate::ids::doc_id_from_source;

use super::{user_agent, FetchBatch, HarvestError, HarvestProgress, Result, SourceAdapter};

const API_URL: &str = "https://api.openalex.org/works";
const PER_PAGE: usize = 200;

/// Map an OpenAlex topic field to an internal category. Fixed dictionary;
/// unmapped fields fall through to General.
fn map_field(field: &str) -> Category {
    match field {
        "Physics and Astronomy" => Category::Physics,
        "Chemistry" => Category::Chemistry,
        "Biochemistry, Genetics and Molecular Biology" => Category::Biology,
        "Immunology and Microbiology" => Category::Biology,
        "Agricultural and Biological Sciences" => Category::Agriculture,
        "Medicine" => Category::Medicine,
        "Health Professions" => Category::Medicine,
        "Nursing" => Category::Medicine,
        "Dentistry" => Category::Medicine,
        "Veterinary" => Category::Medicine,
        "Pharmacology, Toxicology and Pharmaceutics" => Category::Medicine,
        "Neuroscience" => Category::Neuroscience,
        "Psychology" => Category::Psychology,
        "Social Sciences" => Category::Sociology,
        "Economics, Econometrics and Finance" => Category::Economics,
        "Business, Management and Accounting" => Category::Business,
        "Decision Sciences" => Category::Statistics,
        "Arts and Humanities" => Category::Art,
        "Computer Science" => Category::ComputerScience,
        "Mathematics" => Category::Mathematics,
        "Engineering" => Category::Engineering,
        "Energy" => Category::Energy,
        "Materials Science" => Category::MaterialsScience,
        "Environmental Science" => Category::Ecology,
        "Earth and Planetary Sciences" => Category::Geology,
        _ => Category::General,
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    meta: Meta,
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    language: Option<String>,
    doi: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_topic: Option<Topic>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    display_name: Option<String>,
    field: Option<TopicField>,
}

#[derive(Debug, Deserialize)]
struct TopicField {
    display_name: Option<String>,
}

/// The OpenAlex works adapter.
pub struct OpenAlexAdapter {
    client: reqwest::Client,
    mailto: String,
}

impl OpenAlexAdapter {
    /// Adapter identifying itself with `mailto` for the polite pool.
    pub fn new(mailto: impl Into<String>) -> Result<Self> {
        let mailto = mailto.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent(&mailto))
            .timeout(super::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, mailto })
    }

    fn map_work(work: Work) -> Option<Level1Metadata> {
        let id = work.id?;
        let title = work.display_name.unwrap_or_default();
        if title.is_empty() {
            return None;
        }

        let author = work
            .authorships
            .iter()
            .filter_map(|a| a.author.as_ref().and_then(|x| x.display_name.clone()))
            .take(3)
            .collect::<Vec<_>>()
            .join(", ");
        let (category, keywords) = match &work.primary_topic {
            Some(topic) => (
                topic
                    .field
                    .as_ref()
                    .and_then(|f| f.display_name.as_deref())
                    .map(map_field)
                    .unwrap_or(Category::General),
                topic.display_name.clone().unwrap_or_default().to_lowercase(),
            ),
            None => (Category::General, String::new()),
        };
        let peer_reviewed = work.work_type.as_deref() == Some("article");

        Some(
            Level1Metadata {
                doc_id: doc_id_from_source(&id),
                title,
                author,
                year: work.publication_year,
                language: work.language.unwrap_or_else(|| "unknown".to_string()),
                category,
                source_type: work.work_type.unwrap_or_else(|| "article".to_string()),
                doi: work.doi,
                keywords,
                reliability: if peer_reviewed { 0.8 } else { 0.6 },
                peer_reviewed,
                origin: "openalex".to_string(),
                url: id,
                ..Default::default()
            }
            .normalized(),
        )
    }
}

#[async_trait]
impl SourceAdapter for OpenAlexAdapter {
    fn name(&self) -> &str {
        "openalex"
    }

    fn batch_size(&self) -> usize {
        PER_PAGE
    }

    async fn fetch_batch(&self, progress: &HarvestProgress) -> Result<FetchBatch> {
        let cursor = progress.cursor.as_deref().unwrap_or("*");

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("per-page", PER_PAGE.to_string().as_str()),
                ("cursor", cursor),
                ("mailto", self.mailto.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(HarvestError::RateLimited("openalex".to_string()));
        }
        if !status.is_success() {
            return Err(HarvestError::Server {
                source_name: "openalex".to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: WorksResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Parse(format!("openalex: {e}")))?;

        let records = parsed.results.into_iter().filter_map(Self::map_work).collect();
        Ok(FetchBatch {
            records,
            next_cursor: parsed.meta.next_cursor,
            next_offset: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_field_dictionary() {
        assert_eq!(map_field("Physics and Astronomy"), Category::Physics);
        assert_eq!(map_field("Computer Science"), Category::ComputerScience);
        assert_eq!(map_field("Something New"), Category::General);
    }

    #[test]
    fn test_map_work() {
        let json = r#"{
            "id": "https://openalex.org/W2741809807",
            "display_name": "The state of OA",
            "publication_year": 2018,
            "language": "en",
            "doi": "https://doi.org/10.7717/PEERJ.4375",
            "type": "article",
            "authorships": [{"author": {"display_name": "Heather Piwowar"}}],
            "primary_topic": {
                "display_name": "Open Access Publishing",
                "field": {"display_name": "Social Sciences"}
            }
        }"#;
        let work: Work = serde_json::from_str(json).unwrap();
        let record = OpenAlexAdapter::map_work(work).unwrap();

        assert_eq!(record.title, "The state of OA");
        assert_eq!(record.author, "Heather Piwowar");
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.category, Category::Sociology);
        assert_eq!(record.doi.as_deref(), Some("10.7717/peerj.4375"));
        assert!(record.peer_reviewed);
        assert_eq!(record.origin, "openalex");
        assert_eq!(record.doc_id.len(), 16);
    }

    #[test]
    fn test_map_work_without_title_dropped() {
        let work: Work = serde_json::from_str(r#"{"id": "https://openalex.org/W1"}"#).unwrap();
        assert!(OpenAlexAdapter::map_work(work).is_none());
    }

    #[test]
    fn test_user_agent_carries_mailto() {
        let ua = user_agent("team@vio83.example");
        assert!(ua.starts_with("VIO83-AI-Orchestra/2.0"));
        assert!(ua.contains("mailto:team@vio83.example"));
    }
}
