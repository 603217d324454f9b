//! Document Identity
//!
//! Document ids are 16 hex chars derived from a stable hash of the source
//! identity (DOI, API id, absolute path). Re-ingesting the same source
//! yields the same id; collisions are treated as updates.

/// Derive a 16-hex-char document id from a source identity string.
pub fn doc_id_from_source(source: &str) -> String {
    let digest = md5::compute(source.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable() {
        let a = doc_id_from_source("https://openalex.org/W2741809807");
        let b = doc_id_from_source("https://openalex.org/W2741809807");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_sources() {
        assert_ne!(
            doc_id_from_source("10.1000/a"),
            doc_id_from_source("10.1000/b")
        );
    }
}
