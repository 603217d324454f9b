//! JSON / JSONL / CSV Extraction
//!
//! Structured formats carry prose under conventional keys. JSON objects
//! contribute the values of a fixed set of text-like keys; arrays are
//! iterated. CSV rows are joined with `" | "`, keeping only fields long
//! enough to be prose.

use serde_json::Value;

use super::text::extract_text;
use super::{ExtractError, Result};

/// Keys whose string values count as document text, in priority order.
const TEXT_KEYS: &[&str] = &[
    "title",
    "content",
    "body",
    "abstract",
    "description",
    "summary",
    "passage",
    "context",
    "question",
    "answer",
];

/// Minimum field length for CSV prose fields.
const CSV_MIN_FIELD_LEN: usize = 20;

/// Extract text from JSON or JSONL bytes.
pub fn extract_json(bytes: &[u8]) -> Result<String> {
    let raw = extract_text(bytes)?;

    let mut out = String::new();
    if let Ok(value) = serde_json::from_str::<Value>(&raw) {
        walk(&value, &mut out);
    } else {
        // JSONL: one object per line
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<Value>(line) {
                walk(&value, &mut out);
            }
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        Err(ExtractError::Failure {
            format: "json".to_string(),
            reason: "no text-like keys found".to_string(),
        })
    } else {
        Ok(trimmed.to_string())
    }
}

fn walk(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for key in TEXT_KEYS {
                if let Some(Value::String(text)) = map.get(*key) {
                    if !text.trim().is_empty() {
                        out.push_str(text.trim());
                        out.push('\n');
                    }
                }
            }
            // Nested containers may hold further records
            for (key, nested) in map {
                if matches!(nested, Value::Object(_) | Value::Array(_))
                    && !TEXT_KEYS.contains(&key.as_str())
                {
                    walk(nested, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        _ => {}
    }
}

/// Extract text from CSV bytes.
pub fn extract_csv(bytes: &[u8]) -> Result<String> {
    let raw = extract_text(bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Failure {
            format: "csv".to_string(),
            reason: format!("parse error: {e}"),
        })?;
        let fields: Vec<&str> = record
            .iter()
            .map(str::trim)
            .filter(|f| f.len() > CSV_MIN_FIELD_LEN)
            .collect();
        if !fields.is_empty() {
            rows.push(fields.join(" | "));
        }
    }

    if rows.is_empty() {
        Err(ExtractError::Failure {
            format: "csv".to_string(),
            reason: "no prose fields found".to_string(),
        })
    } else {
        Ok(rows.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object() {
        let json = br#"{"title": "A paper", "abstract": "It is about things.", "year": 2001}"#;
        let text = extract_json(json).unwrap();
        assert!(text.contains("A paper"));
        assert!(text.contains("It is about things."));
        assert!(!text.contains("2001"));
    }

    #[test]
    fn test_json_array() {
        let json = br#"[{"content": "first record text"}, {"content": "second record text"}]"#;
        let text = extract_json(json).unwrap();
        assert!(text.contains("first record text"));
        assert!(text.contains("second record text"));
    }

    #[test]
    fn test_jsonl() {
        let jsonl = b"{\"question\": \"What is distillation?\"}\n{\"answer\": \"Keeping the knowledge, dropping the bulk.\"}";
        let text = extract_json(jsonl).unwrap();
        assert!(text.contains("What is distillation?"));
        assert!(text.contains("dropping the bulk"));
    }

    #[test]
    fn test_json_without_text_keys() {
        assert!(extract_json(br#"{"a": 1, "b": [2, 3]}"#).is_err());
    }

    #[test]
    fn test_csv_keeps_long_fields() {
        let csv = b"id,note\n1,a tiny field\n2,this field is long enough to keep around";
        let text = extract_csv(csv).unwrap();
        assert!(text.contains("long enough to keep"));
        assert!(!text.contains("a tiny field"));
    }

    #[test]
    fn test_csv_row_join() {
        let csv =
            b"the first column is a long sentence,the second column is also long enough here";
        let text = extract_csv(csv).unwrap();
        assert!(text.contains(" | "));
    }
}
