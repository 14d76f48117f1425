//! Materializes raw engine responses into typed results.
//!
//! Search responses become a [`Page`] of decoded entities with highlight
//! fragments merged back into their fields; suggest responses become an
//! ordered, de-duplicated list of non-blank strings; bulk responses become
//! per-item failure detail.
//!
//! Row-level decode failures abort the whole page. A row is never dropped
//! silently.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::DocumentCodec;
use crate::error::{BulkItemFailure, CodecError, RepositoryResult};

/// One page of query results.
///
/// `total` is the engine's reported hit count and may exceed
/// `content.len()` when the query asked for fewer rows than matched.
/// An empty page with `total == 0` is a successful result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Engine-reported total hit count for the query.
    pub total: u64,
    /// Decoded entities for this page, in hit order.
    pub content: Vec<T>,
}

impl<T> Page<T> {
    /// A page with the given total and content.
    pub fn new(total: u64, content: Vec<T>) -> Self {
        Self { total, content }
    }

    /// The zero-hit page.
    pub fn empty() -> Self {
        Self {
            total: 0,
            content: Vec::new(),
        }
    }

    /// Whether this page carries no rows.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Decodes a search response body into a page of entities.
///
/// For each hit, the `_source` payload is decoded via the codec; when the
/// hit carries highlighted fragments, each highlighted field's fragments
/// are joined with an empty separator into one string and written over the
/// decoded entity's field. Highlight field names are engine-assigned; a
/// name unknown to the entity is a codec error for that row, which fails
/// the page.
pub fn page_from_response<T>(
    codec: &DocumentCodec<T>,
    body: &Value,
) -> RepositoryResult<Page<T>>
where
    T: Serialize + DeserializeOwned + 'static,
{
    let hits_envelope = body.get("hits");

    let total = hits_envelope
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let hits = hits_envelope
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut content = Vec::with_capacity(hits.len());
    for hit in &hits {
        let source = hit.get("_source").cloned().ok_or_else(|| {
            CodecError::Decode {
                message: "search hit carries no _source".to_string(),
            }
        })?;
        let mut entity = codec.decode(source)?;

        if let Some(highlight) = hit.get("highlight").and_then(Value::as_object) {
            for (field, fragments) in highlight {
                let joined = join_fragments(fragments);
                codec.merge_field(&mut entity, field, &joined)?;
            }
        }

        content.push(entity);
    }

    Ok(Page::new(total, content))
}

/// Joins a highlighted field's fragments with an empty separator.
fn join_fragments(fragments: &Value) -> String {
    fragments
        .as_array()
        .map(|arr| arr.iter().filter_map(Value::as_str).collect::<String>())
        .unwrap_or_default()
}

/// Flattens a suggest response into an ordered list of suggestion texts.
///
/// Options are taken across all suggestion groups in response order.
/// Blank or whitespace-only texts are dropped; exact duplicate texts are
/// collapsed to their first occurrence (case-sensitive, so `"John"` and
/// `"john"` are distinct); the list is capped at `cap` entries.
pub fn suggestions_from_response(body: &Value, cap: usize) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();

    let groups = match body.get("suggest").and_then(Value::as_object) {
        Some(groups) => groups,
        None => return suggestions,
    };

    for entries in groups.values() {
        let entries = match entries.as_array() {
            Some(entries) => entries,
            None => continue,
        };
        for entry in entries {
            let options = match entry.get("options").and_then(Value::as_array) {
                Some(options) => options,
                None => continue,
            };
            for option in options {
                let text = match option.get("text").and_then(Value::as_str) {
                    Some(text) => text,
                    None => continue,
                };
                if text.trim().is_empty() {
                    continue;
                }
                if suggestions.iter().any(|seen| seen == text) {
                    continue;
                }
                suggestions.push(text.to_string());
                if suggestions.len() >= cap {
                    return suggestions;
                }
            }
        }
    }

    suggestions
}

/// Extracts item-level failure detail from a bulk response body.
///
/// Returns one entry per failed item; an empty list means every item
/// succeeded.
pub fn bulk_failures_from_response(body: &Value) -> Vec<BulkItemFailure> {
    let items = match body.get("items").and_then(Value::as_array) {
        Some(items) => items,
        None => return Vec::new(),
    };

    let mut failures = Vec::new();
    for item in items {
        // Each item is keyed by its action ("index", "create", ...).
        let result = match item.as_object().and_then(|o| o.values().next()) {
            Some(result) => result,
            None => continue,
        };
        let error = match result.get("error") {
            Some(error) => error,
            None => continue,
        };

        failures.push(BulkItemFailure {
            id: result
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: result
                .get("status")
                .and_then(Value::as_u64)
                .unwrap_or(500) as u16,
            reason: error
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown bulk failure")
                .to_string(),
        });
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntityDescriptor, EntityMetadata, FieldMetadata};
    use crate::error::RepositoryError;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct BlogPost {
        id: Option<u64>,
        title: String,
    }

    fn codec() -> DocumentCodec<BlogPost> {
        let metadata = EntityMetadata {
            type_name: "BlogPost",
            index: None,
            fields: const { &[FieldMetadata::id("id"), FieldMetadata::new("title")] },
        };
        DocumentCodec::new(Arc::new(
            EntityDescriptor::describe(&metadata).unwrap(),
        ))
    }

    fn search_response() -> Value {
        json!({
            "hits": {
                "total": { "value": 11, "relation": "eq" },
                "hits": [
                    {
                        "_id": "1",
                        "_source": { "id": 1, "title": "Go systems" },
                        "highlight": {
                            "title": ["<em>Go</em>", " systems"]
                        }
                    },
                    {
                        "_id": "2",
                        "_source": { "id": 2, "title": "Rust in practice" }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_page_merges_highlight_fragments() {
        let page = page_from_response(&codec(), &search_response()).unwrap();
        assert_eq!(page.total, 11);
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[0].title, "<em>Go</em> systems");
        assert_eq!(page.content[1].title, "Rust in practice");
    }

    #[test]
    fn test_total_may_exceed_content_length() {
        let page = page_from_response(&codec(), &search_response()).unwrap();
        assert!(page.total as usize > page.content.len());
    }

    #[test]
    fn test_empty_response_is_an_empty_page() {
        let body = json!({
            "hits": { "total": { "value": 0 }, "hits": [] }
        });
        let page = page_from_response(&codec(), &body).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.is_empty());
    }

    #[test]
    fn test_row_decode_failure_fails_the_page() {
        let body = json!({
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    { "_source": { "id": 1, "title": "ok" } },
                    { "_source": { "id": "not-a-number", "title": "bad" } }
                ]
            }
        });
        let err = page_from_response(&codec(), &body).unwrap_err();
        assert!(matches!(err, RepositoryError::Codec(_)));
    }

    #[test]
    fn test_unknown_highlight_field_fails_the_page() {
        let body = json!({
            "hits": {
                "total": { "value": 1 },
                "hits": [
                    {
                        "_source": { "id": 1, "title": "ok" },
                        "highlight": { "summary": ["<em>x</em>"] }
                    }
                ]
            }
        });
        let err = page_from_response(&codec(), &body).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Codec(CodecError::UnknownField { .. })
        ));
    }

    fn suggest_response(texts: &[&str]) -> Value {
        let options: Vec<Value> = texts.iter().map(|t| json!({ "text": t })).collect();
        json!({
            "suggest": {
                "suggestions": [
                    { "text": "jo", "offset": 0, "length": 2, "options": options }
                ]
            }
        })
    }

    #[test]
    fn test_suggestions_drop_blanks_and_exact_duplicates() {
        let body = suggest_response(&["John", "john", "Jordan", "", "John", "  "]);
        let suggestions = suggestions_from_response(&body, 30);
        // Case-sensitive: "john" is distinct from "John".
        assert_eq!(suggestions, vec!["John", "john", "Jordan"]);
    }

    #[test]
    fn test_suggestions_capped_at_requested_size() {
        let body = suggest_response(&["a", "b", "c", "d", "e"]);
        let suggestions = suggestions_from_response(&body, 3);
        assert_eq!(suggestions, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_suggestions_flatten_all_groups() {
        let body = json!({
            "suggest": {
                "by_name": [ { "options": [ { "text": "John" } ] } ],
                "by_alias": [ { "options": [ { "text": "Jordan" }, { "text": "John" } ] } ]
            }
        });
        let mut suggestions = suggestions_from_response(&body, 30);
        suggestions.sort();
        assert_eq!(suggestions, vec!["John", "Jordan"]);
    }

    #[test]
    fn test_suggestions_missing_section_is_empty() {
        assert!(suggestions_from_response(&json!({}), 30).is_empty());
    }

    #[test]
    fn test_bulk_failures_carry_item_detail() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 409,
                             "error": { "type": "version_conflict_engine_exception",
                                        "reason": "version conflict, current [3]" } } },
                { "index": { "_id": "3", "status": 200 } }
            ]
        });
        let failures = bulk_failures_from_response(&body);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id.as_deref(), Some("2"));
        assert_eq!(failures[0].status, 409);
        assert!(failures[0].reason.contains("version conflict"));
    }

    #[test]
    fn test_bulk_without_failures_is_empty() {
        let body = json!({
            "errors": false,
            "items": [ { "index": { "_id": "1", "status": 201 } } ]
        });
        assert!(bulk_failures_from_response(&body).is_empty());
    }
}
