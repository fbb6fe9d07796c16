//! Opaque query object forwarded to the persistence collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Filtering, field selection and paging for collaborator reads.
///
/// The lifecycle service never interprets `filter` or `sort`; it only makes sure
/// the fields it needs are selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Query {
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: Some(fields.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Returns a copy whose field selection includes `required`.
    ///
    /// A query without a field list, or with `*`, already selects everything.
    pub fn ensure_fields(&self, required: &[&str]) -> Self {
        let mut query = self.clone();
        if let Some(fields) = query.fields.as_mut() {
            if !fields.iter().any(|f| f == "*") {
                for field in required {
                    if !fields.iter().any(|f| f == field) {
                        fields.push((*field).to_string());
                    }
                }
            }
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_fields_adds_missing() {
        let query = Query::with_fields(["title"]).ensure_fields(&["id", "title", "storage"]);
        assert_eq!(
            query.fields,
            Some(vec!["title".to_string(), "id".to_string(), "storage".to_string()])
        );
    }

    #[test]
    fn test_ensure_fields_leaves_open_selection_alone() {
        assert_eq!(Query::default().ensure_fields(&["id"]).fields, None);
        let star = Query::with_fields(["*"]).ensure_fields(&["id"]);
        assert_eq!(star.fields, Some(vec!["*".to_string()]));
    }
}
