//! Normalized response envelope
//!
//! The remote API answers in one of three shapes: a flat object, a HAL-style
//! collection (`_embedded` plus `_links`), or an error object carrying
//! `code`/`message`/`details`/`correlationId`. Everything in this module is a
//! pure function over `serde_json::Value` that folds those shapes into
//! [`NormalizedResult`], the only shape callers ever see.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::tenant::TenantContext;

/// Pagination metadata lifted from a collection response.
///
/// Cursor links are carried through opaquely; nothing here parses them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub count: u64,
    pub page_size: u64,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
}

/// Structured error payload returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<Value>,
    pub correlation_id: Option<String>,
}

/// Uniform result envelope for every gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantContext>,
}

impl NormalizedResult {
    /// Attach the tenant the call was made against
    pub fn with_tenant(mut self, tenant: TenantContext) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Build a failed envelope from an error payload
    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            success: false,
            item: None,
            items: None,
            pagination: None,
            error: Some(error),
            tenant: None,
        }
    }

    /// Items of a list result, or an empty slice
    pub fn items(&self) -> &[Value] {
        self.items.as_deref().unwrap_or(&[])
    }
}

/// Extract the item list from a response body.
///
/// Looks at `_embedded` first (the first array it holds, in document order),
/// then at a bare array body, then at a top-level `items` array.
pub fn extract_items(body: &Value) -> Vec<Value> {
    if let Some(embedded) = body.get("_embedded").and_then(Value::as_object) {
        if let Some((key, list)) = embedded.iter().find_map(|(k, v)| v.as_array().map(|a| (k, a))) {
            debug!(collection = %key, count = list.len(), "Found embedded collection");
            return list.clone();
        }
    }

    if let Some(list) = body.as_array() {
        return list.clone();
    }

    if let Some(list) = body.get("items").and_then(Value::as_array) {
        return list.clone();
    }

    debug!("No embedded data found in response");
    Vec::new()
}

/// `_links.<rel>.href`, if present and a string
fn link_href(body: &Value, rel: &str) -> Option<String> {
    body.get("_links")
        .and_then(|links| links.get(rel))
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract pagination metadata from a collection response
pub fn extract_pagination(body: &Value) -> Pagination {
    let next_url = link_href(body, "next");

    Pagination {
        count: body.get("count").and_then(Value::as_u64).unwrap_or(0),
        page_size: body.get("size").and_then(Value::as_u64).unwrap_or(0),
        has_next: next_url.is_some(),
        next_url,
        self_url: link_href(body, "self"),
    }
}

/// Next-page URL of a collection response
pub fn next_page_url(body: &Value) -> Option<String> {
    link_href(body, "next")
}

/// Extract structured error info.
///
/// Any object carrying a `code` or `message` key is treated as an error
/// envelope.
pub fn extract_error(body: &Value) -> Option<ErrorInfo> {
    let obj = body.as_object()?;
    if !obj.contains_key("code") && !obj.contains_key("message") {
        return None;
    }

    let text = |key: &str| {
        obj.get(key).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    };

    Some(ErrorInfo {
        code: text("code"),
        message: text("message"),
        details: obj
            .get("details")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        correlation_id: text("correlationId"),
    })
}

/// Normalize a paginated list response
pub fn normalize_list(body: &Value) -> NormalizedResult {
    let error = extract_error(body);

    NormalizedResult {
        success: error.is_none(),
        item: None,
        items: Some(extract_items(body)),
        pagination: Some(extract_pagination(body)),
        error,
        tenant: None,
    }
}

/// Normalize a single-resource response
pub fn normalize_single(body: &Value) -> NormalizedResult {
    let error = extract_error(body);

    NormalizedResult {
        success: error.is_none(),
        item: if error.is_none() && !body.is_null() {
            Some(body.clone())
        } else {
            None
        },
        items: None,
        pagination: None,
        error,
        tenant: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_items_from_embedded() {
        let body = json!({
            "_embedded": {"widgets": [{"id": 1}, {"id": 2}]},
            "_links": {"next": {"href": "https://api.example.com/widgets?cursor=abc"}}
        });
        let items = extract_items(&body);
        assert_eq!(items, vec![json!({"id": 1}), json!({"id": 2})]);
        assert!(extract_pagination(&body).has_next);
    }

    #[test]
    fn test_extract_items_first_list_in_document_order() {
        let body = json!({
            "_embedded": {"meta": {"a": 1}, "zebras": [{"id": "z"}], "apples": [{"id": "a"}]}
        });
        assert_eq!(extract_items(&body), vec![json!({"id": "z"})]);
    }

    #[test]
    fn test_extract_items_fallbacks() {
        assert_eq!(extract_items(&json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(extract_items(&json!({"items": ["x"]})), vec![json!("x")]);
        assert!(extract_items(&json!({"id": "u1"})).is_empty());
        assert!(extract_items(&json!({"_embedded": {}})).is_empty());
    }

    #[test]
    fn test_pagination_without_next() {
        let body = json!({
            "_embedded": {"users": []},
            "_links": {"self": {"href": "https://api.example.com/users"}},
            "count": 42,
            "size": 10
        });
        let pagination = extract_pagination(&body);
        assert!(!pagination.has_next);
        assert_eq!(pagination.next_url, None);
        assert_eq!(pagination.count, 42);
        assert_eq!(pagination.page_size, 10);
        assert_eq!(
            pagination.self_url.as_deref(),
            Some("https://api.example.com/users")
        );
    }

    #[test]
    fn test_pagination_next_without_href() {
        let body = json!({"_links": {"next": {}}});
        assert!(!extract_pagination(&body).has_next);
    }

    #[test]
    fn test_extract_error() {
        let body = json!({
            "code": "INVALID_DATA",
            "message": "The request could not be completed.",
            "details": [{"code": "INVALID_VALUE", "target": "email"}],
            "correlationId": "c0ffee"
        });
        let error = extract_error(&body).unwrap();
        assert_eq!(error.code.as_deref(), Some("INVALID_DATA"));
        assert_eq!(error.correlation_id.as_deref(), Some("c0ffee"));
        assert_eq!(error.details.len(), 1);

        let only_message = extract_error(&json!({"message": "nope"})).unwrap();
        assert_eq!(only_message.code, None);
        assert!(only_message.details.is_empty());

        assert!(extract_error(&json!({"id": "u1"})).is_none());
        assert!(extract_error(&json!([1])).is_none());
    }

    #[test]
    fn test_normalize_list_success() {
        let body = json!({"_embedded": {"users": [{"id": "u1"}]}, "count": 1, "size": 1});
        let result = normalize_list(&body);
        assert!(result.success);
        assert_eq!(result.items(), &[json!({"id": "u1"})]);
        assert!(result.error.is_none());
        assert!(!result.pagination.unwrap().has_next);
    }

    #[test]
    fn test_normalize_single_error_drops_item() {
        let body = json!({"code": "NOT_FOUND", "message": "Unable to find user"});
        let result = normalize_single(&body);
        assert!(!result.success);
        assert!(result.item.is_none());
        assert_eq!(result.error.unwrap().code.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn test_normalize_single_null_body() {
        let result = normalize_single(&Value::Null);
        assert!(result.success);
        assert!(result.item.is_none());
    }

    #[test]
    fn test_serialized_envelope_omits_absent_fields() {
        let result = normalize_single(&json!({"id": "u1"})).with_tenant(TenantContext {
            name: "Production".to_string(),
            id: "env-1".to_string(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["item"]["id"], "u1");
        assert_eq!(json["tenant"]["name"], "Production");
        assert!(json.get("error").is_none());
        assert!(json.get("items").is_none());
    }
}
