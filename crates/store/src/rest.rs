// Raw HTTP fallback for when the primary data-access path is unreachable.
// Speaks the tagged-value wire format from `codec`.

use crate::backend::{Document, DocumentStore};
use crate::codec::{decode_document, encode_document, encode_value};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::query::{Direction, Predicate, Query};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::TransportUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn document_url(&self, path: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, path, id)
    }

    fn status_error(status: reqwest::StatusCode, context: &str) -> StoreError {
        if status.is_server_error() {
            StoreError::TransportUnavailable(format!("{}: HTTP {}", context, status))
        } else {
            StoreError::Unavailable(format!("{}: HTTP {}", context, status))
        }
    }
}

/// Network-level failures (connect, timeout) map to `TransportUnavailable`;
/// timeouts are propagated, never swallowed.
fn transport_err(err: reqwest::Error) -> StoreError {
    StoreError::TransportUnavailable(err.to_string())
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn get(&self, path: &str, id: &str) -> Result<Option<Document>> {
        let resp = self
            .client
            .get(self.document_url(path, id))
            .send()
            .await
            .map_err(transport_err)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::status_error(resp.status(), "get"));
        }

        let body: Value = resp.json().await.map_err(transport_err)?;
        let wire_fields = body.get("fields").cloned().unwrap_or(Value::Null);
        Ok(Some(Document::new(id, decode_document(&wire_fields, id))))
    }

    async fn list(&self, path: &str, query: &Query) -> Result<Vec<Document>> {
        // Path is "{parent}/{collectionId}"; the query endpoint hangs off the
        // parent document path.
        let (parent, collection_id) = path
            .rsplit_once('/')
            .unwrap_or(("", path));

        let resp = self
            .client
            .post(format!("{}/{}:runQuery", self.base_url, parent))
            .json(&json!({ "structuredQuery": structured_query(collection_id, query) }))
            .send()
            .await
            .map_err(transport_err)?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp.status(), "runQuery"));
        }

        let body: Value = resp.json().await.map_err(transport_err)?;
        let rows = body.as_array().cloned().unwrap_or_default();
        let docs = rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(|doc| {
                let name = doc.get("name")?.as_str()?;
                let id = name.rsplit('/').next()?.to_string();
                let wire_fields = doc.get("fields").cloned().unwrap_or(Value::Null);
                let fields = decode_document(&wire_fields, &id);
                Some(Document::new(id, fields))
            })
            .collect();
        Ok(docs)
    }

    async fn set(&self, path: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let resp = self
            .client
            .patch(self.document_url(path, id))
            .json(&json!({ "fields": encode_document(&fields) }))
            .send()
            .await
            .map_err(transport_err)?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp.status(), "set"));
        }
        Ok(())
    }

    async fn update(&self, path: &str, id: &str, patch: Map<String, Value>) -> Result<()> {
        let mask: Vec<(&str, String)> = patch
            .keys()
            .map(|field| ("updateMask.fieldPaths", field.clone()))
            .collect();

        let resp = self
            .client
            .patch(self.document_url(path, id))
            .query(&[("currentDocument.exists", "true")])
            .query(&mask)
            .json(&json!({ "fields": encode_document(&patch) }))
            .send()
            .await
            .map_err(transport_err)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{}/{}", path, id)));
        }
        if !resp.status().is_success() {
            return Err(Self::status_error(resp.status(), "update"));
        }
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.document_url(path, id))
            .send()
            .await
            .map_err(transport_err)?;

        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Self::status_error(resp.status(), "delete"));
        }
        Ok(())
    }
}

fn structured_query(collection_id: &str, query: &Query) -> Value {
    let mut body = json!({
        "from": [{ "collectionId": collection_id }],
    });

    if !query.predicates.is_empty() {
        let filters: Vec<Value> = query.predicates.iter().map(field_filter).collect();
        body["where"] = json!({
            "compositeFilter": { "op": "AND", "filters": filters }
        });
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        body["orderBy"] = json!([{
            "field": { "fieldPath": order.field },
            "direction": direction,
        }]);
    }

    if let Some(limit) = query.limit {
        body["limit"] = json!(limit);
    }

    body
}

fn field_filter(predicate: &Predicate) -> Value {
    let (field, op, value) = match predicate {
        Predicate::Eq { field, value } => (field, "EQUAL", encode_value(value)),
        Predicate::ArrayContains { field, value } => (field, "ARRAY_CONTAINS", encode_value(value)),
        Predicate::Lte { field, value } => (field, "LESS_THAN_OR_EQUAL", encode_value(value)),
        Predicate::Gte { field, value } => (field, "GREATER_THAN_OR_EQUAL", encode_value(value)),
        Predicate::InSet { field, values } => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            (
                field,
                "IN",
                json!({ "arrayValue": { "values": values } }),
            )
        }
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;

    #[test]
    fn test_structured_query_shape() {
        let query = QueryBuilder::new("tasks")
            .where_eq("status", json!("backlog"))
            .compose()
            .unwrap();
        let body = structured_query("tasks", &query);

        assert_eq!(body["from"][0]["collectionId"], json!("tasks"));
        assert_eq!(body["where"]["compositeFilter"]["op"], json!("AND"));
        let filter = &body["where"]["compositeFilter"]["filters"][0]["fieldFilter"];
        assert_eq!(filter["op"], json!("EQUAL"));
        assert_eq!(filter["value"], json!({"stringValue": "backlog"}));
        // Default task ordering is carried to the backend.
        assert_eq!(body["orderBy"][0]["field"]["fieldPath"], json!("dueDate"));
    }

    #[test]
    fn test_in_set_filter_encodes_as_array() {
        let query = QueryBuilder::new("tasks")
            .where_in("status", vec![json!("backlog"), json!("done")])
            .compose()
            .unwrap();
        let body = structured_query("tasks", &query);
        let filter = &body["where"]["compositeFilter"]["filters"][0]["fieldFilter"];
        assert_eq!(filter["op"], json!("IN"));
        assert_eq!(
            filter["value"]["arrayValue"]["values"][0],
            json!({"stringValue": "backlog"})
        );
    }
}
