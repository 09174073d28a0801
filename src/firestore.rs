//! Firestore REST backend for profile and notification-log writes.
//!
//! Uses `documents:commit` so server timestamps can be applied with a
//! `REQUEST_TIME` field transform in the same write, matching what the client
//! SDK's `serverTimestamp()` sentinel does.
//!
//! # Writes
//!
//! ```text
//! users/{uid}                      update fcmToken, transform lastTokenUpdate (must exist)
//! users/{uid}/notifications/{id}   create full record, transform date (must not exist)
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::FirestoreConfig;
use crate::router::NormalizedNotification;
use crate::store::{NotificationLog, ProfileStore};
use crate::token::RegistrationToken;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

/// Document store client for one Firestore database.
///
/// The caller reuses one `reqwest::Client` for connection pooling.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    id_token: String,
}

impl FirestoreStore {
    /// Create a client authenticating with the signed-in user's ID token.
    pub fn new(client: reqwest::Client, config: &FirestoreConfig, id_token: String) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: config.project_id.clone(),
            database: config.database.clone(),
            id_token,
        }
    }

    /// Point at a different host (emulator or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }

    fn document_name(&self, path: &str) -> String {
        format!("{}/documents/{}", self.database_path(), path)
    }

    async fn commit(&self, write: Value) -> Result<()> {
        let url = format!("{}/v1/{}/documents:commit", self.base_url, self.database_path());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.id_token)
            .json(&json!({ "writes": [write] }))
            .send()
            .await
            .context("Firestore commit request failed")?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Firestore commit failed (HTTP {status}): {body}")
        }
    }
}

#[async_trait]
impl ProfileStore for FirestoreStore {
    async fn update_push_token(&self, uid: &str, token: &RegistrationToken) -> Result<()> {
        let write = json!({
            "update": {
                "name": self.document_name(&format!("users/{uid}")),
                "fields": { "fcmToken": { "stringValue": token.as_str() } },
            },
            "updateMask": { "fieldPaths": ["fcmToken"] },
            "updateTransforms": [
                { "fieldPath": "lastTokenUpdate", "setToServerValue": "REQUEST_TIME" }
            ],
            "currentDocument": { "exists": true },
        });
        self.commit(write).await?;
        log::info!("[Firestore] Updated push token for user {uid}: {}", token.preview());
        Ok(())
    }
}

#[async_trait]
impl NotificationLog for FirestoreStore {
    async fn append(&self, uid: &str, notification: &NormalizedNotification) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut record = serde_json::to_value(notification)?;
        if let Value::Object(fields) = &mut record {
            fields.insert("read".to_string(), Value::Bool(false));
        }
        let Some(fields) = encode_value(&record).pointer("/mapValue/fields").cloned() else {
            anyhow::bail!("notification did not serialize to an object");
        };

        let write = json!({
            "update": {
                "name": self.document_name(&format!("users/{uid}/notifications/{id}")),
                "fields": fields,
            },
            "updateTransforms": [
                { "fieldPath": "date", "setToServerValue": "REQUEST_TIME" }
            ],
            "currentDocument": { "exists": false },
        });
        self.commit(write).await?;
        log::info!("[Firestore] Appended notification {id} for user {uid}");
        Ok(id)
    }
}

/// Encode plain JSON as a Firestore typed `Value`.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PushPayload;
    use crate::router::normalize;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMMIT_PATH: &str = "/v1/projects/demo/databases/(default)/documents:commit";

    fn store(server: &MockServer) -> FirestoreStore {
        let config = FirestoreConfig {
            project_id: "demo".to_string(),
            database: "(default)".to_string(),
        };
        FirestoreStore::new(reqwest::Client::new(), &config, "id-token".to_string())
            .with_base_url(server.uri())
    }

    #[test]
    fn test_encode_value_types() {
        assert_eq!(encode_value(&json!(3)), json!({ "integerValue": "3" }));
        assert_eq!(encode_value(&json!(1.5)), json!({ "doubleValue": 1.5 }));
        assert_eq!(encode_value(&json!(null)), json!({ "nullValue": null }));
        assert_eq!(
            encode_value(&json!({ "a": "b" })),
            json!({ "mapValue": { "fields": { "a": { "stringValue": "b" } } } })
        );
    }

    #[tokio::test]
    async fn test_update_push_token_commits_transform() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMMIT_PATH))
            .and(header("authorization", "Bearer id-token"))
            .and(body_partial_json(json!({
                "writes": [{
                    "update": {
                        "name": "projects/demo/databases/(default)/documents/users/u1",
                        "fields": { "fcmToken": { "stringValue": "tok-123" } }
                    },
                    "updateMask": { "fieldPaths": ["fcmToken"] },
                    "updateTransforms": [
                        { "fieldPath": "lastTokenUpdate", "setToServerValue": "REQUEST_TIME" }
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .update_push_token("u1", &RegistrationToken::new("tok-123"))
            .await
            .expect("commit succeeds");
    }

    #[tokio::test]
    async fn test_append_writes_unread_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMMIT_PATH))
            .and(body_partial_json(json!({
                "writes": [{
                    "update": {
                        "fields": {
                            "titleKey": { "stringValue": "orderTitle" },
                            "read": { "booleanValue": false },
                            "isGlobal": { "booleanValue": false }
                        }
                    },
                    "currentDocument": { "exists": false }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let n = normalize(
            &PushPayload::from_json(r#"{"data": {"titleKey": "orderTitle"}}"#).expect("payload"),
        );
        let id = store(&server).append("u1", &n).await.expect("append");
        assert_eq!(id.len(), 32);
    }

    #[tokio::test]
    async fn test_commit_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("NOT_FOUND"))
            .mount(&server)
            .await;

        let err = store(&server)
            .update_push_token("missing", &RegistrationToken::new("t"))
            .await
            .expect_err("404 is an error");
        assert!(err.to_string().contains("404"));
    }
}
