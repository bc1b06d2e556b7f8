//! Thin Drive v3 / Slides v1 REST client
//!
//! Every request carries a fresh bearer token and is retried with
//! exponential backoff while the failure is recoverable (429, 5xx, network).

use backon::{ExponentialBuilder, Retryable};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::SharedTokenSource;
use crate::config::DeckConfig;
use crate::constants::google::MAX_RETRIES;
use crate::types::{DeckError, ErrorClassifier, Result};

#[derive(Debug, Deserialize)]
struct FileId {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

pub struct GoogleClient {
    client: reqwest::Client,
    tokens: SharedTokenSource,
    slides_base: String,
    drive_base: String,
    upload_base: String,
    backoff: ExponentialBuilder,
}

impl GoogleClient {
    pub fn new(config: &DeckConfig, tokens: SharedTokenSource, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeckError::Deck(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            tokens,
            slides_base: config.slides_api_base.trim_end_matches('/').to_string(),
            drive_base: config.drive_api_base.trim_end_matches('/').to_string(),
            upload_base: config.drive_upload_base.trim_end_matches('/').to_string(),
            backoff: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_times(MAX_RETRIES),
        })
    }

    /// Override the first retry delay
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.backoff = self.backoff.with_min_delay(delay);
        self
    }

    /// Single attempt; a non-success status becomes a categorized error
    async fn send_once<F>(&self, operation: &str, build: &F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&self.client)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                DeckError::Google(ErrorClassifier::classify(
                    &format!("{} request failed: {}", operation, e),
                    "google",
                ))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeckError::google_status(
            status.as_u16(),
            format!("{} returned {}: {}", operation, status, body),
        ))
    }

    /// Retries recoverable failures with backoff
    async fn send<F>(&self, operation: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        (|| self.send_once(operation, &build))
            .retry(self.backoff)
            .when(DeckError::is_recoverable)
            .notify(|err, delay| {
                warn!("{} failed, retrying in {:?}: {}", operation, delay, err);
            })
            .await
    }

    async fn send_json<T, F>(&self, operation: &str, build: F) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send(operation, build).await?;
        response.json::<T>().await.map_err(|e| {
            DeckError::Google(ErrorClassifier::classify(
                &format!("Failed to parse {} response: {}", operation, e),
                "google",
            ))
        })
    }

    // =========================================================================
    // Drive
    // =========================================================================

    /// Copy a file, returning the new file id
    pub async fn copy_file(&self, file_id: &str, name: &str) -> Result<String> {
        let url = format!("{}/files/{}/copy", self.drive_base, file_id);
        let body = json!({"name": name});
        let file: FileId = self
            .send_json("files.copy", |c| {
                c.post(&url)
                    .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                    .json(&body)
            })
            .await?;
        Ok(file.id)
    }

    /// Move a file into `folder_id`, detaching it from its current parents
    pub async fn move_file(&self, file_id: &str, folder_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", self.drive_base, file_id);
        let current: FileParents = self
            .send_json("files.get", |c| {
                c.get(&url)
                    .query(&[("supportsAllDrives", "true"), ("fields", "parents")])
            })
            .await?;
        let remove = current.parents.join(",");

        self.send("files.update", |c| {
            c.patch(&url)
                .query(&[
                    ("supportsAllDrives", "true"),
                    ("addParents", folder_id),
                    ("removeParents", remove.as_str()),
                    ("fields", "id"),
                ])
                .json(&json!({}))
        })
        .await?;
        Ok(())
    }

    /// Upload PNG bytes, then name the file and place it in `folder_id`
    ///
    /// `files.create` is sent once: a retry after a lost success response
    /// would leave a duplicate file in Drive. The follow-up update retries.
    pub async fn upload_png(&self, bytes: Vec<u8>, name: &str, folder_id: Option<&str>) -> Result<String> {
        let upload_url = format!("{}/files", self.upload_base);
        let create = |c: &reqwest::Client| {
            c.post(&upload_url)
                .query(&[
                    ("uploadType", "media"),
                    ("supportsAllDrives", "true"),
                    ("fields", "id"),
                ])
                .header(CONTENT_TYPE, "image/png")
                .body(bytes.clone())
        };
        let file: FileId = self
            .send_once("files.create", &create)
            .await?
            .json()
            .await
            .map_err(|e| {
                DeckError::Google(ErrorClassifier::classify(
                    &format!("Failed to parse files.create response: {}", e),
                    "google",
                ))
            })?;

        let url = format!("{}/files/{}", self.drive_base, file.id);
        let name = if name.ends_with(".png") {
            name.to_string()
        } else {
            format!("{}.png", name)
        };
        self.send("files.update", |c| {
            let mut request = c
                .patch(&url)
                .query(&[("supportsAllDrives", "true"), ("fields", "id")]);
            if let Some(folder) = folder_id {
                request = request.query(&[("addParents", folder)]);
            }
            request.json(&json!({"name": name}))
        })
        .await?;

        debug!(file_id = %file.id, "Uploaded chart image");
        Ok(file.id)
    }

    /// Grant anyone-with-the-link read access
    pub async fn make_public(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}/permissions", self.drive_base, file_id);
        let body = json!({"type": "anyone", "role": "reader"});
        self.send("permissions.create", |c| {
            c.post(&url)
                .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                .json(&body)
        })
        .await?;
        Ok(())
    }

    /// Export a Google Docs editor file in `mime_type`
    pub async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}/export", self.drive_base, file_id);
        let response = self
            .send("files.export", |c| c.get(&url).query(&[("mimeType", mime_type)]))
            .await?;
        let bytes = response.bytes().await.map_err(|e| {
            DeckError::Google(ErrorClassifier::classify(
                &format!("Failed to download export: {}", e),
                "google",
            ))
        })?;
        Ok(bytes.to_vec())
    }

    // =========================================================================
    // Slides
    // =========================================================================

    pub async fn batch_update(&self, presentation_id: &str, requests: Vec<Value>) -> Result<Value> {
        let url = format!(
            "{}/presentations/{}:batchUpdate",
            self.slides_base, presentation_id
        );
        let body = json!({"requests": requests});
        self.send_json("presentations.batchUpdate", |c| c.post(&url).json(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::auth::StaticTokenSource;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleClient {
        let config = DeckConfig {
            slides_api_base: server.uri(),
            drive_api_base: server.uri(),
            drive_upload_base: format!("{}/upload", server.uri()),
            ..DeckConfig::default()
        };
        GoogleClient::new(
            &config,
            Arc::new(StaticTokenSource::new("ya29.test")),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_min_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_copy_file_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/tpl-1/copy"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "copy-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).copy_file("tpl-1", "deck").await.unwrap();
        assert_eq!(id, "copy-1");
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/tpl-1/copy"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files/tpl-1/copy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "copy-2"})))
            .mount(&server)
            .await;

        let id = client(&server).copy_file("tpl-1", "deck").await.unwrap();
        assert_eq!(id, "copy-2");
    }

    #[tokio::test]
    async fn test_does_not_retry_auth_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/tpl-1/copy"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).copy_file("tpl-1", "deck").await.unwrap_err();
        assert!(matches!(err, DeckError::Google(ref e) if e.category == crate::types::ErrorCategory::Auth));
    }

    #[tokio::test]
    async fn test_move_file_replaces_parents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/f-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"parents": ["root-a", "root-b"]})))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/files/f-1"))
            .and(query_param("addParents", "folder-9"))
            .and(query_param("removeParents", "root-a,root-b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f-1"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).move_file("f-1", "folder-9").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_png() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/files"))
            .and(query_param("uploadType", "media"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "img-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/files/img-1"))
            .and(query_param("addParents", "folder-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "img-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .upload_png(vec![0x89, b'P', b'N', b'G'], "aov", Some("folder-9"))
            .await
            .unwrap();
        assert_eq!(id, "img-1");
    }

    #[tokio::test]
    async fn test_upload_create_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/files"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .upload_png(vec![0x89, b'P', b'N', b'G'], "aov", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::Google(ref e) if e.category == crate::types::ErrorCategory::Transient));
    }

    #[tokio::test]
    async fn test_export_pdf_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/p-1/export"))
            .and(query_param("mimeType", "application/pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let bytes = client(&server).export("p-1", "application/pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }
}
