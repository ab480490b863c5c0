//! REST-backed verse saver.

use async_trait::async_trait;
use serde::Serialize;
use shared_types::VerseId;
use std::time::Duration;

use super::VerseSaver;
use crate::autosave::SaveError;
use crate::config::BackendConfig;

#[derive(Debug, Serialize)]
struct SaveVerseBody<'a> {
    content: &'a str,
}

/// `PUT {base_url}/chapters/{chapter_id}/verses/{verse_id}` with
/// `{"content": text}`.
#[derive(Debug, Clone)]
pub struct HttpVerseSaver {
    http: reqwest::Client,
    base_url: String,
    chapter_id: String,
    api_token: Option<String>,
}

impl HttpVerseSaver {
    pub fn new(
        base_url: impl Into<String>,
        chapter_id: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SaveError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chapter_id: chapter_id.into(),
            api_token: api_token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Build from backend config. Returns `None` when no base URL is set.
    pub fn from_config(
        config: &BackendConfig,
        chapter_id: impl Into<String>,
    ) -> Option<Result<Self, SaveError>> {
        let base_url = config.base_url.as_deref()?;
        Some(Self::new(
            base_url,
            chapter_id,
            config.api_token.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    pub fn verse_url(&self, verse_id: VerseId) -> String {
        format!(
            "{}/chapters/{}/verses/{}",
            self.base_url, self.chapter_id, verse_id
        )
    }
}

#[async_trait]
impl VerseSaver for HttpVerseSaver {
    async fn save(&self, verse_id: VerseId, text: &str) -> Result<(), SaveError> {
        let url = self.verse_url(verse_id);
        let mut request = self.http.put(&url).json(&SaveVerseBody { content: text });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(verse_id = %verse_id, url = %url, "Verse saved");
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        tracing::warn!(
            verse_id = %verse_id,
            status = status.as_u16(),
            url = %url,
            "Verse save rejected"
        );
        Err(SaveError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
