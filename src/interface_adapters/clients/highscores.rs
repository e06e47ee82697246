use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::form_urlencoded;

// The highscore backend accepts form-encoded submissions and serves a
// ranked top-ten list. It answers 200 for both outcomes; the JSON
// envelope carries the verdict.

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HighscoreEntry {
    #[serde(rename = "playerName")]
    pub player_name: String,
    pub score: i64,
    /// Backend-side datetime string, passed through untouched.
    pub timestamp: String,
}

/// Submission verdict as the backend reports it.
#[derive(Debug, Clone, Deserialize)]
struct SubmitEnvelope {
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// Row id assigned by the backend, as a string on the wire.
    pub id: String,
}

#[derive(Debug)]
pub enum HighscoreError {
    /// The backend refused the submission (bad name or score).
    Rejected,
    UpstreamUnavailable,
}

fn encode_submission(player_name: &str, score: i64) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("player_name", player_name)
        .append_pair("score", &score.to_string())
        .finish()
}

// Thin reqwest client for the score backend.
#[derive(Clone)]
pub struct HighscoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl HighscoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub async fn submit_score(
        &self,
        player_name: &str,
        score: i64,
    ) -> Result<SubmitReceipt, HighscoreError> {
        // The backend rejects these too; failing locally spares the request.
        if player_name.trim().is_empty() || score < 0 {
            return Err(HighscoreError::Rejected);
        }

        let url = format!("{}/submit_score", self.base_url);
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_submission(player_name, score))
            .send()
            .await
            .map_err(|_| HighscoreError::UpstreamUnavailable)?;

        if !response.status().is_success() {
            return Err(HighscoreError::UpstreamUnavailable);
        }

        let envelope = response
            .json::<SubmitEnvelope>()
            .await
            .map_err(|_| HighscoreError::UpstreamUnavailable)?;
        if !envelope.success {
            tracing::warn!(error = ?envelope.error, "score submission refused");
            return Err(HighscoreError::Rejected);
        }
        Ok(SubmitReceipt {
            id: envelope.id.unwrap_or_default(),
        })
    }

    /// Top ten scores, best first.
    pub async fn get_highscores(&self) -> Result<Vec<HighscoreEntry>, HighscoreError> {
        let url = format!("{}/get_highscores", self.base_url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| HighscoreError::UpstreamUnavailable)?;

        if !response.status().is_success() {
            return Err(HighscoreError::UpstreamUnavailable);
        }

        response
            .json::<Vec<HighscoreEntry>>()
            .await
            .map_err(|_| HighscoreError::UpstreamUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HighscoreClient {
        HighscoreClient::new("http://127.0.0.1:9", Duration::from_millis(100))
            .expect("client builds")
    }

    #[test]
    fn submission_body_uses_backend_field_names() {
        let body = encode_submission("ash ketchum", 120);
        assert_eq!(body, "player_name=ash+ketchum&score=120");
    }

    #[test]
    fn highscore_list_parses_the_backend_shape() {
        let body = r#"[
            {"playerName":"ash","score":120,"timestamp":"2025-01-20 19:22:11"},
            {"playerName":"sam","score":90,"timestamp":"2025-01-19 08:01:45"}
        ]"#;

        let entries: Vec<HighscoreEntry> = serde_json::from_str(body).expect("list parses");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].player_name, "ash");
        assert_eq!(entries[0].timestamp, "2025-01-20 19:22:11");
    }

    #[test]
    fn accepted_envelope_carries_a_string_row_id() {
        let body = r#"{"success":true,"message":"Score submitted successfully","id":"5"}"#;

        let envelope: SubmitEnvelope = serde_json::from_str(body).expect("envelope parses");
        assert!(envelope.success);
        assert_eq!(envelope.id.as_deref(), Some("5"));
    }

    #[test]
    fn refused_envelope_parses_without_an_id() {
        let body = r#"{"success":false,"error":"Invalid input"}"#;

        let envelope: SubmitEnvelope = serde_json::from_str(body).expect("envelope parses");
        assert!(!envelope.success);
        assert!(envelope.id.is_none());
        assert_eq!(envelope.error.as_deref(), Some("Invalid input"));
    }

    #[tokio::test]
    async fn empty_name_is_rejected_before_any_request() {
        let result = client().submit_score("   ", 50).await;
        assert!(matches!(result, Err(HighscoreError::Rejected)));
    }

    #[tokio::test]
    async fn negative_score_is_rejected_before_any_request() {
        let result = client().submit_score("ash", -1).await;
        assert!(matches!(result, Err(HighscoreError::Rejected)));
    }
}
