// Response payloads shared by the plain HTTP routes.

use serde::Serialize;

/// JSON error body for `/highscores` and any future operator routes.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
