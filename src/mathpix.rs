//! Mathpix OCR API client.
//!
//! Mathpix returns mixed Korean text and LaTeX with per-line positions
//! (`line_data`), which [`crate::reflow`] turns back into running text.

use crate::error::ExamError;
use crate::parse::write_json_pretty;
use crate::pipeline::encode::mime_for_path;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const MATHPIX_TEXT_ENDPOINT: &str = "https://api.mathpix.com/v3/text";

/// Request options: `$…$` inline math, line data included.
pub fn build_options_json() -> Value {
    json!({
        "math_inline_delimiters": ["$", "$"],
        "rm_spaces": true,
        "include_line_data": true,
        "formats": ["latex_styled", "text"],
    })
}

#[derive(Clone)]
pub struct MathpixClient {
    app_id: String,
    app_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl fmt::Debug for MathpixClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MathpixClient")
            .field("app_id", &self.app_id)
            .field("app_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl MathpixClient {
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
            endpoint: MATHPIX_TEXT_ENDPOINT.to_string(),
            timeout_secs: 120,
        }
    }

    /// Credentials from `MATHPIX_APP_ID` and `MATHPIX_APP_KEY`.
    pub fn from_env() -> Result<Self, ExamError> {
        let var = |k: &str| {
            std::env::var(k)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ExamError::InvalidConfig(format!("{k} is not set")))
        };
        Ok(Self::new(var("MATHPIX_APP_ID")?, var("MATHPIX_APP_KEY")?))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    /// Upload one image and return the raw response.
    pub async fn recognize(&self, image_path: &Path) -> Result<Value, ExamError> {
        let bytes = tokio::fs::read(image_path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ExamError::FileNotFound {
                    path: image_path.to_path_buf(),
                }
            } else {
                ExamError::ReadFailed {
                    path: image_path.to_path_buf(),
                    source,
                }
            }
        })?;
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());
        debug!("Uploading {} ({} bytes) to Mathpix", file_name, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for_path(image_path))
            .map_err(|e| ExamError::Mathpix(e.to_string()))?;
        let form = Form::new()
            .text("options_json", build_options_json().to_string())
            .part("file", part);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ExamError::Mathpix(e.to_string()))?;
        let response = client
            .post(&self.endpoint)
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExamError::Mathpix(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExamError::Mathpix(e.to_string()))?;
        if !status.is_success() {
            return Err(ExamError::Mathpix(format!("HTTP {status}: {body}")));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| ExamError::Mathpix(format!("bad response: {e}")))?;
        if let Some(err) = value.get("error").and_then(Value::as_str) {
            return Err(ExamError::Mathpix(err.to_string()));
        }
        Ok(value)
    }

    /// [`recognize`](Self::recognize) and save the response pretty-printed.
    pub async fn recognize_to_file(&self, image_path: &Path, output: &Path) -> Result<Value, ExamError> {
        let value = self.recognize(image_path).await?;
        write_json_pretty(output, &value)?;
        info!("Mathpix result for {} → {}", image_path.display(), output.display());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_request_line_data_and_dollar_math() {
        let opts = build_options_json();
        assert_eq!(opts["math_inline_delimiters"], json!(["$", "$"]));
        assert_eq!(opts["rm_spaces"], true);
        assert_eq!(opts["include_line_data"], true);
        assert_eq!(opts["formats"], json!(["latex_styled", "text"]));
    }

    #[test]
    fn debug_hides_key() {
        let client = MathpixClient::new("my-app", "secret-key");
        let dbg = format!("{client:?}");
        assert!(dbg.contains("my-app"));
        assert!(!dbg.contains("secret-key"));
    }

    #[tokio::test]
    async fn missing_image_is_file_not_found() {
        let client = MathpixClient::new("id", "key");
        let err = client
            .recognize(Path::new("/nonexistent/26.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::FileNotFound { .. }));
    }
}
