//! Vision-model call: one image in, one transcript out.
//!
//! Prompt text lives in [`crate::prompts`]; this module only assembles the
//! message list and turns the provider's answer (or failure) into an
//! [`ImageResult`]. A failed call is not retried: the error is recorded on
//! the result and the batch moves on.

use crate::config::TranscribeConfig;
use crate::error::ItemError;
use crate::output::ImageResult;
use crate::prompts::prompts_for;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Build the message list for one image.
///
/// 1. **System message**: the mode's prompt, or the configured override
/// 2. **User message**: the mode's hint text plus the image attachment
pub fn build_messages(image: ImageData, config: &TranscribeConfig) -> Vec<ChatMessage> {
    let (default_system, user_text) = prompts_for(config.mode);
    let system = config.system_prompt.as_deref().unwrap_or(default_system);
    vec![
        ChatMessage::system(system),
        ChatMessage::user_with_images(user_text, vec![image]),
    ]
}

/// Transcribe one encoded image. Never returns an error; check
/// `result.error`.
pub async fn transcribe_image(
    provider: &Arc<dyn LLMProvider>,
    name: &str,
    image: ImageData,
    config: &TranscribeConfig,
) -> ImageResult {
    let start = Instant::now();
    let messages = build_messages(image, config);
    let options = build_options(config);

    match provider.chat(&messages, Some(&options)).await {
        Ok(response) => {
            let duration = start.elapsed();
            debug!(
                "{}: {} input tokens, {} output tokens, {:?}",
                name, response.prompt_tokens, response.completion_tokens, duration
            );
            ImageResult {
                name: name.to_string(),
                output: response.content,
                output_path: None,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
                duration_ms: duration.as_millis() as u64,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: model call failed: {}", name, e);
            failed(
                name,
                start,
                ItemError::LlmFailed {
                    name: name.to_string(),
                    detail: e.to_string(),
                },
            )
        }
    }
}

/// An `ImageResult` carrying only an error.
pub fn failed(name: &str, start: Instant, error: ItemError) -> ImageResult {
    ImageResult {
        name: name.to_string(),
        output: String::new(),
        output_path: None,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        error: Some(error),
    }
}

fn build_options(config: &TranscribeConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
