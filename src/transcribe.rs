//! Transcription stage: a folder of question images → tagged LaTeX or OX
//! JSON via a vision model.
//!
//! Images are processed one at a time in file-name order. A failure on one
//! image is recorded in its [`ImageResult`] and the batch continues; only
//! a batch where every image failed is an error.
//!
//! Outputs:
//! - **Exam mode** appends each cleaned transcript to `<folder>.tex` (or
//!   the configured output), creating it if needed. Appending means a
//!   rerun with `skip` picks up where an interrupted run stopped.
//! - **OX mode** writes `<folder>/<image-stem>.json` per image.

use crate::config::{TranscribeConfig, TranscriptionMode, DEFAULT_MODEL};
use crate::error::{ExamError, ItemError};
use crate::output::{ImageResult, OxQuestion, TranscriptionOutput, TranscriptionStats};
use crate::pipeline::{encode, llm, postprocess};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Transcribe every selected image in `folder`.
pub async fn transcribe_folder(
    folder: impl AsRef<Path>,
    config: &TranscribeConfig,
) -> Result<TranscriptionOutput, ExamError> {
    let total_start = Instant::now();
    let folder = folder.as_ref();
    info!("Transcribing {} ({:?} mode)", folder.display(), config.mode);

    // ── Step 1: List and filter images ───────────────────────────────────
    let all_images = list_images(folder)?;
    if all_images.is_empty() {
        return Err(ExamError::NoImages {
            path: folder.to_path_buf(),
        });
    }
    let selected = select_images(&all_images, config.skip, &config.only);
    let skipped = all_images.len() - selected.len();
    if selected.is_empty() {
        return Err(ExamError::InvalidConfig(format!(
            "skip/only excluded all {} images in '{}'",
            all_images.len(),
            folder.display()
        )));
    }
    debug!("{} images selected, {} skipped", selected.len(), skipped);

    // ── Step 2: Provider ─────────────────────────────────────────────────
    let provider = resolve_provider(config)?;

    let transcript_path = match config.mode {
        TranscriptionMode::Exam => Some(
            config
                .output
                .clone()
                .unwrap_or_else(|| default_transcript_path(folder)),
        ),
        TranscriptionMode::Ox => None,
    };

    // ── Step 3: Sequential model calls ───────────────────────────────────
    let total = selected.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut images = Vec::with_capacity(total);
    for (i, path) in selected.iter().enumerate() {
        let index = i + 1;
        let name = file_name(path);
        if let Some(ref cb) = config.progress_callback {
            cb.on_item_start(index, total, &name);
        }

        let mut result = transcribe_one(&provider, path, &name, config).await;
        if result.error.is_none() {
            result.output = postprocess::clean_transcript(&result.output, config.mode);
            let written = match &transcript_path {
                Some(tex) => append_transcript(tex, &result.output).map(|()| tex.clone()),
                None => write_ox_json(folder, path, &result.output),
            };
            // Disk errors abort the batch rather than silently losing output.
            result.output_path = Some(written?);
        }

        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_item_complete(index, total, &name, result.output.len()),
                Some(e) => cb.on_item_error(index, total, &name, &e.to_string()),
            }
        }
        images.push(result);
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let processed = images.iter().filter(|r| r.error.is_none()).count();
    let failed = images.len() - processed;

    if processed == 0 {
        let first_error = images
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ExamError::AllItemsFailed {
            total: images.len(),
            first_error,
        });
    }

    let stats = TranscriptionStats {
        total_images: all_images.len(),
        processed_images: processed,
        failed_images: failed,
        skipped_images: skipped,
        total_input_tokens: images.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: images.iter().map(|r| r.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Transcription complete: {}/{} images, {} ms",
        processed, total, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, processed);
    }

    Ok(TranscriptionOutput {
        images,
        transcript_path,
        stats,
    })
}

async fn transcribe_one(
    provider: &Arc<dyn LLMProvider>,
    path: &Path,
    name: &str,
    config: &TranscribeConfig,
) -> ImageResult {
    let start = Instant::now();
    match encode::encode_image_file(path) {
        Ok(image) => llm::transcribe_image(provider, name, image, config).await,
        Err(e) => {
            warn!("{}: could not read image: {}", name, e);
            llm::failed(
                name,
                start,
                ItemError::EncodeFailed {
                    name: name.to_string(),
                    detail: e.to_string(),
                },
            )
        }
    }
}

// ── Folder handling ──────────────────────────────────────────────────────

/// Image files directly inside `folder`, sorted by file name.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>, ExamError> {
    let entries = std::fs::read_dir(folder).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExamError::FileNotFound {
                path: folder.to_path_buf(),
            }
        } else {
            ExamError::ReadFailed {
                path: folder.to_path_buf(),
                source,
            }
        }
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    images.sort();
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Apply `skip` to the sorted list, then keep only names in `only` (when
/// non-empty).
pub fn select_images(images: &[PathBuf], skip: usize, only: &[String]) -> Vec<PathBuf> {
    images
        .iter()
        .skip(skip)
        .filter(|p| only.is_empty() || only.iter().any(|n| *n == file_name(p)))
        .cloned()
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<folder>.tex`, next to the folder.
pub fn default_transcript_path(folder: &Path) -> PathBuf {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string());
    folder
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{name}.tex"))
}

fn append_transcript(path: &Path, text: &str) -> Result<(), ExamError> {
    let write_err = |source| ExamError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(text.as_bytes()).map_err(write_err)?;
    if !text.ends_with('\n') {
        file.write_all(b"\n").map_err(write_err)?;
    }
    Ok(())
}

fn write_ox_json(folder: &Path, image: &Path, json: &str) -> Result<PathBuf, ExamError> {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = folder.join(format!("{stem}.json"));

    if let Err(e) = serde_json::from_str::<Vec<OxQuestion>>(json) {
        warn!(
            "{}: model output is not a JSON array of OX questions ({}); saved as-is",
            path.display(),
            e
        );
    }

    std::fs::write(&path, json).map_err(|source| ExamError::OutputWriteFailed {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExamError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExamError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, most specific first:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model` (default `gpt-4o`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env` auto-detection
pub fn resolve_provider(config: &TranscribeConfig) -> Result<Arc<dyn LLMProvider>, ExamError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY (model defaults to {DEFAULT_MODEL}) or configure a provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"x").unwrap();
        p
    }

    #[test]
    fn lists_images_sorted_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "10.png");
        touch(dir.path(), "02.PNG");
        touch(dir.path(), "01.jpg");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "01.json");
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["01.jpg", "02.PNG", "10.png"]);
    }

    #[test]
    fn missing_folder_is_not_found() {
        assert!(matches!(
            list_images(Path::new("/no/such/folder")),
            Err(ExamError::FileNotFound { .. })
        ));
    }

    #[test]
    fn skip_then_only() {
        let imgs: Vec<PathBuf> = ["01.png", "02.png", "03.png", "04.png"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let names = |v: Vec<PathBuf>| v.iter().map(|p| file_name(p)).collect::<Vec<_>>();

        assert_eq!(names(select_images(&imgs, 2, &[])), vec!["03.png", "04.png"]);
        assert_eq!(
            names(select_images(&imgs, 0, &["02.png".into(), "04.png".into()])),
            vec!["02.png", "04.png"]
        );
        assert_eq!(
            names(select_images(&imgs, 3, &["02.png".into(), "04.png".into()])),
            vec!["04.png"]
        );
        assert!(select_images(&imgs, 9, &[]).is_empty());
    }

    #[test]
    fn transcript_sits_next_to_folder() {
        assert_eq!(
            default_transcript_path(Path::new("data/2025_재정학")),
            PathBuf::from("data/2025_재정학.tex")
        );
        assert_eq!(
            default_transcript_path(Path::new("crops/")),
            PathBuf::from("crops.tex")
        );
    }

    #[test]
    fn transcripts_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("out.tex");
        append_transcript(&tex, "```latex\nA\n```\n").unwrap();
        append_transcript(&tex, "```latex\nB\n```").unwrap();
        assert_eq!(
            std::fs::read_to_string(&tex).unwrap(),
            "```latex\nA\n```\n```latex\nB\n```\n"
        );
    }

    #[test]
    fn ox_json_is_written_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("p012.png");
        let path = write_ox_json(dir.path(), &img, "[]").unwrap();
        assert_eq!(path, dir.path().join("p012.json"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");

        // Unparseable output is still kept for manual repair.
        let path = write_ox_json(dir.path(), &dir.path().join("p013.png"), "not json").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "not json");
    }

    #[tokio::test]
    async fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.txt");
        let err = transcribe_folder(dir.path(), &TranscribeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::NoImages { .. }));
    }
}
