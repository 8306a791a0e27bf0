//! Exam transcript (`.tex`) → question records (`.json`).
//!
//! Each ` ```latex ` block is one question. A block missing any of
//! `problem_num`, `description` or `choice` cannot be loaded, so it is set
//! aside in an exceptions file for manual review instead of failing the run.

use crate::error::ExamError;
use crate::latex::remove_backslash_outside_math;
use crate::output::{ExamException, ExamQuestion, ParseOutcome, ParseSummary};
use crate::tags::{extract_tag, split_latex_blocks};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parse a whole transcript.
pub fn parse_exam_tex(content: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (i, block) in split_latex_blocks(content).into_iter().enumerate() {
        match parse_block(block) {
            Some(question) => outcome.questions.push(question),
            None => {
                debug!("Block {} is missing a required tag", i + 1);
                outcome.exceptions.push(ExamException {
                    index: i + 1,
                    block: block.to_string(),
                });
            }
        }
    }
    outcome
}

/// Parse one block, or `None` when a required tag is missing or empty.
pub fn parse_block(block: &str) -> Option<ExamQuestion> {
    let non_empty = |s: String| (!s.is_empty()).then_some(s);

    let problem_info = extract_tag(block, "problemInfo")
        .map(|s| s.replace("• ", ""))
        .and_then(non_empty);
    let problem_num = extract_tag(block, "problem_num")
        .map(|s| s.replace('.', ""))
        .and_then(non_empty)?;
    let description = extract_tag(block, "description").and_then(non_empty)?;
    let choice = extract_tag(block, "choice")
        .map(|s| remove_backslash_outside_math(&s))
        .and_then(non_empty)?;

    Some(ExamQuestion {
        problem_num,
        description,
        choice,
        problem_info,
    })
}

/// Parse `tex_path` and write `<stem>.json` and `<stem>_exception.json`
/// into `out_dir` (default: next to the input).
pub fn parse_exam_file(tex_path: &Path, out_dir: Option<&Path>) -> Result<ParseSummary, ExamError> {
    let content = read_to_string(tex_path)?;
    let outcome = parse_exam_tex(&content);

    let stem = file_stem(tex_path);
    let dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tex_path.parent().unwrap_or_else(|| Path::new("")).to_path_buf());
    let questions_path = dir.join(format!("{stem}.json"));
    let exceptions_path = dir.join(format!("{stem}_exception.json"));

    write_json_pretty(&questions_path, &outcome.questions)?;
    write_json_pretty(&exceptions_path, &outcome.exceptions)?;

    info!(
        "Parsed {}: {} questions, {} exceptions",
        tex_path.display(),
        outcome.questions.len(),
        outcome.exceptions.len()
    );
    if !outcome.exceptions.is_empty() {
        warn!("Review {} for blocks that need fixing", exceptions_path.display());
    }

    Ok(ParseSummary {
        questions_path,
        exceptions_path,
        question_count: outcome.questions.len(),
        exception_count: outcome.exceptions.len(),
    })
}

// ── File helpers shared with the other file-to-file stages ───────────────

pub(crate) fn read_to_string(path: &Path) -> Result<String, ExamError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExamError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ExamError::ReadFailed {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pretty JSON with non-ASCII text kept as-is, creating parent dirs.
pub(crate) fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExamError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ExamError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExamError::OutputWriteFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| ExamError::OutputWriteFailed {
        path: PathBuf::from(path),
        source,
    })
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ExamError> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| ExamError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_BLOCK: &str = r#"```latex
<<problemInfo>>• 2020. 세무사<</problemInfo>>
<<problem_num>>12.<</problem_num>>
<<description>>
다음 자료를 이용하여 $\text{㈜}$한국의 과세표준을 계산하면?
<</description>>
<<choice>>
① $\,$ 1,000,000원 \quad ② $\,$ 2,000,000원
<</choice>>
```"#;

    #[test]
    fn full_block_becomes_question() {
        let outcome = parse_exam_tex(FULL_BLOCK);
        assert!(outcome.exceptions.is_empty());
        let q = &outcome.questions[0];
        assert_eq!(q.problem_num, "12");
        assert_eq!(q.problem_info.as_deref(), Some("2020. 세무사"));
        assert_eq!(
            q.description,
            r"다음 자료를 이용하여 $\text{㈜}$한국의 과세표준을 계산하면?"
        );
        assert_eq!(q.choice, r"① $\,$ 1,000,000원 quad ② $\,$ 2,000,000원");
    }

    #[test]
    fn missing_choice_goes_to_exceptions() {
        let content = format!(
            "{FULL_BLOCK}\n```latex\n<<problem_num>>13.<</problem_num>>\n<<description>>설명<</description>>\n```"
        );
        let outcome = parse_exam_tex(&content);
        assert_eq!(outcome.questions.len(), 1);
        assert_eq!(outcome.exceptions.len(), 1);
        assert_eq!(outcome.exceptions[0].index, 2);
        assert!(outcome.exceptions[0].block.contains("13."));
    }

    #[test]
    fn empty_required_tag_is_an_exception() {
        let block = "<<problem_num>>.<</problem_num>><<description>>d<</description>><<choice>>c<</choice>>";
        assert!(parse_block(block).is_none());
    }

    #[test]
    fn problem_info_is_optional() {
        let block = "<<problem_num>>1<</problem_num>><<description>>d<</description>><<choice>>① a<</choice>>";
        let q = parse_block(block).unwrap();
        assert_eq!(q.problem_info, None);
        assert_eq!(q.problem_num, "1");
    }

    #[test]
    fn table_choice_json_passes_through_without_backslashes() {
        let block = "<<problem_num>>2.<</problem_num>><<description>>d<</description>>\
                     <<choice>>{\"choices\": [{\"number\": \"①\", \"상여\": \"$11,000$\"}]}<</choice>>";
        let q = parse_block(block).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&q.choice).unwrap();
        assert_eq!(parsed["choices"][0]["상여"], "$11,000$");
    }

    #[test]
    fn file_outputs_sit_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("2024_행정소송법.tex");
        std::fs::write(&tex, FULL_BLOCK).unwrap();

        let summary = parse_exam_file(&tex, None).unwrap();
        assert_eq!(summary.question_count, 1);
        assert_eq!(summary.questions_path, dir.path().join("2024_행정소송법.json"));
        assert_eq!(
            summary.exceptions_path,
            dir.path().join("2024_행정소송법_exception.json")
        );

        let written = std::fs::read_to_string(&summary.questions_path).unwrap();
        assert!(written.contains("세무사"), "non-ASCII must not be escaped");
        assert_eq!(std::fs::read_to_string(&summary.exceptions_path).unwrap(), "[]");
    }
}
