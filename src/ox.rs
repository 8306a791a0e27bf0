//! OX (true/false) question text → JSON.
//!
//! Input is a plain-text file of numbered statements:
//!
//! ```text
//! 1. 회계등식은 자산 = 부채 + 자본이다.
//! 정답: O
//! 세부 카테고리: 회계 기본원리 / 회계등식
//! 해설: 회계의 기본 구조는 ...
//! ```

use crate::error::ExamError;
use crate::output::OxQuestion;
use crate::parse::{file_stem, read_to_string, write_json_pretty};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static BLOCK_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.\s").unwrap());
static HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s*(.+?)\n정답:\s*(O|X)").unwrap());
static CATEGORY: Lazy<Regex> = Lazy::new(|| Regex::new(r"세부 카테고리:\s*(.+)").unwrap());
static EXPLANATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)해설:\s*(.+)").unwrap());

/// Split the text into one block per numbered statement.
///
/// A block starts at every line beginning with `<digits>.` plus
/// whitespace. The newline before a boundary is dropped.
fn split_blocks(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut blocks = Vec::new();
    let mut start = 0;
    for m in BLOCK_START.find_iter(text) {
        if m.start() == 0 {
            continue;
        }
        blocks.push(&text[start..m.start() - 1]);
        start = m.start();
    }
    blocks.push(&text[start..]);
    blocks
}

/// Parse every well-formed block. Blocks without a number, a one-line
/// statement and a `정답: O|X` line are skipped.
pub fn parse_ox_text(text: &str) -> Vec<OxQuestion> {
    let mut questions = Vec::new();
    for block in split_blocks(text) {
        let Some(head) = HEAD.captures(block) else {
            debug!("Skipping OX block: {:?}", block.lines().next().unwrap_or(""));
            continue;
        };

        let category = CATEGORY
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let explanation = EXPLANATION
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();

        questions.push(OxQuestion {
            number: head[1].to_string(),
            question: head[2].trim().to_string(),
            answer: head[3].to_string(),
            category,
            explanation,
        });
    }
    questions
}

/// Parse `path` and write `<out_dir>/<stem>_ox_questions.json`.
///
/// `out_dir` defaults to the input's directory. Returns the written path.
pub fn parse_ox_file(path: &Path, out_dir: Option<&Path>) -> Result<PathBuf, ExamError> {
    let text = read_to_string(path)?;
    let questions = parse_ox_text(&text);

    let dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.parent().unwrap_or_else(|| Path::new("")).to_path_buf());
    let out = dir.join(format!("{}_ox_questions.json", file_stem(path)));
    write_json_pretty(&out, &questions)?;

    info!("Parsed {} OX questions → {}", questions.len(), out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1. 회계등식은 자산 = 부채 + 자본이다.
정답: O
세부 카테고리: 회계 기본원리 / 회계등식
해설: 회계의 기본 구조는 자산은 부채와 자본의 합이다.

2. 수익은 자본을 감소시킨다.
정답: X
해설: 수익은 자본을 증가시킨다.
비용은 자본을 감소시킨다.
";

    #[test]
    fn parses_numbered_blocks() {
        let qs = parse_ox_text(SAMPLE);
        assert_eq!(qs.len(), 2);

        assert_eq!(qs[0].number, "1");
        assert_eq!(qs[0].question, "회계등식은 자산 = 부채 + 자본이다.");
        assert_eq!(qs[0].answer, "O");
        assert_eq!(qs[0].category, "회계 기본원리 / 회계등식");
        assert_eq!(qs[0].explanation, "회계의 기본 구조는 자산은 부채와 자본의 합이다.");

        assert_eq!(qs[1].answer, "X");
        assert_eq!(qs[1].category, "");
        assert_eq!(
            qs[1].explanation,
            "수익은 자본을 증가시킨다.\n비용은 자본을 감소시킨다."
        );
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let text = "1. 정답 줄이 없다.\n해설: x\n2. 두 번째.\n정답: O";
        let qs = parse_ox_text(text);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].number, "2");
        assert_eq!(qs[0].explanation, "");
    }

    #[test]
    fn answer_must_be_o_or_x() {
        assert!(parse_ox_text("1. 문장\n정답: 맞음").is_empty());
    }

    #[test]
    fn numbers_inside_a_line_do_not_split() {
        let text = "1. 2024. 개정 기준에 따른다.\n정답: O";
        let qs = parse_ox_text(text);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].question, "2024. 개정 기준에 따른다.");
    }

    #[test]
    fn bare_number_line_keeps_the_next_boundary() {
        let text = "1. 첫 문장\n정답: O\n2.\n3. 다른 문장\n정답: X";
        assert_eq!(split_blocks(text), vec!["1. 첫 문장\n정답: O", "2.", "3. 다른 문장\n정답: X"]);
        let numbers: Vec<_> = parse_ox_text(text).into_iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec!["1", "3"]);
    }

    #[test]
    fn writes_named_after_stem() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("회계학개론.txt");
        std::fs::write(&input, SAMPLE).unwrap();
        let out_dir = dir.path().join("output");

        let out = parse_ox_file(&input, Some(&out_dir)).unwrap();
        assert_eq!(out, out_dir.join("회계학개론_ox_questions.json"));

        let back: Vec<OxQuestion> =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(back, parse_ox_text(SAMPLE));
    }
}
