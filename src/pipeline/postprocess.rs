//! Post-processing: deterministic cleanup of model transcripts.
//!
//! Exam transcripts are appended to one `.tex` file that the parser later
//! splits on the literal ` ```latex ` marker, so every exam output must
//! carry exactly that opener. OX transcripts are written as standalone JSON
//! files, so their fences come off.
//!
//! Rules are small pure `&str → String` passes, applied in a fixed order:
//! line endings before trimming, fences last so they are matched on clean
//! input.

use crate::config::TranscriptionMode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one model response for the given mode.
pub fn clean_transcript(input: &str, mode: TranscriptionMode) -> String {
    match mode {
        TranscriptionMode::Exam => clean_exam_output(input),
        TranscriptionMode::Ox => clean_ox_output(input),
    }
}

/// Exam rules:
/// 1. Normalise line endings
/// 2. Strip invisible Unicode
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ blank lines
/// 5. Make sure the block opens with ` ```latex `
/// 6. End with exactly one newline
pub fn clean_exam_output(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = ensure_latex_fence(&s);
    ensure_final_newline(&s)
}

/// OX rules: line endings, invisible Unicode, then strip the outer
/// ` ```json ` fence.
pub fn clean_ox_output(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    strip_json_fences(&s)
}

// ── Line endings ─────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Invisible characters ─────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Whitespace ───────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Fences ───────────────────────────────────────────────────────────────

const LATEX_FENCE: &str = "```latex";

/// Models occasionally answer with a bare ` ``` ` fence or none at all.
/// Without the ` ```latex ` opener the block would merge into its
/// neighbour when the transcript is split.
fn ensure_latex_fence(input: &str) -> String {
    let trimmed = input.trim_start();
    if trimmed.contains(LATEX_FENCE) {
        return input.to_string();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Bare or mislabelled opener: replace its info string.
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return format!("{LATEX_FENCE}\n{body}");
    }
    format!("{LATEX_FENCE}\n{}\n```", trimmed.trim_end())
}

static RE_JSON_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_json_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_JSON_FENCES.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fences_are_stripped() {
        assert_eq!(strip_json_fences("```json\n[{\"a\":1}]\n```"), "[{\"a\":1}]");
        assert_eq!(strip_json_fences("```\n[]\n```\n"), "[]");
        assert_eq!(strip_json_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn line_endings_and_invisibles() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(remove_invisible_chars("정\u{200B}답\u{FEFF}"), "정답");
    }

    #[test]
    fn latex_fence_is_kept_when_present() {
        let input = "```latex\n<<problem_num>>1.<</problem_num>>\n```";
        assert_eq!(ensure_latex_fence(input), input);
    }

    #[test]
    fn bare_fence_gets_latex_label() {
        let out = ensure_latex_fence("```tex\n<<choice>>①<</choice>>\n```");
        assert_eq!(out, "```latex\n<<choice>>①<</choice>>\n```");
    }

    #[test]
    fn unfenced_output_is_wrapped() {
        let out = ensure_latex_fence("<<problem_num>>3.<</problem_num>>\n");
        assert_eq!(out, "```latex\n<<problem_num>>3.<</problem_num>>\n```");
    }

    #[test]
    fn exam_cleanup_full_pipeline() {
        let input = "```latex\r\n<<problem_num>>12.<</problem_num>>   \r\n\r\n\r\n\r\n\r\n<<choice>>①<</choice>>\r\n```";
        let out = clean_exam_output(input);
        assert!(out.starts_with("```latex\n"));
        assert!(!out.contains('\r'));
        assert!(!out.contains("\n\n\n\n"));
        assert!(out.ends_with("```\n"));
    }

    #[test]
    fn mode_dispatch() {
        let raw = "```json\n[]\n```";
        assert_eq!(clean_transcript(raw, TranscriptionMode::Ox), "[]");
        assert!(clean_transcript(raw, TranscriptionMode::Exam).starts_with("```latex"));
    }
}
