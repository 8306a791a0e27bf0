//! Line reflow and spacing correction for Mathpix OCR output.
//!
//! OCR splits text at the physical line breaks of the scan. Korean words
//! that straddle a break come back glued to their neighbour once the lines
//! are joined (`자본을` + `증가시킨다` → `자본을증가시킨다`). For every line
//! break we join the last token of one line with the first token of the
//! next, run a [`Spacer`] over the Hangul parts, and record the pair when
//! the spacer splits it. Each recorded correction is then applied to the
//! joined text.
//!
//! Math (`$…$`) is never passed to the spacer.

use crate::error::ExamError;
use crate::output::{Correction, ReflowOutput};
use crate::parse::{read_json, write_json_pretty};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

static INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$.*?\$").unwrap());
static KOREAN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[가-힣\s,.]+").unwrap());

// ── Spacers ──────────────────────────────────────────────────────────────

/// Inserts word spacing into Korean text.
pub trait Spacer {
    fn space(&self, text: &str) -> Result<String, ExamError>;
}

/// Dictionary-free Korean spacer.
///
/// Inside a run of Hangul syllables a space is inserted after a common
/// particle or ending when at least one syllable precedes the particle
/// and at least two follow it. Good enough for tokens glued across a line
/// break; not a general-purpose spacer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticleSpacer;

/// Longest first, so `에서` wins over a shorter match.
const PARTICLES: &[&str] = &[
    "에서", "에게", "으로", "부터", "까지", "은", "는", "을", "를", "의",
];

fn is_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

fn ends_with_particle(prefix: &[char]) -> bool {
    PARTICLES.iter().any(|p| {
        let p: Vec<char> = p.chars().collect();
        prefix.len() > p.len() && prefix.ends_with(&p)
    })
}

fn space_syllable_run(run: &[char], out: &mut String) {
    let mut seg_start = 0;
    for k in 1..run.len() {
        if run.len() - k >= 2 && ends_with_particle(&run[seg_start..k]) {
            out.extend(&run[seg_start..k]);
            out.push(' ');
            seg_start = k;
        }
    }
    out.extend(&run[seg_start..]);
}

impl Spacer for ParticleSpacer {
    fn space(&self, text: &str) -> Result<String, ExamError> {
        let mut out = String::with_capacity(text.len() + 8);
        let mut run: Vec<char> = Vec::new();
        for c in text.chars() {
            if is_syllable(c) {
                run.push(c);
                continue;
            }
            space_syllable_run(&run, &mut out);
            run.clear();
            out.push(c);
        }
        space_syllable_run(&run, &mut out);
        Ok(out)
    }
}

/// Pipes text through an external command (stdin → stdout).
///
/// Use this to plug in a neural spacing model behind a small wrapper
/// script. A trailing newline added by the command is dropped.
#[derive(Debug, Clone)]
pub struct CommandSpacer {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpacer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace: `"python3 spacing.py"`.
    pub fn from_command_line(line: &str) -> Result<Self, ExamError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ExamError::InvalidConfig("spacing command is empty".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn error(&self, detail: impl Into<String>) -> ExamError {
        ExamError::Spacing {
            command: self.program.clone(),
            detail: detail.into(),
        }
    }
}

impl Spacer for CommandSpacer {
    fn space(&self, text: &str) -> Result<String, ExamError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.error(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| self.error(format!("writing stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.error(e.to_string()))?;
        if !output.status.success() {
            return Err(self.error(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut spaced = String::from_utf8_lossy(&output.stdout).into_owned();
        if !text.ends_with('\n') {
            if spaced.ends_with('\n') {
                spaced.pop();
            }
            if spaced.ends_with('\r') {
                spaced.pop();
            }
        }
        Ok(spaced)
    }
}

// ── Reflow ───────────────────────────────────────────────────────────────

/// `line_data[].text` values from a Mathpix response. Lines without a
/// text field are skipped.
pub fn extract_line_texts(mathpix: &serde_json::Value) -> Vec<String> {
    mathpix
        .get("line_data")
        .and_then(serde_json::Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.get("text").and_then(serde_json::Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Left-strip every line of every text, keeping newlines, then
/// concatenate the texts.
pub fn join_lines<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|text| {
            text.as_ref()
                .split('\n')
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

/// Run `spacer` over the Korean parts of `text` only.
///
/// Inline math is swapped for `<<MATH_i>>` placeholders first, the spacer
/// sees each maximal run of Hangul, whitespace, `,` and `.`, and the
/// placeholders are restored afterwards.
pub fn space_outside_math(text: &str, spacer: &dyn Spacer) -> Result<String, ExamError> {
    let formulas: Vec<&str> = INLINE_MATH.find_iter(text).map(|m| m.as_str()).collect();
    let mut masked = text.to_string();
    for (i, formula) in formulas.iter().enumerate() {
        masked = masked.replace(formula, &format!("<<MATH_{i}>>"));
    }

    let mut spaced = String::with_capacity(masked.len());
    let mut last = 0;
    for m in KOREAN_RUN.find_iter(&masked) {
        spaced.push_str(&masked[last..m.start()]);
        spaced.push_str(&spacer.space(m.as_str())?);
        last = m.end();
    }
    spaced.push_str(&masked[last..]);

    for (i, formula) in formulas.iter().enumerate() {
        spaced = spaced.replace(&format!("<<MATH_{i}>>"), formula);
    }
    Ok(spaced)
}

/// Candidate fixes for tokens glued across each line break.
pub fn spacing_corrections<S: AsRef<str>>(
    lines: &[S],
    spacer: &dyn Spacer,
) -> Result<Vec<Correction>, ExamError> {
    let mut corrections = Vec::new();
    for pair in lines.windows(2) {
        let curr = pair[0].as_ref().trim();
        let next = pair[1].as_ref().trim();
        if next.is_empty() {
            continue;
        }
        let (Some(last), Some(first)) = (curr.split_whitespace().last(), next.split_whitespace().next())
        else {
            continue;
        };

        let joined = format!("{last}{first}");
        let spaced = space_outside_math(&joined, spacer)?;
        if spaced != joined {
            corrections.push(Correction { joined, spaced });
        }
    }
    Ok(corrections)
}

/// Join OCR lines and apply every spacing correction, in order.
pub fn reflow<S: AsRef<str>>(texts: &[S], spacer: &dyn Spacer) -> Result<ReflowOutput, ExamError> {
    let mut text = join_lines(texts);
    let corrections = spacing_corrections(texts, spacer)?;
    for c in &corrections {
        if text.contains(&c.joined) {
            debug!("Respacing '{}' → '{}'", c.joined, c.spaced);
            text = text.replace(&c.joined, &c.spaced);
        }
    }
    Ok(ReflowOutput { text, corrections })
}

/// Read a saved Mathpix response, reflow it and write the text to `output`.
///
/// When `corrections_path` is given the correction list is written there
/// as JSON too.
pub fn reflow_file(
    mathpix_json: &Path,
    output: &Path,
    corrections_path: Option<&Path>,
    spacer: &dyn Spacer,
) -> Result<ReflowOutput, ExamError> {
    let value: serde_json::Value = read_json(mathpix_json)?;
    let texts = extract_line_texts(&value);
    let result = reflow(&texts, spacer)?;

    std::fs::write(output, &result.text).map_err(|source| ExamError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    })?;
    if let Some(path) = corrections_path {
        write_json_pretty(path, &result.corrections)?;
    }

    info!(
        "Reflowed {} lines with {} corrections → {}",
        texts.len(),
        result.corrections.len(),
        output.display()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Splits after a fixed word, to test the plumbing independently of
    /// the heuristic.
    struct SplitAfter(&'static str);

    impl Spacer for SplitAfter {
        fn space(&self, text: &str) -> Result<String, ExamError> {
            Ok(text.replacen(self.0, &format!("{} ", self.0), 1))
        }
    }

    #[test]
    fn particle_spacer_splits_after_particle() {
        let s = ParticleSpacer;
        assert_eq!(s.space("자본을증가시킨다").unwrap(), "자본을 증가시킨다");
        assert_eq!(s.space("회계의기본").unwrap(), "회계의 기본");
        assert_eq!(s.space("학교에서공부").unwrap(), "학교에서 공부");
    }

    #[test]
    fn particle_spacer_leaves_short_or_plain_runs() {
        let s = ParticleSpacer;
        assert_eq!(s.space("증가시킨다").unwrap(), "증가시킨다");
        // Only one syllable follows the particle.
        assert_eq!(s.space("자본을다").unwrap(), "자본을다");
        assert_eq!(s.space("abc, 1.").unwrap(), "abc, 1.");
    }

    #[test]
    fn extracts_texts_from_line_data() {
        let value = json!({
            "text": "ignored",
            "line_data": [
                {"text": "첫 줄"},
                {"type": "diagram"},
                {"text": "둘째 줄"}
            ]
        });
        assert_eq!(extract_line_texts(&value), vec!["첫 줄", "둘째 줄"]);
        assert!(extract_line_texts(&json!({})).is_empty());
    }

    #[test]
    fn join_lines_left_strips_and_keeps_newlines() {
        let texts = ["  a\n   b\n", "  c "];
        assert_eq!(join_lines(&texts), "a\nb\nc ");
    }

    #[test]
    fn math_is_hidden_from_spacer() {
        let spacer = SplitAfter("가");
        assert_eq!(
            space_outside_math("$가나$가나", &spacer).unwrap(),
            "$가나$가 나"
        );

        let spacer = SplitAfter("자본을");
        assert_eq!(
            space_outside_math("$a$자본을증가", &spacer).unwrap(),
            "$a$자본을 증가"
        );
    }

    #[test]
    fn corrections_join_tokens_across_breaks() {
        let lines = ["수익은 자본을", "증가시킨다.", "", "끝"];
        let corrections = spacing_corrections(&lines, &ParticleSpacer).unwrap();
        assert_eq!(
            corrections,
            vec![Correction {
                joined: "자본을증가시킨다.".into(),
                spaced: "자본을 증가시킨다.".into(),
            }]
        );
    }

    #[test]
    fn reflow_applies_corrections_to_joined_text() {
        let texts = ["수익은 자본을", "증가시킨다."];
        let out = reflow(&texts, &ParticleSpacer).unwrap();
        assert_eq!(out.text, "수익은 자본을 증가시킨다.");
        assert_eq!(out.corrections.len(), 1);
    }

    #[test]
    fn reflow_without_matches_is_plain_join() {
        let texts = ["$x$ 는", " 값"];
        let out = reflow(&texts, &ParticleSpacer).unwrap();
        assert_eq!(out.text, "$x$ 는값");
        assert!(out.corrections.is_empty());
    }

    #[test]
    fn command_spacer_reports_missing_program() {
        let spacer = CommandSpacer::new("definitely-not-a-spacing-command", vec![]);
        let err = spacer.space("가나").unwrap_err();
        assert!(matches!(err, ExamError::Spacing { .. }));
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandSpacer::from_command_line("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_spacer_pipes_through_cat() {
        let spacer = CommandSpacer::from_command_line("cat").unwrap();
        assert_eq!(spacer.space("자본을 증가").unwrap(), "자본을 증가");
    }
}
