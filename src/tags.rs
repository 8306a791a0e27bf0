//! Tag extraction from model transcripts.
//!
//! The exam prompt asks the model to wrap each part of a question in
//! `<<tag>> … <</tag>>` markers and each question in a ` ```latex ` fence.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use once_cell::sync::Lazy;

static TAG_PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn tag_regex(tag: &str) -> Regex {
    let mut cache = TAG_PATTERNS.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(tag.to_string())
        .or_insert_with(|| {
            let tag = regex::escape(tag);
            // Tag names are escaped, so the pattern is always valid.
            Regex::new(&format!(r"(?s)<<{tag}>>\s*(.*?)\s*<</{tag}>>")).unwrap()
        })
        .clone()
}

/// Contents of the first `<<tag>> … <</tag>>` pair, trimmed.
///
/// Matching is non-greedy and spans newlines.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    tag_regex(tag)
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// Split a transcript into question blocks on the literal ` ```latex `
/// marker. Pieces are trimmed; empty pieces are dropped.
pub fn split_latex_blocks(content: &str) -> Vec<&str> {
    content
        .split("```latex")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_match_across_lines() {
        let block = "<<description>>\n  다음 자료를 이용하여\n  계산하시오.  \n<</description>>\n\
                     <<description>>second<</description>>";
        assert_eq!(
            extract_tag(block, "description").as_deref(),
            Some("다음 자료를 이용하여\n  계산하시오.")
        );
    }

    #[test]
    fn missing_or_unclosed_tag_is_none() {
        assert_eq!(extract_tag("<<choice>> ① a", "choice"), None);
        assert_eq!(extract_tag("nothing here", "problem_num"), None);
    }

    #[test]
    fn empty_tag_is_empty_string() {
        assert_eq!(extract_tag("<<choice>>  <</choice>>", "choice").as_deref(), Some(""));
    }

    #[test]
    fn tag_names_are_literal() {
        // A tag name with regex metacharacters must not change the pattern.
        assert_eq!(extract_tag("<<a.b>>x<</a.b>>", "a.b").as_deref(), Some("x"));
        assert_eq!(extract_tag("<<axb>>x<</axb>>", "a.b"), None);
    }

    #[test]
    fn blocks_split_on_latex_fence() {
        let content = "preamble\n```latex\n<<problem_num>>1.<</problem_num>>\n```\n\n```latex\n\n```latex\nB\n```";
        let blocks = split_latex_blocks(content);
        assert_eq!(
            blocks,
            vec!["preamble", "<<problem_num>>1.<</problem_num>>\n```", "B\n```"]
        );
    }
}
