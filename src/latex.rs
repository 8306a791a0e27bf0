//! Math-safe LaTeX normalisation for choice text.
//!
//! Choice lists are rendered by MathJax inside a web page, where a stray
//! `\quad` or `\,` in plain text shows up literally. Backslashes are removed
//! everywhere except inside math and array regions, which are copied
//! through untouched.

const ARRAY_BEGIN: &str = r"\begin{array}";
const ARRAY_END: &str = r"\end{array}";

/// Remove every `\` outside protected regions.
///
/// Protected regions:
/// - `\begin{array}` up to the first following `\end{array}`
/// - one or two `$`, then up to the next `$` (taking a directly following
///   second `$` too). A `$$` with no later `$` is a region on its own.
///
/// An unterminated array or a lone `$` with no closer is plain text.
pub fn remove_backslash_outside_math(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while let Some(ch) = text[i..].chars().next() {
        let rest = &text[i..];
        if let Some(len) = protected_len(rest) {
            out.push_str(&rest[..len]);
            i += len;
            continue;
        }
        if ch != '\\' {
            out.push(ch);
        }
        i += ch.len_utf8();
    }
    out
}

/// Byte length of the protected region starting at `rest`, if any.
fn protected_len(rest: &str) -> Option<usize> {
    if let Some(body) = rest.strip_prefix(ARRAY_BEGIN) {
        let end = body.find(ARRAY_END)?;
        return Some(ARRAY_BEGIN.len() + end + ARRAY_END.len());
    }

    let opener = if rest.starts_with("$$") {
        2
    } else if rest.starts_with('$') {
        1
    } else {
        return None;
    };

    match rest[opener..].find('$') {
        Some(close) => {
            let mut end = opener + close + 1;
            if rest[end..].starts_with('$') {
                end += 1;
            }
            Some(end)
        }
        // `$$` alone: the second `$` closes the first.
        None if opener == 2 => Some(2),
        None => None,
    }
}
