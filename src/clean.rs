//! Text normalization for extracted legal text.
//!
//! Raw text from PDF text layers and OCR is noisy: stray page numbers,
//! runs of layout whitespace, detached punctuation and typographic quotes.
//! [`clean_text`] normalizes all of that deterministically while keeping
//! paragraph and line structure intact, since the section-aware chunker
//! relies on headings sitting at the start of a line.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Normalize raw extracted text. Pure and infallible; empty in, empty out.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = normalize_line_endings(text);
    cleaned = remove_page_numbers(&cleaned);
    cleaned = collapse_whitespace(&cleaned);
    cleaned = attach_punctuation(&cleaned);
    cleaned = straighten_quotes(&cleaned);

    cleaned.trim().to_string()
}

fn normalize_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n'))
        .collect()
}

/// Drops lines that hold only a page marker: `12`, `3 / 40`, `Page 7 of 9`.
fn remove_page_numbers(input: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"\n[ \t]*(?:\d+(?:[ \t]*/[ \t]*\d+)?|(?i:page)[ \t]+\d+(?:[ \t]+(?i:of)[ \t]+\d+)?)[ \t]*\n",
        )
        .unwrap()
    });
    // A second pass catches markers on adjacent lines, whose shared newline
    // was consumed by the first match.
    let once = RE.replace_all(input, "\n");
    RE.replace_all(&once, "\n").into_owned()
}

/// Runs spanning two or more newlines become a paragraph break; any other
/// run of three or more whitespace characters becomes a single space.
fn collapse_whitespace(input: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    RE.replace_all(input, |caps: &Captures| {
        let run = &caps[0];
        if run.matches('\n').count() >= 2 {
            "\n\n".to_string()
        } else if run.chars().count() >= 3 {
            " ".to_string()
        } else {
            run.to_string()
        }
    })
    .into_owned()
}

fn attach_punctuation(input: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,:;!?])").unwrap());
    RE.replace_all(input, "$1").into_owned()
}

fn straighten_quotes(input: &str) -> String {
    input
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
