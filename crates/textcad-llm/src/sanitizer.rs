//! Cleanup of raw LLM output into renderer-ready OpenSCAD source
//!
//! Models routinely wrap code in markdown fences, sprinkle inline backticks,
//! or name the language in their own output. [`sanitize`] removes all of
//! that and never fails: text without fences or backticks comes back trimmed.

use regex::Regex;

const FENCE: &str = "```";

/// Substrings removed from every generated source by default
pub const DEFAULT_BANNED_TERMS: &[&str] = &["openscad"];

/// Sanitize with the default banned terms
pub fn sanitize(raw: &str) -> String {
    Sanitizer::default().sanitize(raw)
}

/// Configurable sanitizer
#[derive(Debug, Clone)]
pub struct Sanitizer {
    banned: Option<Regex>,
}

impl Sanitizer {
    /// Build a sanitizer that strips the given terms case-insensitively
    pub fn new<I, S>(banned_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = banned_terms
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect();

        // Escaped literals always form a valid pattern
        let banned = if alternatives.is_empty() {
            None
        } else {
            Regex::new(&format!("(?i){}", alternatives.join("|"))).ok()
        };

        Self { banned }
    }

    /// Reduce raw model output to compilable source text
    pub fn sanitize(&self, raw: &str) -> String {
        let extracted = extract_code(raw);
        let mut text = extracted.replace('`', "");

        if let Some(banned) = &self.banned {
            // Removing one occurrence can join its neighbours into a new one
            while banned.is_match(&text) {
                text = banned.replace_all(&text, "").into_owned();
            }
        }

        text.trim().to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_BANNED_TERMS.iter().copied())
    }
}

/// Pick the code portion of a response: first fenced block, else the first
/// inline backtick span, else everything.
fn extract_code(raw: &str) -> &str {
    if let Some(start) = raw.find(FENCE) {
        let after = &raw[start + FENCE.len()..];
        let block = match after.find(FENCE) {
            Some(end) => &after[..end],
            None => after,
        };
        return strip_language_tag(block);
    }

    if let Some(start) = raw.find('`') {
        let after = &raw[start + 1..];
        return match after.find('`') {
            Some(end) => &after[..end],
            None => after,
        };
    }

    raw
}

/// Drop a leading ```` ```scad ```` style tag line from a fenced block
fn strip_language_tag(block: &str) -> &str {
    match block.find('\n') {
        Some(newline) => {
            let first_line = block[..newline].trim_end_matches('\r');
            if is_language_tag(first_line) {
                &block[newline + 1..]
            } else {
                block
            }
        }
        None => block,
    }
}

fn is_language_tag(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.'))
}
