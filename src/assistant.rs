//! Prompts and reply cleanup for the chat, simplify and highlight endpoints.

use std::sync::LazyLock;

use regex::Regex;

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|\*").expect("emphasis regex is valid"));
static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("space regex is valid"));
static GLUED_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9])\.([A-Z])").expect("sentence regex is valid")
});

/// Flattens a model reply into one readable line: markdown emphasis is
/// removed, newlines (real or escaped) become spaces, runs of spaces collapse
/// and a missing space after a sentence-ending period is restored.
///
/// Matches do not overlap, so `U.S.A` becomes `U. S.A`.
pub fn format_reply(text: &str) -> String {
    let text = EMPHASIS.replace_all(text, "");
    let text = text.replace("\\n", " ").replace('\n', " ");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = GLUED_SENTENCE.replace_all(&text, "$1. $2");
    text.trim().to_owned()
}

pub fn simplify_prompt(text: &str) -> String {
    format!("Explain in simpler terms (under 50 words): {text}")
}

pub fn highlight_prompt(text: &str) -> String {
    format!(
        "Explain the following text in simple, beginner-friendly terms, using short sentences.\n\
Keep it under 3 sentences.\n\
Text: \"{text}\"\n"
    )
}
