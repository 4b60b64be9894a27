//! Query text normalization.
//!
//! Every query is normalized the same way before it is embedded, so that
//! lookups over all three indexes see identical text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters replaced by a space.
pub const NOISE_CHARS: &str = "./,][-\")(~!#@^%$;*?&№∙^:<:>=_+\\|`1°234}{567890";

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b((?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’]))"#,
    )
    .expect("URL pattern is valid")
});

static LINE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^https?://.*[\r\n]*").expect("line URL pattern is valid"));

/// Normalize a query for embedding.
///
/// Pure and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\t' | '\u{200C}' => ' ',
            c => c,
        })
        .collect();

    let text = URL_RE.replace_all(&text, "");
    let text = LINE_URL_RE.replace_all(&text, "");

    let mut output: String = text
        .chars()
        .map(|c| if NOISE_CHARS.contains(c) { ' ' } else { c })
        .collect();

    while output.contains("  ") {
        output = output.replace("  ", " ");
    }

    output.trim().to_string()
}
