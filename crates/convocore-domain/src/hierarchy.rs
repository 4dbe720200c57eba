//! The single normalization function shared by the hierarchy engine's
//! indexing pass and its query path. Child-instruction prefixes must
//! normalize identically everywhere they're compared, so there is exactly
//! one authoritative implementation rather than one copy per call site.
//!
//! Deliberately lives in the domain crate, not the application crate: it is
//! pure (no I/O, no async), and both the Pass 1 indexer and the Pass 2
//! resolver in `convocore-application::hierarchy_engine` need the exact
//! same behavior, so there is exactly one place it can live without
//! risking drift between two copies.

use crate::constants::hierarchy::NORMALIZE_MAX_LEN;

/// Prefixes stripped from the start of an instruction before matching,
/// case-insensitively, after whitespace collapse. Mirrors the source's
/// reply-quoting conventions ("Re:" in English, "Réponse:" in French).
const STRIPPED_PREFIXES: &[&str] = &["re:", "réponse:", "reponse:"];

/// Normalizes raw instruction text for hierarchy matching.
///
/// Deterministic and symmetric: `normalize(a) == normalize(b)` must hold
/// whenever `a` and `b` are the "same" instruction modulo casing,
/// whitespace, quote style, or a stripped reply prefix (spec.md §8's
/// invariant 4).
///
/// Steps, in order:
/// 1. Lowercase (Unicode-aware).
/// 2. Unify quotation marks (curly single/double, guillemets) to ASCII `'`/`"`.
/// 3. Collapse any run of whitespace to a single space, and trim the ends.
/// 4. Strip one leading "re:"/"réponse:" prefix, if present, then re-trim.
/// 5. Clamp to [`NORMALIZE_MAX_LEN`] `char`s (the nearest Rust-native
///    equivalent of the source's UTF-16 code-unit count; see DESIGN.md for
///    the deliberate departure this implies for astral-plane characters).
#[must_use]
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let unified = unify_quotes(&lowered);
    let collapsed = collapse_whitespace(&unified);
    let stripped = strip_reply_prefix(&collapsed);
    clamp_chars(stripped.trim(), NORMALIZE_MAX_LEN)
}

fn unify_quotes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => '"',
            other => other,
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_owned()
}

fn strip_reply_prefix(s: &str) -> String {
    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            return rest.trim_start().to_owned();
        }
    }
    s.to_owned()
}

fn clamp_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_idempotent() {
        let raw = "  Re:  Analyze   Logs for 'Errors'  ";
        let once = normalize(raw);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn is_symmetric_under_casing_and_whitespace() {
        let a = normalize("Analyze logs for errors");
        let b = normalize("  analyze   logs  for   ERRORS ");
        assert_eq!(a, b);
    }

    #[test]
    fn unifies_quote_styles() {
        let a = normalize("fix the \u{201C}login\u{201D} bug");
        let b = normalize("fix the \"login\" bug");
        assert_eq!(a, b);
    }

    #[test]
    fn strips_reply_prefixes() {
        assert_eq!(normalize("Re: refactor module x"), normalize("refactor module x"));
        assert_eq!(
            normalize("Réponse: corrige le bug"),
            normalize("corrige le bug")
        );
    }

    #[test]
    fn clamps_to_max_len() {
        let raw = "a".repeat(1000);
        let normalized = normalize(&raw);
        assert_eq!(normalized.chars().count(), NORMALIZE_MAX_LEN);
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }
}
