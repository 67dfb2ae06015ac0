// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CSRF token scraping for the printer's management console.
//
// The console embeds each form's anti-forgery token as a hidden input:
//
// ```text
// <input type="hidden" id="CSRFToken7" name="CSRFToken" value="...">
// ```
//
// The markup is firmware-specific, so the sequencing code in `web_access`
// only sees the `TokenExtractor` trait and never the parsing strategy.

use regex::Regex;
use tracing::{debug, warn};

/// Pulls a CSRF token for a given element id out of an HTML page.
pub trait TokenExtractor: Send + Sync {
    /// Return the token attached to `element_id`, or `None` when the page has
    /// no such element.
    fn extract_token(&self, html: &str, element_id: &str) -> Option<String>;
}

/// Default extractor: matches the exact attribute sequence the firmware emits.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexTokenExtractor;

impl RegexTokenExtractor {
    fn pattern(element_id: &str) -> Option<Regex> {
        let source = format!(
            r#"id="{}" name="CSRFToken" value="([^"]+)""#,
            regex::escape(element_id)
        );
        match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(element_id, error = %e, "could not build CSRF token pattern");
                None
            }
        }
    }
}

impl TokenExtractor for RegexTokenExtractor {
    fn extract_token(&self, html: &str, element_id: &str) -> Option<String> {
        let token = Self::pattern(element_id)?
            .captures(html)?
            .get(1)
            .map(|m| m.as_str().to_string());
        debug!(element_id, found = token.is_some(), "CSRF token lookup");
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <form method="post" action="/general/head_cleaning_confirm.html">
          <input type="hidden" id="CSRFToken1" name="CSRFToken" value="tok-one">
          <input type="hidden" id="CSRFToken7" name="CSRFToken" value="abc123">
          <input type="hidden" id="CSRFToken10" name="CSRFToken" value="tok-ten">
        </form>
    "#;

    #[test]
    fn finds_token_for_element_id() {
        let token = RegexTokenExtractor.extract_token(PAGE, "CSRFToken7");
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_element_yields_none() {
        assert_eq!(RegexTokenExtractor.extract_token(PAGE, "CSRFToken3"), None);
        assert_eq!(RegexTokenExtractor.extract_token("", "CSRFToken7"), None);
    }

    #[test]
    fn element_id_is_matched_exactly() {
        // CSRFToken1 must not pick up CSRFToken10's value or vice versa.
        assert_eq!(
            RegexTokenExtractor.extract_token(PAGE, "CSRFToken1").as_deref(),
            Some("tok-one")
        );
        assert_eq!(
            RegexTokenExtractor.extract_token(PAGE, "CSRFToken10").as_deref(),
            Some("tok-ten")
        );
    }

    #[test]
    fn empty_value_is_not_a_token() {
        let html = r#"<input id="CSRFToken2" name="CSRFToken" value="">"#;
        assert_eq!(RegexTokenExtractor.extract_token(html, "CSRFToken2"), None);
    }

    #[test]
    fn regex_metacharacters_in_id_are_escaped() {
        let html = r#"<input id="a.b" name="CSRFToken" value="dot">"#;
        assert_eq!(RegexTokenExtractor.extract_token(html, "axb"), None);
        assert_eq!(
            RegexTokenExtractor.extract_token(html, "a.b").as_deref(),
            Some("dot")
        );
    }
}
