//! Challenge page recognition and token extraction.

use once_cell::sync::Lazy;
use regex::Regex;

/// JavaScript variable the challenge page assigns its hex token to.
const TOKEN_VARIABLE: &str = "arg1";

/// Cookie-name marker present in every ACW challenge page.
const COOKIE_MARKER: &str = "acw_sc__v2";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"var\s+arg1\s*=\s*'([0-9A-Fa-f]+)'").expect("invalid token regex")
});

/// Returns `true` when the body looks like an ACW WAF challenge page.
///
/// Both markers must be present; a 200 body missing either one is "not a
/// challenge" even if it is otherwise unexpected.
pub fn is_waf_challenge(body: &str) -> bool {
    body.contains(COOKIE_MARKER) && body.contains(TOKEN_VARIABLE)
}

/// Extract the hexadecimal challenge token assigned to `arg1`.
///
/// Returns `None` when the assignment is absent, meaning the page is not a
/// decodable challenge.
pub fn extract_token(body: &str) -> Option<&str> {
    TOKEN_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE_PAGE: &str = r#"
        <html><script>
        var arg1='05A2C1F34B7D89E6012F4A6B8C9D3E5F7A1B2C4D';
        document.cookie = 'acw_sc__v2=' + _0x5e8b26(arg1);
        </script></html>
    "#;

    #[test]
    fn recognises_challenge_page() {
        assert!(is_waf_challenge(CHALLENGE_PAGE));
    }

    #[test]
    fn requires_both_markers() {
        assert!(!is_waf_challenge("var arg1='AB12';"));
        assert!(!is_waf_challenge("acw_sc__v2 mentioned without the variable"));
        assert!(!is_waf_challenge(r#"{"id":"msg_01","type":"message"}"#));
    }

    #[test]
    fn extracts_token() {
        assert_eq!(
            extract_token(CHALLENGE_PAGE),
            Some("05A2C1F34B7D89E6012F4A6B8C9D3E5F7A1B2C4D")
        );
    }

    #[test]
    fn extraction_tolerates_spacing() {
        assert_eq!(extract_token("var  arg1 = 'FFEE'"), Some("FFEE"));
    }

    #[test]
    fn missing_assignment_yields_none() {
        assert_eq!(extract_token("<html>acw_sc__v2 arg1</html>"), None);
    }
}
