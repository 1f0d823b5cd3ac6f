//! Shared helpers: the HTTP client, input validation and text cleanup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::error::MatchError;

pub const USER_AGENT: &str = concat!("medmatch/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the registry sources. The per-call deadline is
/// enforced by the aggregator; the client timeout only bounds direct use.
pub fn http_client() -> Result<reqwest::Client, MatchError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .pool_max_idle_per_host(2)
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| MatchError::Internal(format!("failed to build http client: {}", e)))
}

/// Map a non-2xx response to `UpstreamStatus`.
pub fn check_status(
    source_name: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, MatchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(MatchError::UpstreamStatus {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        })
    }
}

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static JS_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static INLINE_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});
static ORCID_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{4}-\d{4}-\d{3}[\dX]$").expect("valid regex"));

/// Make free text safe to store and echo back.
///
/// Script blocks are removed before escaping so their bodies do not survive
/// as escaped text.
pub fn sanitize_input(text: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(text, "");
    let escaped = html_escape::encode_quoted_attribute(&without_scripts);
    let escaped = JS_SCHEME.replace_all(&escaped, "");
    let escaped = INLINE_HANDLER.replace_all(&escaped, "");
    escaped.trim().to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), MatchError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(MatchError::InvalidInput(format!(
            "'{}' is not a valid email address",
            email
        )))
    }
}

/// `dddd-dddd-dddd-ddd[dX]`
pub fn validate_orcid_id(orcid_id: &str) -> Result<(), MatchError> {
    if orcid_id.trim().is_empty() {
        return Err(MatchError::InvalidInput("ORCID ID is required".into()));
    }
    if ORCID_ID.is_match(orcid_id) {
        Ok(())
    } else {
        Err(MatchError::InvalidInput(format!(
            "'{}' is not a valid ORCID iD",
            orcid_id
        )))
    }
}

/// First `max` characters of `text`, with "..." appended when cut.
pub fn truncate_snippet(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Decode entities that upstream APIs double-encode in titles.
pub fn clean_html_entities(text: &str) -> String {
    let mut cleaned = text.to_string();
    for _ in 0..2 {
        let decoded = html_escape::decode_html_entities(&cleaned).into_owned();
        if decoded == cleaned {
            break;
        }
        cleaned = decoded;
    }
    cleaned
}

/// Prefix a person's name with "Dr." unless it already has it.
pub fn doctor_name(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("Dr.") {
        name.to_string()
    } else {
        format!("Dr. {}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_scripts_and_handlers() {
        assert_eq!(
            sanitize_input("  hello <script>alert(1)</script>world "),
            "hello world"
        );
        assert_eq!(sanitize_input("<b onclick=\"x\">hi</b>"), "&lt;b &quot;x&quot;&gt;hi&lt;/b&gt;");
        assert_eq!(sanitize_input("JavaScript:void(0)"), "void(0)");
        assert_eq!(sanitize_input(""), "");
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("jane.doe@example.org").is_ok());
        assert!(validate_email("jane@localhost").is_err());
        assert!(validate_email("not an email").is_err());
    }

    #[test]
    fn test_orcid_validation() {
        assert!(validate_orcid_id("0000-0002-1825-0097").is_ok());
        assert!(validate_orcid_id("0000-0002-1694-233X").is_ok());
        let err = validate_orcid_id("0000-0002-1825").unwrap_err();
        assert!(err.is_client_error());
        assert!(validate_orcid_id("").is_err());
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("short", 200), "short");
        assert_eq!(truncate_snippet("abcdef", 3), "abc...");
        // multi-byte characters are not split
        assert_eq!(truncate_snippet("ééééé", 2), "éé...");
    }

    #[test]
    fn test_doctor_name() {
        assert_eq!(doctor_name("Jane Smith"), "Dr. Jane Smith");
        assert_eq!(doctor_name("Dr. Jane Smith"), "Dr. Jane Smith");
    }
}
