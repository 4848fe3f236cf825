//! Log Redaction Layer
//!
//! Scrubs credentials embedded in URLs (userinfo, token-like query parameters)
//! before they are logged.

use regex::Regex;
use std::sync::LazyLock;

static USERINFO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"://[^/@\s]+@").unwrap());
static SECRET_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([?&](?:access_token|token|api_key|apikey|key|secret|password|auth|signature|sig)=)[^&#\s:]*",
    )
    .unwrap()
});

/// Redacts credentials from every URL found in `input`.
pub fn redact_url(input: &str) -> String {
    let redacted = USERINFO_RE.replace_all(input, "://[REDACTED]@");
    SECRET_PARAM_RE
        .replace_all(&redacted, "${1}[REDACTED]")
        .into_owned()
}
