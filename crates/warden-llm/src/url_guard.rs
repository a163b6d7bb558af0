//! URL-scheme validation shared by every backend client (spec.md §4.12
//! "Note: URLs must begin with `http://` or `https://`. Any other scheme
//! is rejected at configuration time.").

use crate::error::{LlmError, LlmResult};

/// Reject any base URL whose scheme is not `http` or `https`.
///
/// # Errors
///
/// Returns [`LlmError::InvalidUrlScheme`] if `raw` fails to parse as a URL
/// or parses with a non-HTTP(S) scheme.
pub fn validate_backend_url(raw: &str) -> LlmResult<()> {
    let parsed = url::Url::parse(raw).map_err(|_| LlmError::InvalidUrlScheme(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(LlmError::InvalidUrlScheme(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_backend_url("http://localhost:11434").is_ok());
        assert!(validate_backend_url("https://api.example.com").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(validate_backend_url("file:///etc/passwd").is_err());
        assert!(validate_backend_url("ftp://example.com").is_err());
        assert!(validate_backend_url("not a url").is_err());
    }
}
