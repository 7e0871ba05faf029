//! Input validation utilities for DOIs, URLs, and download filenames.
//!
//! DOIs arrive straight from the query string and are appended to the mirror
//! URL, so they are checked against a strict pattern before any request is made.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Accepted DOI shape: `10.` + 4-9 digit registrant + `/` + suffix
pub const DOI_PATTERN: &str = r"^10\.\d{4,9}/[-._;()/:A-Za-z0-9]+$";

/// Characters that cannot appear in a `Content-Disposition` filename
const FILENAME_RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("DOI query parameter is required")]
    MissingDoi,

    #[error("Invalid DOI format")]
    InvalidDoi(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

fn doi_regex() -> &'static Regex {
    static DOI_RE: OnceLock<Regex> = OnceLock::new();
    DOI_RE.get_or_init(|| Regex::new(DOI_PATTERN).expect("DOI pattern is a valid regex"))
}

/// Validate a DOI
///
/// The DOI is returned unchanged: no trimming, no case folding, no prefix
/// stripping. Anything that does not match [`DOI_PATTERN`] exactly is rejected.
pub fn validate_doi(doi: &str) -> Result<String, ValidationError> {
    if doi.is_empty() {
        return Err(ValidationError::MissingDoi);
    }

    if !doi_regex().is_match(doi) {
        return Err(ValidationError::InvalidDoi(doi.to_string()));
    }

    Ok(doi.to_string())
}

/// Validate a configured base URL
///
/// Must be absolute http(s). The returned URL always ends with `/` so that a
/// path can be appended by plain concatenation.
pub fn validate_base_url(url: &str) -> Result<String, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::InvalidUrl("empty URL".to_string()));
    }

    let parsed = url::Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

/// Replace characters that are unsafe in a download filename with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| if FILENAME_RESERVED.contains(&ch) { '_' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_doi_valid() {
        assert!(validate_doi("10.1145/3025453.3025501").is_ok());
        assert!(validate_doi("10.1038/s41586-019-1724-z").is_ok());
        assert!(validate_doi("10.1371/journal.pone.0115069").is_ok());
        assert!(validate_doi("10.1002/(SICI)1097-4571(199806)49:8").is_ok());
    }

    #[test]
    fn test_validate_doi_missing() {
        assert_eq!(validate_doi(""), Err(ValidationError::MissingDoi));
    }

    #[test]
    fn test_validate_doi_invalid() {
        assert!(validate_doi("10.1234").is_err()); // No slash
        assert!(validate_doi("9.1234/abc").is_err()); // Doesn't start with 10
        assert!(validate_doi("10.123/abc").is_err()); // Registrant too short
        assert!(validate_doi("10.1234567890/abc").is_err()); // Registrant too long
        assert!(validate_doi("10.1234/abc def").is_err());
        assert!(validate_doi("10.1234/abc<script>").is_err());
        assert!(validate_doi(" 10.1234/abc").is_err());
        assert!(validate_doi("doi:10.1234/abc").is_err());
    }

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("https://mirror.example").unwrap(),
            "https://mirror.example/"
        );
        assert_eq!(
            validate_base_url("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080/"
        );
        assert!(validate_base_url("").is_err());
        assert!(validate_base_url("ftp://mirror.example").is_err());
        assert!(validate_base_url("mirror.example").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("10.1145/3025453.3025501"),
            "10.1145_3025453.3025501"
        );
        assert_eq!(sanitize_filename(r#"a\b:c*d?e"f<g>h|i"#), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_filename("plain-name_1.2"), "plain-name_1.2");
    }
}
