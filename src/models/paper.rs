//! DOI identifier and bibliographic metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::{sanitize_filename, validate_doi, ValidationError};

/// Title used when the registry has no title for a DOI
pub const PLACEHOLDER_TITLE: &str = "Title not available";

/// Authors string used when the registry has no authors for a DOI
pub const PLACEHOLDER_AUTHORS: &str = "Authors not available";

/// A validated Digital Object Identifier
///
/// Construction goes through [`validate_doi`], so a `Doi` always matches
/// `10.<4-9 digits>/<suffix>`. The value is kept verbatim (no case folding)
/// because it is appended to the mirror URL as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Doi(String);

impl Doi {
    /// Parse and validate a DOI string
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_doi(raw).map(Doi)
    }

    /// The DOI as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header and filesystem safe rendition (`10.1000/x` becomes `10.1000_x`)
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.0)
    }
}

impl FromStr for Doi {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Doi::parse(s)
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Doi {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Bibliographic metadata for a paper
///
/// Either enriched from the registry or the placeholder form built by
/// [`Metadata::basic`]. Both have the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The DOI this metadata describes
    pub doi: String,

    /// Paper title
    pub title: String,

    /// Authors joined for display ("Given Family, Given Family")
    pub authors: String,

    /// Creation timestamp reported by the registry
    pub published_date: Option<String>,

    /// Journal or container title
    pub journal: Option<String>,

    /// Abstract as delivered by the registry (may contain JATS markup)
    pub r#abstract: Option<String>,
}

impl Metadata {
    /// Placeholder metadata for a DOI the registry could not describe
    pub fn basic(doi: &Doi) -> Self {
        Self {
            doi: doi.to_string(),
            title: PLACEHOLDER_TITLE.to_string(),
            authors: PLACEHOLDER_AUTHORS.to_string(),
            published_date: None,
            journal: None,
            r#abstract: None,
        }
    }
}
