//! Three-way outcome of a pipeline step: found, missing, or failed.

use std::fmt;

use crate::sources::SourceError;

/// Why a lookup produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// The locator could not produce a mirror URL
    Unresolved,
    /// The mirror answered with an empty page
    EmptyPage,
    /// No link strategy matched the mirror page
    NoReference,
    /// The document download returned no bytes
    EmptyDocument,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Miss::Unresolved => "could not resolve DOI to a mirror URL",
            Miss::EmptyPage => "received empty HTML response",
            Miss::NoReference => "no PDF URL found in the HTML",
            Miss::EmptyDocument => "received empty PDF",
        };
        f.write_str(text)
    }
}

/// A successful lookup that may have found nothing
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Missing(Miss),
}

/// `Ok(Found)` maps to 200, `Ok(Missing)` to 404, `Err` to 500
pub type LookupResult<T> = Result<Lookup<T>, SourceError>;

impl<T> Lookup<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Missing(miss) => Lookup::Missing(miss),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing(_) => None,
        }
    }
}
