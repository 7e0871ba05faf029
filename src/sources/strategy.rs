//! Strategies for finding the embedded PDF link in a mirror page.
//!
//! The mirror's markup is outside our control, so each known shape is one
//! [`LinkStrategy`]. The fetcher tries them in order and takes the first hit.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Finds a document reference in an HTML page
pub trait LinkStrategy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Return the raw reference (possibly relative, possibly with a fragment)
    fn find(&self, html: &str) -> Option<String>;
}

/// `<embed id="pdf" src="...">`
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbedStrategy;

impl LinkStrategy for EmbedStrategy {
    fn name(&self) -> &str {
        "embed"
    }

    fn find(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("embed[src]").ok()?;

        document
            .select(&selector)
            .filter(|el| {
                el.value()
                    .attr("id")
                    .is_some_and(|id| id.trim().eq_ignore_ascii_case("pdf"))
            })
            .filter_map(|el| el.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(str::to_string)
    }
}

/// `<button onclick="location.href='...?download=true'">`
#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadButtonStrategy;

fn onclick_regex() -> &'static Regex {
    static ONCLICK_RE: OnceLock<Regex> = OnceLock::new();
    ONCLICK_RE.get_or_init(|| {
        Regex::new(r#"(?i)location\.href\s*=\s*['"]([^'"]+\?download=true)['"]"#)
            .expect("onclick pattern is a valid regex")
    })
}

impl LinkStrategy for DownloadButtonStrategy {
    fn name(&self) -> &str {
        "download-button"
    }

    fn find(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("button[onclick]").ok()?;

        document
            .select(&selector)
            .filter_map(|el| el.value().attr("onclick"))
            .find_map(|onclick| {
                onclick_regex()
                    .captures(onclick)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
    }
}

/// Strategies in the order the mirror is known to use them
pub fn default_strategies() -> Vec<Box<dyn LinkStrategy>> {
    vec![Box::new(EmbedStrategy), Box::new(DownloadButtonStrategy)]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMBED_PAGE: &str = r#"<html><body>
        <div id="article">
          <embed type="application/pdf" src="//mirror.example/doc.pdf#toolbar=0" id="pdf">
        </div>
      </body></html>"#;

    const BUTTON_PAGE: &str = r#"<html><body>
        <div id="buttons">
          <button onclick="location.href='//mirror.example/downloads/doc.pdf?download=true'">save</button>
        </div>
      </body></html>"#;

    #[test]
    fn test_embed_found_regardless_of_attribute_order() {
        assert_eq!(
            EmbedStrategy.find(EMBED_PAGE).as_deref(),
            Some("//mirror.example/doc.pdf#toolbar=0")
        );
    }

    #[test]
    fn test_embed_requires_pdf_id() {
        let html = r#"<embed id="viewer" src="/other.pdf">"#;
        assert!(EmbedStrategy.find(html).is_none());
    }

    #[test]
    fn test_download_button() {
        assert_eq!(
            DownloadButtonStrategy.find(BUTTON_PAGE).as_deref(),
            Some("//mirror.example/downloads/doc.pdf?download=true")
        );
    }

    #[test]
    fn test_download_button_requires_download_flag() {
        let html = r#"<button onclick="location.href='/doc.pdf'">save</button>"#;
        assert!(DownloadButtonStrategy.find(html).is_none());
    }

    #[test]
    fn test_nothing_found() {
        let html = "<html><body><p>Article not found</p></body></html>";
        assert!(default_strategies().iter().all(|s| s.find(html).is_none()));
    }
}
