//! Canonical per-source selector table, shared by the HTML extractor and the
//! browser extractor (DESIGN.md open question 1).
//!
//! There is exactly one selector list per source domain; both extraction
//! paths consult this table instead of each keeping their own.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Ordered CSS selectors to try, most specific first, for one source.
pub struct SourceSelectors {
    pub selectors: &'static [&'static str],
}

/// Generic ordered fallback selector list, tried for any source with no
/// entry in the table (or when all of its selectors miss).
pub const GENERIC_SELECTORS: &[&str] = &[
    "article",
    "[itemprop=articleBody]",
    "main",
    ".article-content",
    ".article-body",
    "#article-content",
];

fn table() -> &'static HashMap<&'static str, SourceSelectors> {
    static TABLE: OnceLock<HashMap<&'static str, SourceSelectors>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert(
            "nos.nl",
            SourceSelectors {
                selectors: &["div.article_textwrap", "div.article_body", "article"],
            },
        );
        m.insert(
            "nu.nl",
            SourceSelectors {
                selectors: &["div.block.text", "div.article-container"],
            },
        );
        m.insert(
            "volkskrant.nl",
            SourceSelectors {
                selectors: &["div[class*='artstyle__Body']", "article"],
            },
        );
        m.insert(
            "telegraaf.nl",
            SourceSelectors {
                selectors: &["div.ArticleBodyBlocks__body", "article"],
            },
        );
        m
    })
}

/// Selectors to try for `domain`, falling back to [`GENERIC_SELECTORS`] if
/// the domain has no dedicated entry.
pub fn selectors_for(domain: &str) -> Vec<&'static str> {
    let mut out = Vec::new();
    if let Some(entry) = table().get(domain) {
        out.extend_from_slice(entry.selectors);
    }
    out.extend_from_slice(GENERIC_SELECTORS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_source_gets_its_selectors_before_generic_ones() {
        let selectors = selectors_for("nos.nl");
        assert_eq!(selectors[0], "div.article_textwrap");
        assert!(selectors.contains(&"article"));
    }

    #[test]
    fn unknown_source_falls_back_to_generic_only() {
        let selectors = selectors_for("some-unlisted-site.nl");
        assert_eq!(selectors, GENERIC_SELECTORS.to_vec());
    }
}
