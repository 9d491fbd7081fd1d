//! RSS fetch + draft-record construction.

use crate::error::{NewsroomError, Result};
use crate::types::ArticleCreate;
use chrono::{DateTime, Utc};
use regex::Regex;
use rss::Channel;
use std::sync::OnceLock;

const MAX_SUMMARY_CHARS: usize = 2000;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Strips HTML tags and truncates to [`MAX_SUMMARY_CHARS`] characters,
/// splitting at a char boundary.
pub fn clean_html_summary(raw: &str) -> String {
    let stripped = tag_regex().replace_all(raw, " ");
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= MAX_SUMMARY_CHARS {
        normalized
    } else {
        normalized.chars().take(MAX_SUMMARY_CHARS).collect()
    }
}

/// Fetches and parses an RSS feed into draft article records. Does not
/// perform dedup or insertion; that's the scraper service's job.
pub async fn fetch_feed(client: &reqwest::Client, feed_url: &str, source: &str) -> Result<Vec<ArticleCreate>> {
    let bytes = client
        .get(feed_url)
        .send()
        .await?
        .bytes()
        .await?;

    let channel = Channel::read_from(&bytes[..])
        .map_err(|e| NewsroomError::ParseError(format!("rss parse error: {e}")))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| item_to_article_create(item, source))
        .collect())
}

fn item_to_article_create(item: &rss::Item, source: &str) -> Option<ArticleCreate> {
    let url = item.link()?.to_string();
    let title = item.title().unwrap_or("(untitled)").to_string();

    let summary = item.description().map(clean_html_summary);

    let published = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc));

    let author = item.author().map(|a| a.to_string());

    let image_url = item
        .enclosure()
        .filter(|e| e.mime_type().starts_with("image/"))
        .map(|e| e.url().to_string());

    let keywords: Vec<String> = item.categories().iter().map(|c| c.name().to_string()).collect();
    let category = keywords.first().cloned();

    Some(ArticleCreate {
        url,
        title,
        summary,
        published,
        source: source.to_string(),
        author,
        category,
        keywords,
        image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_summary_strips_tags_and_collapses_whitespace() {
        let raw = "<p>Hello   <b>world</b></p>\n<div>!</div>";
        assert_eq!(clean_html_summary(raw), "Hello world !");
    }

    #[test]
    fn clean_html_summary_truncates_long_input() {
        let raw = "a".repeat(3000);
        let cleaned = clean_html_summary(&raw);
        assert_eq!(cleaned.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn item_to_article_create_skips_items_without_a_link() {
        let item = rss::Item::default();
        assert!(item_to_article_create(&item, "nos.nl").is_none());
    }
}
