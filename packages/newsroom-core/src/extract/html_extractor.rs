//! HTML-first content extraction.

use crate::error::{NewsroomError, Result};
use crate::extract::selectors::selectors_for;
use crate::resilience::UserAgentRotator;
use encoding_rs::{Encoding, UTF_8};
use flate2::read::GzDecoder;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

const MIN_SELECTOR_CONTENT_LEN: usize = 200;
const MIN_PARAGRAPH_LEN: usize = 50;
const MIN_PARAGRAPHS: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const NOISE_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];
const NOISE_CLASS_HINTS: &[&str] = &["advertisement", "ad", "menu"];

const NAV_PHRASES: &[&str] = &[
    "home", "contact", "lees ook", "meer nieuws", "deel dit artikel", "volg ons",
];

/// An extractor that can handle content an HTML-only pass couldn't reach.
/// The browser extractor implements this; html_extractor stays decoupled
/// from chromiumoxide so it can be used and tested without a browser.
#[async_trait::async_trait]
pub trait FallbackExtractor: Send + Sync {
    async fn extract(&self, url: &str, source: &str) -> Result<String>;
}

pub struct HtmlExtractor {
    client: reqwest::Client,
    rotator: Arc<UserAgentRotator>,
    fallback: Option<Arc<dyn FallbackExtractor>>,
}

impl HtmlExtractor {
    pub fn new(client: reqwest::Client, rotator: Arc<UserAgentRotator>) -> Self {
        Self {
            client,
            rotator,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackExtractor>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn extract(&self, url: &str, source: &str) -> Result<String> {
        let html = self.fetch(url).await?;
        let extracted = extract_from_html(&html, source);

        if extracted.chars().count() >= MIN_SELECTOR_CONTENT_LEN {
            return Ok(extracted);
        }

        if let Some(fallback) = &self.fallback {
            let browser_result = fallback.extract(url, source).await.unwrap_or_default();
            if browser_result.chars().count() > extracted.chars().count() {
                return Ok(browser_result);
            }
        }

        Ok(extracted)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let ua = self.rotator.next();
        let mut req = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("User-Agent", ua)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "nl-NL,nl;q=0.9,en;q=0.8");

        if rand::thread_rng().gen_bool(0.7) {
            req = req.header("Referer", "https://www.google.com/");
        }

        let resp = req.send().await?;
        let is_gzip = resp
            .headers()
            .get("content-encoding")
            .map(|v| v.as_bytes() == b"gzip")
            .unwrap_or(false);
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = resp.bytes().await?;

        // Safety net: reqwest normally auto-decompresses, but guard against a
        // server that lied about encoding handling.
        let raw: Vec<u8> = if is_gzip && looks_gzip(&bytes) {
            let mut decoder = GzDecoder::new(&bytes[..]);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| NewsroomError::ParseError(format!("gzip decode failed: {e}")))?;
            out
        } else {
            bytes.to_vec()
        };

        Ok(decode_to_utf8(&raw, &content_type))
    }
}

fn looks_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn decode_to_utf8(raw: &[u8], content_type: &str) -> String {
    let encoding = charset_from_content_type(content_type)
        .or_else(|| charset_from_meta_tag(raw))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(raw);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_lowercase();
    let idx = lower.find("charset=")?;
    let rest = &lower[idx + "charset=".len()..];
    let charset = rest.split(';').next()?.trim().trim_matches('"');
    Encoding::for_label(charset.as_bytes())
}

fn charset_from_meta_tag(raw: &[u8]) -> Option<&'static Encoding> {
    // Only scan the first 1024 bytes as ASCII; enough to find a <meta charset>.
    let head = &raw[..raw.len().min(1024)];
    let head_str = String::from_utf8_lossy(head);
    let lower = head_str.to_lowercase();
    let idx = lower.find("charset=")?;
    let rest = &lower[idx + "charset=".len()..];
    let charset: String = rest
        .trim_start_matches('"')
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    Encoding::for_label(charset.as_bytes())
}

/// Pure function: selector-based extraction with generic and paragraph
/// fallbacks, operating on already-decoded HTML. Used directly by the
/// browser extractor against rendered HTML too.
pub fn extract_from_html(html: &str, source: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in selectors_for(source) {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = collect_text(element);
                if text.chars().count() >= MIN_SELECTOR_CONTENT_LEN {
                    return finalize_text(&text);
                }
            }
        }
    }

    paragraph_fallback(&document)
}

fn collect_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn paragraph_fallback(document: &Html) -> String {
    let Ok(p_selector) = Selector::parse("p") else {
        return String::new();
    };

    let mut paragraphs = Vec::new();
    for p in document.select(&p_selector) {
        if is_inside_noise(p) {
            continue;
        }
        let text = collect_text(p).trim().to_string();
        if text.chars().count() <= MIN_PARAGRAPH_LEN {
            continue;
        }
        let lower = text.to_lowercase();
        if NAV_PHRASES.iter().any(|phrase| lower == *phrase) {
            continue;
        }
        paragraphs.push(text);
    }

    if paragraphs.len() < MIN_PARAGRAPHS {
        return String::new();
    }

    finalize_text(&paragraphs.join("\n\n"))
}

fn is_inside_noise(element: ElementRef) -> bool {
    for ancestor in element.ancestors() {
        let Some(el) = ElementRef::wrap(ancestor) else {
            continue;
        };
        let value = el.value();
        if NOISE_TAGS.contains(&value.name()) {
            return true;
        }
        if let Some(class_attr) = value.attr("class") {
            let lower = class_attr.to_lowercase();
            if NOISE_CLASS_HINTS.iter().any(|hint| lower.contains(hint)) {
                return true;
            }
        }
    }
    false
}

fn finalize_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn decode_html_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_hit_is_used_when_long_enough() {
        let html = format!(
            "<html><body><div class=\"unrelated\">short</div><article>{}</article></body></html>",
            "word ".repeat(60)
        );
        let result = extract_from_html(&html, "some-source.nl");
        assert!(result.chars().count() >= MIN_SELECTOR_CONTENT_LEN);
    }

    #[test]
    fn falls_back_to_paragraphs_when_no_selector_matches() {
        let long_para = |n: usize| format!("<p>{}</p>", "word ".repeat(n));
        let html = format!(
            "<html><body><nav><p>{}</p></nav>{}{}{}</body></html>",
            "word ".repeat(60),
            long_para(15),
            long_para(15),
            long_para(15),
        );
        let result = extract_from_html(&html, "unlisted.nl");
        assert!(!result.is_empty());
        assert!(result.matches("word").count() >= 30);
    }

    #[test]
    fn fewer_than_three_paragraphs_yields_empty_result() {
        let long_para = "<p>".to_string() + &"word ".repeat(15) + "</p>";
        let html = format!("<html><body>{long_para}{long_para}</body></html>");
        let result = extract_from_html(&html, "unlisted.nl");
        assert!(result.is_empty());
    }

    #[test]
    fn charset_detected_from_content_type_header() {
        let encoding = charset_from_content_type("text/html; charset=iso-8859-1");
        assert_eq!(encoding.map(|e| e.name()), Some("windows-1252"));
    }

    #[test]
    fn gzip_magic_bytes_detected() {
        assert!(looks_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!looks_gzip(&[0x00, 0x01]));
    }
}
