//! Category catalog and RSS feed retrieval
//!
//! Maps deal categories to their feed URLs and turns raw feed XML into
//! `ScrapedDeal` candidates. Feed entries carry an HTML snippet in their
//! description; the useful text lives in a `div.snippet.summary` element.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::types::{stable_id, ScrapedDeal};

/// Known categories and their RSS feed URLs.
pub const CATEGORY_FEEDS: &[(&str, &str)] = &[
    ("Home & Garden", "https://www.dealnews.com/c196/Home-Garden/?rss=1"),
    ("Clothing & Accessories", "https://www.dealnews.com/c202/Clothing-Accessories/?rss=1"),
    ("Electronics", "https://www.dealnews.com/c142/Electronics/?rss=1"),
    ("Health & Beauty", "https://www.dealnews.com/c756/Health-Beauty/?rss=1"),
    ("Computers", "https://www.dealnews.com/c39/Computers/?rss=1"),
    ("Sports & Fitness", "https://www.dealnews.com/c211/Sports-Fitness/?rss=1"),
    ("Gaming & Toys", "https://www.dealnews.com/c186/Gaming-Toys/?rss=1"),
    ("Automotive", "https://www.dealnews.com/c238/Automotive/?rss=1"),
    ("Movies, Music & Books", "https://www.dealnews.com/c178/Movies-Music-Books/?rss=1"),
    ("Office & School Supplies", "https://www.dealnews.com/c182/Office-School-Supplies/?rss=1"),
    ("Special Occasion", "https://www.dealnews.com/c636/Special-Occasion/?rss=1"),
];

/// Entries taken from the head of each feed per scan.
pub const MAX_ENTRIES_PER_FEED: usize = 5;

/// Look up the feed URL for a known category name.
pub fn feed_url(category: &str) -> Option<&'static str> {
    CATEGORY_FEEDS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, url)| *url)
}

pub fn is_known_category(category: &str) -> bool {
    feed_url(category).is_some()
}

/// Human-facing name shown in category listings.
pub fn display_name(category: &str) -> String {
    category.replace('_', " ")
}

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<item[^>]*>(.*?)</item>").expect("item regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("title regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<link[^>]*>(.*?)</link>").expect("link regex"));
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<description[^>]*>(.*?)</description>").expect("description regex")
});

/// Fetch one category's feed and return up to [`MAX_ENTRIES_PER_FEED`]
/// candidates. Errors bubble up so the scanner can apply its
/// partial-source-failure policy.
pub async fn fetch_category(client: &reqwest::Client, category: &str) -> Result<Vec<ScrapedDeal>> {
    let url = feed_url(category)
        .with_context(|| format!("no feed configured for category '{category}'"))?;

    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetching feed for '{category}'"))?
        .error_for_status()
        .with_context(|| format!("feed for '{category}' returned an error status"))?
        .text()
        .await
        .with_context(|| format!("reading feed body for '{category}'"))?;

    let deals = parse_feed(category, &body);
    if deals.is_empty() {
        anyhow::bail!("feed for '{category}' contained no parseable items");
    }
    Ok(deals)
}

/// Parse feed XML into candidates. Items without a link are skipped.
pub fn parse_feed(category: &str, xml: &str) -> Vec<ScrapedDeal> {
    ITEM_RE
        .captures_iter(xml)
        .take(MAX_ENTRIES_PER_FEED)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            let url = field(block, &LINK_RE)?;
            let title = field(block, &TITLE_RE).unwrap_or_default();
            let summary = field(block, &DESCRIPTION_RE)
                .map(|html| extract_snippet(&html))
                .unwrap_or_default();
            let id = stable_id(&url);
            Some(ScrapedDeal { category: category.to_string(), title, summary, url, id })
        })
        .collect()
}

fn field(block: &str, re: &Regex) -> Option<String> {
    let raw = re.captures(block)?.get(1)?.as_str();
    let text = unescape_xml(strip_cdata(raw)).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn strip_cdata(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(value)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Pull the useful text out of a feed entry's HTML snippet. The entries wrap
/// their summary in a `div.snippet.summary`; anything else falls back to the
/// whole fragment's text.
pub fn extract_snippet(html_snippet: &str) -> String {
    let fragment = Html::parse_fragment(html_snippet);
    let selector = Selector::parse("div.snippet.summary").expect("snippet selector");

    let text = match fragment.select(&selector).next() {
        Some(element) => element.text().collect::<String>(),
        None => fragment.root_element().text().collect::<String>(),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
