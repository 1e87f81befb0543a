//! Listing detail page parser.
//!
//! Each field is resolved by an ordered list of strategies over a DOM
//! snapshot. The first strategy yielding a non-empty value wins; when none
//! does the field stays `None`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::patterns::{
    digit_count, leading_decimal, looks_like_domain, looks_like_phone, rating_from_label,
    review_count, MIN_PHONE_DIGITS,
};
use crate::types::ListingFields;

/// Primary listing heading
pub const HEADING_SELECTOR: &str = "h1.DUwDvf.lfPIob";
const LEGACY_HEADING_SELECTOR: &str = "h2.section-hero-header-title-title";
/// Info rows (address, phone, website) of the detail panel
const CONTENT_BLOCK_SELECTOR: &str = "div.Io6YTe.fontBodyMedium.kR99db.fdkmkc";
const ADDRESS_META_SELECTOR: &str = r#"meta[itemprop="address"]"#;
const PHONE_CANDIDATE_SELECTOR: &str =
    r#"div.Io6YTe.fontBodyMedium.kR99db.fdkmkc, a[href^="tel:"], span[jsaction]"#;
const TEL_LINK_SELECTOR: &str = r#"a[href^="tel:"]"#;
const LINK_SELECTOR: &str = "a, button";
const RATING_SELECTOR: &str = r#"div[aria-label*="stars"], span[class*="rating"]"#;
const RATING_IMG_SELECTOR: &str = r#"[role="img"][aria-label*="stars"]"#;
const REVIEW_SELECTOR: &str = "button, span";

/// Parsed detail page plus the URL it was loaded from
pub struct DetailPage {
    document: Html,
    base: Option<Url>,
}

impl DetailPage {
    pub fn parse(html: &str, page_url: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            base: Url::parse(page_url).ok(),
        }
    }

    fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.document.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        Selector::parse(css)
            .ok()
            .and_then(|selector| self.document.select(&selector).next())
    }

    fn resolve_link(&self, href: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}

/// One way of finding a field; `None` passes to the next strategy
type Strategy = fn(&DetailPage) -> Option<String>;

/// First strategy producing a non-empty trimmed value
fn first_match(page: &DetailPage, strategies: &[Strategy]) -> Option<String> {
    strategies
        .iter()
        .find_map(|strategy| strategy(page).and_then(|v| clean(&v)))
}

const NAME_STRATEGIES: &[Strategy] = &[heading, legacy_heading];
const ADDRESS_STRATEGIES: &[Strategy] = &[address_block, address_meta];
const PHONE_STRATEGIES: &[Strategy] = &[phone_shaped_text, tel_link];
const WEBSITE_STRATEGIES: &[Strategy] = &[domain_shaped_block, website_labelled_link];
const RATING_STRATEGIES: &[Strategy] = &[star_rating];
const REVIEW_STRATEGIES: &[Strategy] = &[review_count_label];

/// Parser for listing detail pages
pub struct ListingParser;

impl ListingParser {
    /// Resolve every field of a detail page snapshot
    pub fn parse(html: &str, page_url: &str) -> ListingFields {
        let page = DetailPage::parse(html, page_url);

        ListingFields {
            name: first_match(&page, NAME_STRATEGIES),
            address: first_match(&page, ADDRESS_STRATEGIES),
            phone: first_match(&page, PHONE_STRATEGIES),
            website: first_match(&page, WEBSITE_STRATEGIES),
            rating: first_match(&page, RATING_STRATEGIES),
            reviews: first_match(&page, REVIEW_STRATEGIES),
        }
    }
}

/// Text nodes concatenated as rendered; `clean` collapses the whitespace
fn element_text(elem: &ElementRef) -> String {
    elem.text().collect()
}

/// Collapse whitespace; empty becomes `None`
fn clean(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn heading(page: &DetailPage) -> Option<String> {
    page.first(HEADING_SELECTOR).map(|e| element_text(&e))
}

fn legacy_heading(page: &DetailPage) -> Option<String> {
    page.first(LEGACY_HEADING_SELECTOR).map(|e| element_text(&e))
}

fn address_block(page: &DetailPage) -> Option<String> {
    page.first(CONTENT_BLOCK_SELECTOR).map(|e| element_text(&e))
}

fn address_meta(page: &DetailPage) -> Option<String> {
    page.first(ADDRESS_META_SELECTOR)
        .and_then(|e| e.value().attr("content").map(str::to_string))
}

fn phone_shaped_text(page: &DetailPage) -> Option<String> {
    page.select(PHONE_CANDIDATE_SELECTOR)
        .iter()
        .map(element_text)
        .find(|text| looks_like_phone(text))
}

fn tel_link(page: &DetailPage) -> Option<String> {
    let link = page.first(TEL_LINK_SELECTOR)?;
    let is_number = |value: &String| digit_count(value) >= MIN_PHONE_DIGITS;

    // Link text like "Call" carries no number; the target still does
    clean(&element_text(&link)).filter(is_number).or_else(|| {
        link.value()
            .attr("href")
            .and_then(|href| clean(href.trim_start_matches("tel:")))
            .filter(is_number)
    })
}

fn domain_shaped_block(page: &DetailPage) -> Option<String> {
    // Phone-shaped text is never taken as a domain
    page.select(CONTENT_BLOCK_SELECTOR)
        .iter()
        .filter_map(|e| clean(&element_text(e)))
        .find(|text| looks_like_domain(text) && !looks_like_phone(text))
}

fn website_labelled_link(page: &DetailPage) -> Option<String> {
    page.select(LINK_SELECTOR).iter().find_map(|elem| {
        let label = format!(
            "{} {}",
            element_text(elem),
            elem.value().attr("aria-label").unwrap_or_default()
        );
        if !label.to_lowercase().contains("website") {
            return None;
        }
        elem.value()
            .attr("href")
            .filter(|href| !href.trim().is_empty())
            .map(|href| page.resolve_link(href.trim()))
    })
}

fn star_rating(page: &DetailPage) -> Option<String> {
    let elem = page
        .first(RATING_SELECTOR)
        .or_else(|| page.first(RATING_IMG_SELECTOR))?;

    elem.value()
        .attr("aria-label")
        .and_then(rating_from_label)
        .or_else(|| leading_decimal(&element_text(&elem)))
}

fn review_count_label(page: &DetailPage) -> Option<String> {
    page.select(REVIEW_SELECTOR).iter().find_map(|elem| {
        review_count(&element_text(elem))
            .or_else(|| elem.value().attr("aria-label").and_then(review_count))
    })
}
