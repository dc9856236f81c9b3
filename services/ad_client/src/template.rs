//! services/ad_client/src/template.rs
//!
//! The default ad markup.

use ad_delivery_core::{AdRecord, AdTemplate};

/// Renders the stock ad unit: content, a tracked link labeled with the
/// advertiser, and a sponsorship label.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplate;

impl AdTemplate for DefaultTemplate {
    fn render(&self, ad: &AdRecord) -> String {
        format_ad(ad)
    }
}

/// Formats `ad` with the default template.
///
/// The link points at the click-tracking URL, or at the ad's destination when
/// the ad has none. Every interpolated value is escaped.
pub fn format_ad(ad: &AdRecord) -> String {
    let href = ad
        .click_url
        .as_deref()
        .or(ad.url.as_deref())
        .unwrap_or("#");

    format!(
        concat!(
            r#"<div class="ad-unit">"#,
            r#"<p class="ad-content">{content}</p>"#,
            r#"<a class="ad-link" data-ad-track="click" href="{href}" target="_blank" rel="noopener noreferrer">{advertiser}</a>"#,
            r#"<span class="ad-label">Sponsored</span>"#,
            r#"</div>"#,
        ),
        content = escape_html(&ad.content),
        href = escape_html(href),
        advertiser = escape_html(&ad.advertiser),
    )
}

/// Escapes the characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
