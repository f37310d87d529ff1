//! Parse catalog pages from raw HTML without DOM rendering.
//!
//! Both session engines hand back page HTML; everything the engine reads
//! from the site goes through these functions. `scraper` documents are not
//! `Send`, so each function parses and drops the document before returning.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SiteSelectors;
use crate::error::{ScoutError, ScoutResult};
use crate::types::{collapse_whitespace, Item, TaxonomyEntry};

/// Items and pagination link read from one catalog listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<Item>,
    /// Absolute URL of the next page, if the page has one.
    pub next_url: Option<String>,
}

fn selector(css: &str) -> ScoutResult<Selector> {
    Selector::parse(css).map_err(|_| ScoutError::InvalidSelector(css.to_string()))
}

fn text_of(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn absolutize(href: &str, page_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    page_url.join(href).ok().map(|u| u.to_string())
}

/// Whether `css` matches at least one element in `html`.
pub fn has_selector(html: &str, css: &str) -> ScoutResult<bool> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);
    let found = document.select(&sel).next().is_some();
    Ok(found)
}

/// Read the category navigation as raw `(name, url)` pairs in page order.
///
/// Deduplication and root-category removal happen in
/// [`Taxonomy::from_entries`](crate::types::Taxonomy::from_entries).
pub fn parse_categories(
    html: &str,
    page_url: &Url,
    selectors: &SiteSelectors,
) -> ScoutResult<Vec<TaxonomyEntry>> {
    let link_sel = selector(&selectors.category_links)?;
    let document = Html::parse_document(html);

    let entries = document
        .select(&link_sel)
        .filter_map(|a| {
            let name = text_of(&a);
            let url = a
                .value()
                .attr("href")
                .and_then(|href| absolutize(href, page_url))?;
            Some(TaxonomyEntry { name, url })
        })
        .collect();

    Ok(entries)
}

/// Read the item cards and the next-page link of a listing page.
///
/// The title prefers the anchor's `title` attribute, since the visible
/// text is truncated on long titles. Cards without a title are skipped.
pub fn parse_listing(
    html: &str,
    page_url: &Url,
    selectors: &SiteSelectors,
) -> ScoutResult<ListingPage> {
    let card_sel = selector(&selectors.item_card)?;
    let title_sel = selector(&selectors.item_title)?;
    let price_sel = selector(&selectors.item_price)?;
    let next_sel = selector(&selectors.next_page)?;

    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for card in document.select(&card_sel) {
        let title = card
            .select(&title_sel)
            .next()
            .map(|a| {
                a.value()
                    .attr("title")
                    .map(collapse_whitespace)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| text_of(&a))
            })
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let price = card
            .select(&price_sel)
            .next()
            .map(|p| text_of(&p))
            .unwrap_or_default();
        items.push(Item { title, price });
    }

    let next_url = document
        .select(&next_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolutize(href, page_url));

    Ok(ListingPage { items, next_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"
        <html><body>
        <div class="side_categories">
          <ul class="nav nav-list">
            <li><a href="catalogue/category/books_1/index.html">Books</a>
              <ul>
                <li><a href="catalogue/category/books/travel_2/index.html">
                    Travel
                </a></li>
                <li><a href="catalogue/category/books/mystery_3/index.html">Mystery</a></li>
                <li><a href="">Broken</a></li>
              </ul>
            </li>
          </ul>
        </div>
        </body></html>"#;

    const LISTING: &str = r##"
        <html><body><section><ol class="row">
          <li><article class="product_pod">
            <h3><a href="../../../its-only-the-himalayas_981/index.html"
                   title="It's Only the Himalayas">It's Only the ...</a></h3>
            <div class="product_price"><p class="price_color">£45.17</p></div>
          </article></li>
          <li><article class="product_pod">
            <h3><a href="../../../full-moon_1/index.html">Full Moon over Noah's Ark</a></h3>
            <div class="product_price"><p class="price_color"> £49.43 </p></div>
          </article></li>
          <li><article class="product_pod"><h3><a href="#"></a></h3></article></li>
        </ol>
        <ul class="pager"><li class="next"><a href="page-2.html">next</a></li></ul>
        </section></body></html>"##;

    #[test]
    fn test_parse_categories_resolves_urls() {
        let base = Url::parse("https://books.toscrape.com/").unwrap();
        let entries = parse_categories(HOME, &base, &SiteSelectors::default()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Books", "Travel", "Mystery"]);
        assert_eq!(
            entries[1].url,
            "https://books.toscrape.com/catalogue/category/books/travel_2/index.html"
        );
    }

    #[test]
    fn test_parse_listing_items_and_next() {
        let page =
            Url::parse("https://books.toscrape.com/catalogue/category/books/travel_2/index.html")
                .unwrap();
        let listing = parse_listing(LISTING, &page, &SiteSelectors::default()).unwrap();

        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].title, "It's Only the Himalayas");
        assert_eq!(listing.items[0].price, "£45.17");
        assert_eq!(listing.items[1].title, "Full Moon over Noah's Ark");
        assert_eq!(listing.items[1].price, "£49.43");
        assert_eq!(
            listing.next_url.as_deref(),
            Some("https://books.toscrape.com/catalogue/category/books/travel_2/page-2.html")
        );
    }

    #[test]
    fn test_parse_listing_without_pager() {
        let page = Url::parse("https://example.com/c/").unwrap();
        let listing =
            parse_listing("<html><body></body></html>", &page, &SiteSelectors::default()).unwrap();
        assert!(listing.items.is_empty());
        assert!(listing.next_url.is_none());
    }

    #[test]
    fn test_invalid_selector() {
        let selectors = SiteSelectors {
            item_card: "[[[".to_string(),
            ..SiteSelectors::default()
        };
        let page = Url::parse("https://example.com/").unwrap();
        let err = parse_listing("<html></html>", &page, &selectors).unwrap_err();
        assert!(matches!(err, ScoutError::InvalidSelector(_)));
    }

    #[test]
    fn test_has_selector() {
        assert!(has_selector(LISTING, ".product_pod").unwrap());
        assert!(!has_selector(LISTING, ".side_categories").unwrap());
    }
}
