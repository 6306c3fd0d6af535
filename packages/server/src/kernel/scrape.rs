//! Search-results page retrieval and parsing.
//!
//! This is the leaf the tracking workers run: fetch the rendered results
//! page for a keyword, parse the listing items, and feed them to the rank
//! extractor. Static HTML only - the mobile results page renders listings
//! server-side.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use tracing::debug;

use super::tracking::{extract, RankSnapshot, ResultItem, Target};

/// Listing item on the results page.
const ITEM_SELECTOR: &str = "li.place_unit";
/// Display name within an item.
const NAME_SELECTOR: &str = ".place_name";
/// Paid-placement marker within an item.
const AD_SELECTOR: &str = ".ad_label";
/// Attribute carrying the listing's external id.
const ID_ATTR: &str = "data-id";

/// HTTP client for the search-results page.
pub struct SearchPageClient {
    client: reqwest::Client,
    search_url: String,
}

impl SearchPageClient {
    pub fn new(search_url: String) -> Result<Self> {
        // Browser-like User-Agent; the results page serves a stripped
        // variant to unknown clients.
        let user_agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, search_url })
    }

    /// Fetch and parse the results page for a keyword, in rendered order.
    pub async fn fetch_results(&self, keyword: &str) -> Result<Vec<ResultItem>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("query", keyword)])
            .send()
            .await
            .context("search page request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("search page returned HTTP {}", status));
        }

        let html = response.text().await.context("failed to read page body")?;
        let items = parse_results(&html)?;
        debug!(keyword = %keyword, items = items.len(), "parsed search results");
        Ok(items)
    }

    /// Fetch one page and compute the target's rank snapshot.
    ///
    /// Single page, single pass: `found == false` means the target did not
    /// appear here, and the caller decides whether to request more pages.
    pub async fn track_rank(&self, keyword: &str, target: &Target) -> Result<RankSnapshot> {
        let items = self.fetch_results(keyword).await?;
        Ok(extract(&items, target))
    }
}

/// Parse listing items out of a rendered results page.
pub fn parse_results(html: &str) -> Result<Vec<ResultItem>> {
    let item_selector = Selector::parse(ITEM_SELECTOR).map_err(|e| anyhow!("{e}"))?;
    let name_selector = Selector::parse(NAME_SELECTOR).map_err(|e| anyhow!("{e}"))?;
    let ad_selector = Selector::parse(AD_SELECTOR).map_err(|e| anyhow!("{e}"))?;

    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&item_selector) {
        let display_name = element
            .select(&name_selector)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let external_id = element
            .value()
            .attr(ID_ATTR)
            .unwrap_or_default()
            .to_string();

        // Items with neither a name nor an id are decoration, not listings.
        if display_name.is_empty() && external_id.is_empty() {
            continue;
        }

        items.push(ResultItem {
            display_name,
            external_id,
            is_sponsored: element.select(&ad_selector).next().is_some(),
        });
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul class="list_place">
            <li class="place_unit" data-id="ad-77">
              <span class="ad_label">광고</span>
              <span class="place_name">스폰서 카페</span>
            </li>
            <li class="place_unit" data-id="p-1">
              <span class="place_name">강남 맛집 카페</span>
            </li>
            <li class="place_unit" data-id="p-2">
              <span class="place_name">두번째 카페</span>
            </li>
            <li class="place_unit"></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn parses_items_in_rendered_order() {
        let items = parse_results(PAGE).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].external_id, "ad-77");
        assert!(items[0].is_sponsored);
        assert_eq!(items[1].display_name, "강남 맛집 카페");
        assert!(!items[1].is_sponsored);
        assert_eq!(items[2].external_id, "p-2");
    }

    #[test]
    fn empty_page_parses_to_no_items() {
        let items = parse_results("<html><body></body></html>").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn parsed_page_feeds_the_extractor() {
        let items = parse_results(PAGE).unwrap();
        let snapshot = extract(
            &items,
            &Target {
                external_id: "p-1".to_string(),
                display_name: "강남 맛집 카페".to_string(),
            },
        );
        assert_eq!(snapshot.organic_rank, Some(1));
        assert_eq!(snapshot.ad_rank, None);
        assert!(snapshot.found);
    }
}
