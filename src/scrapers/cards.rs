use crate::config::SiteProfile;
use crate::scrapers::parse_selector;
use crate::scrapers::strategy::{Strategy, StrategyChain};
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Ways of finding listing cards in a results page
#[derive(Debug, Clone)]
pub enum CardRule {
    /// Every element matching a card marker
    Marker(Selector),
    /// Parents of listing links, deduplicated, in document order
    LinkParents(Selector),
}

impl<'a> Strategy<'a, Html> for CardRule {
    type Output = Vec<ElementRef<'a>>;

    fn attempt(&self, document: &'a Html) -> Option<Self::Output> {
        let cards: Vec<ElementRef<'a>> = match self {
            CardRule::Marker(selector) => document.select(selector).collect(),
            CardRule::LinkParents(selector) => {
                let mut seen = HashSet::new();
                document
                    .select(selector)
                    .filter_map(|anchor| anchor.parent().and_then(ElementRef::wrap))
                    .filter(|parent| seen.insert(parent.id()))
                    .collect()
            }
        };
        (!cards.is_empty()).then_some(cards)
    }
}

/// Finds the card nodes of a rendered results page
pub struct CardLocator {
    chain: StrategyChain<CardRule>,
}

impl CardLocator {
    pub fn new(site: &SiteProfile) -> Result<Self> {
        let mut rules = site
            .card_selectors
            .iter()
            .map(|css| parse_selector(css).map(CardRule::Marker))
            .collect::<Result<Vec<_>>>()?;
        rules.push(CardRule::LinkParents(parse_selector(
            &site.listing_anchor_selector(),
        )?));

        Ok(Self {
            chain: StrategyChain::new("cards", rules),
        })
    }

    /// Card nodes in document order; empty when the page has no listings
    pub fn locate<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match self.chain.resolve(document) {
            Some(hit) => {
                debug!(strategy = hit.step, cards = hit.value.len(), "located cards");
                hit.value
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn locator() -> CardLocator {
        let site = SiteProfile::new(Url::parse("https://www.airbnb.com").unwrap());
        CardLocator::new(&site).unwrap()
    }

    fn ids<'a>(cards: &[ElementRef<'a>]) -> Vec<&'a str> {
        cards
            .iter()
            .map(|c| c.value().attr("id").unwrap_or(""))
            .collect()
    }

    #[test]
    fn most_specific_marker_wins() {
        let html = r#"
            <div data-testid="card-container" id="generic"></div>
            <div data-testid="explore-property-card" id="a"></div>
            <div data-testid="explore-property-card" id="b"></div>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(ids(&locator().locate(&document)), ["a", "b"]);
    }

    #[test]
    fn falls_back_to_generic_markers() {
        let html = r#"
            <div role="group" id="g1"><a href="/rooms/1">One</a></div>
            <div role="group" id="g2"><a href="/rooms/2">Two</a></div>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(ids(&locator().locate(&document)), ["g1", "g2"]);
    }

    #[test]
    fn falls_back_to_listing_link_parents() {
        let html = r#"
            <section>
                <div id="a"><a href="/rooms/1">Photo</a><a href="/rooms/1?p=2">Title</a></div>
                <div id="b"><a href="https://www.airbnb.com/rooms/2">Other</a></div>
                <div id="c"><a href="/help">Help</a></div>
            </section>
        "#;
        let document = Html::parse_document(html);
        assert_eq!(ids(&locator().locate(&document)), ["a", "b"]);
    }

    #[test]
    fn page_without_listings_is_empty() {
        let document = Html::parse_document("<html><body><p>No results</p></body></html>");
        assert!(locator().locate(&document).is_empty());
    }
}
