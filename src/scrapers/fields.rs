use crate::config::SiteProfile;
use crate::models::ListingEntry;
use crate::scrapers::strategy::{Strategy, StrategyChain};
use crate::scrapers::{collapsed_text, parse_selector};
use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

/// A listing card plus its text, computed once and shared by every lookup
pub struct Card<'a> {
    element: ElementRef<'a>,
    /// All visible text, whitespace collapsed
    text: String,
    /// First non-blank line of the text nodes joined by spaces; only line
    /// breaks inside a text node start a new line
    first_line: Option<String>,
}

impl<'a> Card<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        let joined = element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let first_line = joined
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);
        Self {
            element,
            text: collapsed_text(element),
            first_line,
        }
    }

    fn first(&self, selector: &Selector) -> Option<ElementRef<'a>> {
        self.element.select(selector).next()
    }
}

/// Single lookup against a card; blank results count as misses
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Attribute of the first matching descendant
    Attr {
        selector: Selector,
        attr: &'static str,
    },
    /// First whitespace-separated token of an attribute, e.g. a `srcset` URL
    AttrToken {
        selector: Selector,
        attr: &'static str,
    },
    /// Text of the first matching descendant
    Text(Selector),
    /// Capture group of a pattern searched in the card text
    Pattern { regex: Regex, group: usize },
    FirstLine,
}

impl<'a, 'c> Strategy<'a, Card<'c>> for Lookup {
    type Output = String;

    fn attempt(&self, card: &'a Card<'c>) -> Option<String> {
        let value = match self {
            Lookup::Attr { selector, attr } => card.first(selector)?.value().attr(attr)?.trim().to_string(),
            Lookup::AttrToken { selector, attr } => card
                .first(selector)?
                .value()
                .attr(attr)?
                .split_whitespace()
                .next()?
                .to_string(),
            Lookup::Text(selector) => collapsed_text(card.first(selector)?),
            Lookup::Pattern { regex, group } => regex.captures(&card.text)?.get(*group)?.as_str().to_string(),
            Lookup::FirstLine => card.first_line.clone()?,
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Pulls a `ListingEntry` out of one card, field by field.
///
/// Each field has its own fallback chain; a field that resolves nowhere is
/// left empty and never affects the others.
pub struct FieldExtractor {
    origin: Url,
    title: StrategyChain<Lookup>,
    subtitle: StrategyChain<Lookup>,
    price: StrategyChain<Lookup>,
    rating_and_reviews: Regex,
    reviews: StrategyChain<Lookup>,
    rating: StrategyChain<Lookup>,
    image: StrategyChain<Lookup>,
    link: StrategyChain<Lookup>,
}

impl FieldExtractor {
    pub fn new(site: &SiteProfile) -> Result<Self> {
        let img = parse_selector("img")?;
        let anchor = parse_selector(&site.listing_anchor_selector())?;

        Ok(Self {
            origin: site.origin.clone(),
            title: StrategyChain::new(
                "title",
                vec![
                    Lookup::Attr {
                        selector: parse_selector(r#"meta[itemprop="name"]"#)?,
                        attr: "content",
                    },
                    Lookup::Text(parse_selector(r#"[data-testid="listing-card-title"]"#)?),
                    Lookup::Text(parse_selector(r#"[role="heading"]"#)?),
                    Lookup::FirstLine,
                ],
            ),
            subtitle: StrategyChain::new(
                "subtitle",
                vec![Lookup::Text(parse_selector(
                    r#"div[data-testid="listing-card-subtitle"], span[data-testid="subtitle"]"#,
                )?)],
            ),
            price: StrategyChain::new(
                "price",
                vec![
                    Lookup::Text(parse_selector(
                        r#"[data-testid="price"], [data-testid="price-availability-row"], span[aria-label*="per night"]"#,
                    )?),
                    Lookup::Pattern {
                        regex: pattern(r"[$€£₹]\s*\d[\d,]*")?,
                        group: 0,
                    },
                ],
            ),
            rating_and_reviews: pattern(r"(?i)(\d\.\d{1,2})\s*[·•]\s*([\d,]+)\s*reviews?")?,
            reviews: StrategyChain::new(
                "reviews",
                vec![Lookup::Pattern {
                    regex: pattern(r"(?i)\(([\d,]+)\)\s*reviews?")?,
                    group: 1,
                }],
            ),
            rating: StrategyChain::new(
                "rating",
                vec![Lookup::Pattern {
                    // trailing group stands in for "not followed by a digit"
                    regex: pattern(r"(\d\.\d{1,2})(?:\D|$)")?,
                    group: 1,
                }],
            ),
            image: StrategyChain::new(
                "image",
                vec![
                    Lookup::Attr {
                        selector: img.clone(),
                        attr: "src",
                    },
                    Lookup::Attr {
                        selector: img.clone(),
                        attr: "data-src",
                    },
                    Lookup::AttrToken {
                        selector: img,
                        attr: "srcset",
                    },
                ],
            ),
            link: StrategyChain::new(
                "listing_url",
                vec![Lookup::Attr {
                    selector: anchor,
                    attr: "href",
                }],
            ),
        })
    }

    /// Extract every field of a card; provenance is left for the caller
    pub fn extract(&self, element: ElementRef<'_>) -> ListingEntry {
        let card = Card::new(element);

        let title = self.resolve(&self.title, &card);
        let location = self.location(&title, &card);
        let (rating, reviews_count) = self.rating_and_reviews(&card);
        let listing_url = self
            .link
            .resolve(&card)
            .map(|hit| absolutize(&self.origin, &hit.value))
            .unwrap_or_default();

        ListingEntry {
            location,
            price: self.resolve(&self.price, &card),
            rating,
            reviews_count,
            image_url: self.resolve(&self.image, &card),
            listing_url,
            title,
            ..Default::default()
        }
    }

    fn resolve(&self, chain: &StrategyChain<Lookup>, card: &Card<'_>) -> String {
        chain.resolve(card).map(|hit| hit.value).unwrap_or_default()
    }

    /// "Home in Ziarat" gives "Ziarat"; otherwise the subtitle's leading part
    fn location(&self, title: &str, card: &Card<'_>) -> String {
        if let Some((_, place)) = title.rsplit_once(" in ") {
            return place.trim().to_string();
        }
        let Some(hit) = self.subtitle.resolve(card) else {
            return String::new();
        };
        let subtitle = hit.value.as_str();
        let head = subtitle
            .split_once('·')
            .or_else(|| subtitle.split_once(" - "))
            .map_or(subtitle, |(head, _)| head);
        head.trim().to_string()
    }

    fn rating_and_reviews(&self, card: &Card<'_>) -> (String, String) {
        if let Some(caps) = self.rating_and_reviews.captures(&card.text) {
            return (caps[1].to_string(), caps[2].replace(',', ""));
        }
        let reviews = self.resolve(&self.reviews, card).replace(',', "");
        let rating = self.resolve(&self.rating, card);
        (rating, reviews)
    }
}

fn pattern(re: &str) -> Result<Regex> {
    Regex::new(re).with_context(|| format!("invalid pattern `{}`", re))
}

/// Absolute hrefs pass through untouched; anything else is joined to the origin
pub fn absolutize(origin: &Url, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match origin.join(href) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", origin.as_str().trim_end_matches('/'), href),
    }
}
