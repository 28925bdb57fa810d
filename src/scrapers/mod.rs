pub mod browser;
pub mod cards;
pub mod dedup;
pub mod fields;
pub mod pagination;
pub mod strategy;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::ChromeSession;
pub use dedup::DedupAccumulator;
pub use pagination::PaginationController;
pub use traits::PageDriver;
pub use types::{StopReason, UnitReport};

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};

/// Compile a CSS selector, reporting the offending text on failure
pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{}`: {:?}", css, e))
}

/// Visible text of an element with whitespace collapsed to single spaces
pub(crate) fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
