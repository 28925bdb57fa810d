use crate::config::{PaginationMode, Pacing, RunConfig, SearchTemplate, SiteProfile};
use crate::scrapers::cards::CardLocator;
use crate::scrapers::dedup::DedupAccumulator;
use crate::scrapers::fields::FieldExtractor;
use crate::scrapers::traits::PageDriver;
use crate::scrapers::types::{StopReason, UnitReport, WorkUnit};
use anyhow::Result;
use scraper::Html;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const PAGE_HEIGHT: &str = "document.body.scrollHeight";
const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); true";
/// Set on listing links of a page before moving past it by clicking
const SEEN_ATTR: &str = "data-scout-seen";

/// How the next page of a unit is reached
#[derive(Debug)]
enum Pager {
    /// Each page is its own URL with an increasing items offset
    Offset {
        base: Url,
        param: String,
        offset: usize,
    },
    /// The first page is loaded by URL, later ones by clicking "next"
    NextControl {
        base: Url,
        selector: String,
        anchor: String,
        loaded: bool,
        /// Markers for the page a click leads to: listing links not yet seen
        fresh: Option<Vec<String>>,
    },
}

impl Pager {
    fn load<D: PageDriver>(&mut self, driver: &mut D) -> Result<()> {
        match self {
            Pager::Offset {
                base,
                param,
                offset,
            } => {
                let mut url = base.clone();
                url.query_pairs_mut()
                    .append_pair(param, &offset.to_string());
                info!(url = %url, offset = *offset, "Loading page");
                driver.navigate(url.as_str())
            }
            Pager::NextControl { base, loaded, .. } => {
                if !*loaded {
                    info!(url = %base, "Loading first page");
                    driver.navigate(base.as_str())?;
                    *loaded = true;
                }
                Ok(())
            }
        }
    }

    /// Move to the following page; `Ok(false)` when there is none to move to
    fn advance<D: PageDriver>(&mut self, driver: &mut D, cards_seen: usize) -> Result<bool> {
        match self {
            Pager::Offset { offset, .. } => {
                *offset += cards_seen;
                Ok(true)
            }
            Pager::NextControl {
                selector,
                anchor,
                fresh,
                ..
            } => {
                // the click re-renders in place, so tag the current listings
                // to tell the old DOM from the new one
                let mark = format!(
                    "document.querySelectorAll({}).forEach(a => a.setAttribute('{}', '')); true",
                    serde_json::to_string(anchor)?,
                    SEEN_ATTR
                );
                driver.evaluate(&mark)?;
                let clicked = driver.click_if_clickable(selector)?;
                if clicked {
                    *fresh = Some(vec![format!("{}:not([{}])", anchor, SEEN_ATTR)]);
                }
                Ok(clicked)
            }
        }
    }

    /// Selectors that must appear before the loaded page can be read, when
    /// they differ from the site's content markers
    fn awaited(&self) -> Option<&[String]> {
        match self {
            Pager::Offset { .. } => None,
            Pager::NextControl { fresh, .. } => fresh.as_deref(),
        }
    }
}

/// What a page contributed
#[derive(Debug, Clone, Copy)]
struct PageOutcome {
    cards: usize,
    admitted: usize,
}

#[derive(Debug)]
enum Phase {
    Fetching,
    Extracting,
    Deciding(PageOutcome),
    Stopped(StopReason),
}

/// Walks the result pages of one work unit until the results run out
pub struct PaginationController {
    site: SiteProfile,
    search: SearchTemplate,
    mode: PaginationMode,
    max_pages: Option<usize>,
    pacing: Pacing,
    locator: CardLocator,
    extractor: FieldExtractor,
    interrupt: Arc<AtomicBool>,
}

impl PaginationController {
    pub fn new(config: &RunConfig, interrupt: Arc<AtomicBool>) -> Result<Self> {
        Ok(Self {
            locator: CardLocator::new(&config.site)?,
            extractor: FieldExtractor::new(&config.site)?,
            site: config.site.clone(),
            search: config.search.clone(),
            mode: config.pagination,
            max_pages: config.max_pages,
            pacing: config.pacing.clone(),
            interrupt,
        })
    }

    /// Crawl a unit to exhaustion, admitting new listings into `acc`.
    ///
    /// Page-level failures end the unit and are reported in the returned
    /// `UnitReport`; they never propagate.
    pub fn run_unit<D: PageDriver>(
        &self,
        driver: &mut D,
        unit: &WorkUnit,
        acc: &mut DedupAccumulator,
    ) -> UnitReport {
        let mut report = UnitReport::new(unit.clone());
        let mut pager = match self.pager_for(unit) {
            Ok(pager) => pager,
            Err(e) => {
                report.stop = StopReason::FetchFailed(e.to_string());
                return report;
            }
        };

        let mut phase = Phase::Fetching;
        report.stop = loop {
            phase = match phase {
                Phase::Fetching => self.fetch(driver, &mut pager),
                Phase::Extracting => self.extract(driver, unit, acc, &mut report),
                Phase::Deciding(outcome) => self.decide(driver, &mut pager, outcome, &report),
                Phase::Stopped(reason) => break reason,
            };
        };
        report
    }

    fn pager_for(&self, unit: &WorkUnit) -> Result<Pager> {
        let base = self.search.render(&self.site.origin, unit)?;
        Ok(match self.mode {
            PaginationMode::Offset => Pager::Offset {
                base,
                param: self.site.offset_param.clone(),
                offset: 0,
            },
            PaginationMode::NextControl => Pager::NextControl {
                base,
                selector: self.site.next_page_selector.clone(),
                anchor: self.site.listing_anchor_selector(),
                loaded: false,
                fresh: None,
            },
        })
    }

    fn fetch<D: PageDriver>(&self, driver: &mut D, pager: &mut Pager) -> Phase {
        if self.interrupt.load(Ordering::SeqCst) {
            return Phase::Stopped(StopReason::Interrupted);
        }
        if let Err(e) = pager.load(driver) {
            return Phase::Stopped(StopReason::FetchFailed(e.to_string()));
        }
        self.dismiss_cookies(driver);

        let markers = pager.awaited().unwrap_or(self.site.content_markers.as_slice());
        match driver.wait_for_any(markers, self.pacing.content_timeout) {
            Ok(true) => Phase::Extracting,
            Ok(false) => {
                warn!("Nothing found on page (possible block or different layout)");
                Phase::Stopped(StopReason::NoContent)
            }
            Err(e) => Phase::Stopped(StopReason::FetchFailed(e.to_string())),
        }
    }

    fn extract<D: PageDriver>(
        &self,
        driver: &mut D,
        unit: &WorkUnit,
        acc: &mut DedupAccumulator,
        report: &mut UnitReport,
    ) -> Phase {
        if let Err(e) = self.scroll_to_bottom(driver) {
            debug!(error = %e, "Lazy-load scrolling failed, extracting what is rendered");
        }
        let html = match driver.content() {
            Ok(html) => html,
            Err(e) => return Phase::Stopped(StopReason::FetchFailed(e.to_string())),
        };

        let page_index = report.pages + 1;
        let document = Html::parse_document(&html);
        let cards = self.locator.locate(&document);

        let mut admitted = 0;
        for card in &cards {
            let entry = self
                .extractor
                .extract(*card)
                .with_provenance(&unit.city, unit.category_label(), page_index);
            if acc.admit(entry) {
                admitted += 1;
            }
        }

        report.pages = page_index;
        report.cards_seen += cards.len();
        report.admitted += admitted;
        info!(
            page = page_index,
            cards = cards.len(),
            new = admitted,
            total = acc.len(),
            "Extracted page"
        );

        Phase::Deciding(PageOutcome {
            cards: cards.len(),
            admitted,
        })
    }

    fn decide<D: PageDriver>(
        &self,
        driver: &mut D,
        pager: &mut Pager,
        outcome: PageOutcome,
        report: &UnitReport,
    ) -> Phase {
        if outcome.cards == 0 {
            return Phase::Stopped(StopReason::NoCards);
        }
        if outcome.admitted == 0 {
            return Phase::Stopped(StopReason::NoNewListings);
        }
        if self.max_pages.is_some_and(|max| report.pages >= max) {
            return Phase::Stopped(StopReason::PageLimit);
        }

        match pager.advance(driver, outcome.cards) {
            Ok(true) => {
                self.pacing.page_delay.pause();
                Phase::Fetching
            }
            Ok(false) => Phase::Stopped(StopReason::NoNextPage),
            Err(e) => Phase::Stopped(StopReason::FetchFailed(e.to_string())),
        }
    }

    /// Scroll until the page stops growing so lazy cards render
    fn scroll_to_bottom<D: PageDriver>(&self, driver: &mut D) -> Result<()> {
        let mut last = driver.evaluate(PAGE_HEIGHT)?;
        for _ in 0..self.pacing.scroll_attempts {
            driver.evaluate(SCROLL_TO_BOTTOM)?;
            self.pacing.scroll_pause.pause();
            let height = driver.evaluate(PAGE_HEIGHT)?;
            if height == last {
                break;
            }
            last = height;
        }
        self.pacing.settle_pause.pause();
        Ok(())
    }

    /// Best effort: click a visible button whose caption matches a known label
    fn dismiss_cookies<D: PageDriver>(&self, driver: &mut D) {
        let labels = serde_json::to_string(&self.site.cookie_labels).unwrap_or_else(|_| "[]".into());
        let script = format!(
            r#"(() => {{
                const labels = {labels};
                const button = Array.from(document.querySelectorAll('button')).find(b =>
                    b.offsetParent !== null && labels.some(l => (b.textContent || '').includes(l)));
                if (!button) return false;
                button.click();
                return true;
            }})()"#,
            labels = labels
        );
        match driver.evaluate(&script) {
            Ok(serde_json::Value::Bool(true)) => {
                debug!("Dismissed cookie banner");
                self.pacing.cookie_pause.pause();
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Cookie banner check failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, DedupScope};
    use crate::scrapers::testing::{results_page, FakeDriver};
    use clap::Parser;

    const BASE: &str = "https://www.airbnb.com/s/Hunza--Pakistan/homes";

    fn config(extra: &[&str]) -> RunConfig {
        let mut args = vec!["rental-scout", "--cities", "Hunza", "--categories", "homes"];
        args.extend_from_slice(extra);
        let mut config = Cli::try_parse_from(args).unwrap().into_config().unwrap();
        config.pacing = Pacing::immediate();
        config
    }

    fn controller(config: &RunConfig) -> PaginationController {
        PaginationController::new(config, Arc::new(AtomicBool::new(false))).unwrap()
    }

    fn page_url(offset: usize) -> String {
        format!("{}?items_offset={}", BASE, offset)
    }

    fn unit() -> WorkUnit {
        WorkUnit::new("Hunza", Some("homes"))
    }

    #[test]
    fn offset_pages_until_an_empty_page() {
        let config = config(&[]);
        let mut driver = FakeDriver::new()
            .page(&page_url(0), results_page(&[1, 2, 3]))
            .page(&page_url(3), results_page(&[4, 5]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::NoCards);
        assert_eq!(report.pages, 3);
        assert_eq!(report.admitted, 5);
        assert_eq!(driver.visited, vec![page_url(0), page_url(3), page_url(5)]);

        let entries = acc.entries();
        assert_eq!(entries[0].listing_url, "https://www.airbnb.com/rooms/1");
        assert_eq!(entries[0].category, "homes");
        assert_eq!(entries[0].city, "Hunza");
        assert_eq!(entries[0].page_index, 1);
        assert_eq!(entries[3].page_index, 2);
        assert_eq!(entries[4].reviews_count, "5");
    }

    #[test]
    fn repeated_page_stops_the_unit() {
        let config = config(&[]);
        let mut driver = FakeDriver::new()
            .page(&page_url(0), results_page(&[1, 2]))
            .page(&page_url(2), results_page(&[1, 2]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::NoNewListings);
        assert_eq!(report.pages, 2);
        assert_eq!(report.cards_seen, 4);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn page_limit_is_respected() {
        let config = config(&["--max-pages", "1"]);
        let mut driver = FakeDriver::new()
            .page(&page_url(0), results_page(&[1, 2]))
            .page(&page_url(2), results_page(&[3]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::PageLimit);
        assert_eq!(driver.visited, vec![page_url(0)]);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn missing_content_stops_without_extracting() {
        let config = config(&[]);
        let mut driver = FakeDriver::new().page(&page_url(0), results_page(&[1]));
        driver.blocked = true;
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::NoContent);
        assert_eq!(report.pages, 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn navigation_failure_is_contained() {
        let config = config(&[]);
        let mut driver = FakeDriver::new();
        driver.failing = true;
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert!(matches!(report.stop, StopReason::FetchFailed(_)));
    }

    #[test]
    fn interrupt_stops_before_fetching() {
        let config = config(&[]);
        let controller = PaginationController::new(&config, Arc::new(AtomicBool::new(true))).unwrap();
        let mut driver = FakeDriver::new().page(&page_url(0), results_page(&[1]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller.run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::Interrupted);
        assert!(driver.visited.is_empty());
    }

    #[test]
    fn next_control_clicks_until_it_disappears() {
        let config = config(&["--pagination", "next"]);
        let mut driver = FakeDriver::new()
            .page(BASE, results_page(&[1, 2]))
            .after_next(results_page(&[3, 4]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::NoNextPage);
        assert_eq!(report.pages, 2);
        assert_eq!(driver.visited, vec![BASE.to_string()]);
        assert_eq!(driver.clicks, 1);
        assert_eq!(acc.len(), 4);
        assert_eq!(driver.waited_for[0], config.site.content_markers);
        assert_eq!(
            driver.waited_for[1],
            vec![r#"a[href*="/rooms/"]:not([data-scout-seen])"#.to_string()]
        );
    }

    #[test]
    fn next_click_without_rerender_is_not_read_twice() {
        let config = config(&["--pagination", "next"]);
        let mut driver = FakeDriver::new()
            .page(BASE, results_page(&[1, 2]))
            .after_next(results_page(&[1, 2]));
        let mut acc = DedupAccumulator::new(DedupScope::Run);

        let report = controller(&config).run_unit(&mut driver, &unit(), &mut acc);

        assert_eq!(report.stop, StopReason::NoContent);
        assert_eq!(report.pages, 1);
        assert_eq!(report.cards_seen, 2);
        assert_eq!(driver.clicks, 1);
        assert_eq!(acc.len(), 2);
    }
}
