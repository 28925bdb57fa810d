use crate::scrapers::traits::PageDriver;
use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted stand-in for a browser tab.
///
/// Pages are served by exact URL; unknown URLs render an empty body. Clicking
/// the next control swaps in the next queued page. Listings tagged seen stay
/// tagged until the page HTML changes, so a click that serves identical HTML
/// behaves like one that never re-rendered.
#[derive(Default)]
pub struct FakeDriver {
    pages: HashMap<String, String>,
    next_pages: VecDeque<String>,
    current: String,
    /// HTML of the page whose listings were last tagged seen
    tagged: Option<String>,
    pub blocked: bool,
    pub failing: bool,
    pub visited: Vec<String>,
    pub clicks: usize,
    pub waited_for: Vec<Vec<String>>,
    /// Raise this flag once the given number of pages has been loaded
    pub interrupt_after: Option<(usize, Arc<AtomicBool>)>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn after_next(mut self, html: String) -> Self {
        self.next_pages.push_back(html);
        self
    }
}

impl PageDriver for FakeDriver {
    fn navigate(&mut self, url: &str) -> Result<()> {
        if self.failing {
            bail!("net::ERR_CONNECTION_RESET");
        }
        self.visited.push(url.to_string());
        if let Some((limit, flag)) = &self.interrupt_after {
            if self.visited.len() >= *limit {
                flag.store(true, Ordering::SeqCst);
            }
        }
        self.current = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        Ok(())
    }

    fn content(&mut self) -> Result<String> {
        Ok(self.current.clone())
    }

    fn wait_for_any(&mut self, selectors: &[String], _timeout: Duration) -> Result<bool> {
        self.waited_for.push(selectors.to_vec());
        if self.blocked {
            return Ok(false);
        }
        let wants_untagged = selectors.iter().all(|s| s.contains(":not([data-scout-seen])"));
        Ok(!(wants_untagged && self.tagged.as_ref() == Some(&self.current)))
    }

    fn evaluate(&mut self, script: &str) -> Result<Value> {
        if script.contains("setAttribute('data-scout-seen'") {
            self.tagged = Some(self.current.clone());
            return Ok(Value::Bool(true));
        }
        // constant page height, so lazy-load scrolling settles at once
        Ok(Value::from(2000))
    }

    fn click_if_clickable(&mut self, _selector: &str) -> Result<bool> {
        match self.next_pages.pop_front() {
            Some(html) => {
                self.current = html;
                self.clicks += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Results page holding one card per listing id
pub fn results_page(ids: &[u32]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div data-testid="card-container">
                    <a href="/rooms/{id}"><img src="https://img.example/{id}.jpg"></a>
                    <div data-testid="listing-card-title">Home in Hunza</div>
                    <span data-testid="price">${id}0 night</span>
                    <span>4.9{d} · {id} reviews</span>
                </div>"#,
                id = id,
                d = id % 10
            )
        })
        .collect();
    format!("<html><body><main>{}</main></body></html>", cards)
}
