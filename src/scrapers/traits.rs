use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

/// The slice of browser automation the scraper relies on.
///
/// Implemented by the headless Chrome session for real runs and by a scripted
/// fake in tests, so pagination can be exercised without a browser.
pub trait PageDriver {
    /// Load a URL in the current tab and wait for navigation to finish
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Current rendered document as HTML
    fn content(&mut self) -> Result<String>;

    /// Wait until any selector matches; `Ok(false)` on timeout
    fn wait_for_any(&mut self, selectors: &[String], timeout: Duration) -> Result<bool>;

    /// Evaluate a JavaScript expression and return its value
    fn evaluate(&mut self, script: &str) -> Result<Value>;

    /// Click the first element matching the selector if it is displayed and
    /// enabled; `Ok(false)` when there is nothing clickable
    fn click_if_clickable(&mut self, selector: &str) -> Result<bool>;
}
