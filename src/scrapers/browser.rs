use crate::config::BrowserOptions;
use crate::scrapers::traits::PageDriver;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Headless Chrome with a single tab, owned for the length of a run.
///
/// The browser process is shut down when the session is dropped, which
/// covers normal completion, interruption and unwinding alike.
pub struct ChromeSession {
    // tab must drop before the browser that owns it
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromeSession {
    /// Launch Chrome and open the working tab
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        info!(headless = options.headless, "Launching Chrome...");

        let launch = LaunchOptions::default_builder()
            .headless(options.headless)
            .window_size(Some((1366, 900)))
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(options.page_load_timeout);

        Ok(Self {
            tab,
            _browser: browser,
        })
    }
}

impl PageDriver for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not finish", url))?;
        Ok(())
    }

    fn content(&mut self) -> Result<String> {
        self.tab.get_content().context("Failed to read page HTML")
    }

    fn wait_for_any(&mut self, selectors: &[String], timeout: Duration) -> Result<bool> {
        // a selector list matches as soon as any one of its parts does
        let selector = selectors.join(", ");
        match self.tab.wait_for_element_with_custom_timeout(&selector, timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(selector = %selector, error = %e, "No content marker appeared");
                Ok(false)
            }
        }
    }

    fn evaluate(&mut self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .context("Script evaluation failed")?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn click_if_clickable(&mut self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el || el.offsetParent === null) return false;
                if (el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return true;
            }})()"#,
            selector = serde_json::to_string(selector)?
        );
        let clicked = self.evaluate(&script)?.as_bool() == Some(true);
        debug!(selector, clicked, "Next-page control");
        Ok(clicked)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        info!("Releasing browser session");
        if let Err(e) = self.tab.close(false) {
            warn!(error = %e, "Failed to close tab cleanly");
        }
    }
}
