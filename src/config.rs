use crate::scrapers::types::WorkUnit;
use clap::{Parser, ValueEnum};
use rand::Rng;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CITIES: &[&str] = &[
    "Islamabad",
    "Lahore",
    "Karachi",
    "Rawalpindi",
    "Multan",
    "Faisalabad",
    "Hyderabad",
    "Peshawar",
    "Quetta",
    "Sialkot",
    "Murree",
    "Swat",
    "Hunza",
    "Gilgit",
    "Skardu",
    "Abbottabad",
    "Muzaffarabad",
    "Gwadar",
    "Karimabad",
];

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "homes",
    "apartments",
    "guesthouses",
    "villas",
    "cottages",
    "bungalows",
];

/// Category used in the search path when crawling cities alone
pub const FALLBACK_CATEGORY: &str = "homes";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one city is required")]
    NoCities,
    #[error("invalid site origin `{origin}`: {source}")]
    InvalidOrigin {
        origin: String,
        source: url::ParseError,
    },
    #[error("search path `{0}` has no {{city}} placeholder")]
    MissingCityPlaceholder(String),
    #[error("invalid search URL `{url}`: {source}")]
    InvalidSearchUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("page limit must be at least 1")]
    ZeroPageLimit,
    #[error("delay range is inverted: {min_ms}ms > {max_ms}ms")]
    InvertedDelay { min_ms: u64, max_ms: u64 },
}

/// How successive result pages are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaginationMode {
    /// Rebuild the search URL with an increasing items offset
    Offset,
    /// Click the site's "next page" control
    #[value(name = "next")]
    NextControl,
}

/// Which listings count as duplicates of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DedupScope {
    /// A listing is recorded once per run
    Run,
    /// A listing is recorded once per city
    City,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Collects short-term rental listings city by city")]
pub struct Cli {
    /// Cities to search, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CITIES.iter().map(|c| c.to_string()).collect::<Vec<_>>())]
    pub cities: Vec<String>,

    /// Listing categories, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect::<Vec<_>>())]
    pub categories: Vec<String>,

    /// Crawl one stream per city instead of one per city and category
    #[arg(long)]
    pub city_only: bool,

    /// Country appended to each city slug (`City--Country`); empty to omit
    #[arg(long, default_value = "Pakistan")]
    pub country: String,

    /// Site origin that relative listing links are resolved against
    #[arg(long, default_value = "https://www.airbnb.com")]
    pub origin: String,

    /// Search path template with {city} and optional {category} placeholders
    #[arg(long, default_value = "/s/{city}/{category}")]
    pub search_path: String,

    /// How to move between result pages
    #[arg(long, value_enum, default_value_t = PaginationMode::Offset)]
    pub pagination: PaginationMode,

    /// Maximum pages per work unit (unlimited when omitted)
    #[arg(short, long)]
    pub max_pages: Option<usize>,

    /// Scope of listing deduplication
    #[arg(long, value_enum, default_value_t = DedupScope::Run)]
    pub dedup_scope: DedupScope,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Path to output CSV file
    #[arg(short, long, default_value = "airbnb_scraped.csv")]
    pub output: PathBuf,

    /// Also write the results as a JSON array to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Skip the per-unit snapshot file
    #[arg(long)]
    pub no_snapshot: bool,

    /// Seed the run with rows saved by a previous run
    #[arg(long)]
    pub resume: bool,

    /// Seconds to wait for listing content to appear
    #[arg(long, default_value_t = 15)]
    pub wait_secs: u64,

    /// Lower bound of the pause between pages, in milliseconds
    #[arg(long, default_value_t = 3500)]
    pub min_delay_ms: u64,

    /// Upper bound of the pause between pages, in milliseconds
    #[arg(long, default_value_t = 7000)]
    pub max_delay_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate flags into a run configuration
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let cities: Vec<String> = non_blank(self.cities);
        if cities.is_empty() {
            return Err(ConfigError::NoCities);
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::ZeroPageLimit);
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvertedDelay {
                min_ms: self.min_delay_ms,
                max_ms: self.max_delay_ms,
            });
        }

        let origin = Url::parse(&self.origin).map_err(|source| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            source,
        })?;
        let search = SearchTemplate::new(&self.search_path, non_blank(vec![self.country]).pop())?;

        let categories = if self.city_only {
            Vec::new()
        } else {
            non_blank(self.categories)
        };
        let units = WorkUnit::cross(&cities, &categories);

        let pacing = Pacing {
            content_timeout: Duration::from_secs(self.wait_secs),
            page_delay: DelayRange::new(self.min_delay_ms, self.max_delay_ms),
            ..Pacing::default()
        };

        Ok(RunConfig {
            site: SiteProfile::new(origin),
            search,
            units,
            pagination: self.pagination,
            max_pages: self.max_pages,
            dedup_scope: self.dedup_scope,
            pacing,
            browser: BrowserOptions {
                headless: !self.headed,
                page_load_timeout: Duration::from_secs(60),
            },
            output: OutputPaths {
                csv: self.output,
                json: self.json,
                snapshot: !self.no_snapshot,
                resume: self.resume,
            },
        })
    }
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Everything a run needs, validated
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub site: SiteProfile,
    pub search: SearchTemplate,
    pub units: Vec<WorkUnit>,
    pub pagination: PaginationMode,
    pub max_pages: Option<usize>,
    pub dedup_scope: DedupScope,
    pub pacing: Pacing,
    pub browser: BrowserOptions,
    pub output: OutputPaths,
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub page_load_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub json: Option<PathBuf>,
    pub snapshot: bool,
    pub resume: bool,
}

impl OutputPaths {
    /// Intermediate file rewritten after every completed work unit
    pub fn snapshot_path(&self) -> PathBuf {
        let mut path = self.csv.clone().into_os_string();
        path.push(".partial");
        PathBuf::from(path)
    }
}

/// Markup conventions of the target site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub origin: Url,
    /// Path fragment every listing link contains
    pub listing_path: String,
    /// Card selectors, most specific first
    pub card_selectors: Vec<String>,
    /// Any of these appearing means results have rendered
    pub content_markers: Vec<String>,
    pub next_page_selector: String,
    /// Button captions that dismiss the cookie banner
    pub cookie_labels: Vec<String>,
    pub offset_param: String,
}

impl SiteProfile {
    pub fn new(origin: Url) -> Self {
        let listing_path = "/rooms/".to_string();
        let listing_anchor = format!("a[href*=\"{}\"]", listing_path);
        Self {
            origin,
            card_selectors: vec![
                r#"div[data-testid="explore-property-card"]"#.to_string(),
                r#"div[data-testid="card-container"]"#.to_string(),
                r#"div[data-testid="property-card"]"#.to_string(),
                r#"div[data-testid="listing-card"]"#.to_string(),
                r#"div[role="group"]"#.to_string(),
                r#"div[itemprop="itemListElement"]"#.to_string(),
            ],
            content_markers: vec![
                r#"div[data-testid="card-container"]"#.to_string(),
                r#"div[data-testid="explore-property-card"]"#.to_string(),
                listing_anchor,
            ],
            listing_path,
            next_page_selector: r#"a[aria-label="Next"]"#.to_string(),
            cookie_labels: vec!["Accept".to_string(), "Agree".to_string(), "OK".to_string()],
            offset_param: "items_offset".to_string(),
        }
    }

    /// Selector matching any anchor that links to a listing
    pub fn listing_anchor_selector(&self) -> String {
        format!("a[href*=\"{}\"]", self.listing_path)
    }
}

/// Search URL path with `{city}` and `{category}` placeholders
#[derive(Debug, Clone)]
pub struct SearchTemplate {
    path: String,
    country: Option<String>,
}

impl SearchTemplate {
    pub fn new(path: &str, country: Option<String>) -> Result<Self, ConfigError> {
        if !path.contains("{city}") {
            return Err(ConfigError::MissingCityPlaceholder(path.to_string()));
        }
        Ok(Self {
            path: path.to_string(),
            country,
        })
    }

    /// First-page URL of a work unit; spaces in the city are percent-encoded
    pub fn render(&self, origin: &Url, unit: &WorkUnit) -> Result<Url, ConfigError> {
        let slug = match &self.country {
            Some(country) => format!("{}--{}", unit.city, country),
            None => unit.city.clone(),
        };
        let category = unit.category.as_deref().unwrap_or(FALLBACK_CATEGORY);
        let path = self
            .path
            .replace("{city}", &slug)
            .replace("{category}", category);
        origin
            .join(&path)
            .map_err(|source| ConfigError::InvalidSearchUrl { url: path, source })
    }
}

/// Inclusive range of milliseconds to sleep for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Block the current thread for a random duration within the range
    pub fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// Waits and politeness pauses
#[derive(Debug, Clone)]
pub struct Pacing {
    pub content_timeout: Duration,
    pub scroll_attempts: usize,
    pub scroll_pause: DelayRange,
    pub settle_pause: DelayRange,
    pub cookie_pause: DelayRange,
    pub page_delay: DelayRange,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            content_timeout: Duration::from_secs(15),
            scroll_attempts: 3,
            scroll_pause: DelayRange::new(1500, 3000),
            settle_pause: DelayRange::new(800, 1500),
            cookie_pause: DelayRange::new(1000, 1000),
            page_delay: DelayRange::new(3500, 7000),
        }
    }
}

#[cfg(test)]
impl Pacing {
    pub fn immediate() -> Self {
        let none = DelayRange::new(0, 0);
        Self {
            content_timeout: Duration::from_millis(10),
            scroll_attempts: 3,
            scroll_pause: none,
            settle_pause: none,
            cookie_pause: none,
            page_delay: none,
        }
    }
}
