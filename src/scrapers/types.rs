use std::fmt;

/// One stream of result pages: a city, optionally narrowed to a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub city: String,
    pub category: Option<String>,
}

impl WorkUnit {
    pub fn new(city: &str, category: Option<&str>) -> Self {
        Self {
            city: city.to_string(),
            category: category.map(str::to_string),
        }
    }

    /// Every city paired with every category, city-major; cities alone if
    /// there are no categories
    pub fn cross(cities: &[String], categories: &[String]) -> Vec<WorkUnit> {
        if categories.is_empty() {
            return cities.iter().map(|c| WorkUnit::new(c, None)).collect();
        }
        cities
            .iter()
            .flat_map(|city| {
                categories
                    .iter()
                    .map(move |category| WorkUnit::new(city, Some(category)))
            })
            .collect()
    }

    /// Category as recorded on entries, empty for city-only units
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}/{}", self.city, category),
            None => write!(f, "{}", self.city),
        }
    }
}

/// Why pagination of a work unit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No content marker appeared in time (blocked or changed layout)
    NoContent,
    /// The page rendered but held no listing cards
    NoCards,
    /// Every card on the page had been seen already
    NoNewListings,
    /// The configured maximum number of pages was extracted
    PageLimit,
    /// The next-page control was missing, hidden or disabled
    NoNextPage,
    /// The run was asked to stop
    Interrupted,
    /// Navigation, page read or URL building failed
    FetchFailed(String),
}

impl StopReason {
    /// Whether the unit ended because results ran out rather than a problem
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            StopReason::NoCards | StopReason::NoNewListings | StopReason::PageLimit | StopReason::NoNextPage
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoContent => write!(f, "no content / blocked"),
            StopReason::NoCards => write!(f, "no cards on page"),
            StopReason::NoNewListings => write!(f, "no new listings on page"),
            StopReason::PageLimit => write!(f, "page limit reached"),
            StopReason::NoNextPage => write!(f, "no next page control"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::FetchFailed(err) => write!(f, "fetch failed: {}", err),
        }
    }
}

/// Outcome of one work unit
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: WorkUnit,
    pub pages: usize,
    pub cards_seen: usize,
    pub admitted: usize,
    pub stop: StopReason,
}

impl UnitReport {
    pub fn new(unit: WorkUnit) -> Self {
        Self {
            unit,
            pages: 0,
            cards_seen: 0,
            admitted: 0,
            stop: StopReason::NoCards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_is_city_major() {
        let cities = vec!["Lahore".to_string(), "Swat".to_string()];
        let categories = vec!["homes".to_string(), "villas".to_string()];
        let units = WorkUnit::cross(&cities, &categories);
        let labels: Vec<String> = units.iter().map(|u| u.to_string()).collect();
        assert_eq!(labels, ["Lahore/homes", "Lahore/villas", "Swat/homes", "Swat/villas"]);
    }

    #[test]
    fn cross_without_categories_is_per_city() {
        let cities = vec!["Gwadar".to_string()];
        let units = WorkUnit::cross(&cities, &[]);
        assert_eq!(units, vec![WorkUnit::new("Gwadar", None)]);
        assert_eq!(units[0].category_label(), "");
    }

    #[test]
    fn exhaustion_is_distinguished_from_failures() {
        assert!(StopReason::NoCards.is_exhausted());
        assert!(StopReason::PageLimit.is_exhausted());
        assert!(!StopReason::NoContent.is_exhausted());
        assert!(!StopReason::FetchFailed("timeout".into()).is_exhausted());
    }
}
