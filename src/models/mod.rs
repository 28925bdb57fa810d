use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core listing data model, one row per scraped card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Location")]
    pub location: String,
    /// Raw price text as displayed, e.g. "$120" or "₹ 4,500"
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Rating")]
    pub rating: String,
    /// Digits only, thousands separators stripped
    #[serde(rename = "Reviews")]
    pub reviews_count: String,
    #[serde(rename = "Image_URL")]
    pub image_url: String,
    /// Always absolute when non-empty
    #[serde(rename = "Listing_URL")]
    pub listing_url: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Page")]
    pub page_index: usize,
    #[serde(rename = "Scraped_At")]
    pub scraped_at: DateTime<Utc>,
}

impl ListingEntry {
    /// Key used for deduplication: the listing URL, falling back to the title.
    ///
    /// Returns `None` when the entry has neither and therefore no usable identity.
    pub fn identity_key(&self) -> Option<&str> {
        if !self.listing_url.is_empty() {
            Some(&self.listing_url)
        } else if !self.title.is_empty() {
            Some(&self.title)
        } else {
            None
        }
    }

    /// Attach provenance to a freshly extracted entry
    pub fn with_provenance(mut self, city: &str, category: &str, page_index: usize) -> Self {
        self.city = city.to_string();
        self.category = category.to_string();
        self.page_index = page_index;
        self.scraped_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_url_over_title() {
        let entry = ListingEntry {
            title: "Home in Ziarat".to_string(),
            listing_url: "https://www.airbnb.com/rooms/1".to_string(),
            ..Default::default()
        };
        assert_eq!(entry.identity_key(), Some("https://www.airbnb.com/rooms/1"));

        let entry = ListingEntry {
            title: "Home in Ziarat".to_string(),
            ..Default::default()
        };
        assert_eq!(entry.identity_key(), Some("Home in Ziarat"));

        assert_eq!(ListingEntry::default().identity_key(), None);
    }

    #[test]
    fn provenance_is_attached() {
        let entry = ListingEntry::default().with_provenance("Swat", "villas", 3);
        assert_eq!(entry.city, "Swat");
        assert_eq!(entry.category, "villas");
        assert_eq!(entry.page_index, 3);
    }
}
