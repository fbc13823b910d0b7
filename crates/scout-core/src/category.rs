use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;

/// Content category of a link. Selects extraction schema, prompts and
/// storage namespace. Assigned at ingestion and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Event,
    Festival,
    Sport,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Event, Category::Festival, Category::Sport];

    /// Namespace prefix used in store keys (`event_links_queue`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Event => "event",
            Category::Festival => "festival",
            Category::Sport => "sport",
        }
    }

    /// Plural form. Also the array field the detail schema wraps records in.
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Event => "events",
            Category::Festival => "festivals",
            Category::Sport => "sports",
        }
    }

    /// Match a free-form type label by case-insensitive substring.
    ///
    /// Checked in the order event, festival, sport; the first hit wins.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| label.contains(c.as_str()))
    }

    /// Schema for discovery: a flat list of detail-page URLs.
    pub fn link_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["links"],
            "properties": {
                "links": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": format!("List of URLs that link to individual {} pages", self.as_str())
                }
            }
        })
    }

    /// Schema for a single extracted record of this category.
    pub fn record_schema(&self) -> serde_json::Value {
        let string = json!({"type": "string"});
        let strings = json!({"type": "array", "items": {"type": "string"}});
        let number = json!({"type": "number"});

        let mut properties = serde_json::Map::new();
        for field in [
            "title",
            "description",
            "event_link",
            "price",
            "display_photo",
            "time_zone",
            "address_line_1",
            "city",
            "province_state",
            "postal_zip_code",
            "country",
            "contact_email",
            "contact_website",
            "contact_primary_phone",
        ] {
            properties.insert(field.to_string(), string.clone());
        }
        for field in ["photos", "hosts", "sponsors"] {
            properties.insert(field.to_string(), strings.clone());
        }
        properties.insert("lat".to_string(), number.clone());
        properties.insert("lng".to_string(), number);

        let mut required = vec!["title", "description", "event_link"];
        match self {
            Category::Event => {
                properties.insert("time_slots".to_string(), strings);
            }
            Category::Festival => {
                properties.insert("start_date".to_string(), string.clone());
                properties.insert("end_date".to_string(), string);
                required.extend(["start_date", "end_date", "time_zone"]);
            }
            Category::Sport => {
                properties.insert("sport_type".to_string(), string.clone());
                properties.insert("venue".to_string(), string);
                properties.insert("time_slots".to_string(), strings);
                required.extend(["sport_type", "venue", "time_zone"]);
            }
        }

        json!({
            "type": "object",
            "required": required,
            "properties": properties,
        })
    }

    /// Schema for detail extraction: `{ "<plural>": [record, ...] }`.
    pub fn detail_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": [self.plural()],
            "properties": {
                self.plural(): {
                    "type": "array",
                    "items": self.record_schema(),
                }
            }
        })
    }

    /// Prompt for discovery jobs: only links to single, specific items.
    pub fn discovery_prompt(&self) -> String {
        let noun = self.as_str();
        let hint = match self {
            Category::Event => "/events/123, /concert/abc or #event-456",
            Category::Festival => "/festivals/harvest-fair or /musicfest-2025",
            Category::Sport => "/matches/cup-final or /games/4512",
        };
        format!(
            "You are given a webpage that may contain many links related to {plural}.\n\
             Extract ONLY the URLs that lead directly to a page about one single, specific {noun}.\n\
             Include links to {noun} detail pages, registration, booking or ticket pages for one {noun}, \
             and links carrying a unique identifier or slug (for example {hint}).\n\
             If a {noun} opens in a popup or modal, include that link.\n\
             Exclude listings, calendars, categories, \"all {plural}\" overviews, blogs, news, \
             pagination and \"see more\" links.\n\
             Each URL must correspond to exactly one {noun}.",
            plural = self.plural(),
        )
    }

    /// Prompt for detail jobs.
    pub fn detail_prompt(&self) -> String {
        let noun = self.as_str();
        let extra = match self {
            Category::Event => "time_slots (every date and time the event takes place)",
            Category::Festival => "start_date and end_date",
            Category::Sport => "sport_type, venue and time_slots (match schedule)",
        };
        format!(
            "You are given a webpage describing one or more {plural}.\n\
             Extract every {noun} that has its own title and a direct link, and return them inside \
             the \"{plural}\" list.\n\
             For each {noun} extract if available: title, description, event_link, price, \
             display_photo, photos, time_zone, hosts, sponsors, address_line_1, city, province_state, \
             postal_zip_code, country, lat, lng, contact_email, contact_website, \
             contact_primary_phone and {extra}.\n\
             Use full absolute URLs. Do not invent values; omit fields that are not on the page.",
            plural = self.plural(),
        )
    }

    /// Listing pages for events render lazily and need a longer settle time.
    pub fn wait_for_content(&self) -> bool {
        matches!(self, Category::Event)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" | "events" => Ok(Category::Event),
            "festival" | "festivals" => Ok(Category::Festival),
            "sport" | "sports" => Ok(Category::Sport),
            _ => Err(AppError::InvalidCategory(s.to_string())),
        }
    }
}
