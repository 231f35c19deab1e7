use serde::{Deserialize, Serialize};

pub const GOOGLE_MAPS_BASE_URL: &str = "https://www.google.com/maps";
pub const GOOGLE_STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
pub const GOOGLE_GEOCODE_HOST: &str = "https://maps.googleapis.com";
pub const GOOGLE_ROUTES_HOST: &str = "https://routes.googleapis.com";
pub const GOOGLE_PLACES_HOST: &str = "https://places.googleapis.com";

/// Settings shared by the map-backed capabilities and the map artifacts of an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsConfig {
    /// Key for geocoding, routes, places and static maps. Without it those services
    /// report themselves as not configured.
    pub api_key: Option<String>,
    pub geocode_host: String,
    pub routes_host: String,
    pub places_host: String,
    pub map_base_url: String,
    pub static_map_url: String,
    /// Language of navigation instructions; toll keywords must match it
    pub language_code: String,
    pub toll_keywords: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocode_host: GOOGLE_GEOCODE_HOST.to_string(),
            routes_host: GOOGLE_ROUTES_HOST.to_string(),
            places_host: GOOGLE_PLACES_HOST.to_string(),
            map_base_url: GOOGLE_MAPS_BASE_URL.to_string(),
            static_map_url: GOOGLE_STATIC_MAP_URL.to_string(),
            language_code: "pt-BR".to_string(),
            toll_keywords: vec!["pedágio".to_string()],
            timeout_secs: 30,
        }
    }
}

impl MapsConfig {
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The api key, treating an empty string as absent
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}
