use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{http_client, parse_input, to_output, Capability, MapsConfig};
use crate::errors::AgentResult;
use crate::models::tool::{CapabilityResult, Tool};

pub const NEARBY_PLACES: &str = "nearbyPlaces";
pub const MAX_PLACES: usize = 3;

const PLACES_FIELD_MASK: &str = "places.displayName,places.formattedAddress,places.rating";

#[derive(Debug, Deserialize)]
struct PlacesInput {
    query: String,
    location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPlaces {
    pub places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<PlaceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceEntry {
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

/// Text search for places around a location, backed by the Places API
pub struct NearbyPlacesCapability {
    tool: Tool,
    client: Client,
    config: MapsConfig,
}

impl NearbyPlacesCapability {
    pub fn new(config: MapsConfig) -> AgentResult<Self> {
        let tool = Tool::new(
            NEARBY_PLACES,
            "Finds up to three places (restaurants, gas stations, hotels, attractions...) \
             matching a query near a location.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for, e.g. restaurante"
                    },
                    "location": {
                        "type": "string",
                        "description": "Where to look, e.g. Londrina"
                    }
                },
                "required": ["query", "location"]
            }),
            json!({
                "type": "object",
                "properties": {
                    "places": {
                        "type": "array",
                        "maxItems": MAX_PLACES,
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "address": {"type": "string"},
                                "rating": {"type": "number"}
                            },
                            "required": ["name"]
                        }
                    }
                },
                "required": ["places"]
            }),
        );
        Ok(Self {
            tool,
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    async fn search(&self, api_key: &str, input: &PlacesInput) -> Result<Vec<Place>> {
        let url = format!(
            "{}/v1/places:searchText",
            self.config.places_host.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", PLACES_FIELD_MASK)
            .json(&json!({
                "textQuery": format!("{} near {}", input.query, input.location),
                "languageCode": self.config.language_code,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("places search failed: {}", response.status()));
        }

        let body: SearchTextResponse = response.json().await?;
        Ok(body
            .places
            .into_iter()
            .filter_map(|entry| {
                entry.display_name.map(|name| Place {
                    name: name.text,
                    address: entry.formatted_address,
                    rating: entry.rating,
                })
            })
            .take(MAX_PLACES)
            .collect())
    }
}

#[async_trait]
impl Capability for NearbyPlacesCapability {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> CapabilityResult {
        let input: PlacesInput = parse_input(NEARBY_PLACES, arguments)?;

        let places = match self.config.key() {
            None => {
                tracing::warn!("places service is not configured");
                Vec::new()
            }
            Some(api_key) => match self.search(api_key, &input).await {
                Ok(places) => places,
                Err(e) => {
                    tracing::warn!(error = %e, query = %input.query, "places lookup failed");
                    Vec::new()
                }
            },
        };

        to_output(&NearbyPlaces { places })
    }
}
