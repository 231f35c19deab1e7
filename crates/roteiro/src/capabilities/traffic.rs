use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{http_client, parse_input, to_output, Capability, MapsConfig};
use crate::errors::AgentResult;
use crate::models::tool::{CapabilityResult, Tool};

pub const TRAFFIC_INFO: &str = "trafficInfo";

const ROUTES_FIELD_MASK: &str = "routes.duration,routes.distanceMeters,routes.description,\
routes.polyline.encodedPolyline,routes.legs.steps.navigationInstruction,\
routes.travelAdvisory.tollInfo";

#[derive(Debug, Deserialize)]
struct TrafficInput {
    origin: String,
    destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfo {
    pub travel_time: String,
    pub distance: String,
    pub summary: String,
    pub toll_cost: f64,
    pub toll_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_polyline: Option<String>,
}

impl TrafficInfo {
    /// The "no data" shape: a descriptive summary and zeroed numbers
    pub fn unavailable<S: Into<String>>(summary: S) -> Self {
        Self {
            travel_time: "N/A".to_string(),
            distance: "N/A".to_string(),
            summary: summary.into(),
            toll_cost: 0.0,
            toll_count: 0,
            route_polyline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Default, Deserialize)]
struct ComputeRoutesResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Route {
    duration: Option<String>,
    distance_meters: Option<u64>,
    description: Option<String>,
    polyline: Option<Polyline>,
    #[serde(default)]
    legs: Vec<Leg>,
    travel_advisory: Option<TravelAdvisory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Polyline {
    encoded_polyline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Step {
    navigation_instruction: Option<NavigationInstruction>,
}

#[derive(Debug, Deserialize)]
struct NavigationInstruction {
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TravelAdvisory {
    toll_info: Option<TollInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TollInfo {
    #[serde(default)]
    estimated_price: Vec<Money>,
}

/// A price component as reported by the routes backend: whole units plus nanos.
/// `units` is an int64 and arrives either as a JSON string or a number.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Money {
    #[serde(default)]
    pub units: Option<Value>,
    #[serde(default)]
    pub nanos: Option<i64>,
}

impl Money {
    pub fn amount(&self) -> f64 {
        let units = match &self.units {
            Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        };
        units + self.nanos.unwrap_or(0) as f64 / 1e9
    }
}

/// Sum of all price components, rounded to cents
pub fn toll_cost(prices: &[Money]) -> f64 {
    let total: f64 = prices.iter().map(Money::amount).sum();
    (total * 100.0).round() / 100.0
}

/// Number of navigation instructions mentioning a toll. This is a keyword heuristic tied to
/// the language of the instructions, not an authoritative toll count.
pub fn count_toll_steps<'a, I>(instructions: I, keywords: &[String]) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    instructions
        .into_iter()
        .filter(|text| {
            let text = text.to_lowercase();
            keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str()))
        })
        .count() as u32
}

/// Format a protobuf duration such as "5700s"
pub fn format_duration(duration: &str) -> String {
    let seconds = duration
        .trim()
        .trim_end_matches('s')
        .parse::<f64>()
        .unwrap_or(0.0)
        .max(0.0) as u64;
    let minutes = (seconds + 30) / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{} h {} min", hours, minutes)
    } else {
        format!("{} min", minutes)
    }
}

pub fn format_distance(meters: u64) -> String {
    format!("{:.1} km", meters as f64 / 1000.0)
}

/// Traffic-aware driving route between two free-text locations
pub struct TrafficCapability {
    tool: Tool,
    client: Client,
    config: MapsConfig,
}

impl TrafficCapability {
    pub fn new(config: MapsConfig) -> AgentResult<Self> {
        let tool = Tool::new(
            TRAFFIC_INFO,
            "Gets the current driving route between two places: travel time with traffic, \
             distance, a short summary, and toll cost and count.",
            json!({
                "type": "object",
                "properties": {
                    "origin": {
                        "type": "string",
                        "description": "Starting point, e.g. Curitiba"
                    },
                    "destination": {
                        "type": "string",
                        "description": "End point, e.g. Londrina"
                    }
                },
                "required": ["origin", "destination"]
            }),
            json!({
                "type": "object",
                "properties": {
                    "travelTime": {"type": "string"},
                    "distance": {"type": "string"},
                    "summary": {"type": "string"},
                    "tollCost": {"type": "number"},
                    "tollCount": {"type": "integer"},
                    "routePolyline": {"type": "string"}
                },
                "required": ["travelTime", "distance", "summary", "tollCost", "tollCount"]
            }),
        );
        Ok(Self {
            tool,
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    async fn geocode(&self, api_key: &str, address: &str) -> Result<Option<LatLng>> {
        let url = format!(
            "{}/maps/api/geocode/json",
            self.config.geocode_host.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("address", address), ("key", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("geocoding failed: {}", response.status()));
        }

        let body: GeocodeResponse = response.json().await?;
        if body.status != "OK" {
            tracing::debug!(address, status = %body.status, "geocoding returned no match");
            return Ok(None);
        }
        Ok(body.results.first().map(|result| result.geometry.location))
    }

    async fn compute_route(
        &self,
        api_key: &str,
        origin: LatLng,
        destination: LatLng,
    ) -> Result<Option<Route>> {
        let url = format!(
            "{}/directions/v2:computeRoutes",
            self.config.routes_host.trim_end_matches('/')
        );
        let waypoint = |point: LatLng| {
            json!({
                "location": {
                    "latLng": {"latitude": point.lat, "longitude": point.lng}
                }
            })
        };
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", ROUTES_FIELD_MASK)
            .json(&json!({
                "origin": waypoint(origin),
                "destination": waypoint(destination),
                "travelMode": "DRIVE",
                "routingPreference": "TRAFFIC_AWARE",
                "extraComputations": ["TOLLS"],
                "languageCode": self.config.language_code,
                "units": "METRIC",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("route computation failed: {}", response.status()));
        }

        let body: ComputeRoutesResponse = response.json().await?;
        Ok(body.routes.into_iter().next())
    }

    async fn lookup(&self, api_key: &str, input: &TrafficInput) -> Result<TrafficInfo> {
        let Some(origin) = self.geocode(api_key, &input.origin).await? else {
            return Ok(TrafficInfo::unavailable(format!(
                "Could not find the location \"{}\"",
                input.origin
            )));
        };
        let Some(destination) = self.geocode(api_key, &input.destination).await? else {
            return Ok(TrafficInfo::unavailable(format!(
                "Could not find the location \"{}\"",
                input.destination
            )));
        };

        let Some(route) = self.compute_route(api_key, origin, destination).await? else {
            return Ok(TrafficInfo::unavailable(format!(
                "No route found from {} to {}",
                input.origin, input.destination
            )));
        };

        let instructions: Vec<&str> = route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .filter_map(|step| step.navigation_instruction.as_ref())
            .filter_map(|nav| nav.instructions.as_deref())
            .collect();
        let prices = route
            .travel_advisory
            .as_ref()
            .and_then(|advisory| advisory.toll_info.as_ref())
            .map(|toll| toll.estimated_price.as_slice())
            .unwrap_or_default();

        Ok(TrafficInfo {
            travel_time: route
                .duration
                .as_deref()
                .map(format_duration)
                .unwrap_or_else(|| "N/A".to_string()),
            distance: route
                .distance_meters
                .map(format_distance)
                .unwrap_or_else(|| "N/A".to_string()),
            summary: route
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .map(|d| format!("Route from {} to {} via {}", input.origin, input.destination, d))
                .unwrap_or_else(|| format!("Route from {} to {}", input.origin, input.destination)),
            toll_cost: toll_cost(prices),
            toll_count: count_toll_steps(instructions, &self.config.toll_keywords),
            route_polyline: route
                .polyline
                .and_then(|p| p.encoded_polyline)
                .filter(|p| !p.is_empty()),
        })
    }
}

#[async_trait]
impl Capability for TrafficCapability {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> CapabilityResult {
        let input: TrafficInput = parse_input(TRAFFIC_INFO, arguments)?;

        let info = match self.config.key() {
            None => {
                tracing::warn!("traffic service is not configured");
                TrafficInfo::unavailable("Traffic service is not configured")
            }
            Some(api_key) => match self.lookup(api_key, &input).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        origin = %input.origin,
                        destination = %input.destination,
                        "traffic lookup failed"
                    );
                    TrafficInfo::unavailable(format!(
                        "Traffic data unavailable from {} to {}",
                        input.origin, input.destination
                    ))
                }
            },
        };

        to_output(&info)
    }
}
