use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_input, to_output, Capability};
use crate::models::tool::{CapabilityResult, Tool};

pub const WEATHER_INFO: &str = "weatherInfo";

// Static readings for the cities the app covers. Real-time accuracy is not a goal here.
const KNOWN_WEATHER: &[(&str, &str, &str)] = &[
    ("curitiba", "18°C", "Nublado"),
    ("londrina", "27°C", "Ensolarado"),
    ("maringá", "28°C", "Ensolarado"),
    ("ponta grossa", "19°C", "Chuvoso"),
    ("foz do iguaçu", "30°C", "Parcialmente nublado"),
    ("florianópolis", "24°C", "Ensolarado"),
    ("são paulo", "22°C", "Parcialmente nublado"),
    ("rio de janeiro", "31°C", "Ensolarado"),
];

#[derive(Debug, Deserialize)]
struct WeatherInput {
    location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherInfo {
    pub temperature: String,
    pub condition: String,
    pub summary: String,
}

impl WeatherInfo {
    pub fn lookup(location: &str) -> Self {
        let key = location.trim().to_lowercase();
        match KNOWN_WEATHER.iter().find(|(city, _, _)| *city == key) {
            Some((_, temperature, condition)) => Self {
                temperature: temperature.to_string(),
                condition: condition.to_string(),
                summary: format!("{}: {}, {}", location.trim(), condition, temperature),
            },
            None => Self {
                temperature: "N/A".to_string(),
                condition: "unknown".to_string(),
                summary: format!("No weather data available for {}", location.trim()),
            },
        }
    }
}

pub struct WeatherCapability {
    tool: Tool,
}

impl Default for WeatherCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherCapability {
    pub fn new() -> Self {
        let tool = Tool::new(
            WEATHER_INFO,
            "Gets the current weather (temperature and condition) for a city.",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City name, e.g. Curitiba"
                    }
                },
                "required": ["location"]
            }),
            json!({
                "type": "object",
                "properties": {
                    "temperature": {"type": "string"},
                    "condition": {"type": "string"},
                    "summary": {"type": "string"}
                },
                "required": ["temperature", "condition", "summary"]
            }),
        );
        Self { tool }
    }
}

#[async_trait]
impl Capability for WeatherCapability {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> CapabilityResult {
        let input: WeatherInput = parse_input(WEATHER_INFO, arguments)?;
        to_output(&WeatherInfo::lookup(&input.location))
    }
}
