//! Built-in chat tools.
//!
//! Provides `getWeather`, `generateImage` and `askForConfirmation`. Each tool
//! is constructed via [`AgentTool`] and returned as `Arc<dyn Tool>`; the
//! network collaborators they need are passed in explicitly.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::error::{ParleyError, Result};
use crate::services::image::ImageGenerator;
use crate::services::weather::{describe_weather_code, Geocoder, Units, WeatherService};
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::ToolParameters;

pub const WEATHER_TOOL: &str = "getWeather";
pub const IMAGE_TOOL: &str = "generateImage";
pub const CONFIRMATION_TOOL: &str = "askForConfirmation";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeatherArgs {
    location: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    location_name: Option<String>,
    #[serde(default)]
    units: Units,
}

/// Create the `getWeather` tool: current conditions for a place name or a
/// coordinate pair.
pub fn weather_tool(
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherService>,
) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        WEATHER_TOOL,
        "Get current weather information for a city or a latitude/longitude pair. Returns \
         temperature, conditions, humidity, and wind speed that you can use to provide a \
         natural language weather report to the user.",
        ToolParameters::object()
            .string("location", "The city or location to get weather for", false)
            .number_range("lat", "Latitude coordinate (-90 to 90)", -90.0, 90.0, false)
            .number_range("lon", "Longitude coordinate (-180 to 180)", -180.0, 180.0, false)
            .string(
                "locationName",
                "Optional display name when using coordinates",
                false,
            )
            .string_enum(
                "units",
                "Units of measurement",
                &["metric", "imperial", "standard"],
                Some("metric"),
                false,
            )
            .any_of_required(&[&["location"], &["lat", "lon"]])
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let geocoder = geocoder.clone();
            let weather = weather.clone();
            async move {
                let args: WeatherArgs = args.deserialize()?;
                let (display_name, lat, lon) = match (args.lat, args.lon) {
                    (Some(lat), Some(lon)) => {
                        let name = args
                            .location_name
                            .or(args.location)
                            .unwrap_or_else(|| format!("{lat:.2}, {lon:.2}"));
                        (name, lat, lon)
                    }
                    _ => {
                        let query = args.location.ok_or_else(|| {
                            ParleyError::tool(WEATHER_TOOL, "a location or coordinates are required")
                        })?;
                        let place = geocoder
                            .geocode(&query)
                            .await
                            .map_err(|e| weather_failure(&query, e))?
                            .ok_or_else(|| {
                                ParleyError::tool(
                                    WEATHER_TOOL,
                                    format!("Failed to get weather for {query}: Location \"{query}\" not found"),
                                )
                            })?;
                        (place.name, place.latitude, place.longitude)
                    }
                };

                let current = weather
                    .current(lat, lon, args.units)
                    .await
                    .map_err(|e| weather_failure(&display_name, e))?;

                let last_updated = current
                    .time
                    .clone()
                    .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

                Ok(json!({
                    "location": display_name,
                    "temperature": format!(
                        "{}{}",
                        current.temperature.round() as i64,
                        args.units.temperature_suffix()
                    ),
                    "conditions": describe_weather_code(current.weather_code),
                    "humidity": format!("{}%", current.relative_humidity.round() as i64),
                    "windSpeed": format!(
                        "{} {}",
                        current.wind_speed.round() as i64,
                        args.units.wind_speed_suffix()
                    ),
                    "lastUpdated": last_updated,
                }))
            }
        },
    ))
}

fn weather_failure(location: &str, err: ParleyError) -> ParleyError {
    ParleyError::tool(
        WEATHER_TOOL,
        format!("Failed to get weather for {location}: {err}"),
    )
}

/// Create the `generateImage` tool.
pub fn generate_image_tool(generator: Arc<dyn ImageGenerator>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        IMAGE_TOOL,
        "Generate an image based on a text description",
        ToolParameters::object()
            .string("prompt", "The text description of the image to generate", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let generator = generator.clone();
            async move {
                let prompt = args.get_str("prompt")?.to_string();
                let image = generator
                    .generate(&prompt)
                    .await
                    .map_err(|e| ParleyError::tool(IMAGE_TOOL, format!("Failed to generate image: {e}")))?;
                Ok(json!({
                    "prompt": prompt,
                    "mediaType": image.media_type,
                    "url": image.display_url(),
                }))
            }
        },
    ))
}

/// Create the `askForConfirmation` tool. It has no executor: its result is
/// the user's approval decision.
pub fn confirmation_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::approval_only(
        CONFIRMATION_TOOL,
        "Ask the user for confirmation before proceeding.",
        ToolParameters::object()
            .string("message", "Prompt shown to the user", true)
            .build(),
    ))
}

/// Registry holding every built-in tool.
pub fn default_registry(
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherService>,
    images: Arc<dyn ImageGenerator>,
) -> Result<ToolRegistry> {
    Ok(ToolRegistry::builder()
        .with(weather_tool(geocoder, weather))?
        .with(generate_image_tool(images))?
        .with(confirmation_tool())?
        .build())
}
