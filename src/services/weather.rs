//! Geocoding and current-conditions lookups against Open-Meteo.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::provider::http::{shared_client, status_to_error};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Measurement system for a weather report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    fn temperature_query(self) -> &'static str {
        match self {
            Self::Imperial => "fahrenheit",
            Self::Metric | Self::Standard => "celsius",
        }
    }

    fn wind_speed_query(self) -> &'static str {
        match self {
            Self::Metric => "kmh",
            Self::Imperial => "mph",
            Self::Standard => "ms",
        }
    }

    pub fn temperature_suffix(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
            Self::Standard => " K",
        }
    }

    pub fn wind_speed_suffix(self) -> &'static str {
        match self {
            Self::Metric => "km/h",
            Self::Imperial => "mph",
            Self::Standard => "m/s",
        }
    }
}

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
}

/// Current conditions, already expressed in the requested units.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub relative_humidity: f64,
    pub wind_speed: f64,
    pub weather_code: u16,
    /// Observation time as reported by the service (local to the location).
    pub time: Option<String>,
}

/// Resolves a place name to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service knows no such place.
    async fn geocode(&self, name: &str) -> Result<Option<GeoLocation>>;
}

/// Fetches current conditions for a coordinate pair.
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64, units: Units) -> Result<CurrentWeather>;
}

/// Open-Meteo client implementing both [`Geocoder`] and [`WeatherService`].
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    geocoding_url: String,
    forecast_url: String,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new(DEFAULT_GEOCODING_URL, DEFAULT_FORECAST_URL)
    }
}

impl OpenMeteoClient {
    pub fn new(geocoding_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        Self {
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        }
    }
}

#[async_trait]
impl Geocoder for OpenMeteoClient {
    async fn geocode(&self, name: &str) -> Result<Option<GeoLocation>> {
        debug!(location = name, "geocoding");
        let resp = shared_client()
            .get(&self.geocoding_url)
            .query(&[
                ("name", name),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(upstream("geocoding", status_to_error(status, &body)));
        }

        let data: GeocodingResponse = resp.json().await?;
        Ok(data.results.unwrap_or_default().into_iter().next())
    }
}

#[async_trait]
impl WeatherService for OpenMeteoClient {
    async fn current(&self, latitude: f64, longitude: f64, units: Units) -> Result<CurrentWeather> {
        debug!(latitude, longitude, %units, "fetching current weather");
        let resp = shared_client()
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,windspeed_10m,weather_code".to_string(),
                ),
                ("temperature_unit", units.temperature_query().to_string()),
                ("wind_speed_unit", units.wind_speed_query().to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(upstream("weather", status_to_error(status, &body)));
        }

        let data: ForecastResponse = resp.json().await?;
        let current = data
            .current
            .ok_or_else(|| ParleyError::upstream("weather", "response has no current conditions"))?;

        let temperature = match units {
            Units::Standard => current.temperature_2m + 273.15,
            _ => current.temperature_2m,
        };

        Ok(CurrentWeather {
            temperature,
            relative_humidity: current.relative_humidity_2m,
            wind_speed: current.windspeed_10m,
            weather_code: current.weather_code,
            time: current.time,
        })
    }
}

fn upstream(service: &str, err: ParleyError) -> ParleyError {
    ParleyError::upstream(service, err.to_string())
}

/// Human-readable text for a WMO weather interpretation code.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown conditions",
    }
}

// Open-Meteo response types (internal)

#[derive(Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeoLocation>>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: Option<ForecastCurrent>,
}

#[derive(Deserialize)]
struct ForecastCurrent {
    time: Option<String>,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    windspeed_10m: f64,
    weather_code: u16,
}
