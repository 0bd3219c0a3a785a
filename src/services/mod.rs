//! Outbound collaborators: geocoding, weather, image generation, speech.
//!
//! Each is a trait at the seam plus one HTTP client. None retry.

pub mod image;
pub mod speech;
pub mod weather;

pub use image::{GatewayImageClient, GeneratedImage, ImageGenerator};
pub use speech::{truncate_speech_input, GroqSpeechClient, SpeechAudio, SpeechSynthesizer};
pub use weather::{
    describe_weather_code, CurrentWeather, GeoLocation, Geocoder, OpenMeteoClient, Units,
    WeatherService,
};
