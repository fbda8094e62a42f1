// SPDX-License-Identifier: MPL-2.0

//! # Weather Data Sources
//!
//! The sync engine fetches conditions through the [`WeatherSource`] trait.
//! Two implementations live here:
//!
//! - [`OpenWeatherMapSource`]: the real provider, queried over HTTPS
//! - [`ScriptedSource`]: canned answers for tests and offline runs
//!
//! ## API Integration
//!
//! Uses the OpenWeatherMap current weather endpoint:
//! `https://api.openweathermap.org/data/2.5/weather?q={city}&units={units}&appid={key}&lang={lang}`
//!
//! ## Error Mapping
//!
//! | Provider answer          | Error                          |
//! |--------------------------|--------------------------------|
//! | HTTP 404                 | [`DataSourceError::NotFound`]  |
//! | HTTP 401                 | [`DataSourceError::Unauthorized`] |
//! | HTTP 429                 | [`DataSourceError::RateLimited`] |
//! | other non-2xx            | [`DataSourceError::Unknown`]   |
//! | connect failure, timeout | [`DataSourceError::Transport`] |
//! | malformed body           | [`DataSourceError::Unknown`]   |

use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::DataSourceError;

use super::model::{Units, WeatherSnapshot};

/// What a successful fetch returns.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub snapshot: WeatherSnapshot,
    /// Provider's canonical spelling of the location, if it sent one
    pub location: Option<String>,
}

/// Source of current weather for a city.
#[trait_variant::make(WeatherSource: Send)]
pub trait LocalWeatherSource {
    /// Fetch current conditions for `city` in `units`.
    async fn fetch_weather(&self, city: &str, units: Units) -> Result<WeatherReport, DataSourceError>;
}

// ============================================================================
// OpenWeatherMap Response Structures
// ============================================================================

/// Response from the current weather endpoint.
#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    name: Option<String>,
    main: OwmMain,
    wind: OwmWind,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: String,
}

impl OwmResponse {
    fn into_report(self) -> WeatherReport {
        let (description, icon) = self
            .weather
            .into_iter()
            .next()
            .map(|c| (c.description, c.icon))
            .unwrap_or_else(|| (String::from("N/A"), String::from("01d")));

        WeatherReport {
            snapshot: WeatherSnapshot {
                temperature: self.main.temp,
                feels_like: self.main.feels_like,
                humidity: self.main.humidity,
                pressure: self.main.pressure,
                wind_speed: self.wind.speed,
                description,
                icon,
            },
            location: self.name.filter(|n| !n.is_empty()),
        }
    }
}

/// Map a non-success HTTP status to a domain error.
fn classify_status(status: StatusCode) -> DataSourceError {
    match status {
        StatusCode::NOT_FOUND => DataSourceError::NotFound,
        StatusCode::UNAUTHORIZED => DataSourceError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => DataSourceError::RateLimited,
        other => DataSourceError::Unknown(other.as_u16().to_string()),
    }
}

// ============================================================================
// OpenWeatherMap Source
// ============================================================================

/// Fetches current conditions from OpenWeatherMap.
///
/// The client carries a request timeout so a stalled connection shows up as
/// a transport error on the widget instead of a spinner that never stops.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    language: String,
}

impl OpenWeatherMapSource {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            language: language.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.language.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn request_url(&self, city: &str, units: Units) -> String {
        format!(
            "{}?q={}&units={}&appid={}&lang={}",
            self.api_url,
            urlencoding::encode(city),
            units.as_str(),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.language),
        )
    }
}

impl WeatherSource for OpenWeatherMapSource {
    async fn fetch_weather(&self, city: &str, units: Units) -> Result<WeatherReport, DataSourceError> {
        log::debug!("Requesting weather for {} ({})", city, units);

        let response = self
            .client
            .get(self.request_url(city, units))
            .send()
            .await
            .map_err(|e| DataSourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Weather API answered {} for {}", status, city);
            return Err(classify_status(status));
        }

        let body: OwmResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DataSourceError::Transport(e.to_string())
            } else {
                DataSourceError::Unknown(format!("unexpected response: {e}"))
            }
        })?;

        let report = body.into_report();
        log::info!(
            "Weather for {}: {}{}, {}",
            city,
            report.snapshot.temperature,
            units.temperature_symbol(),
            report.snapshot.description
        );
        Ok(report)
    }
}

// ============================================================================
// Scripted Source
// ============================================================================

/// Data source answering from a script of queued results per city.
///
/// Unscripted cities answer [`DataSourceError::NotFound`]. A held source
/// blocks every fetch until [`release`](Self::release) hands out a permit,
/// which lets a caller interleave other operations with an in-flight fetch.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<String, VecDeque<Result<WeatherReport, DataSourceError>>>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose fetches wait for [`release`](Self::release).
    pub fn held() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Queue `result` as the next answer for `city`.
    pub fn respond(&self, city: &str, result: Result<WeatherReport, DataSourceError>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(city.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Let `count` waiting (or future) fetches proceed.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Number of fetches started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WeatherSource for ScriptedSource {
    async fn fetch_weather(&self, city: &str, _units: Units) -> Result<WeatherReport, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(DataSourceError::Transport("source closed".into())),
            }
        }

        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(city)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(DataSourceError::NotFound))
    }
}

/// Build a report, mostly for scripting a [`ScriptedSource`].
pub fn sample_report(location: &str, temperature: f64) -> WeatherReport {
    WeatherReport {
        snapshot: WeatherSnapshot {
            temperature,
            feels_like: temperature - 1.5,
            humidity: 60.0,
            pressure: 1013.0,
            wind_speed: 3.2,
            description: String::from("scattered clouds"),
            icon: String::from("03d"),
        },
        location: Some(location.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), DataSourceError::NotFound);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), DataSourceError::Unauthorized);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            DataSourceError::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            DataSourceError::Unknown("502".into())
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "name": "London",
            "main": {"temp": 11.3, "feels_like": 10.1, "humidity": 81, "pressure": 1009},
            "wind": {"speed": 4.6},
            "weather": [{"description": "light rain", "icon": "10d"}]
        }"#;
        let report = serde_json::from_str::<OwmResponse>(body).unwrap().into_report();

        assert_eq!(report.location.as_deref(), Some("London"));
        assert_eq!(report.snapshot.humidity, 81.0);
        assert_eq!(report.snapshot.wind_speed, 4.6);
        assert_eq!(report.snapshot.icon, "10d");
    }

    #[test]
    fn test_response_without_conditions_uses_placeholder() {
        let body = r#"{"main": {"temp": 1, "feels_like": 0, "humidity": 50, "pressure": 1000},
                       "wind": {"speed": 0}}"#;
        let report = serde_json::from_str::<OwmResponse>(body).unwrap().into_report();

        assert_eq!(report.snapshot.description, "N/A");
        assert!(report.location.is_none());
    }

    #[test]
    fn test_request_url_encodes_city() {
        let source = OpenWeatherMapSource::new(
            "https://example.test/weather",
            "k3y",
            "en",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            source.request_url("New York", Units::Imperial),
            "https://example.test/weather?q=New%20York&units=imperial&appid=k3y&lang=en"
        );
    }

    #[tokio::test]
    async fn test_scripted_source_answers_in_order() {
        let source = ScriptedSource::new();
        source
            .respond("Oslo", Ok(sample_report("Oslo", 3.0)))
            .respond("Oslo", Err(DataSourceError::RateLimited));

        let first = WeatherSource::fetch_weather(&source, "Oslo", Units::Metric).await.unwrap();
        assert_eq!(first.snapshot.temperature, 3.0);
        assert_eq!(
            WeatherSource::fetch_weather(&source, "Oslo", Units::Metric).await,
            Err(DataSourceError::RateLimited)
        );
        assert_eq!(
            WeatherSource::fetch_weather(&source, "Oslo", Units::Metric).await,
            Err(DataSourceError::NotFound)
        );
        assert_eq!(source.calls(), 3);
    }
}
