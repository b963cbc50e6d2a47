use crate::error::BotError;
use crate::services::ensure_success;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Local calendar date the forecast is for (`YYYY-MM-DD`)
    pub date: String,
    pub condition: &'static str,
    pub temp_min: f64,
    pub temp_max: f64,
    pub rain_chance: u32,
}

impl Forecast {
    pub fn needs_umbrella(&self) -> bool {
        self.rain_chance > 50
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    daily: Option<Daily>,
}

#[derive(Deserialize)]
struct Daily {
    time: Vec<String>,
    weathercode: Vec<Option<i64>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<u32>>,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Today's forecast at the location, in the location's own timezone.
    async fn today(&self, lat: f64, lon: f64) -> Result<Forecast, BotError>;
}

pub struct WeatherService {
    client: reqwest::Client,
}

impl WeatherService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolves a place name to coordinates. `None` when nothing matches.
    pub async fn geocode(&self, name: &str) -> Result<Option<Place>, BotError> {
        let url = Url::parse_with_params(
            "https://geocoding-api.open-meteo.com/v1/search",
            [("name", name), ("count", "1"), ("language", "zh"), ("format", "json")],
        )
        .map_err(|e| BotError::InvalidInput(e.to_string()))?;
        let response = self.client.get(url).send().await?;
        let body: GeocodeResponse = ensure_success("Open-Meteo geocoding", response)?
            .json()
            .await?;
        Ok(body.results.into_iter().next().map(|r| Place {
            name: r.name,
            lat: r.latitude,
            lon: r.longitude,
        }))
    }
}

#[async_trait]
impl ForecastSource for WeatherService {
    async fn today(&self, lat: f64, lon: f64) -> Result<Forecast, BotError> {
        let url = Url::parse_with_params(
            "https://api.open-meteo.com/v1/forecast",
            [
                ("latitude", lat.to_string().as_str()),
                ("longitude", lon.to_string().as_str()),
                (
                    "daily",
                    "weathercode,temperature_2m_max,temperature_2m_min,precipitation_probability_max",
                ),
                ("timezone", "auto"),
            ],
        )
        .map_err(|e| BotError::InvalidInput(e.to_string()))?;
        let response = self.client.get(url).send().await?;
        let body = ensure_success("Open-Meteo", response)?.text().await?;
        parse_forecast(&body)
    }
}

pub fn parse_forecast(json: &str) -> Result<Forecast, BotError> {
    let response: ForecastResponse = serde_json::from_str(json)?;
    let daily = response
        .daily
        .ok_or_else(|| BotError::Upstream("forecast has no daily block".into()))?;

    let missing = || BotError::Upstream("forecast is missing today's values".into());
    let date = daily.time.first().cloned().ok_or_else(missing)?;
    let code = daily.weathercode.first().copied().flatten().ok_or_else(missing)?;
    let temp_max = daily.temperature_2m_max.first().copied().flatten().ok_or_else(missing)?;
    let temp_min = daily.temperature_2m_min.first().copied().flatten().ok_or_else(missing)?;
    let rain_chance = daily
        .precipitation_probability_max
        .first()
        .copied()
        .flatten()
        .unwrap_or(0);

    Ok(Forecast {
        date,
        condition: describe_code(code),
        temp_min,
        temp_max,
        rain_chance,
    })
}

/// WMO weather interpretation code to a short label.
pub fn describe_code(code: i64) -> &'static str {
    match code {
        0 => "☀️ Clear",
        1..=3 => "🌤️ Partly cloudy",
        45 | 48 => "🌫️ Fog",
        51 | 53 | 55 => "🌧️ Drizzle",
        61 | 63 | 65 => "🌧️ Rain",
        80..=82 => "⛈️ Showers",
        c if c >= 95 => "⛈️ Thunderstorm",
        _ => "🌥️ Overcast",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast() {
        let json = r#"{
            "latitude": 25.0,
            "daily": {
                "time": ["2026-10-15", "2026-10-16"],
                "weathercode": [61, 3],
                "temperature_2m_max": [27.4, 28.0],
                "temperature_2m_min": [22.1, 23.0],
                "precipitation_probability_max": [80, 10]
            }
        }"#;
        let forecast = parse_forecast(json).unwrap();
        assert_eq!(forecast.date, "2026-10-15");
        assert_eq!(forecast.condition, "🌧️ Rain");
        assert_eq!(forecast.temp_max, 27.4);
        assert!(forecast.needs_umbrella());
    }

    #[test]
    fn test_missing_daily_is_upstream_error() {
        assert!(matches!(
            parse_forecast(r#"{"error": true}"#),
            Err(BotError::Upstream(_))
        ));
    }

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(0), "☀️ Clear");
        assert_eq!(describe_code(81), "⛈️ Showers");
        assert_eq!(describe_code(99), "⛈️ Thunderstorm");
        assert_eq!(describe_code(71), "🌥️ Overcast");
    }

    #[test]
    fn test_umbrella_threshold() {
        let mut forecast = Forecast {
            date: "2026-10-15".into(),
            condition: "☀️ Clear",
            temp_min: 20.0,
            temp_max: 25.0,
            rain_chance: 50,
        };
        assert!(!forecast.needs_umbrella());
        forecast.rain_chance = 51;
        assert!(forecast.needs_umbrella());
    }
}
