//! Open-Meteo forecast requests and the processed report cached on disk.

use camino::Utf8Path;
use time::OffsetDateTime;

use crate::config::Units;
use crate::config::WeatherConfig;

pub const DEFAULT_API_URL: &str = "https://api.open-meteo.com/v1/forecast";

const DAILY_DAYS: usize = 5;
const HOURLY_HOURS: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Failed to fetch the forecast")]
    Fetch(#[source] reqwest::Error),
}

/// Raw forecast response, only the fields we ask for.
#[derive(Debug, serde::Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub current: CurrentBlock,
    #[serde(default)]
    pub daily: DailyBlock,
    #[serde(default)]
    pub hourly: HourlyBlock,
}

#[derive(Debug, serde::Deserialize)]
pub struct CurrentBlock {
    pub time: String,
    pub temperature_2m: Option<f64>,
    pub weather_code: Option<u16>,
    pub apparent_temperature: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub uv_index: Option<f64>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DailyBlock {
    pub time: Vec<String>,
    pub weather_code: Vec<Option<u16>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub sunrise: Vec<Option<String>>,
    pub sunset: Vec<Option<String>>,
    pub uv_index_max: Vec<Option<f64>>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct HourlyBlock {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub weather_code: Vec<Option<u16>>,
}

/// What the dashboard shows, also the on-disk cache format.
///
/// Times are local to the forecast location, as `YYYY-MM-DDTHH:MM` strings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct WeatherReport {
    #[serde(with = "time::serde::timestamp")]
    pub fetched_at: OffsetDateTime,
    pub utc_offset_seconds: i32,
    pub current: Current,
    pub daily: Vec<Day>,
    pub hourly: Vec<Hour>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Current {
    pub time: String,
    pub temperature: i32,
    pub weather_code: u16,
    pub feels_like: i32,
    pub wind_speed: i32,
    pub humidity: i32,
    pub uv_index: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Day {
    pub date: String,
    pub weather_code: u16,
    pub temp_max: i32,
    pub temp_min: i32,
    pub sunrise: String,
    pub sunset: String,
    pub uv_index: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Hour {
    pub time: String,
    pub weather_code: u16,
    pub temperature: i32,
}

impl WeatherReport {
    pub fn is_fresh(&self, now: OffsetDateTime, max_age: std::time::Duration) -> bool {
        let age = now - self.fetched_at;
        !age.is_negative() && age < max_age
    }
}

pub fn default_api_url() -> url::Url {
    url::Url::parse(DEFAULT_API_URL).expect("default forecast URL parses")
}

pub fn request_url(config: &WeatherConfig) -> url::Url {
    let mut url = config.api_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("latitude", &config.latitude.to_string())
            .append_pair("longitude", &config.longitude.to_string())
            .append_pair(
                "current",
                "temperature_2m,weather_code,apparent_temperature,wind_speed_10m,relative_humidity_2m,uv_index",
            )
            .append_pair(
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min,sunrise,sunset,uv_index_max",
            )
            .append_pair("hourly", "temperature_2m,weather_code")
            .append_pair("forecast_days", &DAILY_DAYS.to_string())
            .append_pair("timezone", "auto");

        if config.units == Units::Imperial {
            query
                .append_pair("temperature_unit", "fahrenheit")
                .append_pair("wind_speed_unit", "mph");
        }
    }
    url
}

pub async fn fetch(
    client: &reqwest::Client,
    config: &WeatherConfig,
    now: OffsetDateTime,
) -> Result<WeatherReport, WeatherError> {
    let url = request_url(config);
    tracing::info!(latitude = config.latitude, longitude = config.longitude, "Fetching forecast");

    let forecast: Forecast = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(WeatherError::Fetch)?
        .json()
        .await
        .map_err(WeatherError::Fetch)?;

    Ok(process(forecast, now))
}

fn round(value: Option<f64>) -> i32 {
    value.map_or(0, |v| v.round() as i32)
}

fn nth<T: Clone>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).cloned().flatten()
}

/// Reduce the raw response to the current conditions, five days and the next twelve hours.
pub fn process(forecast: Forecast, fetched_at: OffsetDateTime) -> WeatherReport {
    let Forecast {
        utc_offset_seconds,
        current,
        daily,
        hourly,
    } = forecast;

    let days = daily
        .time
        .iter()
        .take(DAILY_DAYS)
        .enumerate()
        .map(|(i, date)| Day {
            date: date.clone(),
            weather_code: nth(&daily.weather_code, i).unwrap_or_default(),
            temp_max: round(nth(&daily.temperature_2m_max, i)),
            temp_min: round(nth(&daily.temperature_2m_min, i)),
            sunrise: nth(&daily.sunrise, i).unwrap_or_default(),
            sunset: nth(&daily.sunset, i).unwrap_or_default(),
            uv_index: round(nth(&daily.uv_index_max, i)),
        })
        .collect();

    // Hourly series start at midnight; begin at the hour containing the current time.
    let current_hour = current.time.get(..13).unwrap_or(&current.time);
    let start = hourly
        .time
        .iter()
        .position(|t| t.get(..13).unwrap_or(t) >= current_hour)
        .unwrap_or(0);

    let hours = hourly
        .time
        .iter()
        .enumerate()
        .skip(start)
        .take(HOURLY_HOURS)
        .map(|(i, time)| Hour {
            time: time.clone(),
            weather_code: nth(&hourly.weather_code, i).unwrap_or_default(),
            temperature: round(nth(&hourly.temperature_2m, i)),
        })
        .collect();

    WeatherReport {
        fetched_at,
        utc_offset_seconds,
        current: Current {
            temperature: round(current.temperature_2m),
            weather_code: current.weather_code.unwrap_or_default(),
            feels_like: round(current.apparent_temperature),
            wind_speed: round(current.wind_speed_10m),
            humidity: round(current.relative_humidity_2m),
            uv_index: round(current.uv_index),
            time: current.time,
        },
        daily: days,
        hourly: hours,
    }
}

pub async fn load_cache(path: &Utf8Path) -> Option<WeatherReport> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            tracing::warn!(%path, %error, "Failed to read weather cache");
            return None;
        }
    };

    match serde_json::from_slice(&data) {
        Ok(report) => Some(report),
        Err(error) => {
            tracing::warn!(%path, %error, "Ignoring unreadable weather cache");
            None
        }
    }
}

pub async fn save_cache(path: &Utf8Path, report: &WeatherReport) {
    let result = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(report).map_err(std::io::Error::other)?;
        tokio::fs::write(path, json).await
    };

    if let Err(error) = result.await {
        tracing::warn!(%path, %error, "Failed to write weather cache");
    }
}

/// Human readable description of a WMO weather interpretation code.
pub fn describe(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
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
        _ => "Unknown",
    }
}

/// `51.51°N, 0.13°W` style label for a position.
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    let lat_dir = if latitude >= 0.0 { 'N' } else { 'S' };
    let lon_dir = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.2}°{lat_dir}, {:.2}°{lon_dir}",
        latitude.abs(),
        longitude.abs()
    )
}
