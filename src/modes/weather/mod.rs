//! Current conditions and forecast from Open-Meteo.

pub mod api;
mod dashboard;

use camino::Utf8PathBuf;
use time::OffsetDateTime;

pub use self::api::default_api_url;
pub use self::api::WeatherError;
use self::api::WeatherReport;
use super::DisplayTimer;
use super::Mode;
use super::ModeError;
use crate::config::WeatherConfig;
use crate::display::Display;

pub struct Weather {
    config: WeatherConfig,
    cache_path: Utf8PathBuf,
    client: reqwest::Client,
    timer: DisplayTimer,
}

impl Weather {
    pub fn new(config: WeatherConfig, cache_path: Utf8PathBuf, client: reqwest::Client) -> Self {
        Self {
            timer: DisplayTimer::new(config.display_time),
            config,
            cache_path,
            client,
        }
    }

    fn location(&self) -> String {
        match self.config.location_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => api::format_coordinates(self.config.latitude, self.config.longitude),
        }
    }

    /// A fresh cached report, else a new one from the API, else a stale cached one.
    async fn report(&self) -> Result<WeatherReport, WeatherError> {
        let now = OffsetDateTime::now_utc();
        let cached = api::load_cache(&self.cache_path).await;

        if let Some(report) = cached.as_ref() {
            if report.is_fresh(now, self.config.cache_duration) {
                tracing::debug!(path = %self.cache_path, "Using cached forecast");
                return Ok(report.clone());
            }
        }

        match api::fetch(&self.client, &self.config, now).await {
            Ok(report) => {
                api::save_cache(&self.cache_path, &report).await;
                Ok(report)
            }
            Err(error) => match cached {
                Some(report) => {
                    tracing::warn!(?error, fetched_at = %report.fetched_at, "Forecast fetch failed, using stale cache");
                    Ok(report)
                }
                None => Err(error),
            },
        }
    }
}

impl Mode for Weather {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        if !self.timer.is_due() {
            return Ok(());
        }
        self.timer.mark();

        let report = self.report().await?;
        let (width, height) = display.resolution();
        let frame = dashboard::render(&report, &self.location(), self.config.units, width, height);

        crate::display::present(display, frame.image(), Some(self.config.saturation))?;
        Ok(())
    }

    fn on_enter(&mut self) {
        self.timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::api::testing::FORECAST;
    use super::*;
    use crate::display::testing::RecordingDisplay;

    /// Nothing listens on the discard port, so any fetch fails quickly.
    fn unreachable_config() -> WeatherConfig {
        WeatherConfig {
            api_url: url::Url::parse("http://127.0.0.1:9/v1/forecast").unwrap(),
            ..WeatherConfig::default()
        }
    }

    async fn write_cache(path: &camino::Utf8Path, fetched_at: OffsetDateTime) {
        let report = api::process(serde_json::from_str(FORECAST).unwrap(), fetched_at);
        api::save_cache(path, &report).await;
    }

    fn cache_path(tmp: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().join("weather_data.json")).unwrap()
    }

    #[test]
    fn test_location_label() {
        let mut weather = Weather::new(WeatherConfig::default(), "unused".into(), reqwest::Client::new());
        assert_eq!(weather.location(), "51.51°N, 0.13°W");

        weather.config.location_name = Some("London".to_string());
        assert_eq!(weather.location(), "London");
    }

    #[tokio::test]
    async fn test_fresh_cache_needs_no_network() {
        let tmp = tempfile::tempdir().unwrap();
        let path = cache_path(&tmp);
        write_cache(&path, OffsetDateTime::now_utc()).await;

        let mut weather = Weather::new(unreachable_config(), path, reqwest::Client::new());
        let mut display = RecordingDisplay::new(800, 480);
        weather.update(&mut display).await.unwrap();

        assert_eq!(display.shown.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_used_when_fetch_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = cache_path(&tmp);
        let old = OffsetDateTime::now_utc() - time::Duration::days(2);
        write_cache(&path, old).await;

        let mut weather = Weather::new(unreachable_config(), path, reqwest::Client::new());
        let report = weather.report().await.unwrap();
        assert_eq!(report.fetched_at.unix_timestamp(), old.unix_timestamp());

        let mut display = RecordingDisplay::new(800, 480);
        weather.update(&mut display).await.unwrap();
        assert_eq!(display.shown.len(), 1);
    }

    #[tokio::test]
    async fn test_no_data_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = WeatherConfig {
            display_time: Duration::from_secs(60),
            ..unreachable_config()
        };
        let mut weather = Weather::new(config, cache_path(&tmp), reqwest::Client::new());
        let mut display = RecordingDisplay::new(800, 480);

        let result = weather.update(&mut display).await;
        assert!(matches!(result, Err(ModeError::Weather(_))), "{result:?}");
        assert!(display.shown.is_empty());
    }
}
