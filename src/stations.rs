//! Live station feed client.
//!
//! Proxies the WAQI feed for a fixed set of Vietnamese stations and
//! maps each feed response onto the category scale served by the
//! predictors. Stations that fail to answer are dropped from the
//! list; a single-station lookup surfaces the failure instead.

use crate::aqi::AqiCategory;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const FEED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct Station {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

/// Major Vietnamese cities with WAQI station ids.
pub const VIETNAM_STATIONS: &[Station] = &[
    Station { id: "hanoi", name: "Hanoi", lat: 21.0285, lng: 105.8542 },
    Station { id: "hochiminh", name: "Ho Chi Minh", lat: 10.8231, lng: 106.6297 },
    Station { id: "danang", name: "Da Nang", lat: 16.0544, lng: 108.2022 },
    Station { id: "cantho", name: "Can Tho", lat: 10.0452, lng: 105.7469 },
    Station { id: "haiphong", name: "Hai Phong", lat: 20.8449, lng: 106.6881 },
    Station { id: "nhatrang", name: "Nha Trang", lat: 12.2388, lng: 109.1967 },
    Station { id: "dalat", name: "Da Lat", lat: 11.9404, lng: 108.4583 },
    Station { id: "vungtau", name: "Vung Tau", lat: 10.3459, lng: 107.0843 },
];

pub fn station_by_id(id: &str) -> Option<&'static Station> {
    VIETNAM_STATIONS.iter().find(|s| s.id == id)
}

// ============================================================================
// Feed wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    status: String,
    data: Option<FeedData>,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    aqi: Option<f64>,
    dominentpol: Option<String>,
    #[serde(default)]
    iaqi: Iaqi,
    time: Option<FeedTime>,
}

#[derive(Debug, Default, Deserialize)]
struct Iaqi {
    pm25: Option<IaqiValue>,
    pm10: Option<IaqiValue>,
    o3: Option<IaqiValue>,
    no2: Option<IaqiValue>,
    so2: Option<IaqiValue>,
    co: Option<IaqiValue>,
    t: Option<IaqiValue>,
    h: Option<IaqiValue>,
    p: Option<IaqiValue>,
    w: Option<IaqiValue>,
}

#[derive(Debug, Deserialize)]
struct IaqiValue {
    v: f64,
}

#[derive(Debug, Deserialize)]
struct FeedTime {
    s: Option<String>,
}

// ============================================================================
// Client-facing reading
// ============================================================================

/// One station's current reading, as returned by the proxy endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StationReading {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub aqi: f64,
    pub category: String,
    pub level: u8,
    pub color: String,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind: Option<f64>,
    pub dominentpol: Option<String>,
    pub time: Option<String>,
}

pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl FeedClient {
    pub fn new(config: &Config) -> FeedClient {
        let http = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .unwrap_or_default();
        FeedClient {
            http,
            base_url: config.waqi_base_url.trim_end_matches('/').to_string(),
            token: config.waqi_token.clone(),
        }
    }

    /// Fetch every built-in station. Stations whose fetch fails or
    /// whose feed reports an error are dropped, not fatal.
    pub async fn all_stations(&self) -> Vec<StationReading> {
        let mut readings = Vec::with_capacity(VIETNAM_STATIONS.len());
        for station in VIETNAM_STATIONS {
            match self.fetch(station).await {
                Ok(reading) => readings.push(reading),
                Err(err) => {
                    tracing::warn!(station = station.id, "station fetch failed: {}", err);
                }
            }
        }
        readings
    }

    /// Fetch one station; upstream failures become errors here so the
    /// handler can answer 502.
    pub async fn one_station(&self, id: &str) -> AppResult<StationReading> {
        let station = station_by_id(id)
            .ok_or_else(|| AppError::NotFound(format!("Station \"{}\" not found", id)))?;
        self.fetch(station).await
    }

    async fn fetch(&self, station: &Station) -> AppResult<StationReading> {
        let url = format!("{}/feed/{}/?token={}", self.base_url, station.id, self.token);
        let envelope: FeedEnvelope = self.http.get(&url).send().await?.json().await?;

        if envelope.status != "ok" {
            return Err(AppError::UpstreamError(format!(
                "feed status \"{}\" for station {}",
                envelope.status, station.id
            )));
        }
        let data = envelope.data.ok_or_else(|| {
            AppError::UpstreamError(format!("feed returned no data for station {}", station.id))
        })?;

        let aqi = data.aqi.unwrap_or(0.0);
        let category = AqiCategory::from_aqi(aqi);
        Ok(StationReading {
            id: station.id.to_string(),
            name: station.name.to_string(),
            lat: station.lat,
            lng: station.lng,
            aqi,
            category: category.label().to_string(),
            level: category.level(),
            color: category.color().to_string(),
            pm25: data.iaqi.pm25.map(|v| v.v),
            pm10: data.iaqi.pm10.map(|v| v.v),
            o3: data.iaqi.o3.map(|v| v.v),
            no2: data.iaqi.no2.map(|v| v.v),
            so2: data.iaqi.so2.map(|v| v.v),
            co: data.iaqi.co.map(|v| v.v),
            temperature: data.iaqi.t.map(|v| v.v),
            humidity: data.iaqi.h.map(|v| v.v),
            pressure: data.iaqi.p.map(|v| v.v),
            wind: data.iaqi.w.map(|v| v.v),
            dominentpol: data.dominentpol,
            time: data.time.and_then(|t| t.s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> FeedClient {
        FeedClient::new(&Config {
            port: 0,
            models_dir: String::new(),
            default_model_path: None,
            waqi_base_url: server.base_url(),
            waqi_token: "test-token".into(),
            environment: "test".into(),
        })
    }

    #[tokio::test]
    async fn maps_feed_to_reading() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/feed/hanoi/")
                .query_param("token", "test-token");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "status": "ok",
                    "data": {
                        "aqi": 165,
                        "dominentpol": "pm25",
                        "iaqi": {
                            "pm25": {"v": 165.0},
                            "t": {"v": 28.5},
                            "h": {"v": 70.0}
                        },
                        "time": {"s": "2026-08-29 10:00:00"}
                    }
                }));
        });

        let reading = client_for(&server).one_station("hanoi").await.unwrap();
        mock.assert();

        assert_eq!(reading.name, "Hanoi");
        assert_eq!(reading.aqi, 165.0);
        assert_eq!(reading.category, "Unhealthy");
        assert_eq!(reading.level, 4);
        assert_eq!(reading.pm25, Some(165.0));
        assert_eq!(reading.dominentpol.as_deref(), Some("pm25"));
        assert_eq!(reading.pressure, None);
    }

    #[tokio::test]
    async fn feed_error_status_is_upstream_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/feed/danang/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"status": "error", "data": null}));
        });

        let result = client_for(&server).one_station("danang").await;
        assert!(matches!(result, Err(AppError::UpstreamError(_))));
    }

    #[tokio::test]
    async fn unknown_station_id_is_not_found() {
        let server = MockServer::start();
        let result = client_for(&server).one_station("atlantis").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_stations_drop_from_list() {
        let server = MockServer::start();
        // Only Hanoi answers; the other seven hit unmatched 404s.
        server.mock(|when, then| {
            when.method(GET).path("/feed/hanoi/");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "status": "ok",
                    "data": {"aqi": 42, "iaqi": {}}
                }));
        });

        let readings = client_for(&server).all_stations().await;
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, "hanoi");
        assert_eq!(readings[0].category, "Good");
    }
}
