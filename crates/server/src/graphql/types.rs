//! GraphQL output types.
//!
//! Upstream payloads stay opaque everywhere else; these conversions are the
//! only place that reads provider fields (`name`, `main.temp`,
//! `weather[0].description`, `list[].dt_txt`).

use async_graphql::SimpleObject;
use serde_json::Value;

use nimbus_core::{CityName, WeatherPayload};

use crate::models::Location;

/// A saved favorite city.
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
#[graphql(name = "Location")]
pub struct LocationObject {
    pub id: i32,
    pub city: String,
    pub user_id: i32,
}

impl From<Location> for LocationObject {
    fn from(location: Location) -> Self {
        Self {
            id: location.id.as_i32(),
            city: location.city.into_inner(),
            user_id: location.user_id.as_i32(),
        }
    }
}

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct Weather {
    pub city: String,
    pub temperature: Option<f64>,
    pub description: Option<String>,
}

impl Weather {
    /// Read the summary fields out of a current-weather payload.
    ///
    /// Falls back to the requested city when the payload carries no `name`.
    #[must_use]
    pub fn from_payload(requested: &CityName, payload: &WeatherPayload) -> Self {
        let json = payload.as_json();
        Self {
            city: json
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| requested.to_string(), String::from),
            temperature: temperature(json),
            description: description(json),
        }
    }
}

/// One step of a forecast.
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct ForecastItem {
    pub date: Option<String>,
    pub temperature: Option<f64>,
    pub description: Option<String>,
}

impl ForecastItem {
    /// Read every entry of a forecast payload's `list`.
    ///
    /// A payload without a `list` array yields no items.
    #[must_use]
    pub fn list_from(payload: &WeatherPayload) -> Vec<Self> {
        payload
            .as_json()
            .get("list")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| Self {
                        date: entry.get("dt_txt").and_then(Value::as_str).map(String::from),
                        temperature: temperature(entry),
                        description: description(entry),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn temperature(json: &Value) -> Option<f64> {
    json.pointer("/main/temp").and_then(Value::as_f64)
}

fn description(json: &Value) -> Option<String> {
    json.pointer("/weather/0/description")
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn city(name: &str) -> CityName {
        CityName::parse(name).unwrap()
    }

    #[test]
    fn test_weather_from_payload() {
        let payload = WeatherPayload::new(json!({
            "name": "Paris",
            "main": {"temp": 18.5},
            "weather": [{"description": "light rain"}]
        }));

        let weather = Weather::from_payload(&city("paris"), &payload);
        assert_eq!(weather.city, "Paris");
        assert_eq!(weather.temperature, Some(18.5));
        assert_eq!(weather.description.as_deref(), Some("light rain"));
    }

    #[test]
    fn test_weather_from_sparse_payload() {
        let weather = Weather::from_payload(&city("Oslo"), &WeatherPayload::new(json!({})));
        assert_eq!(weather.city, "Oslo");
        assert_eq!(weather.temperature, None);
        assert_eq!(weather.description, None);
    }

    #[test]
    fn test_forecast_items() {
        let payload = WeatherPayload::new(json!({
            "list": [
                {
                    "dt_txt": "2024-05-01 12:00:00",
                    "main": {"temp": 20},
                    "weather": [{"description": "clear sky"}]
                },
                {"dt_txt": "2024-05-01 15:00:00", "main": {"temp": 21.5}, "weather": []}
            ]
        }));

        let items = ForecastItem::list_from(&payload);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].date.as_deref(), Some("2024-05-01 12:00:00"));
        assert_eq!(items[0].temperature, Some(20.0));
        assert_eq!(items[0].description.as_deref(), Some("clear sky"));
        assert_eq!(items[1].description, None);
    }

    #[test]
    fn test_forecast_without_list() {
        assert!(ForecastItem::list_from(&WeatherPayload::new(json!({"cod": "200"}))).is_empty());
    }
}
