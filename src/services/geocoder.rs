//! Address geocoding and great-circle distance
//!
//! `NominatimGeocoder` queries an OpenStreetMap Nominatim compatible API;
//! `StaticGeocoder` answers from a fixed table and never touches the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{GeocoderConfig, GeocoderProvider, StaticPlace};
use crate::models::GeoLocation;

/// Earth radius used for radius searches, in miles
pub const EARTH_RADIUS_MILES: f64 = 3963.0;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("No location found for '{0}'")]
    NoMatch(String),

    #[error("Geocoding provider failed: {0}")]
    Provider(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, text: &str) -> Result<GeoLocation, GeocodeError>;
}

/// Build the configured geocoder
pub fn build_geocoder(config: &GeocoderConfig) -> anyhow::Result<Arc<dyn Geocoder>> {
    Ok(match config.provider {
        GeocoderProvider::Nominatim => Arc::new(NominatimGeocoder::new(config)?),
        GeocoderProvider::Static => Arc::new(StaticGeocoder::new(config.places.clone())),
    })
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country_code: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, text: &str) -> Result<GeoLocation, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", text),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Provider(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Provider(format!("Invalid response: {}", e)))?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(text.to_string()))?;

        let coordinate = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| GeocodeError::Provider(format!("Invalid coordinate '{}'", raw)))
        };
        let address = place.address;
        let street = match (address.house_number, address.road) {
            (Some(number), Some(road)) => Some(format!("{} {}", number, road)),
            (None, road) => road,
            (number, None) => number,
        };

        Ok(GeoLocation {
            latitude: coordinate(&place.lat)?,
            longitude: coordinate(&place.lon)?,
            formatted_address: place.display_name,
            street,
            city: address.city.or(address.town).or(address.village),
            state: address.state,
            zipcode: address.postcode,
            country: address.country_code.map(|c| c.to_uppercase()),
        })
    }
}

/// Lookup table keyed by address text, matched case-insensitively
pub struct StaticGeocoder {
    places: HashMap<String, StaticPlace>,
}

impl StaticGeocoder {
    pub fn new(places: HashMap<String, StaticPlace>) -> Self {
        let places = places
            .into_iter()
            .map(|(key, place)| (normalize(&key), place))
            .collect();
        Self { places }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, text: &str) -> Result<GeoLocation, GeocodeError> {
        let place = self
            .places
            .get(&normalize(text))
            .ok_or_else(|| GeocodeError::NoMatch(text.to_string()))?;

        Ok(GeoLocation {
            latitude: place.latitude,
            longitude: place.longitude,
            formatted_address: place.formatted_address.clone(),
            street: place.street.clone(),
            city: place.city.clone(),
            state: place.state.clone(),
            zipcode: place.zipcode.clone(),
            country: place.country.clone(),
        })
    }
}

/// Great-circle distance in miles
pub fn distance_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().min(1.0).asin()
}

/// Latitude/longitude box containing every point within `miles` of the center
///
/// Returns `(min_lat, max_lat, min_lng, max_lng)`. Near the poles or the
/// antimeridian the box spans every longitude.
pub fn bounding_box(lat: f64, lng: f64, miles: f64) -> (f64, f64, f64, f64) {
    let angular = (miles / EARTH_RADIUS_MILES).to_degrees();
    let min_lat = (lat - angular).max(-90.0);
    let max_lat = (lat + angular).min(90.0);

    // widest longitude span is at the box edge nearest a pole
    let cos_edge = min_lat.abs().max(max_lat.abs()).to_radians().cos();
    if cos_edge <= f64::EPSILON || angular / cos_edge >= 180.0 {
        return (min_lat, max_lat, -180.0, 180.0);
    }
    let lng_span = angular / cos_edge;
    if lng - lng_span < -180.0 || lng + lng_span > 180.0 {
        return (min_lat, max_lat, -180.0, 180.0);
    }
    (min_lat, max_lat, lng - lng_span, lng + lng_span)
}
