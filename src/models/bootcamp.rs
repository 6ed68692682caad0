//! Bootcamp model
//!
//! A bootcamp is published by one user, located by geocoding its address,
//! and owns courses and reviews. `average_cost` and `average_rating` are
//! derived from those children and never written by clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

/// A published bootcamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootcamp {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(flatten)]
    pub location: GeoLocation,
    pub careers: Vec<Career>,
    pub average_rating: Option<f64>,
    pub average_cost: Option<f64>,
    pub photo: String,
    pub housing: bool,
    pub job_assistance: bool,
    pub job_guarantee: bool,
    pub accept_gi: bool,
    /// Owner id
    pub user: i64,
    pub created_at: DateTime<Utc>,
}

/// Coordinates and address parts resolved by a geocoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
}

/// Career tracks a bootcamp can prepare for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Career {
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Mobile Development")]
    MobileDevelopment,
    #[serde(rename = "UI/UX")]
    UiUx,
    #[serde(rename = "Data Science")]
    DataScience,
    Business,
    Other,
}

impl Career {
    pub fn as_str(&self) -> &'static str {
        match self {
            Career::WebDevelopment => "Web Development",
            Career::MobileDevelopment => "Mobile Development",
            Career::UiUx => "UI/UX",
            Career::DataScience => "Data Science",
            Career::Business => "Business",
            Career::Other => "Other",
        }
    }
}

impl fmt::Display for Career {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Career {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Web Development" => Ok(Career::WebDevelopment),
            "Mobile Development" => Ok(Career::MobileDevelopment),
            "UI/UX" => Ok(Career::UiUx),
            "Data Science" => Ok(Career::DataScience),
            "Business" => Ok(Career::Business),
            "Other" => Ok(Career::Other),
            _ => Err(anyhow::anyhow!("Invalid career: {}", s)),
        }
    }
}

/// Request body for publishing a bootcamp
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBootcampInput {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form address, geocoded on save
    pub address: String,
    pub careers: Vec<Career>,
    #[serde(default)]
    pub housing: bool,
    #[serde(default)]
    pub job_assistance: bool,
    #[serde(default)]
    pub job_guarantee: bool,
    #[serde(default)]
    pub accept_gi: bool,
}

/// Partial update; a new `address` is geocoded again
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBootcampInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub careers: Option<Vec<Career>>,
    pub housing: Option<bool>,
    pub job_assistance: Option<bool>,
    pub job_guarantee: Option<bool>,
    pub accept_gi: Option<bool>,
}
