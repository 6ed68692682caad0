//! Devcamp - REST API for a coding bootcamp directory
//!
//! This library provides the core functionality for the devcamp API:
//! bootcamps, courses, reviews and user accounts over SQLite, with a
//! generic filter/sort/paginate layer shared by every list endpoint.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod query;
pub mod services;
