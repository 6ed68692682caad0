//! Shared API response types
//!
//! Success bodies all carry `success: true`. List endpoints that go through
//! the query translator return `AdvancedResults` directly.

use serde::Serialize;

/// `{success, data}` for a single record
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `{success, count, data}` for unpaginated lists
#[derive(Debug, Serialize)]
pub struct CollectionResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> CollectionResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// `{success, token}` returned by every endpoint that signs a user in
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// Empty object payload used by deletes and logout
#[derive(Debug, Default, Serialize)]
pub struct Empty {}
