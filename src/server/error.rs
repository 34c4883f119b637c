use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::cache::Section;

/// Failure of a query endpoint.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// Nothing has been received from the feed, or the whole `data` object is missing
    AllUnavailable,
    /// The cache has no value for this section
    SectionUnavailable(Section),
    /// The fruit database has not been loaded or scraped yet
    FruitsUnavailable,
}

impl ApiError {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::AllUnavailable => "Failed to fetch all data",
            Self::SectionUnavailable(section) => match section {
                Section::Seeds => "Failed to fetch stock data",
                Section::Gear => "Failed to fetch gear data",
                Section::Eggs => "Failed to fetch egg data",
                Section::Cosmetics => "Failed to fetch cosmetics data",
                Section::Events => "Failed to fetch event data",
                Section::Weather => "Failed to fetch weather data",
            },
            Self::FruitsUnavailable => "Failed to fetch fruit data",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;

        #[cfg(feature = "tracing")]
        tracing::warn!(error = self.message(), "Query failed");

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.message(),
        }));

        (status, body).into_response()
    }
}
