// Copyright (C) 2026  kubestate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Error types for the synchronization pipeline

use kubestate_metrics::MetricError;
use thiserror::Error;

/// Result type alias for remote API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by a [`ResourceApi`](crate::api::ResourceApi)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The requested resume point is no longer retained by the server
    ///
    /// Not a failure: the watcher answers it with a full relist.
    #[error("resource version too old: {0}")]
    Gone(String),

    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status other than 410
    #[error("API server returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Create a Transport error with context
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        ApiError::Transport(msg.into())
    }

    /// Create a Decode error with context
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ApiError::Decode(msg.into())
    }

    /// Whether this error means the watch cursor is too old to resume from
    pub fn is_stale_cursor(&self) -> bool {
        matches!(
            self,
            ApiError::Gone(_) | ApiError::Status { status: 410, .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Errors raised while rendering one object
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// A field the generator cannot work without is absent
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A field is present but malformed
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// JSON pointer of the field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// A record could not be constructed
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// The generator panicked
    #[error("generator panicked: {0}")]
    Panicked(String),
}

impl GeneratorError {
    /// Create an InvalidField error
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        GeneratorError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised while assembling collectors
#[derive(Error, Debug)]
pub enum BuildError {
    /// No remote API capability was supplied
    #[error("no resource API configured")]
    MissingApi,
}
