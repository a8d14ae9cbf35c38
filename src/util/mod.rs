//! Utility functions shared by the fetcher and the configuration layer.
//!
//! - **URL validation**: scheme and host checks before a request is issued

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
