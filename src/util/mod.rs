//! Utility functions shared by the library and the terminal front end.
//!
//! - **URL validation**: scheme checks for requests, public-host checks before
//!   opening a link in the browser
//! - **Text processing**: terminal-safe, width-aware rendering of API text

mod text;
mod url_validator;

pub use text::{display_width, strip_control_chars, strip_html, truncate_to_width};
pub use url_validator::{parse_http_url, validate_url_for_open, UrlValidationError};
