//! Core domain entities.
//!
//! - [`UrlRecord`] - A short code and the URL it redirects to
//! - [`Click`] - One recorded follow of a short code
//! - [`ClickEvent`] - Client metadata captured on a redirect

pub mod click;
pub mod url_record;

pub use click::{Click, ClickEvent};
pub use url_record::UrlRecord;
