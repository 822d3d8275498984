//! Request helpers shared by handlers and middleware.
//!
//! - [`client_ip`] - Client address extraction for rate limiting

pub mod client_ip;
