//! Outer surfaces: the HTTP API and the CSV export format.

pub mod csv;
pub mod http;
