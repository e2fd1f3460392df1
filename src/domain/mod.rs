//! Domain layer: the application record, its lifecycle rules, and the ports
//! the workflow talks to. Nothing here performs I/O.

pub mod admin_log;
pub mod amount;
pub mod application;
pub mod payment;
pub mod ports;
pub mod profile;
pub mod progress;
pub mod slot;
pub mod status;
