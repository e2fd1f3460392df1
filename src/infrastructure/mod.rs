//! Adapters behind the domain ports: storage backends, the payment gateway
//! client, and clocks.

pub mod clock;
pub mod geidea;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
