//! # brook-core
//! Foundation types for the Brook protocol: transactions and their
//! consensus encoding, scripts, addresses, keys, and chain parameters.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod params;
pub mod script;
pub mod types;
