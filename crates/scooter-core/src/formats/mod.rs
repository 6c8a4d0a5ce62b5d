//! # Formats
//!
//! Binary encoding of stored records.

pub mod record;

pub use record::{decode, encode};
