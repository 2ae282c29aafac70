//! Shared protocol definitions for the `massg` JSON wire format.

pub mod codec;
pub mod message;
