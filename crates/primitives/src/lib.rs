//! Shared identifier and value types for the proofnet overlay.

pub mod context;
pub mod gender;
pub mod hash;
pub mod identity;
pub mod splice;
pub mod time;
pub mod version;
