//! Step definitions for deferred write scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
