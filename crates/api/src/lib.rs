//! Dog CEO API contract suite
//!
//! Exercises the public breed and image endpoints of `https://dog.ceo`:
//! - [`client::DogApiClient`]: one isolated HTTP client per test attempt
//! - [`envelope`]: the `{status, message}` wrapper and its payload types
//! - [`validators`]: reusable shape checks that fail with the offending field
//! - [`steps`]: the YAML step vocabulary and its executor

pub mod client;
pub mod envelope;
pub mod steps;
pub mod validators;

pub use client::{ApiConfig, ApiResponse, DogApiClient};
pub use envelope::{ApiStatus, BreedMap, Envelope, ImageUrl};
pub use steps::{build_cases, ApiScenario, ApiStep, VarietyKey};

/// Worker count under CI
pub const CI_WORKERS: usize = 4;
