//! Artifact sources for the model registry.

#[cfg(feature = "http")]
mod hub;
mod local;

#[cfg(feature = "http")]
pub use hub::HubFetcher;
pub use local::LocalDirSource;
