//! Access to the remote archive.

pub mod circuit_breaker;
pub mod fetcher;
pub mod http;

pub use circuit_breaker::CircuitBreaker;
pub use fetcher::{ArtifactStream, FetchError, ResourceFetcher};
pub use http::HttpFetcher;
