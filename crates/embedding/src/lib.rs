pub mod batch;
pub mod circuit_breaker;
pub mod http_provider;
pub mod mock;
pub mod pipeline;
pub mod provider;
pub mod rate_limit;
pub mod retry;

pub use batch::{BatchConcurrency, BatchSizer};
pub use circuit_breaker::{Admission, CircuitBreaker};
pub use http_provider::HttpEmbeddingProvider;
pub use mock::MockProvider;
pub use pipeline::EmbeddingPipeline;
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
