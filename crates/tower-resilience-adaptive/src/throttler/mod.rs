//! Client-side adaptive throttling.
//!
//! Unlike [`crate::AdaptiveLimiterLayer`], which bounds *concurrency*, the
//! throttler bounds *rate of acceptance* by comparing an EWMA of requests
//! against an EWMA of accepts and rejecting a fraction of calls once that
//! ratio drifts - the same client-side throttling formula used by gRPC and
//! described in the Google SRE book: `max(0, (requests - K*accepts) / (requests + 1))`.
//!
//! # Example
//!
//! ```rust
//! use tower_resilience_adaptive::throttler::{AdaptiveThrottlerLayer, ThrottlerConfig};
//! use tower::ServiceBuilder;
//!
//! # fn my_service() -> impl tower::Service<(), Response = (), Error = std::convert::Infallible, Future = std::future::Ready<Result<(), std::convert::Infallible>>> + Clone {
//! #     tower::service_fn(|_: ()| std::future::ready(Ok(())))
//! # }
//! let service = ServiceBuilder::new()
//!     .layer(AdaptiveThrottlerLayer::new(
//!         ThrottlerConfig::builder().k(2.0).build(),
//!     ))
//!     .service(my_service());
//! ```

mod config;
mod error;
mod events;
mod ewma;
mod layer;
mod service;

pub use config::{ThrottlerConfig, ThrottlerConfigBuilder};
pub use error::ThrottlerError;
pub use events::ThrottlerEvent;
pub use layer::AdaptiveThrottlerLayer;
pub use service::AdaptiveThrottlerService;
