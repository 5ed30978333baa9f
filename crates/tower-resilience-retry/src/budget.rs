//! Retry budgets to prevent retry storms.
//!
//! Retry budgets limit the total number of retries across all requests,
//! preventing cascading failures when a downstream service is struggling.
//! This reuses the shared budget primitives in `tower_resilience_core` -
//! [`tower-resilience-hedge`] reuses the same primitives to bound hedges.

pub use tower_resilience_core::budget::{
    AimdBudget, AimdBudgetBuilder, Budget as RetryBudget, BudgetBuilder as RetryBudgetBuilder,
    TokenBucketBudget, TokenBucketBuilder,
};
