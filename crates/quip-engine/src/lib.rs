//! Recommendation and daily-delivery scheduling for Quip.
//!
//! The engine sits between a [`quip_core::store::JokeStore`] backend and the
//! HTTP layer. [`recommend::select_next`] picks the next joke for a user;
//! [`scheduler::Scheduler`] turns that into idempotent once-per-day
//! deliveries, both in batch and on demand.

mod error;
pub mod recommend;
pub mod scheduler;

pub use error::EngineError;
pub use scheduler::{
  BatchStats, DailyOutcome, DeliveryOutcome, Scheduler, SchedulerConfig,
};

#[cfg(test)]
mod tests;
