//! Background batch jobs.
//!
//! Three independent loops, spawned from `main`: the daily aggregation
//! engine, the retention reaper and the realtime snapshot refresher. Each
//! iteration logs failures and keeps ticking — a bad run never kills the
//! loop, and the jobs are idempotent so the next tick is the retry.

pub mod aggregation;
pub mod realtime;
pub mod retention;
