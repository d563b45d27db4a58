//! Background Tasks Module
//!
//! Contains background tasks that run alongside the coordinator.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at a fixed interval,
//!   independent of read traffic

mod sweep;

pub use sweep::{spawn_sweep_task, SweepTask};
