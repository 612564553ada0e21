//! Background Tasks Module
//!
//! Contains background tasks owned by cache instances.
//!
//! # Tasks
//! - TTL Sweep: advances the expiration wheel once per bucket width

mod sweep;

pub use sweep::{spawn_sweep_task, Sweep, SweepHandle};
