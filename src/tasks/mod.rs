//! Background Tasks Module
//!
//! Contains tasks that run independently of callers.
//!
//! # Tasks
//! - Sweeper: Removes expired entries in bounded chunks

mod sweeper;

pub use sweeper::{spawn_sweeper, sweep_pass, SweepSignals};
