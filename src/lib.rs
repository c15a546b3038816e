//! tvnab - TV show tracking and download automation
//!
//! This library crate exposes the scheduler, the show tree and the default
//! task wiring used by the `tvnab` binary.

pub mod config;
pub mod scheduler;
pub mod shows;
pub mod tasks;
pub mod watch;
