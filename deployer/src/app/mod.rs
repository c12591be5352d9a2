//! Command dispatch

pub mod run;
pub mod tasks;
