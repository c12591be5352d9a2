//! Deployment: plan model, executor, and the deploy workflow

pub mod action;
pub mod executor;
pub mod plan;
pub mod run;
pub mod runner;
pub mod summary;
