//! apm-deployer library
//!
//! Provisioning for the Flask APM demo: renders systemd, nginx, logrotate
//! and probe-script artifacts, and applies them as an ordered plan.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod health;
pub mod installer;
pub mod logs;
pub mod render;
pub mod storage;
pub mod utils;
