//! Liveness probe and smoke tests against a running app

pub mod probe;
pub mod smoke;
