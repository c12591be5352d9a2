//! System dependency installation

pub mod install;
pub mod packages;
