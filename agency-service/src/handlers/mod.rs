//! HTTP handlers.

pub mod agency;
pub mod metrics;
pub mod pages;
