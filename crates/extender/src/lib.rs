//! Scheduler extender exposing balance-aware network scoring over HTTP

pub mod api;
pub mod config;
