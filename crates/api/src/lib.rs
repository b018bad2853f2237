//! HTTP host: exposes coordinated endpoints over axum.

pub mod app;
pub mod catalog;
