//! Paged, zoomable monitoring graphs backed by a single graph-state store.
//!
//! [`dashboard::Dashboard`] is the entry point: it owns the [`store`], the
//! [`pager`] window over it, a [`client::Backend`] and a
//! [`render::ChartSurface`], and drives fetching, reconciliation and drawing
//! for every user action.

pub mod activity;
pub mod cli;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod downtime;
pub mod fetch;
pub mod pager;
pub mod persist;
pub mod reconcile;
pub mod render;
pub mod store;
