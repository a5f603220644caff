//! Page visit tracking for axum applications.
//!
//! Each qualifying request either creates a visit row or adds a view to a
//! recent visit by the same visitor on the same page.

pub mod api;
pub mod config;
pub mod models;
pub mod storage;
pub mod tracker;
pub mod web;
