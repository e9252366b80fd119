//! Domain Sales Tracker - partner landing page scanner
//!
//! Fetches partner landing pages, extracts premium domain cards, aggregates
//! sell-through per partner and flags pages whose listings need a refresh.

pub mod application;
pub mod domain;
pub mod infrastructure;
