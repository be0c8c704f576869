//! Timely Task Tracker Library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod predict;
pub mod schedule;
pub mod types;
