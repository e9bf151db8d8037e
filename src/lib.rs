//! ==============================================================================
//! pipeline-monitor - pipeline monitoring console
//! ==============================================================================
//!
//! layout:
//!     - domain / storage / token: plain data, the key-value store, mock tokens
//!     - session / thresholds / theme / notify: the stores held in `context`
//!     - telemetry / simulation / analytics: what the console displays
//!     - server / views: the http surface
//!
//! ==============================================================================

pub mod analytics;
pub mod config;
pub mod context;
pub mod domain;
pub mod notify;
pub mod server;
pub mod session;
pub mod simulation;
pub mod storage;
pub mod telemetry;
pub mod theme;
pub mod thresholds;
pub mod token;
pub mod views;
