//! Raider monitoring.
//!
//! This module provides:
//! - Configuration of regions, cadences and cooldowns
//! - The player registry persisted to `daily_history.json`
//! - The single-flight lookup queue and its worker thread
//! - Sighting dispatch with cooldown policy
//! - The monitor loop and the service that owns it

pub mod config;
pub mod dispatch;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod service;
pub mod worker;

pub use config::{load_config, MonitorConfig};
pub use registry::PlayerRegistry;
pub use runner::MonitorDeps;
pub use service::MonitorService;
