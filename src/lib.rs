// RpaDeck — Workflow editor and session client for a remote browser-automation backend
// License: Apache-2.0

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod logger;
pub mod metrics;
pub mod monitor;
pub mod shell;
pub mod workbench;
pub mod workflow;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
