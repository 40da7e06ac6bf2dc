//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;

pub use crate::app::CoreApp;
pub use cli::{Cli, Commands, SeriesCommands};
pub use config::AppConfig;
pub use storage::{AppStorage, DataSubdir};
