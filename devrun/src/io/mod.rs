//! I/O helpers for devrun commands.

pub mod clean;
pub mod config;
pub mod executor;
pub mod init;
pub mod process;
pub mod report;
