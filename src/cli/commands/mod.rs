//! CLI command implementations.

mod config;
mod process;
mod project;
mod segment;

pub use config::run_config;
pub use process::run_process;
pub use project::run_project;
pub use segment::run_segment;
