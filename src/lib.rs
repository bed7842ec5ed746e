pub mod builder;
pub mod capture;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod files;
pub mod flow;
pub mod registry;
pub mod session;
#[cfg(feature = "cli")]
pub mod shell;
pub mod spec;
pub mod workspace;
