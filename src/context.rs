//! Client context: connection settings, the executor, and the current batch.
//!
//! Implementation details are split into submodules under `src/context/`.

pub mod builder;
pub mod config;
pub mod core;

pub use builder::ClientContextBuilder;
pub use config::ContextConfig;
pub use self::core::ClientContext;
