// Public API exports
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;
pub mod prettyprint;
pub mod progress;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export key types for easy access
pub use domain::*;
pub use ports::*;
