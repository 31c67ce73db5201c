//! Meeting Analyzer Core - Backend logic for turning a recorded meeting
//! into a requirements document.
//!
//! This crate contains all business logic with zero UI dependencies.
//! It is driven by the `meeting-analyzer` CLI but can be embedded in any
//! front-end that subscribes to the orchestrator's progress events.

pub mod config;
pub mod document;
pub mod frames;
pub mod inference;
pub mod logging;
pub mod orchestrator;
pub mod requirements;
pub mod transcription;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
