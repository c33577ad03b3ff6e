//! Endpoint handlers

pub mod health;
pub mod run;

pub use health::{health, root};
pub use run::{identify_endpoints, run_action, run_deep};
