pub mod api;
pub mod config;
pub mod error;
pub mod main_lib;
pub mod scheduler;

pub use main_lib::{build_provider, build_state, build_state_with_provider, init_tracing, AppState};
