// Library exports for testing
pub mod aggregate;
pub mod config;
pub mod event;
pub mod ingest;
pub mod logging;
pub mod renderer;
pub mod timefmt;
