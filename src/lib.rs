// Library surface for headless/integration tests and reuse.
// main.rs only holds the terminal setup and CLI plumbing.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod runtime;
pub mod solve;
pub mod stats;
pub mod timer;
pub mod ui;
pub mod util;
pub mod worker;
