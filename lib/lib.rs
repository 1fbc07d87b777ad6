pub mod build_info;
pub mod cli;
pub mod config;
pub mod db;
pub mod logging;
pub mod poller;
pub mod reporter;
pub mod scheduler;
pub mod server;
pub mod state;
