pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod queue;
pub mod scanner;
pub mod store;
pub mod tools;
