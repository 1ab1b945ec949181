pub mod config;
pub mod cmd;
pub mod executor;
pub mod fence;
pub mod output;
