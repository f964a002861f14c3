pub mod cli;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod playback_log;
pub mod runtime;
pub mod status;
pub mod trigger;

mod coreaudio;
