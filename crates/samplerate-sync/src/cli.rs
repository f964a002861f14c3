use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "samplerate-sync", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Config file (TOML). Defaults to config.toml next to the executable when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the default output device and its supported sample rates, then exit
    #[arg(long)]
    pub list_devices: bool,

    /// Player log poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Default output device check interval in milliseconds
    #[arg(long)]
    pub device_poll_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keep the output device in sync until interrupted (default)
    Run {
        /// Print each new sample rate to stdout, e.g. for a status bar
        #[arg(long)]
        print_status: bool,
    },

    /// Run a single sync cycle and print the resulting status as JSON
    Once,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_accepted() {
        let args = Args::try_parse_from(["samplerate-sync"]).unwrap();
        assert_eq!(args.cmd, None);
        assert!(!args.list_devices);
    }

    #[test]
    fn run_with_overrides() {
        let args = Args::try_parse_from([
            "samplerate-sync",
            "--poll-interval-ms",
            "1500",
            "--config",
            "/etc/samplerate-sync.toml",
            "run",
            "--print-status",
        ])
        .unwrap();
        assert_eq!(args.poll_interval_ms, Some(1500));
        assert_eq!(args.cmd, Some(Command::Run { print_status: true }));
        assert_eq!(
            args.config.as_deref(),
            Some(std::path::Path::new("/etc/samplerate-sync.toml"))
        );
    }

    #[test]
    fn once_subcommand() {
        let args = Args::try_parse_from(["samplerate-sync", "once"]).unwrap();
        assert_eq!(args.cmd, Some(Command::Once));
    }
}
