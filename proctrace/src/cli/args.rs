use clap::{Parser, ValueEnum};
use humantime::Duration;

#[derive(Parser, Debug)]
#[command(name = "proctrace")]
pub struct Cli {
	#[arg(long, value_enum, default_value = "console")]
	pub mode: RunMode,

	#[arg(long, default_value = "/var/log/proctrace.log")]
	pub log_file: String,

	#[arg(long, help = "Suppress exit events for processes shorter than this (e.g. 500ms, 2s)")]
	pub min_duration: Option<Duration>,

	#[arg(long, help = "Emit one JSON object per event instead of log lines")]
	pub json: bool,

	#[arg(long, help = "Time duration (e.g., 20s, 5m, 1h). Only valid with --mode daemon")]
	pub time: Option<Duration>,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
	Console,
	Daemon,
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_parse_ok() {
		let cli = Cli::parse_from(["proctrace"]);
		assert_eq!(cli.mode, RunMode::Console);
		assert!(!cli.json);
		assert!(cli.min_duration.is_none());
		assert!(cli.time.is_none());
	}

	#[test]
	fn min_duration_accepts_humantime() {
		let cli = Cli::parse_from(["proctrace", "--min-duration", "500ms"]);
		let min: std::time::Duration = cli.min_duration.unwrap().into();
		assert_eq!(min.as_nanos(), 500_000_000);
	}

	#[test]
	fn daemon_mode_with_time_parses() {
		let cli = Cli::parse_from(["proctrace", "--mode", "daemon", "--time", "5m"]);
		assert_eq!(cli.mode, RunMode::Daemon);
		let time: std::time::Duration = cli.time.unwrap().into();
		assert_eq!(time.as_secs(), 300);
	}
}

// endregion: --- Tests
