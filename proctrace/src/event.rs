use std::sync::Arc;

use proctrace_common::ProcessEvent;
use serde::Serialize;

/// Userspace view of one wire record. The wire format carries both field
/// groups in every record behind a flag; here the discriminator becomes the
/// variant, so a reader cannot touch the group that is not valid for the
/// record kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
	Exec {
		pid: u32,
		ppid: u32,
		comm: Arc<str>,
		filename: Arc<str>,
	},
	Exit {
		pid: u32,
		ppid: u32,
		exit_code: u32,
		duration_ns: u64,
		comm: Arc<str>,
	},
}

impl From<&ProcessEvent> for LifecycleEvent {
	fn from(raw: &ProcessEvent) -> Self {
		let comm = lossy_str(raw.comm_bytes());
		if raw.is_exit() {
			Self::Exit {
				pid: raw.pid,
				ppid: raw.ppid,
				exit_code: raw.exit_code,
				duration_ns: raw.duration_ns,
				comm,
			}
		} else {
			Self::Exec {
				pid: raw.pid,
				ppid: raw.ppid,
				comm,
				filename: lossy_str(raw.filename_bytes()),
			}
		}
	}
}

fn lossy_str(bytes: &[u8]) -> Arc<str> {
	Arc::from(String::from_utf8_lossy(bytes))
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;

	#[test]
	fn exec_event_serializes_tagged() -> Result<()> {
		// -- Setup & Fixtures
		let fx_evt = LifecycleEvent::Exec {
			pid: 1234,
			ppid: 1,
			comm: Arc::from("bash"),
			filename: Arc::from("/bin/bash"),
		};
		// -- Exec
		let json: serde_json::Value = serde_json::to_value(&fx_evt)?;
		// -- Check
		assert_eq!(json["type"], "exec");
		assert_eq!(json["pid"], 1234);
		assert_eq!(json["ppid"], 1);
		assert_eq!(json["comm"], "bash");
		assert_eq!(json["filename"], "/bin/bash");

		Ok(())
	}

	#[test]
	fn exit_event_serializes_tagged() -> Result<()> {
		let fx_evt = LifecycleEvent::Exit {
			pid: 1234,
			ppid: 1,
			exit_code: 0,
			duration_ns: 2_500_000_000,
			comm: Arc::from("bash"),
		};
		let json: serde_json::Value = serde_json::to_value(&fx_evt)?;
		assert_eq!(json["type"], "exit");
		assert_eq!(json["exit_code"], 0);
		assert_eq!(json["duration_ns"], 2_500_000_000u64);

		Ok(())
	}

	#[test]
	fn non_utf8_comm_converts_lossily() {
		let mut raw = ProcessEvent::zeroed();
		raw.set_comm(&[0xff, 0xfe, b'a']);

		let evt = LifecycleEvent::from(&raw);
		match evt {
			LifecycleEvent::Exec { comm, .. } => {
				assert_eq!(&*comm, "\u{fffd}\u{fffd}a");
			}
			_ => panic!("expected exec variant"),
		}
	}
}

// endregion: --- Tests
