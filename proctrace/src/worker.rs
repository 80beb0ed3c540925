use crate::{
	error::{Error, Result},
	event::LifecycleEvent,
	trx::{EventRx, EventTx},
};
use aya::maps::{MapData, RingBuf};
use proctrace_common::ProcessEvent;
use tokio::io::unix::AsyncFd;
use tracing::{info, warn};
use zerocopy::FromBytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
	Text,
	Json,
}

pub struct RingBufWorker {
	pub ringbuf_fd: AsyncFd<RingBuf<MapData>>,
	pub tx: EventTx,
}

impl RingBufWorker {
	pub async fn start(ringbuf_fd: AsyncFd<RingBuf<MapData>>, tx: EventTx) -> Result<()> {
		let mut worker = RingBufWorker { ringbuf_fd, tx };
		tokio::spawn(async move {
			let res = worker.start_worker().await;
			res
		});
		Ok(())
	}

	async fn start_worker(&mut self) -> Result<()> {
		loop {
			let mut guard = self.ringbuf_fd.readable_mut().await?;
			let ring_buf = guard.get_inner_mut();

			while let Some(item) = ring_buf.next() {
				let data = item.as_ref();

				match parse_event_from_bytes(data) {
					Ok(event) => {
						self.tx.send(LifecycleEvent::from(&event)).await?;
					}
					Err(e) => warn!("Failed to parse record: {:?}", e),
				}
			}

			guard.clear_ready();
		}
	}
}

fn parse_event_from_bytes(data: &[u8]) -> Result<ProcessEvent> {
	let evt = ProcessEvent::ref_from_prefix(data).map_err(|_| Error::InvalidEventSize)?.0;
	Ok(*evt)
}

pub struct RenderWorker {
	pub rx: EventRx,
	pub format: OutputFormat,
}

impl RenderWorker {
	pub async fn start(rx: EventRx, format: OutputFormat) -> Result<()> {
		let worker = RenderWorker { rx, format };
		tokio::spawn(async move {
			let res = worker.start_worker().await;
			res
		});
		Ok(())
	}

	pub async fn start_worker(&self) -> Result<()> {
		while let Ok(evt) = self.rx.recv().await {
			match self.format {
				OutputFormat::Text => info!("{}", render_line(&evt)),
				OutputFormat::Json => println!("{}", serde_json::to_string(&evt)?),
			}
		}
		Ok(())
	}
}

fn render_line(evt: &LifecycleEvent) -> String {
	match evt {
		LifecycleEvent::Exec { pid, ppid, comm, filename } => {
			format!("EXEC {:<16} pid {} ppid {} {}", comm, pid, ppid, filename)
		}
		LifecycleEvent::Exit { pid, ppid, exit_code, duration_ns, comm } => {
			format!(
				"EXIT {:<16} pid {} ppid {} code {} ({})",
				comm,
				pid,
				ppid,
				exit_code,
				render_duration(*duration_ns)
			)
		}
	}
}

fn render_duration(duration_ns: u64) -> String {
	// Zero means the exec was never observed (process predates the tracer).
	if duration_ns == 0 {
		return "unknown".to_string();
	}
	format!("{:.3}s", duration_ns as f64 / 1_000_000_000.0)
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use zerocopy::IntoBytes;

	fn fx_exec_record() -> ProcessEvent {
		let mut evt = ProcessEvent::zeroed();
		evt.pid = 1234;
		evt.ppid = 1;
		evt.set_comm(b"bash");
		evt.set_filename(b"/bin/bash");
		evt
	}

	fn fx_exit_record() -> ProcessEvent {
		let mut evt = ProcessEvent::zeroed();
		evt.pid = 1234;
		evt.ppid = 1;
		evt.exit_code = 2;
		evt.duration_ns = 2_500_000_000;
		evt.set_comm(b"bash");
		evt.exit_event = 1;
		evt
	}

	#[test]
	fn parse_event_from_bytes_ok() -> Result<()> {
		// -- Setup & Fixtures
		let fx_evt = fx_exec_record();
		// -- Exec
		let parsed = parse_event_from_bytes(fx_evt.as_bytes())?;
		// -- Check
		assert_eq!(parsed, fx_evt);

		Ok(())
	}

	#[test]
	fn parse_event_tolerates_trailing_bytes() -> Result<()> {
		let fx_evt = fx_exit_record();
		let mut data = fx_evt.as_bytes().to_vec();
		// Ring buffer items may round up past the record size.
		data.extend_from_slice(&[0u8; 4]);

		let parsed = parse_event_from_bytes(&data)?;
		assert_eq!(parsed, fx_evt);

		Ok(())
	}

	#[test]
	fn parse_event_rejects_short_buffer() {
		let fx_evt = fx_exec_record();
		let data = &fx_evt.as_bytes()[..20];

		let res = parse_event_from_bytes(data);
		assert!(matches!(res, Err(Error::InvalidEventSize)));
	}

	#[test]
	fn exec_record_converts_to_exec_variant() -> Result<()> {
		let mut fx_evt = fx_exec_record();
		// Stale bytes in the exit group must not leak into the exec view.
		fx_evt.exit_code = 99;
		fx_evt.duration_ns = 77;

		let evt = LifecycleEvent::from(&fx_evt);

		match evt {
			LifecycleEvent::Exec { pid, ppid, comm, filename } => {
				assert_eq!(pid, 1234);
				assert_eq!(ppid, 1);
				assert_eq!(&*comm, "bash");
				assert_eq!(&*filename, "/bin/bash");
			}
			other => return Err(format!("expected exec variant, got {other:?}").into()),
		}

		Ok(())
	}

	#[test]
	fn exit_record_converts_to_exit_variant() -> Result<()> {
		let fx_evt = fx_exit_record();

		let evt = LifecycleEvent::from(&fx_evt);

		match evt {
			LifecycleEvent::Exit { pid, exit_code, duration_ns, comm, .. } => {
				assert_eq!(pid, 1234);
				assert_eq!(exit_code, 2);
				assert_eq!(duration_ns, 2_500_000_000);
				assert_eq!(&*comm, "bash");
			}
			other => return Err(format!("expected exit variant, got {other:?}").into()),
		}

		Ok(())
	}

	#[test]
	fn render_line_formats_both_kinds() {
		let exec_line = render_line(&LifecycleEvent::from(&fx_exec_record()));
		assert!(exec_line.starts_with("EXEC"));
		assert!(exec_line.contains("/bin/bash"));

		let exit_line = render_line(&LifecycleEvent::from(&fx_exit_record()));
		assert!(exit_line.starts_with("EXIT"));
		assert!(exit_line.contains("code 2"));
		assert!(exit_line.contains("2.500s"));
	}

	#[test]
	fn render_duration_marks_unseen_exec() {
		assert_eq!(render_duration(0), "unknown");
	}
}

// endregion: --- Tests
