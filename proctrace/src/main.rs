// region:    --- Modules
mod cli;
mod error;
mod event;
mod trx;
mod worker;
// endregion: --- Modules

use crate::{
	cli::args::{Cli, RunMode},
	worker::{OutputFormat, RenderWorker, RingBufWorker},
};

pub use self::error::{Error, Result};
use aya::{
	maps::{MapData, RingBuf},
	programs::TracePoint,
	Ebpf,
};
use clap::Parser;
use daemonize::Daemonize;
use proctrace_common::SETTING_MIN_DURATION_NS;
use std::{fs::File, path::Path};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
#[rustfmt::skip]
use tracing::{debug, info, warn};
use tokio::io::unix::AsyncFd;
use tracing_subscriber::EnvFilter;

pub fn daemonize_process(log_path: &str) -> Result<()> {
	let log_file = File::create(Path::new(log_path))?;

	let daemonize = Daemonize::new()
		.working_directory("/")
		.umask(0o027)
		.stdout(log_file.try_clone()?)
		.stderr(log_file);

	daemonize
		.start()
		.map_err(|err| Error::DaemonStartFail { cause: err.to_string() })?;

	Ok(())
}

fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(mode: RunMode) -> Option<WorkerGuard> {
	match mode {
		RunMode::Console => {
			tracing_subscriber::fmt()
				.with_target(false)
				.with_env_filter(env_filter())
				.init();
			None
		}
		RunMode::Daemon => {
			let file_appender = rolling::daily("/var/log/proctrace", "proctrace.log");
			let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

			tracing_subscriber::fmt()
				.with_writer(non_blocking_writer)
				.with_target(false)
				.with_ansi(false)
				.with_env_filter(env_filter())
				.init();

			Some(guard)
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();

	if args.time.is_some() && args.mode != RunMode::Daemon {
		return Err(Error::InvalidTimeMode);
	}

	let _tracing_guard = init_tracing(args.mode);

	if let RunMode::Daemon = args.mode {
		daemonize_process(&args.log_file)?;
	}

	// Bump the memlock rlimit. This is needed for older kernels that don't use the
	// new memcg based accounting, see https://lwn.net/Articles/837122/
	let rlim = libc::rlimit {
		rlim_cur: libc::RLIM_INFINITY,
		rlim_max: libc::RLIM_INFINITY,
	};
	let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
	if ret != 0 {
		debug!("remove limit on locked memory failed, ret is: {ret}");
	}

	let mut ebpf = aya::Ebpf::load(aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/proctrace")))?;
	if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
		// This can happen if you remove all log statements from your eBPF program.
		warn!("failed to initialize eBPF logger: {e}");
	}

	let min_duration_ns = args.min_duration.map(|d| d.as_nanos() as u64).unwrap_or(0);
	apply_settings(&mut ebpf, min_duration_ns)?;

	let ringbuf_fd = load_probes(&mut ebpf)?;

	let (tx, rx) = trx::new_trx_pair();
	let format = if args.json { OutputFormat::Json } else { OutputFormat::Text };

	RingBufWorker::start(ringbuf_fd, tx).await?;
	RenderWorker::start(rx, format).await?;

	match args.mode {
		RunMode::Console => {
			info!("Tracing process exec and exit events. Ctrl-C to stop.");
			tokio::signal::ctrl_c().await?;
			info!("Exiting...");
		}

		RunMode::Daemon => match args.time {
			Some(run_time) => {
				tokio::select! {
					_ = tokio::time::sleep(run_time.into()) => {},
					_ = tokio::signal::ctrl_c() => {},
				}
			}
			None => {
				tokio::signal::ctrl_c().await?;
			}
		},
	}

	Ok(())
}

// Must run before the programs attach so the very first exit records already
// see the threshold.
fn apply_settings(ebpf: &mut Ebpf, min_duration_ns: u64) -> Result<()> {
	let map = ebpf.map_mut("SETTINGS").ok_or(Error::EbpfMapNotFound)?;
	let mut settings: aya::maps::HashMap<_, u32, u64> = aya::maps::HashMap::try_from(map)?;
	settings.insert(SETTING_MIN_DURATION_NS, min_duration_ns, 0)?;
	Ok(())
}

pub fn load_probes(ebpf: &mut Ebpf) -> Result<AsyncFd<RingBuf<MapData>>> {
	let tp_exec: &mut TracePoint = ebpf.program_mut("proc_exec").ok_or(Error::EbpfProgNotFound)?.try_into()?;
	tp_exec.load()?;
	tp_exec.attach("sched", "sched_process_exec")?;

	let tp_exit: &mut TracePoint = ebpf.program_mut("proc_exit").ok_or(Error::EbpfProgNotFound)?.try_into()?;
	tp_exit.load()?;
	tp_exit.attach("sched", "sched_process_exit")?;

	let ring_buf = RingBuf::try_from(ebpf.take_map("EVENTS").ok_or(Error::EbpfMapNotFound)?)?;
	let fd = AsyncFd::new(ring_buf)?;
	Ok(fd)
}
