#![no_std]
#![no_main]

use aya_ebpf::{
	helpers::{
		bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_task, bpf_probe_read_kernel,
		bpf_probe_read_kernel_str_bytes, r#gen::bpf_ktime_get_ns,
	},
	macros::{map, tracepoint},
	maps::{HashMap, PerCpuArray, RingBuf},
	programs::TracePointContext,
	EbpfContext,
};
use aya_log_ebpf::error;
use proctrace_common::{ProcessEvent, SETTING_MIN_DURATION_NS, TASK_COMM_LEN};

mod vmlinux;
use vmlinux::task_struct;

#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(256 * 1024, 0);

// pid -> ktime at exec, consumed by the exit probe to compute the lifetime.
#[map]
static EXEC_START: HashMap<u32, u64> = HashMap::with_max_entries(8192, 0);

// Written by userspace before attach. Key 0 holds min_duration_ns.
#[map]
static SETTINGS: HashMap<u32, u64> = HashMap::with_max_entries(1, 0);

// Staging slot for the outgoing record; a 164-byte struct with a 127-byte
// string read into it does not fit the BPF stack comfortably.
#[map]
static SCRATCH: PerCpuArray<ProcessEvent> = PerCpuArray::with_max_entries(1, 0);

// Offset of the `__data_loc char[] filename` field in the raw
// `sched_process_exec` tracepoint record. The low 16 bits of the loaded value
// hold the byte offset of the string within the record.
const EXEC_FILENAME_LOC: usize = 8;

macro_rules! try_read {
	($ctx:expr, $offset:expr) => {
		match $ctx.read_at($offset) {
			Ok(val) => val,
			Err(_) => return Err(1),
		}
	};
}

#[tracepoint]
pub fn proc_exec(ctx: TracePointContext) -> u32 {
	match try_proc_exec(ctx) {
		Ok(ret) => ret,
		Err(ret) => ret,
	}
}

fn try_proc_exec(ctx: TracePointContext) -> Result<u32, u32> {
	let pid = (bpf_get_current_pid_tgid() >> 32) as u32;

	let ts = unsafe { bpf_ktime_get_ns() };
	let _ = EXEC_START.insert(&pid, &ts, 0);

	let event = unsafe { &mut *SCRATCH.get_ptr_mut(0).ok_or(1u32)? };
	*event = ProcessEvent::zeroed();
	event.pid = pid;
	event.ppid = unsafe { read_ppid() }.unwrap_or(0);
	event.comm = bpf_get_current_comm().unwrap_or([0u8; TASK_COMM_LEN]);
	event.exit_event = 0;

	let loc: u32 = unsafe { try_read!(ctx, EXEC_FILENAME_LOC) };
	let offset = (loc & 0xffff) as usize;
	unsafe {
		let src = (ctx.as_ptr() as *const u8).add(offset);
		let _ = bpf_probe_read_kernel_str_bytes(src, &mut event.filename);
	}

	match EVENTS.output(event, 0) {
		Ok(_) => (),
		Err(e) => error!(&ctx, "ring buffer full, dropping exec record: {}", e),
	}

	Ok(0)
}

#[tracepoint]
pub fn proc_exit(ctx: TracePointContext) -> u32 {
	match try_proc_exit(ctx) {
		Ok(ret) => ret,
		Err(ret) => ret,
	}
}

fn try_proc_exit(ctx: TracePointContext) -> Result<u32, u32> {
	let id = bpf_get_current_pid_tgid();
	let pid = (id >> 32) as u32;
	let tid = id as u32;

	// Thread exits also fire this tracepoint; only whole-process exits count.
	if pid != tid {
		return Ok(0);
	}

	let now = unsafe { bpf_ktime_get_ns() };
	let start = unsafe { EXEC_START.get(&pid) }.copied();
	let _ = EXEC_START.remove(&pid);

	// Zero when the exec predates the tracer.
	let duration_ns = start.map(|ts| now.saturating_sub(ts)).unwrap_or(0);

	let min_duration_ns = unsafe { SETTINGS.get(&SETTING_MIN_DURATION_NS) }.copied().unwrap_or(0);
	if min_duration_ns > 0 && duration_ns < min_duration_ns {
		return Ok(0);
	}

	let event = unsafe { &mut *SCRATCH.get_ptr_mut(0).ok_or(1u32)? };
	*event = ProcessEvent::zeroed();
	event.pid = pid;
	event.ppid = unsafe { read_ppid() }.unwrap_or(0);
	event.exit_code = unsafe { read_exit_code() }.unwrap_or(0);
	event.duration_ns = duration_ns;
	event.comm = bpf_get_current_comm().unwrap_or([0u8; TASK_COMM_LEN]);
	event.exit_event = 1;

	match EVENTS.output(event, 0) {
		Ok(_) => (),
		Err(e) => error!(&ctx, "ring buffer full, dropping exit record: {}", e),
	}

	Ok(0)
}

unsafe fn read_ppid() -> Result<u32, i64> {
	let task = bpf_get_current_task() as *const task_struct;
	let parent = bpf_probe_read_kernel(&(*task).real_parent)?;
	let tgid = bpf_probe_read_kernel(&(*parent).tgid)?;
	Ok(tgid as u32)
}

unsafe fn read_exit_code() -> Result<u32, i64> {
	let task = bpf_get_current_task() as *const task_struct;
	let code = bpf_probe_read_kernel(&(*task).exit_code)?;
	// Wait-status convention: the exit code proper lives in bits 8..16.
	Ok(((code >> 8) & 0xff) as u32)
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
	loop {}
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
