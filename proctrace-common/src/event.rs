use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Capacity of the `comm` buffer, matching the kernel's `TASK_COMM_LEN`.
pub const TASK_COMM_LEN: usize = 16;

/// Capacity of the `filename` buffer.
pub const MAX_FILENAME_LEN: usize = 127;

/// One process lifecycle transition, as written by the probe and read by
/// userspace. The layout is the wire contract between the two sides: packed,
/// no padding, 164 bytes.
///
/// `exit_event` selects which field group is meaningful. Exec records carry
/// `filename`; exit records carry `exit_code` and `duration_ns`. Both groups
/// are physically present in every record and the irrelevant one is ignored
/// by the reader.
///
/// `comm` and `filename` are fixed-width buffers. The probe NUL-terminates
/// them, but readers must not rely on that: a name filling the whole buffer
/// has no terminator. Use [`ProcessEvent::comm_bytes`] and
/// [`ProcessEvent::filename_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ProcessEvent {
	pub pid: u32,
	pub ppid: u32,
	pub exit_code: u32,
	pub duration_ns: u64,
	pub comm: [u8; TASK_COMM_LEN],
	pub filename: [u8; MAX_FILENAME_LEN],
	/// 0 for an exec record, nonzero for an exit record. One byte on the
	/// wire, like a C `bool`.
	pub exit_event: u8,
}

impl ProcessEvent {
	pub const fn zeroed() -> Self {
		Self {
			pid: 0,
			ppid: 0,
			exit_code: 0,
			duration_ns: 0,
			comm: [0; TASK_COMM_LEN],
			filename: [0; MAX_FILENAME_LEN],
			exit_event: 0,
		}
	}

	pub fn is_exit(&self) -> bool {
		self.exit_event != 0
	}

	/// The command name up to the first NUL, or the full buffer when no
	/// terminator exists.
	pub fn comm_bytes(&self) -> &[u8] {
		let end = self.comm.iter().position(|&b| b == 0).unwrap_or(TASK_COMM_LEN);
		&self.comm[..end]
	}

	/// The executable path up to the first NUL, or the full buffer when no
	/// terminator exists. Only meaningful on exec records.
	pub fn filename_bytes(&self) -> &[u8] {
		let end = self.filename.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME_LEN);
		&self.filename[..end]
	}

	/// Copies at most `TASK_COMM_LEN - 1` bytes and NUL-terminates, the same
	/// truncation the kernel applies to long command names.
	pub fn set_comm(&mut self, src: &[u8]) {
		self.comm = truncate_into(src);
	}

	/// Copies at most `MAX_FILENAME_LEN - 1` bytes and NUL-terminates.
	pub fn set_filename(&mut self, src: &[u8]) {
		self.filename = truncate_into(src);
	}
}

fn truncate_into<const N: usize>(src: &[u8]) -> [u8; N] {
	let mut buf = [0u8; N];
	let len = src.len().min(N - 1);
	buf[..len].copy_from_slice(&src[..len]);
	buf
}

// region:    --- Tests


// endregion: --- Tests
