#![allow(non_camel_case_types, dead_code)]

// Pruned from `aya-tool generate task_struct` output: only the fields the
// probes dereference survive, with byte padding standing in for everything
// else. The offsets bake in the BTF of the kernel the bindings were generated
// against; regenerate when targeting a kernel with a different layout.

use aya_ebpf::cty::c_int;

#[repr(C)]
pub struct task_struct {
	pub _pad0: [u8; 0x918],
	pub exit_code: c_int,
	pub _pad1: [u8; 0x14],
	pub pid: c_int,
	pub tgid: c_int,
	pub _pad2: [u8; 0x10],
	pub real_parent: *mut task_struct,
	pub parent: *mut task_struct,
}
