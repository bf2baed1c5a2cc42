//! Linux/x86 boot protocol loader.
//!
//! Loads a bzImage kernel and an initrd from the filesystem, lays them out at
//! the fixed physical addresses the real-mode setup code expects, patches the
//! setup header, and prepares the entry state for the mode-switch trampoline
//! that performs the actual 16-bit far jump.

use core::convert::Infallible;

use alloc::vec::Vec;

use crate::errors::LoaderError;
use crate::fzboot::config::ConfigEntry;
use crate::fzboot::linux::headers::{
    SetupHeader, BOOT_FLAG_MAGIC, CAN_USE_HEAP, HEADER_MAGIC, LOADER_TYPE_ID,
};
use crate::info;

pub mod headers;

/// Minimum boot protocol version this loader supports (2.02).
const MIN_PROTOCOL_VERSION: u16 = 0x0202;

/// Physical base address of the real-mode setup code.
pub const SETUP_BASE: u32 = 0x70000;

/// Physical base address of the protected-mode kernel.
pub const KERNEL_BASE: u32 = 0x100000;

/// Offset, from [`SETUP_BASE`], of the command-line buffer.
const CMDLINE_OFFSET: u32 = 0xE000;

/// Maximum length of the command line the loader will copy in.
const CMDLINE_MAX_LEN: usize = 0x2000;

/// Legacy ceiling for `initrd_addr_max` on pre-2.03 kernels.
const LEGACY_INITRD_ADDR_MAX: u32 = 0x37FFFFFF;

/// `vid_mode` value meaning "normal", i.e. let the kernel pick (§4.3, §6).
const VID_MODE_NORMAL: u16 = 0xFFFF;

/// Register state the trampoline must load before the final 16-bit far jump.
#[derive(Debug, Clone, Copy)]
pub struct EntryState {
    pub cs: u16,
    pub ds: u16,
    pub sp: u16,
    pub bp: u16,
}

impl EntryState {
    fn for_setup_base() -> Self {
        Self {
            cs: ((SETUP_BASE >> 4) + 0x20) as u16,
            ds: (SETUP_BASE >> 4) as u16,
            sp: CMDLINE_OFFSET as u16,
            bp: CMDLINE_OFFSET as u16,
        }
    }
}

/// Loads and boots the Linux kernel named by `entry`, never returning on success.
///
/// Reads `kernel`, `initrd`, `args`, `drive` and `partitionStart` from `entry`; all but `args`
/// are mandatory. `args` defaults to an empty command line.
pub fn boot(entry: &dyn ConfigEntry) -> Result<Infallible, LoaderError> {
    let kernel_path = entry.get("kernel").ok_or(LoaderError::MissingArguments)?;
    let initrd_path = entry.get("initrd").ok_or(LoaderError::MissingArguments)?;
    let args = entry.get("args").unwrap_or("");

    let drive: usize = entry
        .get("drive")
        .and_then(|s| s.parse().ok())
        .ok_or(LoaderError::MissingArguments)?;
    let partition_start: u64 = entry
        .get("partitionStart")
        .and_then(|s| s.parse().ok())
        .ok_or(LoaderError::MissingArguments)?;

    info!("linux86", "loading kernel {kernel_path}");

    let mut kernel: Vec<u8> = Vec::new();
    crate::fs::ext4::read_file(drive, partition_start, kernel_path, &mut kernel)?;

    let mut hdr = SetupHeader::copy_from_image(kernel.as_mut_ptr());
    validate_setup_header(&hdr)?;

    info!("linux86", "loading initrd {initrd_path}");
    let mut initrd: Vec<u8> = Vec::new();
    crate::fs::ext4::read_file(drive, partition_start, initrd_path, &mut initrd)?;

    let initrd_addr_max = if hdr.version() >= 0x0203 {
        hdr.initrd_addr_max()
    } else {
        LEGACY_INITRD_ADDR_MAX
    };
    let ramdisk_image = choose_ramdisk_address(initrd.len(), initrd_addr_max)?;
    if u64::from(ramdisk_image) + initrd.len() as u64 > u64::from(initrd_addr_max) {
        return Err(LoaderError::TooLarge);
    }

    let cmdline_len = args.len().min(CMDLINE_MAX_LEN - 1);
    let cmd_line_ptr = SETUP_BASE + CMDLINE_OFFSET;

    hdr.set_vid_mode(VID_MODE_NORMAL);
    hdr.set_loadflags(hdr.loadflags() | CAN_USE_HEAP);
    hdr.set_type_of_loader(LOADER_TYPE_ID);
    hdr.set_ramdisk_image(ramdisk_image);
    hdr.set_ramdisk_size(initrd.len() as u32);
    hdr.set_heap_end_ptr((CMDLINE_OFFSET - 0x200) as u16);
    hdr.set_cmd_line_ptr(cmd_line_ptr);

    let setup_sectors_len = (usize::from(hdr.setup_sects()) + 1) * 512;
    if kernel.len() < setup_sectors_len {
        return Err(LoaderError::InvalidFormat);
    }

    unsafe {
        place_setup(&hdr, &kernel[..setup_sectors_len]);
        place_protected_mode_kernel(&kernel[setup_sectors_len..]);
        place_initrd(ramdisk_image, &initrd);
        place_cmdline(cmd_line_ptr, args, cmdline_len);
    }

    info!("linux86", "handing off to kernel entry");

    let entry_state = EntryState::for_setup_base();

    // SAFETY: `entry_state` was derived from the fixed, just-populated real-mode setup area;
    // the jump never returns, which is why this call is this function's final, divergent
    // expression.
    unsafe { real_mode_jump(entry_state) }
}

/// Disables interrupts and performs the 16-bit far jump into the real-mode setup code.
///
/// This never returns: control passes to the kernel's own real-mode entry point, which is
/// outside anything this crate still owns.
///
/// # Safety
/// The real-mode setup region, stack, and segment registers implied by `state` must already
/// hold the values the Linux/x86 boot protocol expects.
#[cfg(feature = "real")]
unsafe fn real_mode_jump(state: EntryState) -> ! {
    use core::arch::asm;

    asm!(
        "cli",
        "mov ds, {ds:x}",
        "mov es, {ds:x}",
        "mov fs, {ds:x}",
        "mov gs, {ds:x}",
        "mov ss, {ds:x}",
        "mov sp, {sp:x}",
        "mov bp, {bp:x}",
        "push {cs:x}",
        "push 0",
        "retf",
        ds = in(reg) state.ds,
        sp = in(reg) state.sp,
        bp = in(reg) state.bp,
        cs = in(reg) state.cs,
        options(noreturn),
    )
}

#[cfg(not(feature = "real"))]
unsafe fn real_mode_jump(_state: EntryState) -> ! {
    unreachable!("real-mode handoff requires the `real` feature")
}

fn validate_setup_header(hdr: &SetupHeader) -> Result<(), LoaderError> {
    if hdr.header() != HEADER_MAGIC || hdr.boot_flag() != BOOT_FLAG_MAGIC {
        return Err(LoaderError::InvalidFormat);
    }
    if hdr.version() < MIN_PROTOCOL_VERSION {
        return Err(LoaderError::Unsupported);
    }
    if hdr.loadflags() & crate::fzboot::linux::headers::LOADED_HIGH == 0 {
        // zImage-style low loads are not supported.
        return Err(LoaderError::Unsupported);
    }
    Ok(())
}

/// Picks a physical address for the initrd, below `initrd_addr_max`, above the protected-mode
/// kernel load area.
///
/// The actual free-memory search is out of scope here (external memory manager, §1); this loader
/// places the initrd directly above [`KERNEL_BASE`], which is always valid for boot images small
/// enough to fit under `initrd_addr_max`.
fn choose_ramdisk_address(initrd_len: usize, initrd_addr_max: u32) -> Result<u32, LoaderError> {
    let candidate = KERNEL_BASE;
    if u64::from(candidate) + initrd_len as u64 > u64::from(initrd_addr_max) {
        return Err(LoaderError::TooLarge);
    }
    Ok(candidate)
}

/// # Safety
/// `setup_bytes` must be exactly `(setup_sects+1)*512` bytes; the destination region at
/// [`SETUP_BASE`] must be mapped and writable.
unsafe fn place_setup(hdr: &SetupHeader, setup_bytes: &[u8]) {
    let dest = SETUP_BASE as *mut u8;
    core::ptr::copy_nonoverlapping(setup_bytes.as_ptr(), dest, setup_bytes.len());
    hdr.write_to_image(dest);
}

/// # Safety
/// The destination region at [`KERNEL_BASE`] must be mapped, writable, and large enough to hold
/// `body`.
unsafe fn place_protected_mode_kernel(body: &[u8]) {
    core::ptr::copy_nonoverlapping(body.as_ptr(), KERNEL_BASE as *mut u8, body.len());
}

/// # Safety
/// The destination region at `addr` must be mapped, writable, and large enough to hold `initrd`.
unsafe fn place_initrd(addr: u32, initrd: &[u8]) {
    core::ptr::copy_nonoverlapping(initrd.as_ptr(), addr as *mut u8, initrd.len());
}

/// # Safety
/// The destination region at `addr` must be mapped and writable for at least `len + 1` bytes.
unsafe fn place_cmdline(addr: u32, args: &str, len: usize) {
    let dest = addr as *mut u8;
    core::ptr::copy_nonoverlapping(args.as_ptr(), dest, len);
    core::ptr::write(dest.add(len), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_state_matches_protocol_layout() {
        let state = EntryState::for_setup_base();
        assert_eq!(state.cs, 0x9000);
        assert_eq!(state.ds, 0x7000);
        assert_eq!(state.sp, 0xE000);
    }

    #[test]
    fn cmdline_pointer_is_fixed() {
        assert_eq!(SETUP_BASE + CMDLINE_OFFSET, 0x7E000);
    }

    #[test]
    fn ramdisk_address_rejects_overflow_past_max() {
        let result = choose_ramdisk_address(0x10_000_000, 0x10_00_000);
        assert!(matches!(result, Err(LoaderError::TooLarge)));
    }
}
