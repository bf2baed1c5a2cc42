//! Universal Boot Interface loader (§3, §4.4): reads a kernel's `K_*` table chain, constructs
//! the matching `B_*` chain, loads the kernel image and its modules, and hands off control.

pub mod kchain;
pub mod memtable;
pub mod modules;
pub mod platform;
pub mod tables;
pub mod video;

use core::convert::Infallible;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::errors::LoaderError;
use crate::fzboot::config::ConfigEntry;
use crate::fzboot::process::loader::{KernelImage, KernelImageOps};
use crate::info;

use kchain::parse_chain;
use memtable::{choose_relocation_base, resolve_kernel_offset, MemRequest};
use modules::build_module_list;
use platform::{MemRegion, UbiMemType, UbiPlatform};
use tables::*;
use video::VideoRequest;

/// Bits this loader implements; `K_ROOT.bits` must match exactly (§4.4.1 step 3).
const IMPLEMENTED_BITS: u16 = if cfg!(feature = "x86_64") { 64 } else { 32 };

/// Preferred bootloader self-relocation base (§4.4.6): `0xFFFFFFFF00000000` on amd64, `0`
/// (never relocate) on i386.
#[cfg(feature = "x86_64")]
const RELOCATION_PREFERRED_BASE: u64 = 0xFFFF_FFFF_0000_0000;

/// Loads the kernel and every module named by `entry`, builds the `B_*` table chain the
/// kernel's `K_*` chain called for, and calls into the kernel. Never returns on success.
pub fn boot(
    entry: &dyn ConfigEntry,
    platform: &mut dyn UbiPlatform,
) -> Result<Infallible, LoaderError> {
    let kernel_path = entry.get("kernel").ok_or(LoaderError::MissingArguments)?;
    let drive: usize = entry
        .get("drive")
        .and_then(|s| s.parse().ok())
        .ok_or(LoaderError::MissingArguments)?;
    let partition_start: u64 = entry
        .get("partitionStart")
        .and_then(|s| s.parse().ok())
        .ok_or(LoaderError::MissingArguments)?;
    let disable_kaslr = entry.get_bool("disableKaslr");

    info!("ubi", "loading kernel {kernel_path}");
    let mut kernel_bytes = Vec::new();
    crate::fs::ext4::read_file(drive, partition_start, kernel_path, &mut kernel_bytes)?;

    let image = KernelImage::parse(&kernel_bytes)?;
    let header_vaddr = image.find_ubi_header()?;
    let chain = parse_chain(&image, header_vaddr)?;

    let root = chain.root.ok_or(LoaderError::InvalidFormat)?;
    validate_root(&root)?;

    let (kernel_min, kernel_max) = image.vaddr_range()?;
    let image_size = kernel_max.saturating_sub(kernel_min);

    let offset = resolve_offset(
        &image,
        chain.mem.as_ref(),
        disable_kaslr,
        image_size,
        platform,
    )?;

    // Self-relocation must run before any table is built (§4.4.6 precedes §4.4.1 step 4): every
    // pointer this loader hands the kernel is an address inside this binary's own relocated
    // footprint, and there is no pointer registry to fix up after the fact.
    relocate_self(platform, kernel_min + offset, kernel_max + offset)?;

    let mut last: *mut BTableHeader = core::ptr::null_mut();

    let b_root = Box::leak(Box::new(BRootTable {
        header: BTableHeader::new(B_ROOT),
        spec_version_major: UBI_VERSION as u8,
        spec_version_minor: 0,
        reserved: 0,
        flags: if platform.is_uefi() { B_ROOT_FIRMWARE_UEFI } else { 0 },
    }));
    link_table(&mut last, b_root as *mut BRootTable as *mut BTableHeader);

    if let Some(mem) = chain.mem.as_ref() {
        let request = MemRequest::from_table(mem);
        let layout = memtable::build_mem_layout(platform.vmem(), &request)?;
        platform.move_stack(layout.stack_location - layout.stack_size, layout.stack_size);

        let b_mem = Box::leak(Box::new(BMemTable {
            header: BTableHeader::new(B_MEM),
            flags: mem.flags,
            heap_location: layout.heap_location,
            heap_size: layout.heap_size,
            stack_location: layout.stack_location,
            stack_size: layout.stack_size,
            id_map_location: layout.id_map_location,
            id_map_size: layout.id_map_size,
            kernel_base: mem.kernel_base + offset,
        }));
        link_table(&mut last, b_mem as *mut BMemTable as *mut BTableHeader);
    }

    if let Some(vid) = chain.vid.as_ref() {
        let b_vid = Box::leak(Box::new(build_video_table(vid, platform)));
        link_table(&mut last, b_vid as *mut BVidTable as *mut BTableHeader);
    }

    let kernel_load_address = kernel_min + offset;
    let loaded_modules = build_module_list(
        platform.vmem(),
        &image,
        drive,
        partition_start,
        kernel_path,
        kernel_load_address,
        kernel_bytes.len() as u64,
        &chain.modules,
        entry,
    )?;
    let b_mod = Box::leak(Box::new(build_module_table(&loaded_modules)));
    link_table(&mut last, b_mod as *mut BModuleTable as *mut BTableHeader);

    let b_sys = Box::leak(Box::new(BSysTable {
        header: BTableHeader::new(B_SYS),
        flags: 0,
        smbios_addr: platform.smbios_addr(),
        rsdp_addr: platform.rsdp_addr(),
        uefi_system_table: 0,
    }));
    link_table(&mut last, b_sys as *mut BSysTable as *mut BTableHeader);

    let b_memmap = Box::leak(Box::new(build_memmap_table(platform.memory_map())));
    link_table(&mut last, b_memmap as *mut BMemmapTable as *mut BTableHeader);

    let b_loader = Box::leak(Box::new(BLoaderTable {
        header: BTableHeader::new(B_LOADER),
        name: leak_str(entry.get("name").unwrap_or("fzboot")),
    }));
    link_table(&mut last, b_loader as *mut BLoaderTable as *mut BTableHeader);

    if let Some(args) = entry.get("args") {
        let b_cmd = Box::leak(Box::new(BCmdTable {
            header: BTableHeader::new(B_CMD),
            cmd: leak_str(args),
        }));
        link_table(&mut last, b_cmd as *mut BCmdTable as *mut BTableHeader);
    }

    let (boot_drive, boot_partition_start) = platform.boot_drive();
    let b_bdrive = Box::leak(Box::new(BBdriveTable {
        header: BTableHeader::new(B_BDRIVE),
        drive_type: *b"unknown\0",
        partition_format: 0,
        signature: [0; 16],
        part_num: boot_drive,
        other: (boot_partition_start & 0xFFFF_FFFF) as u32,
    }));
    link_table(&mut last, b_bdrive as *mut BBdriveTable as *mut BTableHeader);

    load_kernel_segments(&image, platform, offset)?;

    if root.flags & K_ROOT_KEEP_SERVICES == 0 {
        platform.exit_boot_services();
        b_root.flags |= B_ROOT_SERVICES_EXITED;
    }

    // The memory map changed shape as the kernel image and every module were placed; rebuild it
    // wholesale rather than appending, preserving the chain link already threaded to it.
    let preserved_next = b_memmap.header.next;
    *b_memmap = build_memmap_table(platform.memory_map());
    b_memmap.header.next = preserved_next;

    finalize_checksums(b_root);
    platform.disable_interrupts();
    platform.flush_screen();

    info!("ubi", "calling kernel entry");

    let is_pe = matches!(image, KernelImage::Pe(_));

    // SAFETY: every table above has been fully initialised and checksummed, and the kernel
    // segments have just been placed at their final, relocated virtual addresses.
    unsafe { call_kernel(image.entry() + offset, b_root as *const BRootTable as u64, is_pe) }
}

fn validate_root(root: &KRootTable) -> Result<(), LoaderError> {
    if root.min_version_major as u32 > UBI_VERSION || root.min_version_minor as u32 > UBI_VERSION_MINOR
    {
        return Err(LoaderError::Unsupported);
    }
    if root.bits != IMPLEMENTED_BITS {
        return Err(LoaderError::Unsupported);
    }
    Ok(())
}

fn resolve_offset(
    image: &KernelImage<'_>,
    mem: Option<&KMemTable>,
    disable_kaslr: bool,
    image_size: u64,
    platform: &mut dyn UbiPlatform,
) -> Result<u64, LoaderError> {
    match mem {
        Some(mem) => resolve_kernel_offset(
            image.is_pie(),
            mem.flags & K_MEM_KASLR != 0,
            disable_kaslr,
            mem.kernel_base,
            mem.kaslr_size,
            image_size,
            platform.random_u64(),
        ),
        None => Ok(0),
    }
}

fn build_video_table(vid: &KVidTable, platform: &mut dyn UbiPlatform) -> BVidTable {
    let want_clear = vid.flags & VID_CLEAR_SCREEN != 0;
    let requested = if vid.flags & VID_MODE_MASK == VID_TEXT {
        VideoRequest::Text
    } else {
        VideoRequest::Graphics {
            width: vid.width,
            height: vid.height,
            bpp: vid.bpp,
        }
    };

    let adopted = platform.set_video_mode(requested);

    let mut flags = if adopted.text { VID_TEXT } else { VID_GRAPHICS };
    if want_clear {
        flags |= VID_CLEAR_SCREEN;
    }

    BVidTable {
        header: BTableHeader::new(B_VID),
        flags,
        width: adopted.width,
        height: adopted.height,
        bpp: adopted.bpp,
        pitch: adopted.pitch,
        framebuffer: adopted.framebuffer,
        cursor_x: 0,
        cursor_y: 0,
    }
}

fn build_module_table(modules: &[modules::LoadedModule]) -> BModuleTable {
    let mut entries = Vec::with_capacity(modules.len());
    for module in modules {
        entries.push(BModuleEntry {
            path: leak_str(&module.path),
            load_address: module.load_address,
            size: module.size,
        });
    }
    let entries = Box::leak(entries.into_boxed_slice());

    BModuleTable {
        header: BTableHeader::new(B_MOD),
        flags: 0,
        length: entries.len() as u32,
        modules: entries.as_ptr() as u64,
    }
}

fn build_memmap_table(regions: Vec<MemRegion>) -> BMemmapTable {
    let mut entries = Vec::with_capacity(regions.len());
    for region in regions {
        entries.push(BMemmapEntry {
            base: region.base,
            size: region.size,
            mem_type: region.mem_type as u32,
            reserved: 0,
        });
    }
    let entries = Box::leak(entries.into_boxed_slice());

    BMemmapTable {
        header: BTableHeader::new(B_MEMMAP),
        flags: 0,
        length: entries.len() as u32,
        entries: entries.as_ptr() as u64,
    }
}

/// Leaks an owned copy of `s`, NUL-terminated, returning its stable virtual address.
///
/// Every string referenced from a `B_*` table (module paths, command line, loader name) must
/// outlive the kernel call; there is no point at which this crate ever frees it again.
fn leak_str(s: &str) -> u64 {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    let leaked = Box::leak(bytes.into_boxed_slice());
    leaked.as_ptr() as u64
}

/// Resolves and performs the bootloader's own relocation (§4.4.6, amd64 only). Must run before
/// any `B_*` table is built: every pointer this loader hands the kernel lives inside its own
/// footprint, and there is no pointer registry to fix those up after the fact once tables exist.
#[cfg_attr(not(feature = "x86_64"), allow(unused_variables))]
fn relocate_self(
    platform: &mut dyn UbiPlatform,
    kernel_min: u64,
    kernel_max: u64,
) -> Result<(), LoaderError> {
    #[cfg(feature = "x86_64")]
    {
        let loader_size = 0x10_0000u64;
        let usable_memory = 0x1_0000_0000u64;
        let base = choose_relocation_base(
            RELOCATION_PREFERRED_BASE,
            kernel_min,
            kernel_max,
            loader_size,
            usable_memory,
        )?;
        platform.relocate_self(base)?;
    }

    Ok(())
}

/// Loads every loadable segment of the kernel image into its final, offset virtual address.
/// Placement doesn't move the bootloader's own address space, so unlike [`relocate_self`] this
/// can happen after every `B_*` table has already been built.
fn load_kernel_segments(
    image: &KernelImage<'_>,
    platform: &mut dyn UbiPlatform,
    offset: u64,
) -> Result<(), LoaderError> {
    for (bytes, dest_vaddr, mem_size) in image.load_segments() {
        let dest = dest_vaddr + offset;
        let page_start = dest & !(platform::PAGE_SIZE - 1);
        let page_end = (dest + mem_size + platform::PAGE_SIZE - 1) & !(platform::PAGE_SIZE - 1);
        let mut va = page_start;
        while va < page_end {
            if !platform.vmem().is_mapped(va) {
                let pa = platform.vmem().claim_frame()?;
                platform.vmem().map_page(va, pa, UbiMemType::Os)?;
            }
            va += platform::PAGE_SIZE;
        }

        // SAFETY: every page in `[page_start, page_end)` was just mapped above.
        unsafe {
            let dest_ptr = dest as *mut u8;
            core::ptr::write_bytes(dest_ptr, 0, mem_size as usize);
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), dest_ptr, bytes.len());
        }
    }

    Ok(())
}

/// Walks the finished chain from `root` and computes every table's checksum (§4.4.7).
fn finalize_checksums(root: &mut BRootTable) {
    let mut cursor = root as *mut BRootTable as *mut BTableHeader;
    while !cursor.is_null() {
        // SAFETY: every table in the chain was built by this module and is still alive.
        unsafe {
            let magic = (*cursor).magic;
            let size = table_size(magic);
            set_checksum(cursor, size);
            cursor = (*cursor).next as *mut BTableHeader;
        }
    }
}

/// Indirectly calls the kernel entry point, passing the `B_ROOT` table pointer (§4.4.8).
///
/// `is_pe` selects the calling convention: the Microsoft x64 ABI (first argument in `rcx`) for a
/// `PE` kernel, the System V ABI (first argument in `rdi`) for an `ELF` one.
///
/// # Safety
/// `entry` must be a valid, executable virtual address conforming to the UBI kernel-call ABI;
/// `b_root` must address a fully-initialised, checksummed `B_ROOT` chain.
#[cfg(feature = "real")]
unsafe fn call_kernel(entry: u64, b_root: u64, is_pe: bool) -> Result<Infallible, LoaderError> {
    let status: u16;
    if is_pe {
        core::arch::asm!(
            "call {entry}",
            entry = in(reg) entry,
            in("rcx") b_root,
            lateout("ax") status,
        );
    } else {
        core::arch::asm!(
            "call {entry}",
            entry = in(reg) entry,
            in("rdi") b_root,
            lateout("ax") status,
        );
    }
    Err(status_to_error(status))
}

#[cfg(not(feature = "real"))]
unsafe fn call_kernel(_entry: u64, _b_root: u64, _is_pe: bool) -> Result<Infallible, LoaderError> {
    unreachable!("kernel handoff requires the `real` feature")
}

/// The kernel call returns control only on failure; a `Success` status making it back here means
/// the kernel itself gave up and handed control back, which is still reported as a failure.
fn status_to_error(status: u16) -> LoaderError {
    match status {
        10 => LoaderError::Unsupported,
        11 => LoaderError::InvalidFormat,
        12 => LoaderError::Unavailable,
        13 => LoaderError::OutOfMemory,
        14 => LoaderError::NotFound,
        15 => LoaderError::IoError,
        0 => LoaderError::Exception(Box::new(UbiStatus::Success)),
        _ => LoaderError::Exception(Box::new(UbiStatus::Error)),
    }
}

impl crate::errors::BaseError for UbiStatus {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_root_rejects_unimplemented_version() {
        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: (UBI_VERSION + 1) as u8,
            min_version_minor: 0,
            bits: IMPLEMENTED_BITS,
            flags: 0,
        };
        assert!(matches!(validate_root(&root), Err(LoaderError::Unsupported)));
    }

    #[test]
    fn validate_root_rejects_mismatched_bits() {
        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: 1,
            min_version_minor: 0,
            bits: if IMPLEMENTED_BITS == 64 { 32 } else { 64 },
            flags: 0,
        };
        assert!(matches!(validate_root(&root), Err(LoaderError::Unsupported)));
    }

    #[test]
    fn validate_root_rejects_unimplemented_minor_version() {
        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: UBI_VERSION as u8,
            min_version_minor: (UBI_VERSION_MINOR + 1) as u8,
            bits: IMPLEMENTED_BITS,
            flags: 0,
        };
        assert!(matches!(validate_root(&root), Err(LoaderError::Unsupported)));
    }

    #[test]
    fn validate_root_accepts_matching_chain() {
        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: 1,
            min_version_minor: 0,
            bits: IMPLEMENTED_BITS,
            flags: 0,
        };
        assert!(validate_root(&root).is_ok());
    }
}
