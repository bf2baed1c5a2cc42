//! UBI boot-table chain: magics, wire layouts, and the checksum/link helpers shared by every
//! table the UBI loader constructs.

use bytemuck::{Pod, Zeroable};

/// Implemented major version of the Universal Boot Interface.
pub const UBI_VERSION: u32 = 1;
/// Implemented minor version of the Universal Boot Interface.
pub const UBI_VERSION_MINOR: u32 = 0;

pub const K_ROOT: u64 = 0x4083_F3EC_5249_4255;
pub const B_ROOT: u64 = 0xC0D3_16DC_4249_4255;
pub const K_MEM: u64 = 0x008A_B29D_204D_454D;
pub const B_MEM: u64 = 0x80FE_B99D_204D_454D;
pub const K_VID: u64 = 0x00C0_A7BA_4449_5656;
pub const B_VID: u64 = 0x800C_881E_4449_5656;
pub const K_MOD: u64 = 0x00EB_C9E6_5344_4F4D;
pub const B_MOD: u64 = 0x808E_B4AD_5344_4F4D;
pub const B_SYS: u64 = 0x801A_D6E7_5F53_5953;
pub const B_MEMMAP: u64 = 0x80F6_04C7_5041_4D4D;
pub const B_LOADER: u64 = 0x8083_AE86_2042_4C42;
pub const B_CMD: u64 = 0x80A4_F8A3_4C44_4D43;
pub const B_BDRIVE: u64 = 0x80C8_CDA8_5652_4442;

/// The `{magic, next}` pair common to every table header, kernel-declared or bootloader-built.
/// Used to peek at an unknown table while walking the chain, before reading its concrete type.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ChainHeader {
    pub magic: u64,
    pub next: u64,
}

/// Header of a kernel-declared (`K_*`) table: no checksum, since the kernel image is never
/// mutated by the loader.
pub type KTableHeader = ChainHeader;

impl KTableHeader {
    pub fn new(magic: u64) -> Self {
        Self { magic, next: 0 }
    }
}

/// Header of a bootloader-built (`B_*`) table.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BTableHeader {
    pub magic: u64,
    pub next: u64,
    pub checksum: u32,
}

impl BTableHeader {
    pub fn new(magic: u64) -> Self {
        Self {
            magic,
            next: 0,
            checksum: 0,
        }
    }
}

/// Status codes exchanged with the kernel over the UBI call, as published in the protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbiStatus {
    Success = 0,
    Error = 1,
    Unsupported = 10,
    Invalid = 11,
    Unavailable = 12,
    OutOfMemory = 13,
    NotFound = 14,
    IoError = 15,
}

/// Returns the wire size of the table identified by `magic`, the way the loader's own
/// `B_*`/`K_*` struct definitions fix it — there is no `size` field in the header itself.
pub fn table_size(magic: u64) -> usize {
    match magic {
        K_ROOT => core::mem::size_of::<KRootTable>(),
        K_MEM => core::mem::size_of::<KMemTable>(),
        K_VID => core::mem::size_of::<KVidTable>(),
        K_MOD => core::mem::size_of::<KModTable>(),
        B_ROOT => core::mem::size_of::<BRootTable>(),
        B_MEM => core::mem::size_of::<BMemTable>(),
        B_VID => core::mem::size_of::<BVidTable>(),
        B_MOD => core::mem::size_of::<BModuleTable>(),
        B_SYS => core::mem::size_of::<BSysTable>(),
        B_MEMMAP => core::mem::size_of::<BMemmapTable>(),
        B_LOADER => core::mem::size_of::<BLoaderTable>(),
        B_CMD => core::mem::size_of::<BCmdTable>(),
        B_BDRIVE => core::mem::size_of::<BBdriveTable>(),
        _ => core::mem::size_of::<ChainHeader>(),
    }
}

/// Computes and stores the checksum for a just-finalised table, so that the sum of every byte
/// from `header + size_of::<BTableHeader>()` up to `header + total_size` is zero, modulo 2^32.
///
/// # Safety
/// `table` must point to a valid, fully-initialised table of at least `total_size` bytes.
pub unsafe fn set_checksum(table: *mut BTableHeader, total_size: usize) {
    let header = &mut *table;
    header.checksum = 0;

    let bytes = core::slice::from_raw_parts(table as *const u8, total_size);
    let body = &bytes[core::mem::size_of::<BTableHeader>()..];

    let sum: u32 = body.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    header.checksum = 0u32.wrapping_sub(sum);
}

/// Links `new_table` after the table most recently constructed, and advances the cursor.
///
/// Tables are emitted in construction order (`B_ROOT → B_MEM → B_VID → B_MOD → B_SYS → B_MEMMAP →
/// B_LOADER → B_CMD → B_BDRIVE`); this just threads `next` pointers as each is built.
pub fn link_table(last: &mut *mut BTableHeader, new_table: *mut BTableHeader) {
    unsafe {
        if !last.is_null() {
            (**last).next = new_table as u64;
        }
    }
    *last = new_table;
}

/// `B_ROOT.flags` bit: firmware is UEFI rather than legacy BIOS.
pub const B_ROOT_FIRMWARE_UEFI: u32 = 1 << 0;
/// `B_ROOT.flags` bit: boot services have been exited; set once, never cleared.
pub const B_ROOT_SERVICES_EXITED: u32 = 1 << 2;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BRootTable {
    pub header: BTableHeader,
    pub spec_version_major: u8,
    pub spec_version_minor: u8,
    pub reserved: u16,
    pub flags: u32,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BMemTable {
    pub header: BTableHeader,
    pub flags: u32,
    pub heap_location: u64,
    pub heap_size: u64,
    pub stack_location: u64,
    pub stack_size: u64,
    pub id_map_location: u64,
    pub id_map_size: u64,
    pub kernel_base: u64,
}

/// `BVidTable.flags`/`KVidTable.flags` bit: a text-mode console was adopted.
pub const VID_TEXT: u32 = 1 << 0;
/// `BVidTable.flags`/`KVidTable.flags` bit: a graphics mode was adopted (or requested).
pub const VID_GRAPHICS: u32 = 1 << 1;
/// `BVidTable.flags` bit: the screen should be (or was) cleared once adopted.
pub const VID_CLEAR_SCREEN: u32 = 1 << 2;
/// Mask over `KVidTable.flags` selecting which of [`VID_TEXT`]/[`VID_GRAPHICS`] was requested.
pub const VID_MODE_MASK: u32 = 0x3;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BVidTable {
    pub header: BTableHeader,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub pitch: u32,
    pub framebuffer: u64,
    pub cursor_x: u32,
    pub cursor_y: u32,
}

/// One bootloader-built module entry: `{path, load_address, size}` (§4.4.4).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BModuleEntry {
    pub path: u64,
    pub load_address: u64,
    pub size: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BModuleTable {
    pub header: BTableHeader,
    pub flags: u32,
    pub length: u32,
    pub modules: u64,
    // `length` [`BModuleEntry`] records live at VA `modules`, not inline in this struct, so the
    // table itself stays a fixed size regardless of how many modules were loaded.
}

/// `BSysTable.flags` mask: SMBIOS entry-point version found (0 = none, 2 = `_SM_`, 3 = `_SM3_`).
pub const SYS_SMBIOS_VERSION_MASK: u32 = 0xF;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BSysTable {
    pub header: BTableHeader,
    pub flags: u32,
    pub smbios_addr: u64,
    pub rsdp_addr: u64,
    pub uefi_system_table: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BMemmapEntry {
    pub base: u64,
    pub size: u64,
    pub mem_type: u32,
    pub reserved: u32,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BMemmapTable {
    pub header: BTableHeader,
    pub flags: u32,
    pub length: u32,
    pub entries: u64,
    // `length` [`BMemmapEntry`] records live at VA `entries`; rebuilt wholesale on every
    // post-init pass (§4.4.1 step 7), so it is never appended to in place.
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BLoaderTable {
    pub header: BTableHeader,
    pub name: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BCmdTable {
    pub header: BTableHeader,
    pub cmd: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BBdriveTable {
    pub header: BTableHeader,
    pub drive_type: [u8; 8],
    pub partition_format: u16,
    pub signature: [u8; 16],
    pub part_num: u32,
    pub other: u32,
}

/// Kernel-declared root table (`K_ROOT`), embedded in the kernel image at `ubi_header`/`.ubihdr`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KRootTable {
    pub header: KTableHeader,
    pub min_version_major: u8,
    pub min_version_minor: u8,
    pub bits: u16,
    pub flags: u32,
}

/// `K_ROOT.flags` bit requesting that boot services remain available past the kernel call.
pub const K_ROOT_KEEP_SERVICES: u32 = 1 << 2;

/// `K_MEM.flags`/`B_MEM.flags` bit: the kernel's own base is eligible for KASLR.
pub const K_MEM_KASLR: u32 = 1 << 0;
/// `K_MEM.flags` bit: the kernel wants extended (5-level) paging. Declared for completeness;
/// the loader does not yet act on it.
pub const K_MEM_EXT_PAGING: u32 = 1 << 1;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KMemTable {
    pub header: KTableHeader,
    pub flags: u32,
    pub heap_location: u64,
    pub heap_size: u64,
    pub stack_location: u64,
    pub stack_size: u64,
    pub id_map_location: u64,
    pub id_map_size: u64,
    pub kernel_base: u64,
    pub kaslr_size: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KVidTable {
    pub header: KTableHeader,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
}

/// One kernel-declared module request: `{path, load_address}`. `path` may be a zero in-file
/// value on a position-independent image, resolved through `.rela.dyn` (§4.2); `load_address`
/// zero means "anywhere".
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KModuleEntry {
    pub path: u64,
    pub load_address: u64,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KModTable {
    pub header: KTableHeader,
    pub flags: u32,
    pub length: u32,
    // `length` [`KModuleEntry`] records follow immediately in memory (inline, unlike the
    // bootloader-built module table, since the kernel image lays them out at link time).
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_zeroes_trailing_sum() {
        let mut table = BSysTable {
            header: BTableHeader::new(B_SYS),
            flags: 0,
            smbios_addr: 0xDEAD_BEEF,
            rsdp_addr: 0xF00D,
            uefi_system_table: 0,
        };

        unsafe {
            set_checksum(
                &mut table as *mut BSysTable as *mut BTableHeader,
                core::mem::size_of::<BSysTable>(),
            )
        };

        let bytes = bytemuck::bytes_of(&table);
        let body = &bytes[core::mem::size_of::<BTableHeader>()..];
        let sum: u32 = body.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
        assert_eq!(sum, 0);
    }

    #[test]
    fn link_table_threads_next_pointers() {
        let mut root = BRootTable {
            header: BTableHeader::new(B_ROOT),
            spec_version_major: UBI_VERSION as u8,
            spec_version_minor: 0,
            reserved: 0,
            flags: 0,
        };
        let mut sys = BSysTable {
            header: BTableHeader::new(B_SYS),
            flags: 0,
            smbios_addr: 0,
            rsdp_addr: 0,
            uefi_system_table: 0,
        };

        let mut last: *mut BTableHeader = core::ptr::null_mut();
        link_table(&mut last, &mut root as *mut BRootTable as *mut BTableHeader);
        link_table(&mut last, &mut sys as *mut BSysTable as *mut BTableHeader);

        assert_eq!(root.header.next, &sys as *const BSysTable as u64);
    }

    #[test]
    fn table_size_matches_concrete_struct() {
        assert_eq!(table_size(B_MEM), core::mem::size_of::<BMemTable>());
        assert_eq!(table_size(K_MOD), core::mem::size_of::<KModTable>());
        assert_eq!(table_size(0xBAD), core::mem::size_of::<ChainHeader>());
    }

    #[test]
    fn k_root_keep_services_matches_firmware_exit_bit() {
        assert_eq!(K_ROOT_KEEP_SERVICES, B_ROOT_SERVICES_EXITED);
    }
}
