//! Internal data structures used by the `MZ`/`PE` format.
//!
//! Struct layouts follow the published Microsoft PE/COFF specification; unlike the ELF headers
//! in [`super::super::elf::header`], no reference C implementation of this format was available
//! to ground these against, so field names follow the specification's own naming.

use bytemuck::{Pod, Zeroable};
use pod_enum::pod_enum;

/// `e_magic` value of a valid DOS/MZ header (`"MZ"`).
pub const MZ_MAGIC: [u8; 2] = [b'M', b'Z'];

/// `Signature` value of a valid PE header (`"PE\0\0"`).
pub const PE_MAGIC: [u8; 4] = [b'P', b'E', 0, 0];

/// `IMAGE_FILE_MACHINE_I386`.
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;

/// `IMAGE_FILE_MACHINE_AMD64`.
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;

/// `IMAGE_NT_OPTIONAL_HDR64_MAGIC`.
pub const PE32_PLUS_MAGIC: u16 = 0x020B;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct DosHeader {
    pub e_magic: [u8; 2],
    pub e_cblp: u16,
    pub e_cp: u16,
    pub e_crlc: u16,
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    pub e_ss: u16,
    pub e_sp: u16,
    pub e_csum: u16,
    pub e_ip: u16,
    pub e_cs: u16,
    pub e_lfarlc: u16,
    pub e_ovno: u16,
    pub e_res: [u16; 4],
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_res2: [u16; 10],

    /// File offset of the PE header.
    pub e_lfanew: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CoffFileHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// `IMAGE_OPTIONAL_HEADER64`, the only optional-header flavor this loader accepts
/// (a 64-bit bootloader only ever loads `PE32+` kernels).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct OptionalHeader64 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_os_version: u16,
    pub minor_os_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

#[repr(transparent)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SectionCharacteristics(pub u32);

impl SectionHeader {
    /// Returns this section's name, stripped of its trailing NUL padding.
    ///
    /// Section names longer than 8 bytes (stored via the string table) are not supported; the
    /// `.ubihdr` section name used by this loader always fits.
    pub fn name_str(&self) -> Option<&str> {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        core::str::from_utf8(&self.name[..end]).ok()
    }
}

#[pod_enum]
#[repr(u16)]
pub enum PeMachine {
    I386 = 0x014C,
    Amd64 = 0x8664,
}
