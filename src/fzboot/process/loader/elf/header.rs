//! Internal data structures used by the `ELF` format.

use bytemuck::{Pod, Zeroable};
use pod_enum::pod_enum;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfHeader64 {
    /// Contains architecture independent information on how to decode the file's content.
    pub ident: ElfIdentification,

    /// Identifies the object file type.
    pub file_type: ElfFileType,

    /// Used to specify the required architecture for this file.
    pub arch: ElfMachineArch,

    /// Identifies the object file version.
    pub version: u32,

    /// Virtual address used when starting the process.
    pub entry: u64,

    /// Offset of the program header table (in bytes).
    pub prog_header_offset: u64,

    /// Offset of the section header table (in bytes).
    pub sect_header_offset: u64,

    /// Architecture-specific flags associated to this file.
    pub flags: u32,

    /// ELF Header size (in bytes).
    pub header_size: u16,

    /// Size of a single entry in the program header table (in bytes).
    pub prog_header_size: u16,

    /// Number of entries in the program header table.
    pub prog_header_entries_count: u16,

    /// Size of a section header (in bytes).
    pub sect_header_size: u16,

    /// Number of entries in the section header table.
    pub sect_header_entries_count: u16,

    /// Section header table index of the entry associated with the section name string table.
    pub sect_name_string_table_idx: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfSectionHeader64 {
    pub name: u32,
    pub section_type: ElfSectionType,
    pub section_flags: ElfSectionFlags,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addr_align: u64,
    pub entry_size: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfSymbolTableEntry64 {
    pub name: u32,
    pub info: ElfSymbolInfo,
    pub reserved: u8,
    pub section_table_idx: u16,
    pub symbol_value: u64,
    pub size: u64,
}

#[repr(transparent)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfSymbolInfo(pub u8);

#[repr(transparent)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfSectionFlags(pub u64);

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfRelEntry {
    pub address: u64,
    pub info: ElfRelInfo,
}

/// `.rela.dyn` / `.rela.plt` entry.
///
/// Used by [`super::ElfImage::reldyn_addend`] to resolve pointer fields that are zero in-file
/// on `ET_DYN` images.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfRelaEntry {
    pub offset: u64,
    pub info: ElfRelInfo,
    pub addend: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfProgramHeaderEntry {
    pub seg_type: ElfSegmentType,
    pub flags: ElfSegmentFlags,
    pub offset: u64,
    pub virt_addr: u64,
    pub reserved: u64,
    pub file_seg_size: u64,
    pub mem_seg_size: u64,
    pub align: u64,
}

#[pod_enum]
#[repr(u32)]
pub enum ElfSegmentType {
    Null = 0,
    Load = 1,
    Dynamic = 2,
    Interpreter = 3,
    Note = 4,
    ProgramHeaderTable = 6,
}

#[repr(transparent)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfSegmentFlags(pub u32);

#[repr(transparent)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfRelInfo(pub u64);

#[pod_enum]
#[repr(u32)]
pub enum ElfSectionType {
    Null = 0,
    ProgBits = 1,
    SymbolTable = 2,
    StringTable = 3,
    Rela = 4,
    SymbolHashTable = 5,
    DynamicLinkingTable = 6,
    NoteInformation = 7,
    NoBits = 8,
    Rel = 9,
    DynamicSymbolTable = 11,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ElfIdentification {
    /// Contains a magic number, used to identify `ELF` files.
    pub magic: [u8; 4],

    /// Identifies the file class (or capacity).
    pub class: ElfClass,

    /// Specifies the encoding of the processor-specific data in the object file.
    pub encoding: ElfDataEncoding,

    /// `ELF` header version number.
    pub version: u8,

    pub os_abi: ElfOsAbiIdent,
    pub abi_version: u8,
    pub reserved: [u8; 7],
}

/// Magic number expected at the start of [`ElfIdentification::magic`] (`\x7fELF`).
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

#[pod_enum]
#[repr(u8)]
pub enum ElfClass {
    None = 0,
    Class32 = 1,
    Class64 = 2,
}

#[pod_enum]
#[repr(u8)]
pub enum ElfDataEncoding {
    None = 0,
    Lsb = 1,
    Msb = 2,
}

#[pod_enum]
#[repr(u8)]
pub enum ElfOsAbiIdent {
    SysV = 0,
    HPUX = 1,
    Standalone = 0xFF,
}

#[pod_enum]
#[repr(u16)]
pub enum ElfFileType {
    None = 0,
    Reloc = 1,
    Exec = 2,
    SharedObject = 3,
    Core = 4,
}

/// `EM_386`, the machine value for 32-bit x86.
pub const EM_386: u16 = 3;

/// `EM_X86_64`, the machine value for amd64.
pub const EM_X86_64: u16 = 62;

#[pod_enum]
#[repr(u16)]
pub enum ElfMachineArch {
    None = 0,
    I386 = 3,
    Amd64 = 62,
}
