//! `ELF64` kernel image parsing.
//!
//! Identifies loadable segments, locates the kernel-embedded UBI header (by symbol or by
//! section), and resolves pointer fields that are left zero in-file on position-independent
//! (`ET_DYN`) images via `.rela.dyn`.

use bytemuck::pod_read_unaligned;

use crate::errors::LoaderError;

pub mod header;

use header::{
    ElfFileType, ElfHeader64, ElfMachineArch, ElfProgramHeaderEntry, ElfRelaEntry,
    ElfSectionHeader64, ElfSectionType, ElfSegmentType, ElfSymbolTableEntry64, ELF_MAGIC,
};

/// Name of the symbol the UBI header may be exposed under.
const UBI_HEADER_SYMBOL: &str = "ubi_header";

/// Name of the section the UBI header may be placed in, if not exposed as a symbol.
const UBI_HEADER_SECTION: &str = ".ubihdr";

/// A parsed `ELF64` kernel image, borrowing the raw file bytes it was built from.
pub struct ElfImage<'a> {
    bytes: &'a [u8],
    header: ElfHeader64,
}

impl<'a> ElfImage<'a> {
    /// Parses `bytes` as an `ELF64` image, validating the magic and the machine type.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LoaderError> {
        if bytes.len() < core::mem::size_of::<ElfHeader64>() {
            return Err(LoaderError::InvalidFormat);
        }

        let header: ElfHeader64 =
            pod_read_unaligned(&bytes[..core::mem::size_of::<ElfHeader64>()]);

        if header.ident.magic != ELF_MAGIC {
            return Err(LoaderError::InvalidFormat);
        }

        let expected_arch = if cfg!(feature = "x86_64") {
            ElfMachineArch::Amd64
        } else {
            ElfMachineArch::I386
        };
        if header.arch != expected_arch {
            return Err(LoaderError::Unsupported);
        }

        Ok(Self { bytes, header })
    }

    /// True if this image is position-independent (`ET_DYN`).
    pub fn is_pie(&self) -> bool {
        self.header.file_type == ElfFileType::SharedObject
    }

    pub fn entry(&self) -> u64 {
        self.header.entry
    }

    fn program_headers(&self) -> impl Iterator<Item = ElfProgramHeaderEntry> + '_ {
        let start = self.header.prog_header_offset as usize;
        let size = self.header.prog_header_size as usize;
        let count = self.header.prog_header_entries_count as usize;

        (0..count).filter_map(move |i| {
            let off = start + i * size;
            self.bytes
                .get(off..off + core::mem::size_of::<ElfProgramHeaderEntry>())
                .map(pod_read_unaligned)
        })
    }

    fn section_headers(&self) -> impl Iterator<Item = ElfSectionHeader64> + '_ {
        let start = self.header.sect_header_offset as usize;
        let size = self.header.sect_header_size as usize;
        let count = self.header.sect_header_entries_count as usize;

        (0..count).filter_map(move |i| {
            let off = start + i * size;
            self.bytes
                .get(off..off + core::mem::size_of::<ElfSectionHeader64>())
                .map(pod_read_unaligned)
        })
    }

    fn shstrtab(&self) -> Option<&'a [u8]> {
        let idx = self.header.sect_name_string_table_idx as usize;
        let sh: ElfSectionHeader64 = self.section_headers().nth(idx)?;
        self.bytes
            .get(sh.offset as usize..(sh.offset + sh.size) as usize)
    }

    fn section_name(&self, sh: &ElfSectionHeader64, shstrtab: &[u8]) -> Option<&'a str> {
        let start = sh.name as usize;
        let end = shstrtab[start..].iter().position(|&b| b == 0)? + start;
        core::str::from_utf8(&shstrtab[start..end]).ok()
    }

    /// Returns the minimum and maximum virtual address covered by `PT_LOAD` segments.
    pub fn vaddr_range(&self) -> Result<(u64, u64), LoaderError> {
        let mut min = u64::MAX;
        let mut max = 0u64;

        for ph in self.program_headers() {
            if ph.seg_type != ElfSegmentType::Load {
                continue;
            }
            min = min.min(ph.virt_addr);
            max = max.max(ph.virt_addr + ph.mem_seg_size);
        }

        if max <= min {
            return Err(LoaderError::InvalidFormat);
        }

        Ok((min, max))
    }

    /// Iterates over `PT_LOAD` segments as `(file bytes, destination virtual address, memory
    /// size)` triples; `file bytes` may be shorter than `memory size`, the remainder is BSS and
    /// must be zeroed by the caller.
    pub fn load_segments(&self) -> impl Iterator<Item = (&'a [u8], u64, u64)> + '_ {
        self.program_headers().filter_map(move |ph| {
            if ph.seg_type != ElfSegmentType::Load {
                return None;
            }
            let file_bytes = self
                .bytes
                .get(ph.offset as usize..(ph.offset + ph.file_seg_size) as usize)?;
            Some((file_bytes, ph.virt_addr, ph.mem_seg_size))
        })
    }

    /// Translates a virtual address to its offset in the file, by locating the `PT_LOAD`
    /// segment it falls within.
    pub fn file_addr(&self, vaddr: u64) -> Option<usize> {
        self.program_headers().find_map(|ph| {
            if ph.seg_type != ElfSegmentType::Load {
                return None;
            }
            if vaddr >= ph.virt_addr && vaddr < ph.virt_addr + ph.file_seg_size {
                Some((ph.offset + (vaddr - ph.virt_addr)) as usize)
            } else {
                None
            }
        })
    }

    /// Locates the kernel-declared `ubi_header` (`K_ROOT` chain root), by symbol name first,
    /// falling back to the `.ubihdr` section.
    pub fn find_ubi_header(&self) -> Result<u64, LoaderError> {
        if let Some(vaddr) = self.find_symbol(UBI_HEADER_SYMBOL) {
            return Ok(vaddr);
        }
        if let Some(vaddr) = self.find_section_vaddr(UBI_HEADER_SECTION) {
            return Ok(vaddr);
        }
        Err(LoaderError::NotFound)
    }

    fn find_symbol(&self, name: &str) -> Option<u64> {
        let shstrtab = self.shstrtab()?;

        let symtab_sh = self.section_headers().find(|sh| {
            sh.section_type == ElfSectionType::SymbolTable
                || sh.section_type == ElfSectionType::DynamicSymbolTable
        })?;
        let strtab_sh = self
            .section_headers()
            .nth(symtab_sh.link as usize)
            .filter(|sh| sh.section_type == ElfSectionType::StringTable)?;

        let strtab = self
            .bytes
            .get(strtab_sh.offset as usize..(strtab_sh.offset + strtab_sh.size) as usize)?;

        let entry_size = core::mem::size_of::<ElfSymbolTableEntry64>();
        let count = (symtab_sh.size as usize) / entry_size;

        for i in 0..count {
            let off = symtab_sh.offset as usize + i * entry_size;
            let entry: ElfSymbolTableEntry64 =
                pod_read_unaligned(self.bytes.get(off..off + entry_size)?);

            let name_start = entry.name as usize;
            let name_end = strtab[name_start..].iter().position(|&b| b == 0)? + name_start;
            let sym_name = core::str::from_utf8(&strtab[name_start..name_end]).ok()?;

            if sym_name == name {
                return Some(entry.symbol_value);
            }
        }

        let _ = shstrtab;
        None
    }

    fn find_section_vaddr(&self, name: &str) -> Option<u64> {
        let shstrtab = self.shstrtab()?;
        self.section_headers()
            .find(|sh| self.section_name(sh, shstrtab) == Some(name))
            .map(|sh| sh.addr)
    }

    /// Scans `.rela.dyn` for an entry relocating `vaddr`, returning its addend.
    ///
    /// Used to resolve pointer fields of the UBI table chain that are zero in-file on `ET_DYN`
    /// images, since the loader (not the dynamic linker) is the one performing the rebase.
    pub fn reldyn_addend(&self, vaddr: u64) -> Option<u64> {
        let shstrtab = self.shstrtab()?;
        let rela_sh = self.section_headers().find(|sh| {
            sh.section_type == ElfSectionType::Rela
                && self.section_name(sh, shstrtab) == Some(".rela.dyn")
        })?;

        let entry_size = core::mem::size_of::<ElfRelaEntry>();
        let count = (rela_sh.size as usize) / entry_size;

        for i in 0..count {
            let off = rela_sh.offset as usize + i * entry_size;
            let entry: ElfRelaEntry = pod_read_unaligned(self.bytes.get(off..off + entry_size)?);
            if entry.offset == vaddr {
                return Some(entry.addend);
            }
        }

        None
    }

    /// Returns the `len` raw file bytes backing the `PT_LOAD` segment containing `vaddr`, if any.
    pub fn bytes_at(&self, vaddr: u64, len: usize) -> Option<&'a [u8]> {
        let off = self.file_addr(vaddr)?;
        self.bytes.get(off..off + len)
    }

    /// Returns the bytes of the NUL-terminated string backing `vaddr`, NUL excluded.
    pub fn cstr_at(&self, vaddr: u64) -> Option<&'a [u8]> {
        let off = self.file_addr(vaddr)?;
        let rest = self.bytes.get(off..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        Some(&rest[..end])
    }

    /// Resolves the runtime value of a pointer-sized field at file offset `field_file_off`,
    /// whose virtual address (once the segment it lives in is known) is `field_vaddr`.
    ///
    /// If the raw in-file value is non-zero, it is returned as-is (already a valid runtime
    /// pointer for non-PIE images); otherwise the `.rela.dyn` addend for `field_vaddr` is used.
    /// A field with no matching relocation resolves to `0` rather than failing: a `next` pointer
    /// resolved this way is how a `K_*` chain terminates (mirrors `ubi_get_elf_reldyn_var_addr`,
    /// which returns `0` on no match).
    pub fn resolve_pointer_field(
        &self,
        field_file_off: usize,
        field_vaddr: u64,
    ) -> Result<u64, LoaderError> {
        let raw = u64::from_le_bytes(
            self.bytes
                .get(field_file_off..field_file_off + 8)
                .ok_or(LoaderError::InvalidFormat)?
                .try_into()
                .map_err(|_| LoaderError::InvalidFormat)?,
        );

        if raw != 0 {
            return Ok(raw);
        }

        Ok(self.reldyn_addend(field_vaddr).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::header::*;
    use super::*;

    #[test]
    fn rejects_truncated_images() {
        assert!(matches!(
            ElfImage::parse(&[0u8; 4]),
            Err(LoaderError::InvalidFormat)
        ));
    }

    #[test]
    fn machine_arch_round_trips_through_repr() {
        assert_eq!(ElfMachineArch::from(EM_X86_64), ElfMachineArch::Amd64);
        assert_eq!(u16::from(ElfMachineArch::I386), EM_386);
    }
}
