//! `MZ`/`PE` kernel image parsing.

use bytemuck::pod_read_unaligned;

use crate::errors::LoaderError;

pub mod header;

use header::{
    CoffFileHeader, DosHeader, OptionalHeader64, PeMachine, SectionHeader, MZ_MAGIC, PE32_PLUS_MAGIC,
    PE_MAGIC,
};

const UBI_HEADER_SECTION: &str = ".ubihdr";

/// A parsed `MZ`/`PE` kernel image, borrowing the raw file bytes it was built from.
pub struct PeImage<'a> {
    bytes: &'a [u8],
    coff: CoffFileHeader,
    optional: OptionalHeader64,
    sections_offset: usize,
}

impl<'a> PeImage<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LoaderError> {
        if bytes.len() < core::mem::size_of::<DosHeader>() {
            return Err(LoaderError::InvalidFormat);
        }
        let dos: DosHeader = pod_read_unaligned(&bytes[..core::mem::size_of::<DosHeader>()]);
        if dos.e_magic != MZ_MAGIC {
            return Err(LoaderError::InvalidFormat);
        }

        let pe_off = dos.e_lfanew as usize;
        let sig = bytes
            .get(pe_off..pe_off + 4)
            .ok_or(LoaderError::InvalidFormat)?;
        if sig != PE_MAGIC {
            return Err(LoaderError::InvalidFormat);
        }

        let coff_off = pe_off + 4;
        let coff: CoffFileHeader = pod_read_unaligned(
            bytes
                .get(coff_off..coff_off + core::mem::size_of::<CoffFileHeader>())
                .ok_or(LoaderError::InvalidFormat)?,
        );

        let expected_machine = if cfg!(feature = "x86_64") {
            PeMachine::Amd64
        } else {
            PeMachine::I386
        };
        if PeMachine::from(coff.machine) != expected_machine {
            return Err(LoaderError::Unsupported);
        }

        let optional_off = coff_off + core::mem::size_of::<CoffFileHeader>();
        let optional: OptionalHeader64 = pod_read_unaligned(
            bytes
                .get(optional_off..optional_off + core::mem::size_of::<OptionalHeader64>())
                .ok_or(LoaderError::InvalidFormat)?,
        );
        if optional.magic != PE32_PLUS_MAGIC {
            return Err(LoaderError::Unsupported);
        }

        let sections_offset = optional_off + coff.size_of_optional_header as usize;

        Ok(Self {
            bytes,
            coff,
            optional,
            sections_offset,
        })
    }

    pub fn entry(&self) -> u64 {
        self.optional.image_base + u64::from(self.optional.address_of_entry_point)
    }

    fn sections(&self) -> impl Iterator<Item = SectionHeader> + '_ {
        let count = self.coff.number_of_sections as usize;
        let size = core::mem::size_of::<SectionHeader>();

        (0..count).filter_map(move |i| {
            let off = self.sections_offset + i * size;
            self.bytes.get(off..off + size).map(pod_read_unaligned)
        })
    }

    /// Returns the minimum and maximum virtual address spanned by this image's sections,
    /// on the same absolute (`image_base`-relative) basis as [`Self::entry`] and
    /// [`Self::find_ubi_header`].
    pub fn vaddr_range(&self) -> Result<(u64, u64), LoaderError> {
        let mut min = u64::MAX;
        let mut max = 0u64;

        for sh in self.sections() {
            let va = self.optional.image_base + u64::from(sh.virtual_address);
            min = min.min(va);
            max = max.max(va + u64::from(sh.virtual_size));
        }

        if max <= min {
            return Err(LoaderError::InvalidFormat);
        }

        Ok((min, max))
    }

    /// Iterates over sections as `(file bytes, destination virtual address, memory size)`
    /// triples; the destination address is absolute, matching [`Self::vaddr_range`].
    pub fn load_segments(&self) -> impl Iterator<Item = (&'a [u8], u64, u64)> + '_ {
        self.sections().filter_map(move |sh| {
            let file_bytes = self.bytes.get(
                sh.pointer_to_raw_data as usize
                    ..(sh.pointer_to_raw_data + sh.size_of_raw_data) as usize,
            )?;
            Some((
                file_bytes,
                self.optional.image_base + u64::from(sh.virtual_address),
                u64::from(sh.virtual_size),
            ))
        })
    }

    /// Translates an absolute virtual address to its offset in the file, by locating the
    /// section it falls within.
    pub fn file_addr(&self, vaddr: u64) -> Option<usize> {
        let rva = vaddr.checked_sub(self.optional.image_base)?;
        self.sections().find_map(|sh| {
            let start = u64::from(sh.virtual_address);
            let end = start + u64::from(sh.size_of_raw_data);
            if rva >= start && rva < end {
                Some((sh.pointer_to_raw_data as u64 + (rva - start)) as usize)
            } else {
                None
            }
        })
    }

    /// Returns the `len` raw file bytes backing the section containing `vaddr`, if any.
    pub fn bytes_at(&self, vaddr: u64, len: usize) -> Option<&'a [u8]> {
        let off = self.file_addr(vaddr)?;
        self.bytes.get(off..off + len)
    }

    /// Reads a little-endian `u64` at file offset `file_off`. `PE` pointer fields are never
    /// left zero for runtime resolution the way `ET_DYN` ELF ones are (§4.2), since this loader
    /// only supports non-relocatable `PE32+` kernels; the value read here is already final.
    pub fn read_u64(&self, file_off: usize) -> Result<u64, LoaderError> {
        let raw = self
            .bytes
            .get(file_off..file_off + 8)
            .ok_or(LoaderError::InvalidFormat)?;
        Ok(u64::from_le_bytes(raw.try_into().unwrap()))
    }

    /// Returns the bytes of the NUL-terminated string backing `vaddr`, NUL excluded.
    pub fn cstr_at(&self, vaddr: u64) -> Option<&'a [u8]> {
        let off = self.file_addr(vaddr)?;
        let rest = self.bytes.get(off..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        Some(&rest[..end])
    }

    /// Locates the kernel-declared `ubi_header` by scanning for the `.ubihdr` section.
    pub fn find_ubi_header(&self) -> Result<u64, LoaderError> {
        self.sections()
            .find(|sh| sh.name_str() == Some(UBI_HEADER_SECTION))
            .map(|sh| self.optional.image_base + u64::from(sh.virtual_address))
            .ok_or(LoaderError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_mz_images() {
        assert!(matches!(
            PeImage::parse(&[0u8; 64]),
            Err(LoaderError::InvalidFormat)
        ));
    }
}
