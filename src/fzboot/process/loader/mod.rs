//! Kernel image identification and the shared surface both image formats expose to the UBI
//! loader.

use crate::errors::LoaderError;

pub mod elf;
pub mod pe;

use elf::ElfImage;
use pe::PeImage;

/// Operations the UBI loader needs from a kernel image, regardless of its concrete format.
///
/// Implemented per-variant of [`KernelImage`] rather than as a runtime-dispatched trait object:
/// the set of supported kernel image formats is closed and known at compile time.
pub trait KernelImageOps {
    /// Virtual-address entry point, as declared in the image header (before any rebase offset).
    fn entry(&self) -> u64;

    /// Minimum and maximum virtual address spanned by this image's loadable segments.
    fn vaddr_range(&self) -> Result<(u64, u64), LoaderError>;

    /// Loadable segments as `(file bytes, destination virtual address, memory size)`.
    fn load_segments(&self) -> alloc::vec::Vec<(&[u8], u64, u64)>;

    /// Translates a virtual address into this image's file offset.
    fn file_addr(&self, vaddr: u64) -> Option<usize>;

    /// Locates the kernel-declared `K_ROOT` table, either by symbol or by section.
    fn find_ubi_header(&self) -> Result<u64, LoaderError>;

    /// True if this image was built as position-independent code.
    fn is_pie(&self) -> bool;

    /// Returns the `len` raw file bytes mapped at virtual address `vaddr`.
    ///
    /// Used by the UBI loader to walk the kernel-declared table chain in place, without copying
    /// the table bytes out of the kernel image buffer.
    fn bytes_at(&self, vaddr: u64, len: usize) -> Result<&[u8], LoaderError>;

    /// Returns the bytes of the NUL-terminated string mapped at virtual address `vaddr`, NUL
    /// excluded. Used to read module paths out of the kernel-declared module table (§4.4.4).
    fn cstr_at(&self, vaddr: u64) -> Result<&[u8], LoaderError>;

    /// Resolves the runtime value of the pointer-sized field at `field_vaddr`.
    ///
    /// For a non-PIE image (or any `PE` image) the in-file value is already final. For a
    /// position-independent `ELF` image, a zero in-file value is resolved through `.rela.dyn`
    /// (§4.2/§4.3).
    fn resolve_pointer(&self, field_vaddr: u64) -> Result<u64, LoaderError>;
}

/// A parsed kernel image, tagged by its concrete on-disk format.
pub enum KernelImage<'a> {
    Elf(ElfImage<'a>),
    Pe(PeImage<'a>),
}

impl<'a> KernelImage<'a> {
    /// Identifies and parses `bytes` as either an `ELF` or `MZ`/`PE` image.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LoaderError> {
        if bytes.starts_with(&elf::header::ELF_MAGIC) {
            return Ok(Self::Elf(ElfImage::parse(bytes)?));
        }
        if bytes.starts_with(&pe::header::MZ_MAGIC) {
            return Ok(Self::Pe(PeImage::parse(bytes)?));
        }
        Err(LoaderError::InvalidFormat)
    }
}

impl<'a> KernelImageOps for KernelImage<'a> {
    fn entry(&self) -> u64 {
        match self {
            Self::Elf(img) => img.entry(),
            Self::Pe(img) => img.entry(),
        }
    }

    fn vaddr_range(&self) -> Result<(u64, u64), LoaderError> {
        match self {
            Self::Elf(img) => img.vaddr_range(),
            Self::Pe(img) => img.vaddr_range(),
        }
    }

    fn load_segments(&self) -> alloc::vec::Vec<(&[u8], u64, u64)> {
        match self {
            Self::Elf(img) => img.load_segments().collect(),
            Self::Pe(img) => img.load_segments().collect(),
        }
    }

    fn file_addr(&self, vaddr: u64) -> Option<usize> {
        match self {
            Self::Elf(img) => img.file_addr(vaddr),
            Self::Pe(img) => img.file_addr(vaddr),
        }
    }

    fn find_ubi_header(&self) -> Result<u64, LoaderError> {
        match self {
            Self::Elf(img) => img.find_ubi_header(),
            Self::Pe(img) => img.find_ubi_header(),
        }
    }

    fn is_pie(&self) -> bool {
        match self {
            Self::Elf(img) => img.is_pie(),
            Self::Pe(_) => false,
        }
    }

    fn bytes_at(&self, vaddr: u64, len: usize) -> Result<&[u8], LoaderError> {
        match self {
            Self::Elf(img) => img.bytes_at(vaddr, len).ok_or(LoaderError::NotFound),
            Self::Pe(img) => img.bytes_at(vaddr, len).ok_or(LoaderError::NotFound),
        }
    }

    fn cstr_at(&self, vaddr: u64) -> Result<&[u8], LoaderError> {
        match self {
            Self::Elf(img) => img.cstr_at(vaddr).ok_or(LoaderError::NotFound),
            Self::Pe(img) => img.cstr_at(vaddr).ok_or(LoaderError::NotFound),
        }
    }

    fn resolve_pointer(&self, field_vaddr: u64) -> Result<u64, LoaderError> {
        match self {
            Self::Elf(img) => {
                let off = img.file_addr(field_vaddr).ok_or(LoaderError::NotFound)?;
                img.resolve_pointer_field(off, field_vaddr)
            }
            Self::Pe(img) => {
                let off = img.file_addr(field_vaddr).ok_or(LoaderError::NotFound)?;
                img.read_u64(off)
            }
        }
    }
}
