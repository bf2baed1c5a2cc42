//! Walks the kernel-declared `K_*` table chain embedded in the kernel image at `ubi_header`/
//! `.ubihdr` (§3, §4.4.1 step 2).

use alloc::vec::Vec;
use bytemuck::pod_read_unaligned;

use crate::errors::LoaderError;
use crate::fzboot::process::loader::KernelImageOps;
use crate::fzboot::ubi::tables::{
    ChainHeader, KMemTable, KModTable, KModuleEntry, KRootTable, KVidTable, K_MEM, K_MOD, K_ROOT,
    K_VID,
};

/// Offset of `TableHeader::next` within any table, used to resolve it through
/// [`KernelImageOps::resolve_pointer`] rather than reading it as a plain field, since it may be
/// left zero in-file on a position-independent image.
const NEXT_FIELD_OFFSET: u64 = 8;

/// One kernel-declared module request, path already resolved to a final virtual address (§4.2):
/// a zero in-file pointer on a PIE image has been recovered through `.rela.dyn`.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRequest {
    pub path_vaddr: u64,
    /// Requested load VA; `0` means "anywhere".
    pub load_address: u64,
}

/// Every kernel-declared table this loader understands, once parsed out of the image.
#[derive(Debug, Default)]
pub struct KernelChain {
    pub root: Option<KRootTable>,
    pub mem: Option<KMemTable>,
    pub vid: Option<KVidTable>,
    /// Kernel-declared modules, in declaration order (§4.4.4).
    pub modules: Vec<ModuleRequest>,
}

fn read_header(img: &dyn KernelImageOps, vaddr: u64) -> Result<ChainHeader, LoaderError> {
    let bytes = img.bytes_at(vaddr, core::mem::size_of::<ChainHeader>())?;
    Ok(pod_read_unaligned(bytes))
}

fn read_table<T: bytemuck::Pod>(img: &dyn KernelImageOps, vaddr: u64) -> Result<T, LoaderError> {
    let bytes = img.bytes_at(vaddr, core::mem::size_of::<T>())?;
    Ok(pod_read_unaligned(bytes))
}

fn next_table_vaddr(img: &dyn KernelImageOps, vaddr: u64) -> Result<u64, LoaderError> {
    img.resolve_pointer(vaddr + NEXT_FIELD_OFFSET)
}

/// Parses the `K_ROOT` table and every table reachable from it, starting at `root_vaddr`
/// (the address [`KernelImageOps::find_ubi_header`] returned).
pub fn parse_chain(img: &dyn KernelImageOps, root_vaddr: u64) -> Result<KernelChain, LoaderError> {
    let root: KRootTable = read_table(img, root_vaddr)?;
    if root.header.magic != K_ROOT {
        return Err(LoaderError::InvalidFormat);
    }

    let mut chain = KernelChain {
        root: Some(root),
        ..Default::default()
    };

    let mut cursor = next_table_vaddr(img, root_vaddr)?;
    // A closed, acyclic chain is an invariant of a well-formed kernel image; bound the walk
    // generously so a corrupt chain fails instead of looping forever.
    for _ in 0..64 {
        if cursor == 0 {
            break;
        }
        let header = read_header(img, cursor)?;

        match header.magic {
            K_MEM => chain.mem = Some(read_table(img, cursor)?),
            K_VID => chain.vid = Some(read_table(img, cursor)?),
            K_MOD => chain.modules = parse_mod_table(img, cursor)?,
            _ => return Err(LoaderError::InvalidFormat),
        }

        cursor = next_table_vaddr(img, cursor)?;
    }

    Ok(chain)
}

fn parse_mod_table(img: &dyn KernelImageOps, vaddr: u64) -> Result<Vec<ModuleRequest>, LoaderError> {
    let table: KModTable = read_table(img, vaddr)?;

    let entries_start = vaddr + core::mem::size_of::<KModTable>() as u64;
    let entry_size = core::mem::size_of::<KModuleEntry>() as u64;

    let mut modules = Vec::with_capacity(table.length as usize);
    for i in 0..u64::from(table.length) {
        let entry_vaddr = entries_start + i * entry_size;
        let path_field_vaddr = entry_vaddr;
        let load_address_bytes = img.bytes_at(entry_vaddr + 8, 8)?;

        modules.push(ModuleRequest {
            path_vaddr: img.resolve_pointer(path_field_vaddr)?,
            load_address: u64::from_le_bytes(load_address_bytes.try_into().unwrap()),
        });
    }

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzboot::ubi::tables::{KRootTable, KTableHeader, KVidTable, K_VID};
    use bytemuck::bytes_of;

    /// A flat byte buffer addressed directly by virtual address (no PIE resolution), standing
    /// in for a parsed kernel image in tests that only exercise chain-walking logic.
    struct FlatImage {
        bytes: alloc::vec::Vec<u8>,
    }

    impl FlatImage {
        fn new(size: usize) -> Self {
            Self {
                bytes: alloc::vec![0u8; size],
            }
        }

        fn write(&mut self, vaddr: u64, data: &[u8]) {
            let start = vaddr as usize;
            self.bytes[start..start + data.len()].copy_from_slice(data);
        }
    }

    impl KernelImageOps for FlatImage {
        fn entry(&self) -> u64 {
            0
        }
        fn vaddr_range(&self) -> Result<(u64, u64), LoaderError> {
            Ok((0, self.bytes.len() as u64))
        }
        fn load_segments(&self) -> alloc::vec::Vec<(&[u8], u64, u64)> {
            alloc::vec![]
        }
        fn file_addr(&self, vaddr: u64) -> Option<usize> {
            Some(vaddr as usize)
        }
        fn find_ubi_header(&self) -> Result<u64, LoaderError> {
            Ok(0)
        }
        fn is_pie(&self) -> bool {
            false
        }
        fn bytes_at(&self, vaddr: u64, len: usize) -> Result<&[u8], LoaderError> {
            self.bytes
                .get(vaddr as usize..vaddr as usize + len)
                .ok_or(LoaderError::NotFound)
        }
        fn cstr_at(&self, vaddr: u64) -> Result<&[u8], LoaderError> {
            let rest = self.bytes.get(vaddr as usize..).ok_or(LoaderError::NotFound)?;
            let end = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or(LoaderError::NotFound)?;
            Ok(&rest[..end])
        }
        fn resolve_pointer(&self, field_vaddr: u64) -> Result<u64, LoaderError> {
            let bytes = self.bytes_at(field_vaddr, 8)?;
            Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
        }
    }

    #[test]
    fn parses_root_then_mem_then_vid_chain() {
        let mut img = FlatImage::new(0x200);

        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: 1,
            min_version_minor: 0,
            bits: 64,
            flags: 0,
        };
        img.write(0, bytes_of(&root));
        img.write(8, &0x40u64.to_le_bytes());

        let mem = KMemTable {
            header: KTableHeader::new(K_MEM),
            flags: 0,
            heap_location: 0,
            heap_size: 0x1000,
            stack_location: 0,
            stack_size: 0,
            id_map_location: 0,
            id_map_size: 0,
            kernel_base: 0xFFFF_8000_0000_0000,
            kaslr_size: 0x1000_0000,
        };
        img.write(0x40, bytes_of(&mem));
        img.write(0x48, &0x100u64.to_le_bytes());

        let vid = KVidTable {
            header: KTableHeader::new(K_VID),
            flags: 2,
            width: 1024,
            height: 768,
            bpp: 32,
        };
        img.write(0x100, bytes_of(&vid));
        img.write(0x108, &0u64.to_le_bytes());

        let chain = parse_chain(&img, 0).unwrap();
        assert!(chain.root.is_some());
        assert_eq!(chain.mem.unwrap().kernel_base, 0xFFFF_8000_0000_0000);
        assert_eq!(chain.vid.unwrap().width, 1024);
        assert!(chain.modules.is_empty());
    }

    #[test]
    fn rejects_chain_not_starting_with_k_root() {
        let mut img = FlatImage::new(0x40);
        let vid = KVidTable {
            header: KTableHeader::new(K_VID),
            flags: 1,
            width: 80,
            height: 25,
            bpp: 4,
        };
        img.write(0, bytes_of(&vid));

        assert!(matches!(
            parse_chain(&img, 0),
            Err(LoaderError::InvalidFormat)
        ));
    }

    #[test]
    fn parses_module_table_entries() {
        let mut img = FlatImage::new(0x200);

        let root = KRootTable {
            header: KTableHeader::new(K_ROOT),
            min_version_major: 1,
            min_version_minor: 0,
            bits: 64,
            flags: 0,
        };
        img.write(0, bytes_of(&root));
        img.write(8, &0x40u64.to_le_bytes());

        let modtable = KModTable {
            header: KTableHeader::new(K_MOD),
            flags: 0,
            length: 2,
        };
        img.write(0x40, bytes_of(&modtable));
        img.write(0x48, &0u64.to_le_bytes());

        let entries_start = 0x40 + core::mem::size_of::<KModTable>() as u64;
        img.write(entries_start, &0x1000u64.to_le_bytes());
        img.write(entries_start + 8, &0u64.to_le_bytes());
        img.write(entries_start + 16, &0x2000u64.to_le_bytes());
        img.write(entries_start + 24, &0x5000_0000u64.to_le_bytes());

        let chain = parse_chain(&img, 0).unwrap();
        assert_eq!(chain.modules.len(), 2);
        assert_eq!(chain.modules[0].path_vaddr, 0x1000);
        assert_eq!(chain.modules[0].load_address, 0);
        assert_eq!(chain.modules[1].path_vaddr, 0x2000);
        assert_eq!(chain.modules[1].load_address, 0x5000_0000);
    }
}
