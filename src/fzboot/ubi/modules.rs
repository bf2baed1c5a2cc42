//! Module table construction: the kernel image (module 0), kernel-declared modules, and the
//! config `modules` list (§4.4.4).

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::errors::LoaderError;
use crate::fzboot::config::ConfigEntry;
use crate::fzboot::process::loader::KernelImageOps;
use crate::fzboot::ubi::kchain::ModuleRequest;
use crate::fzboot::ubi::memtable::reserve_region;
use crate::fzboot::ubi::platform::VirtualMemory;

/// One module, fully loaded and ready to be recorded as a `BModuleEntry`.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub path: String,
    pub load_address: u64,
    pub size: u64,
}

/// Reads a kernel-declared module's path out of the image, resolving the `K_MOD` entry's
/// already-reldyn-resolved `path_vaddr` to its backing string.
fn declared_module_path(
    img: &dyn KernelImageOps,
    module: &ModuleRequest,
) -> Result<String, LoaderError> {
    let bytes = img.cstr_at(module.path_vaddr)?;
    core::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| LoaderError::InvalidFormat)
}

/// Splits the config `modules` option (`"mod_a:mod_b"`) into non-empty path components, in
/// declaration order.
pub fn split_config_modules(list: &str) -> impl Iterator<Item = &str> {
    list.split(':').filter(|s| !s.is_empty())
}

/// Reads `path` off the boot partition and places it at `requested` (or anywhere, if `0`),
/// following the same reservation algorithm as the kernel image itself (§4.4.5).
fn load_module(
    vmem: &mut dyn VirtualMemory,
    drive: usize,
    partition_start: u64,
    path: &str,
    requested: u64,
) -> Result<LoadedModule, LoaderError> {
    let mut bytes = Vec::new();
    crate::fs::ext4::read_file(drive, partition_start, path, &mut bytes)?;

    let base = reserve_region(vmem, requested, bytes.len().max(1) as u64)?;
    unsafe {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), base as *mut u8, bytes.len());
    }

    Ok(LoadedModule {
        path: path.to_string(),
        load_address: base,
        size: bytes.len() as u64,
    })
}

/// Builds the full, ordered module list (§4.4.4): the kernel image first, then every
/// kernel-declared module, then every entry in the config `modules` list.
#[allow(clippy::too_many_arguments)]
pub fn build_module_list(
    vmem: &mut dyn VirtualMemory,
    img: &dyn KernelImageOps,
    drive: usize,
    partition_start: u64,
    kernel_path: &str,
    kernel_load_address: u64,
    kernel_size: u64,
    declared: &[ModuleRequest],
    entry: &dyn ConfigEntry,
) -> Result<Vec<LoadedModule>, LoaderError> {
    let mut modules = Vec::with_capacity(declared.len() + 2);
    modules.push(LoadedModule {
        path: kernel_path.to_string(),
        load_address: kernel_load_address,
        size: kernel_size,
    });

    for module in declared {
        let path = declared_module_path(img, module)?;
        modules.push(load_module(
            vmem,
            drive,
            partition_start,
            &path,
            module.load_address,
        )?);
    }

    if let Some(list) = entry.get("modules") {
        for path in split_config_modules(list) {
            modules.push(load_module(vmem, drive, partition_start, path, 0)?);
        }
    }

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_module_list_skips_empty_components() {
        let parsed: Vec<&str> = split_config_modules("mod_a:mod_b").collect();
        assert_eq!(parsed, ["mod_a", "mod_b"]);
    }

    #[test]
    fn config_module_list_handles_single_entry() {
        let parsed: Vec<&str> = split_config_modules("mod_a").collect();
        assert_eq!(parsed, ["mod_a"]);
    }

    #[test]
    fn config_module_list_empty_string_yields_nothing() {
        assert_eq!(split_config_modules("").count(), 0);
    }

    struct FlatImage {
        bytes: Vec<u8>,
    }

    impl KernelImageOps for FlatImage {
        fn entry(&self) -> u64 {
            0
        }
        fn vaddr_range(&self) -> Result<(u64, u64), LoaderError> {
            Ok((0, self.bytes.len() as u64))
        }
        fn load_segments(&self) -> Vec<(&[u8], u64, u64)> {
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
            let rest = self
                .bytes
                .get(vaddr as usize..)
                .ok_or(LoaderError::NotFound)?;
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
    fn declared_module_path_reads_nul_terminated_string() {
        let mut bytes = alloc::vec![0u8; 32];
        bytes[0x10..0x10 + 6].copy_from_slice(b"mod_k\0");
        let img = FlatImage { bytes };

        let module = ModuleRequest {
            path_vaddr: 0x10,
            load_address: 0,
        };
        assert_eq!(declared_module_path(&img, &module).unwrap(), "mod_k");
    }
}
