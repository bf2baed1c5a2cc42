//! Memory layout: `K_MEM` → `B_MEM` (§4.4.2), virtual reservation (§4.4.5), and bootloader
//! self-relocation (§4.4.6).

use crate::errors::LoaderError;
use crate::fzboot::ubi::platform::{UbiMemType, VirtualMemory, PAGE_SIZE};
use crate::fzboot::ubi::tables::KMemTable;

/// The fixed set of regions a kernel's `K_MEM` table can request (§4.4.2): heap and identity-map
/// are optional (a zero size skips them), the stack is always allocated.
#[derive(Debug, Clone, Copy)]
pub struct MemRequest {
    pub heap_location: u64,
    pub heap_size: u64,
    pub stack_location: u64,
    pub stack_size: u64,
    pub id_map_location: u64,
    pub id_map_size: u64,
}

impl MemRequest {
    pub fn from_table(table: &KMemTable) -> Self {
        Self {
            heap_location: table.heap_location,
            heap_size: table.heap_size,
            stack_location: table.stack_location,
            stack_size: table.stack_size,
            id_map_location: table.id_map_location,
            id_map_size: table.id_map_size,
        }
    }
}

/// The resolved layout handed back to the UBI driver to populate `B_MEM`. `kernel_base` is set
/// separately, once the kernel's own rebase offset has been chosen (§4.4.2, §4.4.1 step 7).
#[derive(Debug, Clone, Copy)]
pub struct MemLayout {
    pub heap_location: u64,
    pub heap_size: u64,
    pub stack_location: u64,
    pub stack_size: u64,
    pub id_map_location: u64,
    pub id_map_size: u64,
}

/// Rounds `size` up to the next page boundary.
fn page_round_up(size: u64) -> u64 {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Implements §4.4.5: reserve `size` bytes at `requested` if free, else fall back to any free
/// range of the same size. Either way, every claimed page is backed by a freshly-allocated
/// physical frame and mapped one-to-one, reserved as [`UbiMemType::Os`].
pub fn reserve_region(
    vmem: &mut dyn VirtualMemory,
    requested: u64,
    size: u64,
) -> Result<u64, LoaderError> {
    let size = page_round_up(size.max(1));
    let page_count = size / PAGE_SIZE;

    let fits_at_requested = requested != 0
        && (0..page_count).all(|i| !vmem.is_mapped(requested + i * PAGE_SIZE));

    let base = if fits_at_requested {
        requested
    } else {
        vmem.find_anywhere(size)?
    };

    for i in 0..page_count {
        let va = base + i * PAGE_SIZE;
        let pa = vmem.claim_frame()?;
        vmem.map_page(va, pa, UbiMemType::Os)?;
    }

    Ok(base)
}

/// Implements §4.4.2's KASLR offset roll: page-aligned, within
/// `[kernel_base, kernel_base + kaslr_size - image_size]`.
pub fn kaslr_offset(
    kernel_base: u64,
    kaslr_size: u64,
    image_size: u64,
    rand: u64,
) -> Result<u64, LoaderError> {
    if image_size > kaslr_size {
        return Err(LoaderError::InvalidFormat);
    }
    kernel_base
        .checked_add(image_size)
        .ok_or(LoaderError::InvalidFormat)?;

    let span = kaslr_size - image_size;
    let roll = if span == 0 { 0 } else { rand % (span + 1) } & !(PAGE_SIZE - 1);

    kernel_base
        .checked_add(roll)
        .ok_or(LoaderError::InvalidFormat)
}

/// Resolves the rebase offset applied to every `PT_LOAD`/section destination address (§4.4.2).
///
/// `is_dyn` is true for an `ET_DYN` ELF image (the only kind ever relocatable); KASLR requires
/// both that and the kernel's `K_MEM_KASLR` flag and `disableKaslr` being unset. A non-`ET_DYN`
/// image is always loaded at its own fixed link-time base, offset `0`.
pub fn resolve_kernel_offset(
    is_dyn: bool,
    kaslr_requested: bool,
    kaslr_disabled_by_config: bool,
    kernel_base: u64,
    kaslr_size: u64,
    image_size: u64,
    rand: u64,
) -> Result<u64, LoaderError> {
    if !is_dyn {
        return Ok(0);
    }
    if kaslr_requested && !kaslr_disabled_by_config {
        kaslr_offset(kernel_base, kaslr_size, image_size, rand)
    } else {
        Ok(kernel_base)
    }
}

/// Implements §4.4.6: chooses a base the bootloader relocates itself to, so that its own
/// footprint never overlaps the kernel's `[min+offset, max+offset)` interval.
///
/// `preferred` is `0xFFFFFFFF00000000` on amd64 and `0` (never relocate) on i386; callers on
/// i386 should skip calling this entirely, matching §4.4.6 ("no relocation").
pub fn choose_relocation_base(
    preferred: u64,
    kernel_min: u64,
    kernel_max: u64,
    loader_size: u64,
    usable_memory: u64,
) -> Result<u64, LoaderError> {
    let overlaps = preferred < kernel_max
        && preferred
            .checked_add(loader_size)
            .map(|end| end > kernel_min)
            .unwrap_or(true);

    if !overlaps {
        return Ok(preferred);
    }

    if kernel_max.checked_add(loader_size).is_some() {
        return Ok(kernel_max);
    }

    kernel_min
        .checked_sub(usable_memory)
        .ok_or(LoaderError::NoSuitableRelocation)
}

/// Builds the resolved [`MemLayout`] for `B_MEM` from the kernel's `K_MEM` request (§4.4.2).
///
/// Heap and stack go through the reservation algorithm (§4.4.5): a zero requested location means
/// "anywhere", a non-zero one is honoured if free and otherwise falls back. The stack request is
/// the desired *top* address (it grows down), so the reservation is made against `size` bytes
/// below it; the returned `stack_location` is again the top (`low + size`). The identity-map
/// region, when requested, is mapped directly with no reservation fallback.
pub fn build_mem_layout(
    vmem: &mut dyn VirtualMemory,
    request: &MemRequest,
) -> Result<MemLayout, LoaderError> {
    let (heap_location, heap_size) = if request.heap_size > 0 {
        let base = reserve_region(vmem, request.heap_location, request.heap_size)?;
        (base, request.heap_size)
    } else {
        (0, 0)
    };

    let stack_size = if request.stack_size == 0 {
        vmem.current_stack_size()
    } else {
        request.stack_size
    };
    let requested_low = request
        .stack_location
        .checked_sub(stack_size)
        .unwrap_or(0);
    let stack_low = reserve_region(vmem, requested_low, stack_size)?;
    let stack_location = stack_low + stack_size;

    let (id_map_location, id_map_size) = if request.id_map_size > 0 {
        let size = request.id_map_size & !(PAGE_SIZE - 1);
        vmem.identity_map(request.id_map_location, size)?;
        (request.id_map_location, size)
    } else {
        (0, 0)
    };

    Ok(MemLayout {
        heap_location,
        heap_size,
        stack_location,
        stack_size,
        id_map_location,
        id_map_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;

    struct MockVmem {
        mapped: BTreeSet<u64>,
        next_frame: u64,
        next_anywhere: u64,
        stack_size: u64,
    }

    impl MockVmem {
        fn new() -> Self {
            Self {
                mapped: BTreeSet::new(),
                next_frame: 0x1000,
                next_anywhere: 0x9000_0000,
                stack_size: 0x4000,
            }
        }
    }

    impl VirtualMemory for MockVmem {
        fn is_mapped(&self, va: u64) -> bool {
            self.mapped.contains(&va)
        }

        fn claim_frame(&mut self) -> Result<u64, LoaderError> {
            let pa = self.next_frame;
            self.next_frame += PAGE_SIZE;
            Ok(pa)
        }

        fn map_page(&mut self, va: u64, _pa: u64, _mem_type: UbiMemType) -> Result<(), LoaderError> {
            self.mapped.insert(va);
            Ok(())
        }

        fn find_anywhere(&mut self, size: u64) -> Result<u64, LoaderError> {
            let base = self.next_anywhere;
            self.next_anywhere += page_round_up(size);
            Ok(base)
        }

        fn identity_map(&mut self, va: u64, size: u64) -> Result<(), LoaderError> {
            let pages = page_round_up(size) / PAGE_SIZE;
            for i in 0..pages {
                self.mapped.insert(va + i * PAGE_SIZE);
            }
            Ok(())
        }

        fn current_stack_size(&self) -> u64 {
            self.stack_size
        }
    }

    #[test]
    fn reserve_honours_requested_base_when_free() {
        let mut vmem = MockVmem::new();
        let base = reserve_region(&mut vmem, 0x4000_0000, 0x2000).unwrap();
        assert_eq!(base, 0x4000_0000);
        assert!(vmem.is_mapped(0x4000_0000));
        assert!(vmem.is_mapped(0x4000_1000));
    }

    #[test]
    fn reserve_falls_back_when_requested_range_collides() {
        let mut vmem = MockVmem::new();
        vmem.mapped.insert(0x4000_1000);
        let base = reserve_region(&mut vmem, 0x4000_0000, 0x2000).unwrap();
        assert_ne!(base, 0x4000_0000);
        assert!(vmem.is_mapped(base));
        assert!(vmem.is_mapped(base + PAGE_SIZE));
    }

    #[test]
    fn kaslr_offset_is_page_aligned_and_in_range() {
        let kernel_base = 0xFFFF_8000_0000_0000u64;
        let kaslr_size = 0x4000_0000u64;
        let image_size = 0x0020_0000u64;

        for rand in [0u64, 1, 0xFFFF_FFFF, u64::MAX] {
            let offset = kaslr_offset(kernel_base, kaslr_size, image_size, rand).unwrap();
            assert_eq!(offset & 0xFFF, 0);
            assert!(offset >= kernel_base);
            assert!(offset <= kernel_base + kaslr_size - image_size);
        }
    }

    #[test]
    fn kaslr_rejects_oversized_image() {
        assert!(matches!(
            kaslr_offset(0x1000, 0x1000, 0x2000, 0),
            Err(LoaderError::InvalidFormat)
        ));
    }

    #[test]
    fn kernel_offset_is_zero_for_non_dyn_images() {
        let offset = resolve_kernel_offset(false, true, false, 0x1000, 0x1000, 0x1000, 42).unwrap();
        assert_eq!(offset, 0);
    }

    #[test]
    fn kernel_offset_falls_back_to_base_when_kaslr_disabled() {
        let offset =
            resolve_kernel_offset(true, true, true, 0xFFFF_8000_0000_0000, 0x1000_0000, 0x1000, 42)
                .unwrap();
        assert_eq!(offset, 0xFFFF_8000_0000_0000);
    }

    #[test]
    fn relocation_keeps_preferred_base_when_no_overlap() {
        let base = choose_relocation_base(0xFFFF_FFFF_0000_0000, 0x1000, 0x2000, 0x1000, 0x1000)
            .unwrap();
        assert_eq!(base, 0xFFFF_FFFF_0000_0000);
    }

    #[test]
    fn relocation_picks_kernel_max_when_preferred_overlaps() {
        let base = choose_relocation_base(0x1800, 0x1000, 0x2000, 0x1000, 0x1000).unwrap();
        assert_eq!(base, 0x2000);
    }

    #[test]
    fn relocation_fails_when_no_base_has_headroom() {
        let result = choose_relocation_base(0x1100, 0x1000, u64::MAX - 0x10, 0x100, 0x2000);
        assert!(matches!(result, Err(LoaderError::NoSuitableRelocation)));
    }

    #[test]
    fn mem_layout_skips_heap_and_id_map_when_zero_sized() {
        let mut vmem = MockVmem::new();
        let request = MemRequest {
            heap_location: 0,
            heap_size: 0,
            stack_location: 0,
            stack_size: 0,
            id_map_location: 0,
            id_map_size: 0,
        };
        let layout = build_mem_layout(&mut vmem, &request).unwrap();
        assert_eq!(layout.heap_location, 0);
        assert_eq!(layout.heap_size, 0);
        assert_eq!(layout.id_map_location, 0);
        assert_eq!(layout.id_map_size, 0);
        assert_eq!(layout.stack_size, vmem.stack_size);
        assert_eq!(layout.stack_location, 0x9000_0000 + vmem.stack_size);
    }

    #[test]
    fn mem_layout_honours_requested_stack_top() {
        let mut vmem = MockVmem::new();
        let request = MemRequest {
            heap_location: 0,
            heap_size: 0,
            stack_location: 0x5000_2000,
            stack_size: 0x2000,
            id_map_location: 0,
            id_map_size: 0,
        };
        let layout = build_mem_layout(&mut vmem, &request).unwrap();
        assert_eq!(layout.stack_location, 0x5000_2000);
        assert_eq!(layout.stack_size, 0x2000);
        assert!(vmem.is_mapped(0x5000_0000));
        assert!(vmem.is_mapped(0x5000_1000));
    }

    #[test]
    fn mem_layout_identity_maps_page_rounded_down_size() {
        let mut vmem = MockVmem::new();
        let request = MemRequest {
            heap_location: 0,
            heap_size: 0,
            stack_location: 0,
            stack_size: 0x1000,
            id_map_location: 0,
            id_map_size: 0x2800,
        };
        let layout = build_mem_layout(&mut vmem, &request).unwrap();
        assert_eq!(layout.id_map_location, 0);
        assert_eq!(layout.id_map_size, 0x2000);
        assert!(vmem.is_mapped(0));
        assert!(vmem.is_mapped(0x1000));
        assert!(!vmem.is_mapped(0x2000));
    }

    #[test]
    fn mem_layout_reserves_heap_at_requested_location() {
        let mut vmem = MockVmem::new();
        let request = MemRequest {
            heap_location: 0x6000_0000,
            heap_size: 0x1000,
            stack_location: 0,
            stack_size: 0x1000,
            id_map_location: 0,
            id_map_size: 0,
        };
        let layout = build_mem_layout(&mut vmem, &request).unwrap();
        assert_eq!(layout.heap_location, 0x6000_0000);
        assert_eq!(layout.heap_size, 0x1000);
    }
}
