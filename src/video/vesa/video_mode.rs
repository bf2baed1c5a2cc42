//! VESA display mode information, as produced by the VBE real-mode helpers and
//! consumed once the bootloader has switched to protected mode.

use core::mem;

/// In-memory location of the [`VbeInfoBlock`] header, left behind by the
/// real-mode VBE query.
pub const VESA_VBE_BUFFER: usize = 0x4f00;

/// In-memory location of the [`ModeInfoBlock`] header for the currently
/// selected display mode.
pub const VESA_MODE_BUFFER: usize = VESA_VBE_BUFFER + mem::size_of::<VbeInfoBlock>();

/// VBE Controller information block.
///
/// Provides general information about the capabilities of the installed VBE
/// software and hardware. Only kept here for its size, which locates
/// [`ModeInfoBlock`] right after it in memory.
#[repr(C, packed)]
pub struct VbeInfoBlock {
    vbe_signature: [u8; 4],
    pub vbe_version: u16,
    oem_string_ptr: u32,
    capabilities: u32,
    pub video_mode_ptr: u32,
    total_memory: u16,
    reserved: [u8; 492],
}

/// Mode information block that contains technical details relative to a
/// specific display mode.
#[repr(C, align(256))]
pub struct ModeInfoBlock {
    pub mode_attributes: u16,

    pub window_a_attrs: u8,
    pub window_b_attrs: u8,
    pub win_granularity: u16,
    pub win_size: u16,
    pub win_a_segment: u16,
    pub win_b_segment: u16,
    pub win_func_ptr: u32,
    pub bytes_per_scanline: u16,

    /// Width for this display mode.
    pub width: u16,

    /// Height for this display mode.
    pub height: u16,

    pub char_width: u8,
    pub char_height: u8,
    pub planes_count: u8,

    /// Number of bits in a pixel.
    pub bits_per_pixel: u8,
    pub banks_count: u8,

    pub memory_model: MemoryModel,

    pub bank_size: u8,
    pub image_pages_count: u8,
    padding_1: u8,
    pub red_mask_s: u8,
    pub red_field_pos: u8,
    pub green_mask_s: u8,
    pub green_field_pos: u8,
    pub blue_mask_s: u8,
    pub blue_field_pos: u8,
    pub rsvd_mask_size: u8,
    pub rsvd_field_pos: u8,
    pub direct_color_mode: u8,

    /// Physical linear address of the start of the framebuffer for this mode.
    pub framebuffer: u32,

    padding_2: u8,
    padding_3: u16,
    reserved: [u8; 206],
}

impl ModeInfoBlock {
    pub fn pixel_layout(&self) -> PixelLayout {
        match (
            self.red_field_pos,
            self.green_field_pos,
            self.blue_field_pos,
        ) {
            (0, 8, 16) => PixelLayout::RGB,
            (16, 8, 0) => PixelLayout::BGR,
            _ => PixelLayout::RGB,
        }
    }
}

/// Byte order convention for a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    RGB,
    BGR,
}

/// Memory organization used for a display mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum MemoryModel {
    TextMode = 0,
    Cga = 1,
    Hercules = 2,
    Planar = 3,
    Packed = 4,
    Unchained = 5,
    DirectColor = 6,
    Yuv = 7,
}
