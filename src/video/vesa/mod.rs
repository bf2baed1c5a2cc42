//! VESA linear-framebuffer text console.
//!
//! Exposes the shared [`TEXT_BUFFER`] and the low-level `print`/`print_colored`/
//! `arg_print` primitives that back the crate's `println!`/`info!`/`warn!`/
//! `error!` macros (see [`crate::video::io`]).

use conquer_once::spin::OnceCell;
use core::fmt::Write;

pub mod framebuffer;
pub mod video_mode;

use framebuffer::{LockedTextFrameBuffer, RgbaColor};

/// Shared protected-mode text console.
///
/// Initialized once, right after the switch to protected mode, from the
/// [`video_mode::ModeInfoBlock`] left at [`video_mode::VESA_MODE_BUFFER`] by the
/// real-mode stage.
pub static TEXT_BUFFER: OnceCell<LockedTextFrameBuffer<'static>> = OnceCell::uninit();

/// Writes a plain string to the shared text console.
///
/// # Panics
///
/// Panics if called before [`TEXT_BUFFER`] has been initialized.
pub fn print(text: &str) {
    TEXT_BUFFER
        .get()
        .expect("text console used before initialization")
        .buffer
        .lock()
        .write_str(text)
        .ok();
}

/// Writes a string to the shared text console using the given color.
///
/// # Panics
///
/// Panics if called before [`TEXT_BUFFER`] has been initialized.
pub fn print_colored(text: &str, color: &RgbaColor) {
    TEXT_BUFFER
        .get()
        .expect("text console used before initialization")
        .buffer
        .lock()
        .write_str_with_color(text, color);
}

/// Writes pre-formatted arguments (as produced by `format_args_nl!`) to the
/// shared text console.
///
/// # Panics
///
/// Panics if called before [`TEXT_BUFFER`] has been initialized.
pub fn arg_print(args: core::fmt::Arguments) {
    TEXT_BUFFER
        .get()
        .expect("text console used before initialization")
        .buffer
        .lock()
        .write_fmt(args)
        .ok();
}
