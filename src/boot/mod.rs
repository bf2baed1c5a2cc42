//! Boot-time information structures and loader dispatch.
//!
//! Ties together the two loader personalities (`linux86`, `ubi`) behind a single
//! entry point, matching the way a selected configuration entry is dispatched to
//! the appropriate handler before control is handed off to the loaded kernel.

use core::convert::Infallible;

use crate::errors::LoaderError;
use crate::fzboot::config::ConfigEntry;

pub mod multiboot;

/// Dispatches a parsed configuration entry to the loader personality it names.
///
/// `entry.loader_kind()` selects between `"linux86"` and `"ubi"`; any other value
/// is rejected as [`LoaderError::Unsupported`]. The indirect jump/call performed by
/// either loader on its success path never returns, which is why this function's
/// success type is [`Infallible`]: reaching the end of this function without
/// diverging is itself the failure case.
pub fn dispatch_entry(entry: &dyn ConfigEntry) -> Result<Infallible, LoaderError> {
    match entry.get("loader") {
        Some("linux86") => crate::fzboot::linux::boot(entry),
        Some("ubi") => crate::fzboot::ubi::boot(entry),
        Some(_) => Err(LoaderError::Unsupported),
        None => Err(LoaderError::MissingArguments),
    }
}
