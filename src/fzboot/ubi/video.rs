//! Video mode selection (§4.4.3).
//!
//! Picking *which* mode to request is in-scope loader logic and is kept pure/testable here;
//! actually programming the display is a firmware capability reached through
//! [`crate::fzboot::ubi::platform::UbiPlatform::set_video_mode`].

/// The mode a kernel's `K_VID` table asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoRequest {
    /// `mode == 1`: 80x25 text mode.
    Text,
    /// `mode == 2`: a graphics mode at the given resolution/depth.
    Graphics { width: u32, height: u32, bpp: u32 },
}

/// The mode actually adopted, reported back into `B_VID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoModeResult {
    pub text: bool,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub framebuffer: u64,
    pub pitch: u32,
}

/// Alternate bit depths tried, in order, at the requested resolution once the exact mode fails.
const ALT_BPPS: [u32; 4] = [32, 24, 16, 15];

/// Fixed fallback resolutions, smallest first, tried at 32bpp once no bit depth works at the
/// requested resolution.
const FIXED_MODES: [(u32, u32); 8] = [
    (320, 200),
    (640, 480),
    (800, 600),
    (1024, 768),
    (1366, 768),
    (1280, 1024),
    (1600, 900),
    (1920, 1080),
];

/// Final fallback mode, used if nothing in [`FIXED_MODES`] is available either.
const FALLBACK_MODE: (u32, u32, u32) = (640, 480, 32);

/// Picks a graphics mode to request, given a callback reporting whether a given
/// `(width, height, bpp)` combination is available.
///
/// Mirrors §4.4.3 exactly: try the exact request; then the same resolution at alternate bit
/// depths (descending); then the closest smaller-or-equal fixed resolution at 32bpp; then the
/// hard-coded `640x480x32` fallback.
pub fn select_graphics_mode(
    width: u32,
    height: u32,
    bpp: u32,
    mut available: impl FnMut(u32, u32, u32) -> bool,
) -> (u32, u32, u32) {
    if available(width, height, bpp) {
        return (width, height, bpp);
    }

    for &alt in ALT_BPPS.iter() {
        if available(width, height, alt) {
            return (width, height, alt);
        }
    }

    let mut best: Option<(u32, u32)> = None;
    for &(w, h) in FIXED_MODES.iter() {
        if w <= width && h <= height && available(w, h, 32) {
            best = match best {
                Some((bw, bh)) if (bw as u64) * (bh as u64) >= (w as u64) * (h as u64) => {
                    Some((bw, bh))
                }
                _ => Some((w, h)),
            };
        }
    }
    if let Some((w, h)) = best {
        return (w, h, 32);
    }

    FALLBACK_MODE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_mode_wins_when_available() {
        let (w, h, b) = select_graphics_mode(1024, 768, 32, |_, _, _| true);
        assert_eq!((w, h, b), (1024, 768, 32));
    }

    #[test]
    fn falls_back_to_alternate_bpp_at_same_resolution() {
        let (w, h, b) = select_graphics_mode(1024, 768, 32, |_, _, bpp| bpp == 16);
        assert_eq!((w, h, b), (1024, 768, 16));
    }

    #[test]
    fn falls_back_to_closest_smaller_fixed_mode() {
        // Nothing at 1920x1080 works, and only 800x600 (of the fixed set) is available at 32bpp.
        let (w, h, b) =
            select_graphics_mode(1920, 1080, 32, |w, h, bpp| (w, h, bpp) == (800, 600, 32));
        assert_eq!((w, h, b), (800, 600, 32));
    }

    #[test]
    fn falls_back_to_final_default_when_nothing_else_available() {
        let (w, h, b) = select_graphics_mode(1920, 1080, 32, |_, _, _| false);
        assert_eq!((w, h, b), FALLBACK_MODE);
    }

    #[test]
    fn picks_largest_eligible_fixed_mode_not_smallest() {
        let (w, h, b) = select_graphics_mode(2000, 2000, 32, |w, h, bpp| {
            bpp == 32 && matches!((w, h), (800, 600) | (1024, 768))
        });
        assert_eq!((w, h, b), (1024, 768));
    }
}
