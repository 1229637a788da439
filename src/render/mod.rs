// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Rendering of analysis tables: plain text for the CLI, ratatui for the
//! TUI, with shared allocation-percentage color thresholds.

pub mod cli;
pub mod tui;

/// A backend-independent highlight tone; each renderer maps it to its own
/// color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Orange,
    Yellow,
    Green,
}

/// Ascending percentage thresholds with the tone applied at and above each.
pub type ColorMap = [(i64, Tone); 4];

/// For running allocation, high utilisation is good.
pub const CMAP_RUNNING: ColorMap = [
    (0, Tone::Red),
    (25, Tone::Orange),
    (50, Tone::Yellow),
    (75, Tone::Green),
];

/// For pending allocation, high pressure is bad.
pub const CMAP_PENDING: ColorMap = [
    (0, Tone::Green),
    (25, Tone::Yellow),
    (50, Tone::Orange),
    (75, Tone::Red),
];

/// The tone for an allocation percentage, or none below every threshold.
pub fn row_tone(percent: i64, cmap: &ColorMap) -> Option<Tone> {
    cmap.iter()
        .rev()
        .find(|(threshold, _)| percent >= *threshold)
        .map(|(_, tone)| *tone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_pick_the_highest_band() {
        assert_eq!(row_tone(0, &CMAP_RUNNING), Some(Tone::Red));
        assert_eq!(row_tone(24, &CMAP_RUNNING), Some(Tone::Red));
        assert_eq!(row_tone(25, &CMAP_RUNNING), Some(Tone::Orange));
        assert_eq!(row_tone(74, &CMAP_RUNNING), Some(Tone::Yellow));
        assert_eq!(row_tone(100, &CMAP_RUNNING), Some(Tone::Green));
    }

    #[test]
    fn pending_map_inverts_the_scale() {
        assert_eq!(row_tone(10, &CMAP_PENDING), Some(Tone::Green));
        assert_eq!(row_tone(90, &CMAP_PENDING), Some(Tone::Red));
    }

    #[test]
    fn below_every_threshold_has_no_tone() {
        assert_eq!(row_tone(-1, &CMAP_RUNNING), None);
    }
}
