//! Geometry for the spectrum canvas and the frequency/volume pad.
//!
//! Pure functions only; the host draws with whatever it has (canvas 2D,
//! a terminal, a plot in tests).

use serde::Serialize;

use crate::params::{MAX_FREQUENCY, PlaybackState, clamp_frequency};

/// Volume range covered by the vertical axis of the pad, in slider units.
pub const PAD_VOLUME_RANGE: f64 = 50.0;
/// Half the size of the position marker, in pixels.
pub const MARKER_RADIUS: f64 = 6.0;

/// Linearly map `value` from `[x1, y1]` onto `[x2, y2]`, clamped to the
/// target range.
pub fn map_range(value: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((value - x1) * (y2 - x2) / (y1 - x1) + x2).min(y2).max(x2)
}

/// One bar of the spectrum plot, in canvas pixels with the origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumBar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Lay out one bar per spectrum bin across a `width` × `height` canvas,
/// bars growing up from the bottom edge with a one pixel gap.
pub fn spectrum_bars(
    data: &[u8],
    width: f64,
    height: f64,
) -> impl Iterator<Item = SpectrumBar> + '_ {
    let slot = if data.is_empty() {
        0.0
    } else {
        width / data.len() as f64
    };
    data.iter().enumerate().map(move |(i, &byte)| {
        let bar_height = map_range(byte as f64, 0.0, 255.0, 0.0, height);
        SpectrumBar {
            x: i as f64 * slot,
            y: height - bar_height,
            width: (slot - 1.0).max(0.0),
            height: bar_height,
        }
    })
}

/// Pad position → `(frequency, volume)` in UI units. Left to right sweeps
/// the full frequency range; bottom to top sweeps volume 0 to 50.
pub fn pointer_to_controls(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    let volume = (PAD_VOLUME_RANGE - map_range(y, 0.0, height, 0.0, PAD_VOLUME_RANGE)).ceil();
    let frequency = map_range(x, 0.0, width, 0.0, MAX_FREQUENCY).ceil();
    (clamp_frequency(frequency), volume)
}

/// Top-left corner of the marker drawn at the current frequency/volume.
pub fn marker_position(frequency: f64, volume: f64, width: f64, height: f64) -> (f64, f64) {
    let x = map_range(frequency, 1.0, MAX_FREQUENCY, 0.0, width) - MARKER_RADIUS;
    let y = height - map_range(volume, 0.0, PAD_VOLUME_RANGE, 0.0, height) - MARKER_RADIUS;
    (x, y)
}

/// Caption of the play/stop button that toggles `target`.
pub fn button_label(current: PlaybackState, target: PlaybackState) -> &'static str {
    let playing = current == target;
    match (target, playing) {
        (PlaybackState::Tone, false) => "Play Sound",
        (PlaybackState::Tone, true) => "Stop Sound",
        (PlaybackState::Noise, false) => "Play White Noise Therapy",
        (PlaybackState::Noise, true) => "Stop White Noise Therapy",
        (PlaybackState::Idle, _) => "Stop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_range_scales_and_clamps() {
        assert_eq!(map_range(5.0, 0.0, 10.0, 0.0, 100.0), 50.0);
        assert_eq!(map_range(-1.0, 0.0, 10.0, 0.0, 100.0), 0.0);
        assert_eq!(map_range(20.0, 0.0, 10.0, 0.0, 100.0), 100.0);
        assert_eq!(map_range(255.0, 0.0, 255.0, 0.0, 300.0), 300.0);
    }

    #[test]
    fn bars_fill_the_canvas_width() {
        let data = [0u8, 255, 51, 102];
        let bars: Vec<_> = spectrum_bars(&data, 400.0, 300.0).collect();
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[1].x, 100.0);
        assert_eq!(bars[1].width, 99.0);
        assert_eq!(bars[0].height, 0.0);
        assert_eq!(bars[0].y, 300.0);
        assert_eq!(bars[1].height, 300.0);
        assert_eq!(bars[1].y, 0.0);
        assert!((bars[2].height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn empty_spectrum_has_no_bars() {
        assert_eq!(spectrum_bars(&[], 400.0, 300.0).count(), 0);
    }

    #[test]
    fn pointer_maps_to_frequency_and_volume() {
        // Bottom-left corner: lowest frequency, silence.
        assert_eq!(pointer_to_controls(0.0, 300.0, 800.0, 300.0), (1.0, 0.0));
        // Top-right corner: full range.
        assert_eq!(pointer_to_controls(800.0, 0.0, 800.0, 300.0), (22000.0, 50.0));
        let (freq, vol) = pointer_to_controls(400.0, 150.0, 800.0, 300.0);
        assert_eq!(freq, 11000.0);
        assert_eq!(vol, 25.0);
    }

    #[test]
    fn marker_tracks_controls() {
        let (x, y) = marker_position(1.0, 0.0, 800.0, 300.0);
        assert_eq!((x, y), (-MARKER_RADIUS, 300.0 - MARKER_RADIUS));
        // Volume above the pad range pins the marker to the top edge.
        let (_, y) = marker_position(3000.0, 80.0, 800.0, 300.0);
        assert_eq!(y, -MARKER_RADIUS);
    }

    #[test]
    fn button_labels_follow_state() {
        use PlaybackState::*;
        assert_eq!(button_label(Idle, Tone), "Play Sound");
        assert_eq!(button_label(Tone, Tone), "Stop Sound");
        assert_eq!(button_label(Tone, Noise), "Play White Noise Therapy");
        assert_eq!(button_label(Noise, Noise), "Stop White Noise Therapy");
    }
}
