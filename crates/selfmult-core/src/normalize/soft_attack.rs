//! Soft-attack envelope for sudden loudness jumps
//!
//! RMS normalization lags a full window behind an onset, so a transient
//! would pass at full gain and then get pulled down (audible pumping). When
//! a jump is detected the gain is additionally shaped by a curve that starts
//! at 1, dips sharply and recovers to ~1 over one RMS window.

use crate::types::{Sample, SILENCE_THRESHOLD};

/// A rise must exceed the largest rise in the window by this factor to count
/// as an attack
pub const ATTACK_TRIGGER_RATIO: Sample = 1.5;

/// Precompute the attack curve `1/(100t+1) + 0.9901·t²` for `t = i/len`
pub fn attack_curve(len: usize) -> Vec<Sample> {
    (0..len)
        .map(|i| {
            let t = i as Sample / len as Sample;
            1.0 / (100.0 * t + 1.0) + 0.9901 * t * t
        })
        .collect()
}

/// Per-channel attack detector and envelope position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoftAttack {
    in_progress: bool,
    /// Next index into the attack curve
    progress: usize,
    /// Largest rise between neighbouring squared samples in the window
    max_rise: Sample,
    /// Ring position of the sample that produced `max_rise`
    max_rise_index: usize,
}

impl SoftAttack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    #[inline]
    pub fn progress(&self) -> usize {
        self.progress
    }

    #[inline]
    pub fn max_rise(&self) -> Sample {
        self.max_rise
    }

    /// Inspect the squared sample just written at `cursor`
    ///
    /// Compares it with the previously written one. When the slot holding
    /// the current maximum rise has just been overwritten, the maximum is
    /// rebuilt from the rest of the window first.
    pub fn detect(&mut self, squares: &[Sample], cursor: usize, sum_of_squares: f32) {
        let len = squares.len();
        let previous = if cursor == 0 { len - 1 } else { cursor - 1 };
        let rise = squares[cursor] - squares[previous];

        if cursor == self.max_rise_index {
            self.max_rise = window_max_rise(squares, cursor);
        }

        if rise > self.max_rise * ATTACK_TRIGGER_RATIO {
            self.trigger(sum_of_squares);
        }

        if rise > self.max_rise {
            self.max_rise = rise;
            self.max_rise_index = cursor;
        }
    }

    /// Start the envelope unless one is running or the channel is silent
    pub fn trigger(&mut self, sum_of_squares: f32) {
        if !self.in_progress && sum_of_squares > SILENCE_THRESHOLD {
            self.in_progress = true;
            self.progress = 0;
        }
    }

    /// Envelope factor for the current sample, advancing the envelope
    ///
    /// Returns 1 outside an attack. An attack lasts exactly `curve.len()`
    /// samples.
    #[inline]
    pub fn next_factor(&mut self, curve: &[Sample], exponent: f32) -> Sample {
        if !self.in_progress {
            return 1.0;
        }
        let factor = curve[self.progress].powf(exponent);
        self.progress += 1;
        if self.progress >= curve.len() {
            self.in_progress = false;
        }
        factor
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Largest neighbour rise in the window, ignoring the pairs that touch `skip`
fn window_max_rise(squares: &[Sample], skip: usize) -> Sample {
    let len = squares.len();
    let mut max_rise = 0.0;
    let mut last = len - 1;
    for index in 0..len {
        if index != skip && last != skip {
            let rise = squares[index] - squares[last];
            if rise > max_rise {
                max_rise = rise;
            }
        }
        last = index;
    }
    max_rise
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_shape() {
        let curve = attack_curve(800);
        assert_eq!(curve.len(), 800);
        assert_eq!(curve[0], 1.0);

        // Sharp dip early on
        let min = curve.iter().cloned().fold(Sample::MAX, Sample::min);
        assert!(min < 0.2, "curve minimum {} should dip well below 1", min);

        // Recovers to ~1 at the end
        let last = *curve.last().unwrap();
        assert!((last - 1.0).abs() < 0.02, "curve ends at {}", last);
    }

    #[test]
    fn test_envelope_lasts_exactly_curve_length() {
        let curve = attack_curve(32);
        let mut attack = SoftAttack::new();
        attack.trigger(1.0);
        assert!(attack.in_progress());

        for i in 0..32 {
            let factor = attack.next_factor(&curve, 1.0);
            assert_eq!(factor, curve[i]);
        }
        assert!(!attack.in_progress());
        assert_eq!(attack.next_factor(&curve, 1.0), 1.0);
    }

    #[test]
    fn test_factor_uses_exponent() {
        let curve = attack_curve(16);
        let mut attack = SoftAttack::new();
        attack.trigger(1.0);
        attack.next_factor(&curve, 2.0);
        let factor = attack.next_factor(&curve, 2.0);
        assert!((factor - curve[1] * curve[1]).abs() < 1e-6);
    }

    #[test]
    fn test_silent_channel_never_triggers() {
        let mut attack = SoftAttack::new();
        attack.trigger(SILENCE_THRESHOLD * 0.5);
        assert!(!attack.in_progress());
    }

    #[test]
    fn test_trigger_does_not_restart_running_attack() {
        let curve = attack_curve(16);
        let mut attack = SoftAttack::new();
        attack.trigger(1.0);
        attack.next_factor(&curve, 1.0);
        attack.next_factor(&curve, 1.0);
        attack.trigger(1.0);
        assert_eq!(attack.progress(), 2);
    }

    #[test]
    fn test_step_is_detected() {
        let mut squares = vec![0.0; 8];
        let mut attack = SoftAttack::new();

        for cursor in 0..4 {
            attack.detect(&squares, cursor, 0.0);
        }
        assert!(!attack.in_progress());

        squares[4] = 1.0;
        attack.detect(&squares, 4, 1.0);
        assert!(attack.in_progress());
        assert_eq!(attack.max_rise(), 1.0);
    }

    #[test]
    fn test_max_rise_rebuilt_when_evicted() {
        let squares = vec![0.0, 0.5, 0.5, 0.6, 0.6, 0.6];
        let mut attack = SoftAttack::new();
        attack.max_rise = 0.5;
        attack.max_rise_index = 1;

        // Slot 1 was just overwritten; pairs (0,1) and (1,2) are skipped,
        // leaving the 0.1 rise at (2,3)
        attack.detect(&squares, 1, 1.0);
        assert!((attack.max_rise() - 0.5).abs() < 1e-6);
        assert_eq!(attack.max_rise_index, 1);

        let rebuilt = window_max_rise(&squares, 1);
        assert!((rebuilt - 0.1).abs() < 1e-6);
    }
}
