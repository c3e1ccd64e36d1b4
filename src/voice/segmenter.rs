//! Utterance segmentation
//!
//! Splits a continuous microphone stream into finalized utterances using RMS
//! energy: speech onset above a threshold opens a segment, a run of silence
//! closes it.

use super::capture::SAMPLE_RATE;

/// Minimum RMS energy treated as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Segments shorter than this are discarded as noise (0.3 s)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Trailing silence that finalizes an utterance (0.5 s)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize / 2;

/// Hard cap on a single utterance (30 s)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech onset
    Idle,
    /// Inside an utterance, accumulating samples
    Speaking,
}

/// Energy-based utterance segmenter
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmenterState,
    buffer: Vec<f32>,
    silence: usize,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceSegmenter {
    /// Create an idle segmenter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            buffer: Vec::new(),
            silence: 0,
        }
    }

    /// Feed one chunk of samples
    ///
    /// Returns the utterance's samples once it is finalized.
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    tracing::trace!(energy, "speech onset");
                    self.state = SegmenterState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence = 0;
                }
                None
            }
            SegmenterState::Speaking => {
                self.buffer.extend_from_slice(samples);
                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                let finished = self.silence > SILENCE_SAMPLES
                    || self.buffer.len() >= MAX_UTTERANCE_SAMPLES;
                if !finished {
                    return None;
                }

                let speech_len = self.buffer.len().saturating_sub(self.silence);
                let utterance = std::mem::take(&mut self.buffer);
                self.reset();

                if speech_len < MIN_SPEECH_SAMPLES {
                    tracing::trace!(samples = speech_len, "segment too short, dropped");
                    return None;
                }

                tracing::debug!(samples = utterance.len(), "utterance finalized");
                Some(utterance)
            }
        }
    }

    /// Discard any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.buffer.clear();
        self.silence = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.3 * (i as f32 * 0.1).sin())
            .collect()
    }

    fn silence(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        vec![0.0; n]
    }

    #[test]
    fn energy_calculation() {
        assert!(calculate_energy(&[0.0; 100]) < 0.001);
        assert!(calculate_energy(&[0.5; 100]) > 0.4);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn silence_never_opens_a_segment() {
        let mut seg = UtteranceSegmenter::new();
        assert!(seg.push(&silence(1.0)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn speech_then_silence_finalizes() {
        let mut seg = UtteranceSegmenter::new();
        assert!(seg.push(&tone(0.5)).is_none());
        assert_eq!(seg.state(), SegmenterState::Speaking);

        let utterance = seg.push(&silence(0.6)).unwrap();
        assert!(utterance.len() >= tone(0.5).len());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn short_blip_is_dropped() {
        let mut seg = UtteranceSegmenter::new();
        seg.push(&tone(0.1));
        assert!(seg.push(&silence(0.6)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn reset_discards_partial_speech() {
        let mut seg = UtteranceSegmenter::new();
        seg.push(&tone(0.5));
        seg.reset();
        assert!(seg.push(&silence(0.6)).is_none());
    }
}
