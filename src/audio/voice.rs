//! A single playing ambient voice: a looping synthesized buffer with a
//! smoothed gain ramp and an optional slow amplitude LFO.

use std::f32::consts::TAU;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use rodio::Source;

use super::synthesis::SynthBuffer;
use super::SoundKind;

pub const FADE_IN_DELAY_SECS: f32 = 0.1;
pub const FADE_IN_TC_SECS: f32 = 0.8;
pub const FADE_OUT_TC_SECS: f32 = 0.5;
pub const ADJUST_TC_SECS: f32 = 0.2;
pub const AUTO_STOP_TC_SECS: f32 = 0.8;
pub const TEARDOWN_SECS: f32 = 1.5;
pub const AUTO_TEARDOWN_SECS: f32 = 2.0;

/// Shared knobs for a live voice. The engine thread writes targets; the
/// playback source reads them once per frame.
pub struct VoiceControl {
    target_gain: AtomicU32,
    ramp_tc: AtomicU32,
    teardown_secs: AtomicU32,
    stopping: AtomicBool,
}

impl VoiceControl {
    pub fn new(target_gain: f32, attack_tc_secs: f32) -> Self {
        Self {
            target_gain: AtomicU32::new(target_gain.to_bits()),
            ramp_tc: AtomicU32::new(attack_tc_secs.to_bits()),
            teardown_secs: AtomicU32::new(TEARDOWN_SECS.to_bits()),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn set_target(&self, gain: f32, tc_secs: f32) {
        self.target_gain
            .store(gain.max(0.0).to_bits(), Ordering::Relaxed);
        self.ramp_tc.store(tc_secs.max(1e-3).to_bits(), Ordering::Relaxed);
    }

    pub fn target(&self) -> f32 {
        f32::from_bits(self.target_gain.load(Ordering::Relaxed))
    }

    pub fn ramp_tc(&self) -> f32 {
        f32::from_bits(self.ramp_tc.load(Ordering::Relaxed))
    }

    pub fn teardown_secs(&self) -> f32 {
        f32::from_bits(self.teardown_secs.load(Ordering::Relaxed))
    }

    /// Fades the voice to silence and arms self-termination. Stopping an
    /// already-stopping voice is a no-op; returns whether this call won.
    pub fn stop(&self, fade_tc_secs: f32, teardown_secs: f32) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.teardown_secs
            .store(teardown_secs.to_bits(), Ordering::Relaxed);
        self.set_target(0.0, fade_tc_secs);
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }
}

pub struct AmbientVoice {
    buffer: SynthBuffer,
    control: Arc<VoiceControl>,
    pos: usize,
    channel: u16,
    gain: f32,
    delay_frames: u64,
    lfo: Option<(f32, f32)>,
    lfo_phase: f32,
    teardown_frames: Option<u64>,
    last_tc: f32,
    alpha: f32,
}

impl AmbientVoice {
    pub fn new(kind: SoundKind, buffer: SynthBuffer, control: Arc<VoiceControl>) -> Self {
        let delay_frames = (FADE_IN_DELAY_SECS * buffer.sample_rate as f32) as u64;
        Self {
            lfo: kind.lfo(),
            buffer,
            control,
            pos: 0,
            channel: 0,
            gain: 0.0,
            delay_frames,
            lfo_phase: 0.0,
            teardown_frames: None,
            last_tc: 0.0,
            alpha: 0.0,
        }
    }

    /// Per-frame bookkeeping: ramp the gain, advance the LFO, count down
    /// the teardown window. Returns false once the voice is spent.
    fn advance_frame(&mut self) -> bool {
        let rate = self.buffer.sample_rate as f32;

        if self.control.is_stopping() && self.teardown_frames.is_none() {
            let frames = (self.control.teardown_secs() * rate) as u64;
            self.teardown_frames = Some(frames);
        }
        if let Some(frames) = &mut self.teardown_frames {
            if *frames == 0 {
                return false;
            }
            *frames -= 1;
        }

        if self.delay_frames > 0 {
            // Hold silent through the fade-in delay.
            self.delay_frames -= 1;
        } else {
            let tc = self.control.ramp_tc();
            if tc != self.last_tc {
                self.last_tc = tc;
                self.alpha = 1.0 - (-1.0 / (tc * rate)).exp();
            }
            self.gain += self.alpha * (self.control.target() - self.gain);
        }

        if let Some((freq, _)) = self.lfo {
            self.lfo_phase = (self.lfo_phase + TAU * freq / rate) % TAU;
        }
        true
    }

    fn modulation(&self) -> f32 {
        match self.lfo {
            // Oscillates between (1 - depth) and 1.
            Some((_, depth)) => (1.0 - depth) + depth * 0.5 * (1.0 + self.lfo_phase.sin()),
            None => 1.0,
        }
    }
}

impl Iterator for AmbientVoice {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.channel == 0 && !self.advance_frame() {
            return None;
        }

        let sample = self.buffer.samples[self.pos];
        self.pos = (self.pos + 1) % self.buffer.samples.len();
        self.channel = (self.channel + 1) % self.buffer.channels;

        Some(sample * self.gain * self.modulation())
    }
}

impl Source for AmbientVoice {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.buffer.channels
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44100;

    fn flat_buffer(channels: u16) -> SynthBuffer {
        SynthBuffer {
            samples: vec![1.0; RATE as usize * channels as usize],
            channels,
            sample_rate: RATE,
        }
    }

    #[test]
    fn gain_ramps_to_the_target_after_the_delay() {
        let control = Arc::new(VoiceControl::new(0.5, 0.05));
        let mut voice = AmbientVoice::new(SoundKind::Rain, flat_buffer(1), control);

        // One second of samples: 0.1 s delay plus many time constants.
        let last = voice.by_ref().take(RATE as usize).last().unwrap();
        assert!((last - 0.5).abs() < 0.02, "settled at {last}");
    }

    #[test]
    fn delay_holds_the_voice_silent() {
        let control = Arc::new(VoiceControl::new(0.5, 0.05));
        let mut voice = AmbientVoice::new(SoundKind::Rain, flat_buffer(1), control);

        let early: Vec<f32> = voice.by_ref().take(2000).collect();
        assert!(early.iter().all(|s| s.abs() < 1e-6), "silent during delay");
    }

    #[test]
    fn stop_is_idempotent_and_terminates_the_voice() {
        let control = Arc::new(VoiceControl::new(0.5, 0.05));
        let mut voice =
            AmbientVoice::new(SoundKind::Rain, flat_buffer(1), control.clone());

        assert!(control.stop(FADE_OUT_TC_SECS, 0.2));
        assert!(!control.stop(FADE_OUT_TC_SECS, 0.2), "second stop is a no-op");

        let drained = voice.by_ref().count();
        // Terminates within the 0.2 s teardown window.
        assert!(drained <= (0.25 * RATE as f32) as usize, "drained {drained}");
    }

    #[test]
    fn stereo_voice_interleaves_frames() {
        let control = Arc::new(VoiceControl::new(1.0, 0.001));
        let mut buffer = flat_buffer(2);
        // Mark channels so interleaving is observable.
        for (i, sample) in buffer.samples.iter_mut().enumerate() {
            *sample = if i % 2 == 0 { 1.0 } else { -1.0 };
        }
        let voice = AmbientVoice::new(SoundKind::Ocean, buffer, control);

        let samples: Vec<f32> = voice.take(RATE as usize).collect();
        // After the ramp settles, even indices stay positive and odd stay
        // negative.
        let tail = &samples[samples.len() - 1000..];
        let offset = samples.len() - 1000;
        for (i, sample) in tail.iter().enumerate() {
            if (offset + i) % 2 == 0 {
                assert!(*sample >= 0.0);
            } else {
                assert!(*sample <= 0.0);
            }
        }
    }
}
