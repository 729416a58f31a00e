//! Procedural generation of the ambient loop buffers.
//!
//! Everything here is pure sample math: no audio context, no clocks. Each
//! texture is noise shaped by a small filter chain, normalized, and blended
//! across the loop point so playback can wrap seamlessly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use super::SoundKind;

/// Length of a generated loop. Long enough that the ear does not pick up
/// the repetition in a steady texture.
pub const AMBIENT_LOOP_SECS: f32 = 6.0;

const NORMALIZE_PEAK: f32 = 0.85;
const LOOP_FADE_SECS: f32 = 0.05;

/// Probability per sample of a fireplace crackle impulse.
const CRACKLE_PROBABILITY: f64 = 1.0 / 2500.0;
/// Exponential decay time constant of one crackle, in seconds.
const CRACKLE_DECAY_SECS: f32 = 0.015;

#[derive(Debug, Clone)]
pub struct SynthBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl SynthBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

pub fn synthesize(kind: SoundKind, duration_secs: f32, sample_rate: u32) -> SynthBuffer {
    let mut rng = StdRng::from_entropy();
    synthesize_with(kind, duration_secs, sample_rate, &mut rng)
}

pub fn synthesize_with(
    kind: SoundKind,
    duration_secs: f32,
    sample_rate: u32,
    rng: &mut StdRng,
) -> SynthBuffer {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let rate = sample_rate as f32;

    let mut buffer = match kind {
        SoundKind::Rain => {
            // Steady hiss: white noise band-limited to suppress rumble and
            // the harshest top end.
            let mut samples = white_noise(rng, frames);
            Biquad::highpass(rate, 800.0, 0.707).process_buffer(&mut samples);
            Biquad::lowpass(rate, 4000.0, 0.707).process_buffer(&mut samples);
            SynthBuffer {
                samples,
                channels: 1,
                sample_rate,
            }
        }
        SoundKind::CoffeeShop => {
            // Warm murmur: brown-ish noise with the sub-bass removed, hiss
            // rolled off, and a presence bump where voices sit.
            let mut samples = brown_noise(rng, frames);
            Biquad::highpass(rate, 120.0, 0.707).process_buffer(&mut samples);
            Biquad::lowpass(rate, 3500.0, 0.707).process_buffer(&mut samples);
            Biquad::peaking(rate, 700.0, 1.0, 4.0).process_buffer(&mut samples);
            SynthBuffer {
                samples,
                channels: 1,
                sample_rate,
            }
        }
        SoundKind::Fireplace => {
            let crackles = crackle_train(rng, frames, rate);
            let body = pink_noise(rng, frames);
            let mut samples: Vec<f32> = body
                .iter()
                .zip(&crackles)
                .map(|(pink, crackle)| pink * 0.7 + crackle)
                .collect();
            Biquad::lowpass(rate, 2800.0, 0.707).process_buffer(&mut samples);
            Biquad::peaking(rate, 160.0, 0.9, 6.0).process_buffer(&mut samples);
            Biquad::peaking(rate, 650.0, 1.0, 3.0).process_buffer(&mut samples);
            SynthBuffer {
                samples,
                channels: 1,
                sample_rate,
            }
        }
        SoundKind::Ocean => {
            // Dull stereo rumble; the wave swell lives in the playback LFO.
            let mut left = white_noise(rng, frames);
            let mut right = white_noise(rng, frames);
            Biquad::lowpass(rate, 600.0, 0.707).process_buffer(&mut left);
            Biquad::lowpass(rate, 600.0, 0.707).process_buffer(&mut right);
            let mut samples = Vec::with_capacity(frames * 2);
            for (l, r) in left.iter().zip(&right) {
                samples.push(*l);
                samples.push(*r);
            }
            SynthBuffer {
                samples,
                channels: 2,
                sample_rate,
            }
        }
    };

    normalize(&mut buffer.samples, NORMALIZE_PEAK);
    let fade_frames = (LOOP_FADE_SECS * rate) as usize;
    crossfade_loop(&mut buffer, fade_frames);
    buffer
}

fn white_noise(rng: &mut StdRng, frames: usize) -> Vec<f32> {
    (0..frames).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Leaky integration of white noise: small random steps, clamped, with a
/// gentle decay so no DC offset builds up.
fn brown_noise(rng: &mut StdRng, frames: usize) -> Vec<f32> {
    let mut last = 0.0f32;
    (0..frames)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            last += white * 0.02;
            last = last.clamp(-1.0, 1.0);
            last *= 0.9999;
            last
        })
        .collect()
}

/// Three leaky integrators at staggered time constants, summed. A cheap
/// pink-noise approximation with roughly -3 dB/octave over the audible
/// band.
fn pink_noise(rng: &mut StdRng, frames: usize) -> Vec<f32> {
    let (mut b0, mut b1, mut b2) = (0.0f32, 0.0f32, 0.0f32);
    (0..frames)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            b0 = 0.99765 * b0 + white * 0.0990460;
            b1 = 0.96300 * b1 + white * 0.2965164;
            b2 = 0.57000 * b2 + white * 1.0526913;
            (b0 + b1 + b2 + white * 0.1848) * 0.2
        })
        .collect()
}

/// Sparse impulse train with exponentially decaying envelopes, carried on
/// white noise so each crackle sounds like a burst rather than a click.
fn crackle_train(rng: &mut StdRng, frames: usize, sample_rate: f32) -> Vec<f32> {
    let decay = (-1.0 / (CRACKLE_DECAY_SECS * sample_rate)).exp();
    let mut envelope = 0.0f32;
    (0..frames)
        .map(|_| {
            envelope *= decay;
            if rng.gen_bool(CRACKLE_PROBABILITY) {
                envelope += rng.gen_range(0.4..1.0);
            }
            envelope * rng.gen_range(-1.0..1.0f32)
        })
        .collect()
}

fn normalize(samples: &mut [f32], target_peak: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 1e-6 {
        let scale = target_peak / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Blends the buffer tail into its head and drops the tail, so sample
/// `len-1` flows into sample `0` without a click.
fn crossfade_loop(buffer: &mut SynthBuffer, fade_frames: usize) {
    let channels = buffer.channels as usize;
    let frames = buffer.frames();
    let fade = fade_frames.min(frames / 4);
    if fade == 0 {
        return;
    }
    for i in 0..fade {
        let weight = i as f32 / fade as f32;
        for c in 0..channels {
            let head = i * channels + c;
            let tail = (frames - fade + i) * channels + c;
            buffer.samples[head] =
                buffer.samples[head] * weight + buffer.samples[tail] * (1.0 - weight);
        }
    }
    buffer.samples.truncate((frames - fade) * channels);
}

/// Two-pole filter in direct form 1, coefficients from the RBJ audio EQ
/// cookbook.
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn lowpass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let omega = TAU * freq / sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    pub fn highpass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let omega = TAU * freq / sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    pub fn peaking(sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Self {
        let amp = 10.0f32.powf(gain_db / 40.0);
        let omega = TAU * freq / sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            1.0 + alpha * amp,
            -2.0 * cos,
            1.0 - alpha * amp,
            1.0 + alpha / amp,
            -2.0 * cos,
            1.0 - alpha / amp,
        )
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    pub fn process_buffer(mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44100;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Signal power at one frequency via the Goertzel recurrence.
    fn goertzel_power(samples: &[f32], sample_rate: f32, freq: f32) -> f32 {
        let coeff = 2.0 * (TAU * freq / sample_rate).cos();
        let (mut s_prev, mut s_prev2) = (0.0f32, 0.0f32);
        for sample in samples {
            let s = sample + coeff * s_prev - s_prev2;
            s_prev2 = s_prev;
            s_prev = s;
        }
        (s_prev2 * s_prev2 + s_prev * s_prev - coeff * s_prev * s_prev2) / samples.len() as f32
    }

    /// Power averaged over several bins; single noise bins fluctuate too
    /// much to compare directly.
    fn band_power(samples: &[f32], sample_rate: f32, freqs: &[f32]) -> f32 {
        freqs
            .iter()
            .map(|freq| goertzel_power(samples, sample_rate, *freq))
            .sum::<f32>()
            / freqs.len() as f32
    }

    #[test]
    fn lowpass_passes_dc_and_highpass_blocks_it() {
        let mut lp = Biquad::lowpass(RATE as f32, 1000.0, 0.707);
        let mut hp = Biquad::highpass(RATE as f32, 1000.0, 0.707);
        let mut lp_out = 0.0;
        let mut hp_out = 0.0;
        for _ in 0..4000 {
            lp_out = lp.process(1.0);
            hp_out = hp.process(1.0);
        }
        assert!((lp_out - 1.0).abs() < 0.01, "lowpass DC gain ~1, got {lp_out}");
        assert!(hp_out.abs() < 0.01, "highpass DC gain ~0, got {hp_out}");
    }

    #[test]
    fn rain_power_sits_in_the_hiss_band() {
        let buffer = synthesize_with(SoundKind::Rain, 2.0, RATE, &mut seeded(7));
        assert_eq!(buffer.channels, 1);
        let rate = RATE as f32;
        let in_band = band_power(
            &buffer.samples,
            rate,
            &[1600.0, 1900.0, 2200.0, 2500.0, 2800.0],
        );
        let below = band_power(&buffer.samples, rate, &[60.0, 100.0, 140.0, 180.0, 220.0]);
        let above = band_power(
            &buffer.samples,
            rate,
            &[8200.0, 8800.0, 9400.0, 10000.0, 10600.0],
        );
        assert!(in_band > below * 3.0, "in {in_band} below {below}");
        assert!(in_band > above * 3.0, "in {in_band} above {above}");
    }

    #[test]
    fn ocean_is_a_stereo_low_rumble() {
        let buffer = synthesize_with(SoundKind::Ocean, 2.0, RATE, &mut seeded(11));
        assert_eq!(buffer.channels, 2);
        let left: Vec<f32> = buffer.samples.iter().step_by(2).copied().collect();
        let rate = RATE as f32;
        let low = band_power(&left, rate, &[120.0, 180.0, 240.0, 300.0, 360.0]);
        let high = band_power(&left, rate, &[2400.0, 2800.0, 3200.0, 3600.0, 4000.0]);
        assert!(low > high * 3.0, "low {low} high {high}");
    }

    #[test]
    fn crackle_train_is_sparse_bursts() {
        let crackles = crackle_train(&mut seeded(13), 2 * RATE as usize, RATE as f32);
        let peak = crackles.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.2, "expected at least one audible crackle");
        let quiet = crackles
            .iter()
            .filter(|sample| sample.abs() < peak * 0.05)
            .count();
        assert!(
            quiet as f32 > crackles.len() as f32 * 0.8,
            "most of the train is silence between bursts"
        );
    }

    #[test]
    fn buffers_are_normalized_and_loop_trimmed() {
        for kind in SoundKind::ALL {
            let buffer = synthesize_with(kind, 2.0, RATE, &mut seeded(17));
            let expected_frames =
                (2.0 * RATE as f32) as usize - (LOOP_FADE_SECS * RATE as f32) as usize;
            assert_eq!(buffer.frames(), expected_frames, "{kind:?}");
            let peak = buffer.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            assert!(peak <= NORMALIZE_PEAK + 1e-3, "{kind:?} peak {peak}");
            assert!(buffer.samples.iter().all(|s| s.is_finite()), "{kind:?}");
        }
    }
}
