//! Signal-quality assessment ahead of transcription.
//!
//! Transcription is by far the most expensive step in the pipeline, so
//! every drained batch goes through this gate first: decode, measure RMS
//! and band-energy SNR, run VAD, and only hand on buffers that look like
//! intelligible speech. Low-SNR buffers get a light cleanup pass first.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use tracing::warn;

use super::vad;

/// Voice band bounds used for the SNR estimate, in Hz.
const VOICE_BAND_LOW: f32 = 300.0;
const VOICE_BAND_HIGH: f32 = 3400.0;

/// SNR assumed for buffers too short for a meaningful spectrum.
const DEFAULT_SNR_DB: f32 = 5.0;

/// Below this SNR the denoise pass is applied before transcription.
const DENOISE_SNR_DB: f32 = 10.0;

/// Per-batch signal metrics. Computed fresh for every drained batch and
/// never persisted.
#[derive(Debug, Clone, Copy)]
pub struct QualityMetrics {
    /// Normalized RMS level in [0, 1].
    pub rms_level: f32,
    /// Estimated signal-to-noise ratio in dB.
    pub snr: f32,
    /// Voice-activity decision for the whole buffer.
    pub is_voice: bool,
    /// Overall quality score in [0, 1].
    pub quality: f32,
    /// Buffer duration in seconds.
    pub duration_secs: f32,
}

impl QualityMetrics {
    fn rejected() -> Self {
        Self {
            rms_level: 0.0,
            snr: 0.0,
            is_voice: false,
            quality: 0.0,
            duration_secs: 0.0,
        }
    }
}

/// Decodes raw PCM16 bytes and assesses them, returning normalized f32
/// samples ready for the speech engine plus the metrics for gating.
///
/// An odd trailing byte is dropped. An empty buffer yields no samples and
/// a rejected metrics block rather than an error.
pub fn process(audio: &[u8], sample_rate: u32) -> (Vec<f32>, QualityMetrics) {
    let even = audio.len() & !1;
    let audio = &audio[..even];

    let mut samples: Vec<f32> = audio
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    if samples.is_empty() {
        return (samples, QualityMetrics::rejected());
    }

    let rms_level = rms(&samples);
    let snr = estimate_snr(&samples, sample_rate);

    // Fail open: a detector fault must not starve the transcription path.
    let is_voice = vad::detect_voice(audio, sample_rate).unwrap_or_else(|e| {
        warn!("voice detector failed, assuming voice: {}", e);
        true
    });

    let mut quality = 0.0;
    if rms_level > 0.01 && rms_level < 0.8 {
        quality += 0.4;
    }
    if snr > 5.0 {
        quality += 0.6 * (snr / 20.0).min(1.0);
    }
    let quality = quality.min(1.0_f32);

    if snr < DENOISE_SNR_DB {
        denoise(&mut samples, sample_rate);
    }

    let metrics = QualityMetrics {
        rms_level,
        snr,
        is_voice,
        quality,
        duration_secs: samples.len() as f32 / sample_rate as f32,
    };

    (samples, metrics)
}

fn rms(samples: &[f32]) -> f32 {
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum / samples.len() as f64).sqrt()) as f32
}

/// Ratio of energy inside the 300-3400Hz voice band to everything else.
fn estimate_snr(samples: &[f32], sample_rate: u32) -> f32 {
    if samples.len() <= 1024 {
        return DEFAULT_SNR_DB;
    }

    let n = samples.len();
    let mut buffer: Vec<Complex<f32>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

    let bin_hz = sample_rate as f32 / n as f32;
    let mut voice_energy = 0.0f64;
    let mut noise_energy = 0.0f64;

    for (i, c) in buffer.iter().enumerate() {
        // Real input mirrors energy into the upper half of the spectrum;
        // fold each negative-frequency bin onto its positive twin so a
        // tone's full energy is judged against one band.
        let bin = if i <= n / 2 { i } else { n - i };
        let freq = bin as f32 * bin_hz;
        let energy = (c.norm_sqr()) as f64;
        if (VOICE_BAND_LOW..=VOICE_BAND_HIGH).contains(&freq) {
            voice_energy += energy;
        } else {
            noise_energy += energy;
        }
    }

    (10.0 * (voice_energy / (noise_energy + 1e-10)).log10()) as f32
}

/// Best-effort cleanup for noisy buffers: a one-pole high-pass around
/// 300Hz followed by a soft compressor (threshold 0.1, ratio 0.5).
fn denoise(samples: &mut [f32], sample_rate: u32) {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * VOICE_BAND_LOW);
    let dt = 1.0 / sample_rate as f32;
    let alpha = rc / (rc + dt);

    let mut prev_in = samples[0];
    let mut prev_out = 0.0f32;
    for s in samples.iter_mut() {
        let x = *s;
        prev_out = alpha * (prev_out + x - prev_in);
        prev_in = x;
        *s = prev_out;
    }

    const THRESHOLD: f32 = 0.1;
    const RATIO: f32 = 0.5;
    for s in samples.iter_mut() {
        let mag = s.abs();
        if mag > THRESHOLD {
            *s = s.signum() * (THRESHOLD + (mag - THRESHOLD) * RATIO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 16000;

    fn sine_bytes(freq: f32, amplitude: f32, secs: f32) -> Vec<u8> {
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin() * 32767.0) as i16
            })
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    #[test]
    fn clean_tone_scores_above_half_and_is_voice() {
        // 1kHz sine at ~0.3 RMS (amplitude 0.42): in-band energy dominates.
        let audio = sine_bytes(1000.0, 0.42, 1.0);
        let (samples, metrics) = process(&audio, SAMPLE_RATE);

        assert!(!samples.is_empty());
        assert!(metrics.is_voice);
        assert!(metrics.quality > 0.5, "quality was {}", metrics.quality);
        assert!((metrics.rms_level - 0.3).abs() < 0.05);
        assert!(metrics.snr > 10.0);
    }

    #[test]
    fn all_zero_buffer_is_rejected_without_panicking() {
        let audio = vec![0u8; SAMPLE_RATE as usize * 2];
        let (_, metrics) = process(&audio, SAMPLE_RATE);

        assert!(!metrics.is_voice);
        assert!(metrics.quality < 0.5);
        assert_eq!(metrics.rms_level, 0.0);
    }

    #[test]
    fn empty_buffer_yields_no_samples() {
        let (samples, metrics) = process(&[], SAMPLE_RATE);
        assert!(samples.is_empty());
        assert!(!metrics.is_voice);
        assert_eq!(metrics.duration_secs, 0.0);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let mut audio = sine_bytes(1000.0, 0.3, 0.5);
        audio.push(0x7f);
        let (samples, _) = process(&audio, SAMPLE_RATE);
        assert_eq!(samples.len(), (audio.len() - 1) / 2);
    }

    #[test]
    fn short_buffer_uses_default_snr() {
        // 512 samples is under the FFT floor.
        let audio = sine_bytes(1000.0, 0.3, 0.032);
        let (_, metrics) = process(&audio, SAMPLE_RATE);
        assert_eq!(metrics.snr, DEFAULT_SNR_DB);
    }

    #[test]
    fn out_of_band_tone_has_low_snr() {
        let audio = sine_bytes(6000.0, 0.3, 1.0);
        let (_, metrics) = process(&audio, SAMPLE_RATE);
        assert!(metrics.snr < 0.0, "snr was {}", metrics.snr);
    }

    #[test]
    fn duration_matches_sample_count() {
        let audio = sine_bytes(1000.0, 0.3, 1.5);
        let (samples, metrics) = process(&audio, SAMPLE_RATE);
        let expected = samples.len() as f32 / SAMPLE_RATE as f32;
        assert!((metrics.duration_secs - expected).abs() < f32::EPSILON);
    }
}
