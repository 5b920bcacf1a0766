//! Frame-based voice activity detection.
//!
//! Splits the raw PCM16 byte stream into 30ms frames and classifies each
//! one with an energy + zero-crossing detector. A buffer counts as voice
//! when at least 30% of its classified frames look like speech.

use anyhow::{bail, Result};

/// Frame length used for classification, in milliseconds.
pub const FRAME_DURATION_MS: u32 = 30;

/// Minimum share of speech frames for a buffer to count as voice.
pub const VOICE_RATIO: f32 = 0.3;

/// Normalized RMS below which a frame is plain silence.
const ENERGY_THRESHOLD: f32 = 0.01;

/// Zero-crossing rate band typical of voiced speech. Hiss and static sit
/// above the upper bound, hum and DC drift below the lower one.
const ZCR_SPEECH_MIN: f32 = 0.02;
const ZCR_SPEECH_MAX: f32 = 0.35;

/// Decides whether `audio` (raw little-endian PCM16 bytes) contains speech.
///
/// Frames that cannot be classified (trailing partial frame) are skipped
/// rather than counted as silence. A buffer shorter than one frame, or one
/// where nothing classified, is not voice. Callers treat an `Err` as
/// "assume voice" so a detector fault never starves the transcription path.
pub fn detect_voice(audio: &[u8], sample_rate: u32) -> Result<bool> {
    if sample_rate == 0 {
        bail!("sample rate must be non-zero");
    }

    let frame_samples = (sample_rate * FRAME_DURATION_MS / 1000) as usize;
    let frame_bytes = frame_samples * 2;
    if audio.len() < frame_bytes {
        return Ok(false);
    }

    let mut speech_frames = 0usize;
    let mut classified_frames = 0usize;

    for frame in audio.chunks(frame_bytes) {
        match classify_frame(frame) {
            Some(is_speech) => {
                classified_frames += 1;
                if is_speech {
                    speech_frames += 1;
                }
            }
            None => continue,
        }
    }

    if classified_frames == 0 {
        return Ok(false);
    }

    Ok(speech_frames as f32 / classified_frames as f32 >= VOICE_RATIO)
}

/// Classifies one frame. Returns `None` when the frame is too short to
/// decode (the trailing remainder of the buffer).
fn classify_frame(frame: &[u8]) -> Option<bool> {
    if frame.len() < 4 || frame.len() % 2 != 0 {
        return None;
    }

    let samples: Vec<f32> = frame
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
    if rms < ENERGY_THRESHOLD {
        return Some(false);
    }

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let zcr = crossings as f32 / samples.len() as f32;

    Some((ZCR_SPEECH_MIN..=ZCR_SPEECH_MAX).contains(&zcr))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 16000;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn sine(freq: f32, amplitude: f32, secs: f32) -> Vec<i16> {
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin() * 32767.0) as i16
            })
            .collect()
    }

    #[test]
    fn silence_is_not_voice() {
        let audio = pcm_bytes(&vec![0i16; SAMPLE_RATE as usize]);
        assert!(!detect_voice(&audio, SAMPLE_RATE).unwrap());
    }

    #[test]
    fn tone_in_speech_band_is_voice() {
        // 1kHz at 16kHz gives a ZCR of 0.125, squarely inside the band.
        let audio = pcm_bytes(&sine(1000.0, 0.3, 1.0));
        assert!(detect_voice(&audio, SAMPLE_RATE).unwrap());
    }

    #[test]
    fn high_frequency_hiss_is_rejected() {
        // 7kHz crosses zero ~0.875 of samples, well above the speech band.
        let audio = pcm_bytes(&sine(7000.0, 0.3, 1.0));
        assert!(!detect_voice(&audio, SAMPLE_RATE).unwrap());
    }

    #[test]
    fn buffer_shorter_than_one_frame_is_not_voice() {
        let audio = pcm_bytes(&vec![1000i16; 10]);
        assert!(!detect_voice(&audio, SAMPLE_RATE).unwrap());
    }

    #[test]
    fn zero_sample_rate_is_an_error() {
        assert!(detect_voice(&[0u8; 64], 0).is_err());
    }

    #[test]
    fn mostly_silence_with_short_burst_is_not_voice() {
        let mut samples = vec![0i16; SAMPLE_RATE as usize];
        let burst = sine(1000.0, 0.3, 0.1);
        samples[..burst.len()].copy_from_slice(&burst);
        // ~3 speech frames out of ~33 classified, below the 30% ratio.
        assert!(!detect_voice(&pcm_bytes(&samples), SAMPLE_RATE).unwrap());
    }
}
