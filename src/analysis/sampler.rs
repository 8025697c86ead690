//! Log-spaced resampling of the raw magnitude spectrum into visual bands.
//!
//! Band `i` targets `20 * (16000/20)^(i/N)` Hz, so visual resolution
//! concentrates in the musically dense low/mid range while the highs stay
//! compact. The target frequency maps to a raw bin via
//! `bin = floor(freq * M * 2 / sample_rate)` and is averaged with its
//! immediate neighbors to knock down single-bin noise.

/// Low bound of the mapped frequency range.
pub const MIN_FREQ_HZ: f32 = 20.0;
/// High bound of the mapped frequency range.
pub const MAX_FREQ_HZ: f32 = 16_000.0;

/// Resample a raw magnitude array (one byte per linear-frequency bin, 0-255)
/// into `band_count` log-spaced band values on the same 0-255 scale.
///
/// Bands whose bin window falls entirely outside the spectrum contribute 0.
pub fn sample_bands(magnitudes: &[u8], sample_rate: u32, band_count: usize) -> Vec<f32> {
    let bins = magnitudes.len();
    let mut out = vec![0.0f32; band_count];
    if bins == 0 || sample_rate == 0 || band_count == 0 {
        return out;
    }

    let ratio = MAX_FREQ_HZ / MIN_FREQ_HZ;
    for (i, band) in out.iter_mut().enumerate() {
        let target_freq = MIN_FREQ_HZ * ratio.powf(i as f32 / band_count as f32);
        let bin = ((target_freq * bins as f32 * 2.0) / sample_rate as f32).floor() as i64;

        // Fixed +-1 neighbor window regardless of band density; at high band
        // counts adjacent bands may read the same bin.
        let mut sum = 0.0f32;
        let mut count = 0u32;
        for n in -1i64..=1 {
            let idx = bin + n;
            if idx >= 0 && (idx as usize) < bins {
                sum += f32::from(magnitudes[idx as usize]);
                count += 1;
            }
        }
        *band = if count > 0 { sum / count as f32 } else { 0.0 };
    }
    out
}

/// Deterministic idle animation used before any audio is live.
///
/// A pure function of the frame counter and band index, so the preview is
/// never static and tests can replay it exactly.
pub fn idle_bands(frame_count: u64, band_count: usize) -> Vec<f32> {
    let t = frame_count as f32;
    let pulse = (t * 0.05).sin() * 0.2 + 0.3;
    (0..band_count)
        .map(|i| {
            let wave = (i as f32 * 0.15 + t * 0.04).sin() * 0.5 + 0.5;
            pulse * wave * 50.0
        })
        .collect()
}
