//! Rational-ratio polyphase resampling.
//!
//! A conversion from `input` Hz to `target` Hz is carried out as upsampling by
//! `target / gcd` followed by decimation by `input / gcd`, with a single
//! Kaiser-windowed low-pass FIR in between. The filter is only ever evaluated
//! at the phases that contribute to a kept output sample, so the upsampled
//! signal is never materialized.

use std::f64::consts::PI;

use crate::audio::AudioBuffer;
use crate::error::ResampleError;

/// Kaiser window shape parameter of the anti-aliasing filter.
pub const KAISER_BETA: f64 = 5.0;

/// Filter half-length, in multiples of `max(up, down)`.
pub const HALF_LENGTH_FACTOR: usize = 10;

/// Interpolation and decimation factors reduced to lowest terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RationalRatio {
    /// Upsampling (interpolation) factor.
    pub up: u32,
    /// Downsampling (decimation) factor.
    pub down: u32,
}

impl RationalRatio {
    /// Reduce `target_rate / input_rate` through their greatest common divisor.
    pub fn between(input_rate: u32, target_rate: u32) -> Result<Self, ResampleError> {
        if input_rate == 0 || target_rate == 0 {
            return Err(ResampleError::InvalidSampleRate);
        }

        let divisor = gcd(input_rate, target_rate);
        Ok(Self {
            up: target_rate / divisor,
            down: input_rate / divisor,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.up == self.down
    }

    /// Number of output frames produced from `frames` input frames.
    pub fn output_len(&self, frames: usize) -> usize {
        let scaled = frames as u128 * u128::from(self.up);
        let down = u128::from(self.down);
        (scaled / down + u128::from(scaled % down != 0)) as usize
    }
}

/// What has to happen to bring a source to the target rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResamplePlan {
    /// The source is already at the target rate and is referenced as is.
    PassThrough,
    /// The source has to be converted with the given ratio.
    Convert(RationalRatio),
}

impl ResamplePlan {
    pub fn between(input_rate: u32, target_rate: u32) -> Result<Self, ResampleError> {
        let ratio = RationalRatio::between(input_rate, target_rate)?;
        if ratio.is_identity() {
            Ok(Self::PassThrough)
        } else {
            Ok(Self::Convert(ratio))
        }
    }
}

pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let rem = a % b;
        a = b;
        b = rem;
    }
    a
}

/// Converts decoded audio by a rational ratio.
///
/// Implementations are shared by every worker of a run.
pub trait Resample: Sync {
    fn resample(
        &self,
        audio: &AudioBuffer,
        ratio: RationalRatio,
    ) -> Result<AudioBuffer, ResampleError>;
}

/// Windowed-sinc polyphase resampler.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolyphaseResampler;

impl PolyphaseResampler {
    pub fn new() -> Self {
        Self
    }
}

impl Resample for PolyphaseResampler {
    fn resample(
        &self,
        audio: &AudioBuffer,
        ratio: RationalRatio,
    ) -> Result<AudioBuffer, ResampleError> {
        if audio.sample_rate == 0 {
            return Err(ResampleError::InvalidSampleRate);
        }
        if audio.frames() == 0 {
            return Err(ResampleError::EmptyAudio);
        }

        let target_rate =
            u64::from(audio.sample_rate) * u64::from(ratio.up) / u64::from(ratio.down);
        let target_rate =
            u32::try_from(target_rate).map_err(|_| ResampleError::InvalidSampleRate)?;
        if ratio.is_identity() {
            return Ok(audio.clone());
        }

        let filter = design_filter(ratio);
        let planes: Vec<Vec<f32>> = audio
            .deinterleave()
            .iter()
            .map(|plane| resample_plane(plane, ratio, &filter))
            .collect();

        Ok(AudioBuffer::interleave(&planes, target_rate))
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-16 {
            return sum;
        }
        k += 1.0;
    }
}

fn kaiser(n: usize, len: usize, beta: f64) -> f64 {
    if len == 1 {
        return 1.0;
    }
    let r = 2.0 * n as f64 / (len - 1) as f64 - 1.0;
    bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / bessel_i0(beta)
}

/// Low-pass FIR taps for `ratio`, with unity DC gain scaled by `ratio.up`.
///
/// The cutoff sits at the lower of the two Nyquist frequencies, expressed in
/// the upsampled domain, and the length is `2 * 10 * max(up, down) + 1`.
pub fn design_filter(ratio: RationalRatio) -> Vec<f64> {
    let max_rate = ratio.up.max(ratio.down) as usize;
    let half_len = HALF_LENGTH_FACTOR * max_rate;
    let len = 2 * half_len + 1;
    let cutoff = 1.0 / max_rate as f64;

    let mut taps: Vec<f64> = (0..len)
        .map(|n| {
            let m = n as f64 - half_len as f64;
            cutoff * sinc(cutoff * m) * kaiser(n, len, KAISER_BETA)
        })
        .collect();

    let gain = f64::from(ratio.up) / taps.iter().sum::<f64>();
    for tap in &mut taps {
        *tap *= gain;
    }
    taps
}

/// Resample a single channel with precomputed `filter` taps.
///
/// Output sample `m` is the filter centred on position `m * down` of the
/// zero-stuffed upsampled signal; only the taps that hit non-zero samples
/// (every `up`-th one, starting at the output's phase) are evaluated.
pub fn resample_plane(input: &[f32], ratio: RationalRatio, filter: &[f64]) -> Vec<f32> {
    let up = ratio.up as usize;
    let down = ratio.down as usize;
    let half_len = filter.len() / 2;
    let out_len = ratio.output_len(input.len());

    let mut output = Vec::with_capacity(out_len);
    for m in 0..out_len {
        let position = m * down + half_len;
        let newest = position / up;
        let mut tap = position % up;
        let mut acc = 0.0f64;
        let mut back = 0usize;

        while tap < filter.len() && back <= newest {
            if let Some(&sample) = input.get(newest - back) {
                acc += filter[tap] * f64::from(sample);
            }
            tap += up;
            back += 1;
        }
        output.push(acc as f32);
    }
    output
}
