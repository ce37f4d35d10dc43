//! Perlin noise behind `wiggle()` and `noise()`.

use noise::{NoiseFn, Perlin};

use crate::property::PropertyValue;

/// Higher octaves add nothing visible and only cost samples.
pub const MAX_OCTAVES: i32 = 16;

/// Wiggle state for deterministic noise generation
pub struct WiggleState {
    perlin: Perlin,
    seed: u32,
}

impl WiggleState {
    pub fn with_seed(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    /// One dimension of AE wiggle.
    ///
    /// Octaves are sampled at doubling frequencies and `amp_mult` scaled
    /// amplitudes. The sum is clamped to `[-amp, amp]`.
    pub fn wiggle(&self, time: f64, freq: f64, amp: f64, octaves: i32, amp_mult: f64) -> f64 {
        let sample_time = time * freq;
        let mut result = 0.0;
        let mut current_amp = amp;
        let mut current_freq = 1.0;

        for _ in 0..octaves.clamp(1, MAX_OCTAVES) {
            // Integer lattice points are always zero, keep coordinates fractional
            let noise_val = self
                .perlin
                .get([sample_time * current_freq * 0.1, self.seed as f64 * 0.01 + 0.5]);
            result += noise_val * current_amp;
            current_amp *= amp_mult;
            current_freq *= 2.0;
        }

        let bound = amp.abs();
        result.clamp(-bound, bound)
    }

    /// Independent noise per dimension.
    pub fn wiggle_vector(
        &self,
        time: f64,
        freq: f64,
        amp: &[f64],
        octaves: i32,
        amp_mult: f64,
    ) -> Vec<f64> {
        amp.iter()
            .enumerate()
            .map(|(i, a)| {
                let dim_state = WiggleState::with_seed(self.seed.wrapping_add(i as u32));
                dim_state.wiggle(time, freq, *a, octaves, amp_mult)
            })
            .collect()
    }

    /// AE `noise(val)`: a value in `[-1, 1]` for a number or a point.
    pub fn sample(&self, coords: &[f64]) -> f64 {
        match coords {
            [] => 0.0,
            [x] => self.perlin.get([*x, 0.5]),
            [x, y] => self.perlin.get([*x, *y]),
            [x, y, z, ..] => self.perlin.get([*x, *y, *z]),
        }
    }
}

impl Default for WiggleState {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

/// Wiggle a property value according to AE semantics
pub fn wiggle_property_value(
    base_value: &PropertyValue,
    time: f64,
    freq: f64,
    amp: f64,
    octaves: i32,
    amp_mult: f64,
    seed: u32,
) -> PropertyValue {
    let wiggle_state = WiggleState::with_seed(seed);

    match base_value {
        PropertyValue::Scalar(v) => {
            PropertyValue::Scalar(v + wiggle_state.wiggle(time, freq, amp, octaves, amp_mult))
        }
        PropertyValue::Vector(components) => {
            let amps = vec![amp; components.len()];
            let wiggled = wiggle_state.wiggle_vector(time, freq, &amps, octaves, amp_mult);
            PropertyValue::Vector(
                components
                    .iter()
                    .zip(wiggled.iter())
                    .map(|(base, w)| base + w)
                    .collect(),
            )
        }
    }
}
