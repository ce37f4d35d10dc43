//! `seedRandom`, `random`, `gaussRandom` and `noise`.
//!
//! The generator is owned by one evaluation and seeded from the layer, the
//! property and the current time, so the same sample always draws the same
//! numbers. `seedRandom(offset, true)` drops the time from the seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::context::EvaluationContext;
use crate::error::{ExpressionError, Result};
use crate::function::CallArgs;
use crate::value::Value;
use crate::wiggle::WiggleState;

pub struct RandomState {
    rng: StdRng,
    layer: u32,
    property: u32,
    time: f64,
}

impl RandomState {
    pub fn new(ctx: &EvaluationContext) -> Self {
        let layer = ctx.layer.as_ref().map_or(0, |l| l.index);
        let mut state = Self {
            rng: StdRng::seed_from_u64(0),
            layer,
            property: ctx.property_index,
            time: ctx.time,
        };
        state.reseed(0.0, false);
        state
    }

    pub fn reseed(&mut self, offset: f64, timeless: bool) {
        let mut hasher = DefaultHasher::new();
        self.layer.hash(&mut hasher);
        self.property.hash(&mut hasher);
        offset.to_bits().hash(&mut hasher);
        if !timeless {
            self.time.to_bits().hash(&mut hasher);
        }
        self.rng = StdRng::seed_from_u64(hasher.finish());
    }

    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Roughly 90% of the draws fall into `[0, 1]`.
    pub fn gaussian(&mut self) -> f64 {
        let u1 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2 = self.rng.gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        0.5 + z * 0.304
    }
}

pub fn seed_random(state: &mut RandomState, args: &CallArgs) -> Result<Value> {
    let offset = args
        .get(0, "offset")
        .and_then(Value::to_number)
        .ok_or_else(|| ExpressionError::type_error("seedRandom: offset must be a number"))?;
    let timeless = args.get(1, "timeless").is_some_and(Value::is_truthy);
    state.reseed(offset, timeless);
    Ok(Value::Undefined)
}

/// `random()`, `random(max)`, `random(min, max)`; numbers or component-wise
/// over vectors.
pub fn random(
    state: &mut RandomState,
    args: &CallArgs,
    gauss: bool,
    name: &str,
) -> Result<Value> {
    let mut draw = || {
        if gauss {
            state.gaussian()
        } else {
            state.uniform()
        }
    };

    let components = |index: usize, param: &str| -> Result<Option<Vec<f64>>> {
        match args.get(index, param) {
            None => Ok(None),
            Some(v) => v.components().map(Some).ok_or_else(|| {
                ExpressionError::type_error(format!("{}: invalid argument {}", name, v))
            }),
        }
    };
    let first = components(0, "maxValOrArray1")?;
    let second = components(1, "maxValOrArray2")?;
    let vector = args.values().any(Value::is_vector_like);

    let (min, max) = match (first, second) {
        (None, _) => return Ok(Value::Number(draw())),
        (Some(max), None) => (vec![0.0; max.len()], max),
        (Some(min), Some(max)) => (min, max),
    };

    let len = min.len().max(max.len());
    let pick = |v: &[f64], i: usize| match v {
        [single] => *single,
        _ => v.get(i).copied().unwrap_or(0.0),
    };
    let result: Vec<f64> = (0..len)
        .map(|i| {
            let (lo, hi) = (pick(&min, i), pick(&max, i));
            lo + draw() * (hi - lo)
        })
        .collect();

    match (vector, result.as_slice()) {
        (false, [n]) => Ok(Value::Number(*n)),
        _ => Ok(Value::from_components(result)),
    }
}

pub fn noise(args: &CallArgs) -> Result<Value> {
    let coords = args
        .get(0, "valOrArray")
        .and_then(Value::components)
        .ok_or_else(|| ExpressionError::type_error("noise: argument must be a number or an array"))?;
    Ok(Value::Number(WiggleState::default().sample(&coords)))
}
