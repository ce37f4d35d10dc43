//! `linear`, `ease`, `easeIn`, `easeOut` and the bezier solver shared with
//! the keyframe sampler.

use glam::DVec2;

use crate::error::{ExpressionError, Result};
use crate::function::CallArgs;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    Linear,
    /// Cubic bezier through (0,0), `p1`, `p2`, (1,1).
    Bezier(DVec2, DVec2),
}

pub const EASE: Easing = Easing::Bezier(DVec2::new(0.33, 0.0), DVec2::new(0.667, 1.0));
pub const EASE_IN: Easing = Easing::Bezier(DVec2::new(0.333, 0.0), DVec2::new(0.833, 0.833));
pub const EASE_OUT: Easing = Easing::Bezier(DVec2::new(0.167, 0.167), DVec2::new(0.667, 1.0));

impl Easing {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Easing::Linear => x.clamp(0.0, 1.0),
            Easing::Bezier(p1, p2) => solve_cubic_bezier(p1, p2, x),
        }
    }
}

/// Eased progress for `x` in `[0, 1]`.
pub fn solve_cubic_bezier(p1: DVec2, p2: DVec2, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est =
            3.0 * one_minus_t * one_minus_t * t * p1.x + 3.0 * one_minus_t * t * t * p2.x + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-6 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-9 {
            break;
        }
        t = (t - err / dx_dt).clamp(0.0, 1.0);
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// `fn(t, tMin, tMax, value1, value2)` or `fn(t, value1, value2)` with the
/// range `[0, 1]`.
pub fn interpolate(easing: Easing, name: &str, args: &CallArgs) -> Result<Value> {
    let number = |index: usize, param: &str| -> Result<f64> {
        args.get(index, param)
            .and_then(Value::to_number)
            .ok_or_else(|| ExpressionError::type_error(format!("{}: '{}' must be a number", name, param)))
    };

    let (t, t_min, t_max, from, to) = if args.len() == 3 {
        (number(0, "t")?, 0.0, 1.0, arg(args, 1, "value1", name)?, arg(args, 2, "value2", name)?)
    } else {
        (
            number(0, "t")?,
            number(1, "tMin")?,
            number(2, "tMax")?,
            arg(args, 3, "value1", name)?,
            arg(args, 4, "value2", name)?,
        )
    };

    let progress = if t_max == t_min {
        if t >= t_max {
            1.0
        } else {
            0.0
        }
    } else {
        easing.apply((t - t_min) / (t_max - t_min))
    };

    blend(&from, &to, progress, name)
}

fn arg(args: &CallArgs, index: usize, param: &str, name: &str) -> Result<Value> {
    args.get(index, param)
        .cloned()
        .map(Value::resolve)
        .ok_or_else(|| ExpressionError::MissingArgument {
            parameter: param.to_string(),
            function: name.to_string(),
        })
}

fn blend(from: &Value, to: &Value, progress: f64, name: &str) -> Result<Value> {
    if !from.is_vector_like() && !to.is_vector_like() {
        return match (from.to_number(), to.to_number()) {
            (Some(a), Some(b)) => Ok(Value::Number(a + (b - a) * progress)),
            _ => Err(ExpressionError::type_error(format!(
                "{}: cannot interpolate {} and {}",
                name,
                from.type_name(),
                to.type_name()
            ))),
        };
    }
    match (from.components(), to.components()) {
        (Some(a), Some(b)) => {
            let len = a.len().max(b.len());
            let component = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);
            Ok(Value::from_components(
                (0..len)
                    .map(|i| {
                        let (a, b) = (component(&a, i), component(&b, i));
                        a + (b - a) * progress
                    })
                    .collect(),
            ))
        }
        _ => Err(ExpressionError::type_error(format!(
            "{}: cannot interpolate {} and {}",
            name,
            from.type_name(),
            to.type_name()
        ))),
    }
}
