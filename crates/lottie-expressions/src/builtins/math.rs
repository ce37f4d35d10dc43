//! Vector math globals and the `Math` object.

use crate::error::{ExpressionError, Result};
use crate::function::CallArgs;
use crate::resolver::MathMember;
use crate::value::Value;

fn components(args: &CallArgs, index: usize, param: &str, name: &str) -> Result<Vec<f64>> {
    args.get(index, param)
        .and_then(Value::components)
        .ok_or_else(|| ExpressionError::type_error(format!("{}: '{}' must be a number or vector", name, param)))
}

fn number(args: &CallArgs, index: usize, param: &str, name: &str) -> Result<f64> {
    args.get(index, param)
        .and_then(Value::to_number)
        .ok_or_else(|| ExpressionError::type_error(format!("{}: '{}' must be a number", name, param)))
}

fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// `clamp(value, limit1, limit2)`, component-wise for vectors.
pub fn clamp(args: &CallArgs) -> Result<Value> {
    let value = args
        .get(0, "value")
        .cloned()
        .map(Value::resolve)
        .unwrap_or_default();
    let lo = components(args, 1, "limit1", "clamp")?;
    let hi = components(args, 2, "limit2", "clamp")?;
    let limit = |v: &[f64], i: usize| match v {
        [single] => *single,
        _ => v.get(i).copied().unwrap_or(0.0),
    };

    let clamp_one = |x: f64, i: usize| {
        let (a, b) = (limit(&lo, i), limit(&hi, i));
        let (min, max) = (a.min(b), a.max(b));
        if min.is_nan() || max.is_nan() {
            x
        } else {
            x.clamp(min, max)
        }
    };

    if value.is_vector_like() {
        let v = components(args, 0, "value", "clamp")?;
        return Ok(Value::from_components(
            v.iter().enumerate().map(|(i, x)| clamp_one(*x, i)).collect(),
        ));
    }
    Ok(Value::Number(clamp_one(number(args, 0, "value", "clamp")?, 0)))
}

pub fn dot(args: &CallArgs) -> Result<Value> {
    let a = components(args, 0, "vec1", "dot")?;
    let b = components(args, 1, "vec2", "dot")?;
    Ok(Value::Number(a.iter().zip(&b).map(|(x, y)| x * y).sum()))
}

/// `length(vec)` or the distance `length(point1, point2)`.
pub fn length(args: &CallArgs) -> Result<Value> {
    let a = components(args, 0, "vec", "length")?;
    if args.len() < 2 {
        return Ok(Value::Number(magnitude(&a)));
    }
    let b = components(args, 1, "point2", "length")?;
    let len = a.len().max(b.len());
    let diff: Vec<f64> = (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0.0) - b.get(i).copied().unwrap_or(0.0))
        .collect();
    Ok(Value::Number(magnitude(&diff)))
}

pub fn normalize(args: &CallArgs) -> Result<Value> {
    let v = components(args, 0, "vec", "normalize")?;
    let len = magnitude(&v);
    if len == 0.0 {
        return Ok(Value::from_components(vec![0.0; v.len()]));
    }
    Ok(Value::from_components(v.iter().map(|x| x / len).collect()))
}

/// Angle in degrees from `fromPoint` towards `atPoint` in the XY plane.
pub fn look_at(args: &CallArgs) -> Result<Value> {
    let from = components(args, 0, "fromPoint", "lookAt")?;
    let at = components(args, 1, "atPoint", "lookAt")?;
    let get = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);
    let (dx, dy) = (get(&at, 0) - get(&from, 0), get(&at, 1) - get(&from, 1));
    Ok(Value::Number(dy.atan2(dx).to_degrees()))
}

pub fn degrees_to_radians(args: &CallArgs) -> Result<Value> {
    Ok(Value::Number(number(args, 0, "degrees", "degreesToRadians")?.to_radians()))
}

pub fn radians_to_degrees(args: &CallArgs) -> Result<Value> {
    Ok(Value::Number(number(args, 0, "radians", "radiansToDegrees")?.to_degrees()))
}

/// Constants of the `Math` object.
pub fn constant(member: MathMember) -> Option<f64> {
    use std::f64::consts;
    match member {
        MathMember::Pi => Some(consts::PI),
        MathMember::E => Some(consts::E),
        MathMember::Sqrt2 => Some(consts::SQRT_2),
        MathMember::Ln2 => Some(consts::LN_2),
        MathMember::Ln10 => Some(consts::LN_10),
        _ => None,
    }
}

/// Functions of the `Math` object. `Math.random` is handled by the caller.
pub fn call(member: MathMember, name: &str, args: &CallArgs) -> Result<Value> {
    let numbers: Vec<f64> = args
        .values()
        .map(|v| v.to_number().unwrap_or(f64::NAN))
        .collect();
    let x = numbers.first().copied().unwrap_or(f64::NAN);
    let y = numbers.get(1).copied().unwrap_or(f64::NAN);

    let result = match member {
        MathMember::Abs => x.abs(),
        MathMember::Acos => x.acos(),
        MathMember::Asin => x.asin(),
        MathMember::Atan => x.atan(),
        MathMember::Atan2 => x.atan2(y),
        MathMember::Ceil => x.ceil(),
        MathMember::Cos => x.cos(),
        MathMember::Exp => x.exp(),
        MathMember::Floor => x.floor(),
        MathMember::Log => x.ln(),
        // half-way values round up, as in JavaScript
        MathMember::Round => (x + 0.5).floor(),
        MathMember::Sign => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        MathMember::Sin => x.sin(),
        MathMember::Sqrt => x.sqrt(),
        MathMember::Tan => x.tan(),
        MathMember::Trunc => x.trunc(),
        MathMember::Pow => x.powf(y),
        MathMember::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        MathMember::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        MathMember::Hypot => magnitude(&numbers),
        _ => {
            return Err(ExpressionError::type_error(format!(
                "Math.{} is not a function",
                name
            )))
        }
    };
    Ok(Value::Number(result))
}
