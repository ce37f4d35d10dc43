//! Built-in globals and the members of host objects.
//!
//! [`Host`] is the evaluation-side view of an [`EvaluationContext`]: it owns
//! the random generator of the sample and hands out the `this*` objects.

pub mod color;
pub mod domain;
pub mod interpolation;
pub mod math;
pub mod random;

use std::sync::Arc;

use crate::ast::BinaryOp;
use crate::context::{CompObject, EvaluationContext, LayerRef, LookupKey};
use crate::error::{ExpressionError, Result};
use crate::function::CallArgs;
use crate::property::PropertyRef;
use crate::resolver::{Builtin, GlobalOp, Signature};
use crate::value::{self, DomainObject, PropertyHandle, Value};

use interpolation::Easing;
use random::RandomState;

pub struct Host<'a> {
    pub ctx: &'a EvaluationContext,
    pub random: RandomState,
}

impl<'a> Host<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        Self {
            ctx,
            random: RandomState::new(ctx),
        }
    }

    pub fn this_comp(&self) -> Result<Arc<CompObject>> {
        self.ctx
            .comp
            .clone()
            .ok_or_else(|| unavailable("thisComp"))
    }

    pub fn this_layer(&self) -> Result<LayerRef> {
        self.ctx.this_layer().ok_or_else(|| unavailable("thisLayer"))
    }

    pub fn this_property(&self) -> Result<PropertyHandle> {
        self.ctx
            .property
            .as_ref()
            .map(|p| self.handle(p))
            .ok_or_else(|| unavailable("thisProperty"))
    }

    /// Frames per second of the current composition.
    pub fn frame_rate(&self) -> f64 {
        match &self.ctx.comp {
            Some(comp) if comp.frame_rate > 0.0 => comp.frame_rate,
            _ => self.ctx.frame_rate,
        }
    }

    pub fn handle(&self, property: &PropertyRef) -> PropertyHandle {
        PropertyHandle {
            property: property.clone(),
            time: self.ctx.time,
        }
    }

    /// Seed of `wiggle()`: stable per layer and property, independent of time.
    pub fn wiggle_seed(&self) -> u32 {
        let layer = self.ctx.layer.as_ref().map_or(0, |l| l.index);
        layer
            .wrapping_mul(7919)
            .wrapping_add(self.ctx.property_index.wrapping_mul(31))
    }
}

fn unavailable(name: &str) -> ExpressionError {
    ExpressionError::type_error(format!("{} is not available in this context", name))
}

pub(crate) fn missing(param: &str, function: &str) -> ExpressionError {
    ExpressionError::MissingArgument {
        parameter: param.to_string(),
        function: function.to_string(),
    }
}

/// Required argument, with property handles resolved to their value.
pub(crate) fn value_arg(args: &CallArgs, index: usize, param: &str, function: &str) -> Result<Value> {
    args.get(index, param)
        .cloned()
        .map(Value::resolve)
        .ok_or_else(|| missing(param, function))
}

pub(crate) fn number_arg(args: &CallArgs, index: usize, param: &str, function: &str) -> Result<f64> {
    let value = value_arg(args, index, param, function)?;
    value.to_number().ok_or_else(|| {
        ExpressionError::type_error(format!(
            "{}: '{}' must be a number, got {}",
            function,
            param,
            value.type_name()
        ))
    })
}

pub(crate) fn optional_number(
    args: &CallArgs,
    index: usize,
    param: &str,
    function: &str,
    default: f64,
) -> Result<f64> {
    match args.get(index, param) {
        None | Some(Value::Undefined) => Ok(default),
        Some(_) => number_arg(args, index, param, function),
    }
}

pub(crate) fn components_arg(
    args: &CallArgs,
    index: usize,
    param: &str,
    function: &str,
) -> Result<Vec<f64>> {
    let value = value_arg(args, index, param, function)?;
    value.components().ok_or_else(|| {
        ExpressionError::type_error(format!(
            "{}: '{}' must be a number or an array, got {}",
            function,
            param,
            value.type_name()
        ))
    })
}

/// `"name"` or a 1-based index.
pub(crate) fn lookup_key(args: &CallArgs, param: &str, function: &str) -> Result<LookupKey> {
    match value_arg(args, 0, param, function)? {
        Value::Str(name) => Ok(LookupKey::Name(name.to_string())),
        other => other
            .to_number()
            .filter(|n| *n >= 1.0 && n.fract() == 0.0)
            .map(|n| LookupKey::Index(n as usize))
            .ok_or_else(|| {
                ExpressionError::type_error(format!(
                    "{}: expected a name or an index, got {}",
                    function, other
                ))
            }),
    }
}

/// Runs a name bound by the resolver. Accessors get empty `args`.
pub fn call_builtin(host: &mut Host<'_>, builtin: Builtin, args: &CallArgs) -> Result<Value> {
    if let Signature::Unsupported { .. } = builtin.signature() {
        return Err(ExpressionError::Unsupported(builtin.name().to_string()));
    }
    match builtin {
        Builtin::Property(member) => {
            let handle = host.this_property()?;
            domain::property_member(host, &handle, member, args)
        }
        Builtin::Layer(member) => {
            let layer = host.this_layer()?;
            domain::layer_member(host, &layer, member, args)
        }
        Builtin::Comp(member) => {
            let comp = host.this_comp()?;
            domain::comp_member(&comp, member, args)
        }
        Builtin::Global(op) => call_global(host, op, args),
    }
}

fn call_global(host: &mut Host<'_>, op: GlobalOp, args: &CallArgs) -> Result<Value> {
    let name = op.name();
    let params = op.signature().params();
    let arithmetic = |op: BinaryOp| -> Result<Value> {
        let a = value_arg(args, 0, params[0], name)?;
        let b = value_arg(args, 1, params[1], name)?;
        value::binary(op, &a, &b)
    };

    match op {
        GlobalOp::Time => Ok(Value::Number(host.ctx.time)),
        GlobalOp::ThisComp => Ok(Value::Object(DomainObject::Comp(host.this_comp()?))),
        GlobalOp::ThisLayer => Ok(Value::Object(DomainObject::Layer(host.this_layer()?))),
        GlobalOp::ThisProperty => Ok(Value::Object(DomainObject::Property(host.this_property()?))),
        GlobalOp::Math => Ok(Value::Object(DomainObject::Math)),
        GlobalOp::Comp => {
            let comp_name = value_arg(args, 0, "name", name)?.to_string();
            host.ctx
                .composition(&comp_name)
                .map(|c| Value::Object(DomainObject::Comp(c)))
                .ok_or_else(|| {
                    ExpressionError::type_error(format!("composition '{}' not found", comp_name))
                })
        }
        GlobalOp::Add => arithmetic(BinaryOp::Add),
        GlobalOp::Sub => arithmetic(BinaryOp::Sub),
        GlobalOp::Mul => arithmetic(BinaryOp::Mul),
        GlobalOp::Div => arithmetic(BinaryOp::Div),
        GlobalOp::Mod => arithmetic(BinaryOp::Rem),
        GlobalOp::Clamp => math::clamp(args),
        GlobalOp::Dot => math::dot(args),
        GlobalOp::Length => math::length(args),
        GlobalOp::Normalize => math::normalize(args),
        GlobalOp::LookAt => math::look_at(args),
        GlobalOp::DegreesToRadians => math::degrees_to_radians(args),
        GlobalOp::RadiansToDegrees => math::radians_to_degrees(args),
        GlobalOp::TimeToFrames => {
            let t = optional_number(args, 0, "t", name, host.ctx.time)?;
            let fps = optional_number(args, 1, "fps", name, host.frame_rate())?;
            Ok(Value::Number((t * fps + 1e-9).floor()))
        }
        GlobalOp::FramesToTime => {
            let frames = number_arg(args, 0, "frames", name)?;
            let fps = optional_number(args, 1, "fps", name, host.frame_rate())?;
            if fps == 0.0 {
                return Err(ExpressionError::type_error("framesToTime: fps must not be 0"));
            }
            Ok(Value::Number(frames / fps))
        }
        GlobalOp::SeedRandom => random::seed_random(&mut host.random, args),
        GlobalOp::Random => random::random(&mut host.random, args, false, name),
        GlobalOp::GaussRandom => random::random(&mut host.random, args, true, name),
        GlobalOp::Noise => random::noise(args),
        GlobalOp::Linear => interpolation::interpolate(Easing::Linear, name, args),
        GlobalOp::Ease => interpolation::interpolate(interpolation::EASE, name, args),
        GlobalOp::EaseIn => interpolation::interpolate(interpolation::EASE_IN, name, args),
        GlobalOp::EaseOut => interpolation::interpolate(interpolation::EASE_OUT, name, args),
        GlobalOp::HslToRgb => Ok(Value::from_components(color::hsl_to_rgb(
            &components_arg(args, 0, "hsla", name)?,
        ))),
        GlobalOp::RgbToHsl => Ok(Value::from_components(color::rgb_to_hsl(
            &components_arg(args, 0, "rgba", name)?,
        ))),
        GlobalOp::Cross => Err(ExpressionError::Unsupported(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resolver::LayerMember;

    #[test]
    fn test_time_conversions() {
        let ctx = EvaluationContext::new(2.0, 25.0);
        let mut host = Host::new(&ctx);
        let frames = call_builtin(&mut host, Builtin::Global(GlobalOp::TimeToFrames), &CallArgs::default())
            .unwrap();
        assert_eq!(frames.to_number(), Some(50.0));

        let args = CallArgs::positional([Value::Number(12.0), Value::Number(24.0)]);
        let time = call_builtin(&mut host, Builtin::Global(GlobalOp::FramesToTime), &args).unwrap();
        assert_eq!(time.to_number(), Some(0.5));
    }

    #[test]
    fn test_missing_receiver_is_type_error() {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let mut host = Host::new(&ctx);
        let err = call_builtin(&mut host, Builtin::Global(GlobalOp::ThisLayer), &CallArgs::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("thisLayer"));
    }

    #[test]
    fn test_unsupported_builtin_reports_name() {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let mut host = Host::new(&ctx);
        let err = call_builtin(
            &mut host,
            Builtin::Layer(LayerMember::SampleImage),
            &CallArgs::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.to_string().contains("sampleImage"));
    }

    #[test]
    fn test_vector_arithmetic_globals() {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let mut host = Host::new(&ctx);
        let args = CallArgs::positional([
            Value::from_components(vec![1.0, 2.0]),
            Value::from_components(vec![3.0, 4.0]),
        ]);
        let sum = call_builtin(&mut host, Builtin::Global(GlobalOp::Add), &args).unwrap();
        assert_eq!(sum.to_string(), "4,6");
    }
}
