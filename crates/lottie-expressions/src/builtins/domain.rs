//! Members of host objects: properties, layers, compositions and their parts.

use std::sync::Arc;

use glam::DVec2;

use super::{components_arg, lookup_key, number_arg, optional_number, Host};
use crate::context::{CompObject, ContentObject, EffectObject, LayerRef, LookupKey, TransformObject};
use crate::error::{ExpressionError, Result};
use crate::function::CallArgs;
use crate::property::{self, LoopSpan, LoopType, PropertyRef};
use crate::resolver::{
    check_use, CompMember, ContentMember, EffectMember, LayerMember, MathMember, PropertyMember,
    Signature, TransformMember,
};
use crate::value::{DomainObject, PropertyHandle, Value};
use crate::wiggle::{wiggle_property_value, MAX_OCTAVES};

fn property_value(host: &Host<'_>, property: &PropertyRef) -> Value {
    Value::Object(DomainObject::Property(host.handle(property)))
}

fn not_found(what: &str, owner: &str, key: &LookupKey) -> ExpressionError {
    let key = match key {
        LookupKey::Name(name) => format!("'{}'", name),
        LookupKey::Index(index) => index.to_string(),
    };
    ExpressionError::type_error(format!("{} {} not found in '{}'", what, key, owner))
}

/// Checks the use of a vocabulary member. `Ok(None)` means the name is not a
/// member at all.
fn select<M: Copy>(
    found: Option<M>,
    signature: impl Fn(M) -> Signature,
    name: &str,
    call: Option<&CallArgs>,
) -> Result<Option<M>> {
    let Some(member) = found else {
        return Ok(None);
    };
    let sig = signature(member);
    if let Signature::Unsupported { .. } = sig {
        return Err(ExpressionError::Unsupported(name.to_string()));
    }
    if check_use(sig, name, call.map(CallArgs::len))? {
        return Ok(Some(member));
    }
    match call {
        Some(_) => Err(ExpressionError::type_error(format!("{} is not a function", name))),
        None => Err(ExpressionError::type_error(format!(
            "{} is a function and must be called",
            name
        ))),
    }
}

fn unknown(kind: &str, name: &str, call: Option<&CallArgs>) -> Result<Value> {
    match call {
        Some(_) => Err(ExpressionError::type_error(format!(
            "{}.{} is not a function",
            kind, name
        ))),
        None => Ok(Value::Undefined),
    }
}

/// `object.name` (`call == None`) or `object.name(args)`.
pub fn member(
    host: &mut Host<'_>,
    object: &DomainObject,
    name: &str,
    call: Option<&CallArgs>,
) -> Result<Value> {
    let empty = CallArgs::default();
    let args = call.unwrap_or(&empty);

    match object {
        DomainObject::Property(handle) => {
            match select(PropertyMember::lookup(name), PropertyMember::signature, name, call)? {
                Some(m) => property_member(host, handle, m, args),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Layer(layer) => {
            match select(LayerMember::lookup(name), LayerMember::signature, name, call)? {
                Some(m) => layer_member(host, layer, m, args),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Comp(comp) => {
            match select(CompMember::lookup(name), CompMember::signature, name, call)? {
                Some(m) => comp_member(comp, m, args),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Transform(transform) => {
            match select(TransformMember::lookup(name), TransformMember::signature, name, call)? {
                Some(m) => Ok(transform_member(host, transform, m)),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Effect(effect) => {
            match select(EffectMember::lookup(name), EffectMember::signature, name, call)? {
                Some(m) => effect_member(host, effect, m, args),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Content(content) => {
            match select(ContentMember::lookup(name), ContentMember::signature, name, call)? {
                Some(m) => content_member(content, m, args),
                None if call.is_none() => Ok(content_fallback(host, content, name)),
                None => unknown(object.kind(), name, call),
            }
        }
        DomainObject::Math => {
            match select(MathMember::lookup(name), MathMember::signature, name, call)? {
                Some(MathMember::Random) => Ok(Value::Number(host.random.uniform())),
                Some(m) => match super::math::constant(m) {
                    Some(c) => Ok(Value::Number(c)),
                    None => super::math::call(m, name, args),
                },
                None => unknown(object.kind(), name, call),
            }
        }
    }
}

/// `object(args)`: `effect("Slider")("Slider")` and `comp("Main")(1)`.
pub fn invoke(host: &mut Host<'_>, object: &DomainObject, args: &CallArgs) -> Result<Value> {
    match object {
        DomainObject::Effect(effect) => effect_member(host, effect, EffectMember::Param, args),
        DomainObject::Comp(comp) => comp_member(comp, CompMember::Layer, args),
        DomainObject::Content(content) => content_member(content, ContentMember::Content, args),
        other => Err(ExpressionError::type_error(format!(
            "{} is not a function",
            other.kind()
        ))),
    }
}

pub fn property_member(
    host: &mut Host<'_>,
    handle: &PropertyHandle,
    member: PropertyMember,
    args: &CallArgs,
) -> Result<Value> {
    let property = &handle.property;
    let name = member.name();
    match member {
        PropertyMember::Value => Ok(Value::from_property(&handle.current())),
        PropertyMember::Velocity => Ok(Value::from_property(&property.velocity_at_time(handle.time))),
        PropertyMember::Speed => Ok(Value::Number(property.speed_at_time(handle.time))),
        PropertyMember::NumKeys => Ok(Value::Number(property.key_times().len() as f64)),
        PropertyMember::ValueAtTime => {
            let t = number_arg(args, 0, "t", name)?;
            Ok(Value::from_property(&property.value_at_time(t)))
        }
        PropertyMember::VelocityAtTime => {
            let t = number_arg(args, 0, "t", name)?;
            Ok(Value::from_property(&property.velocity_at_time(t)))
        }
        PropertyMember::SpeedAtTime => {
            let t = number_arg(args, 0, "t", name)?;
            Ok(Value::Number(property.speed_at_time(t)))
        }
        PropertyMember::Wiggle => {
            let freq = number_arg(args, 0, "freq", name)?;
            let amp = number_arg(args, 1, "amp", name)?;
            let octaves = optional_number(args, 2, "octaves", name, 1.0)?;
            let amp_mult = optional_number(args, 3, "amp_mult", name, 0.5)?;
            let t = optional_number(args, 4, "t", name, handle.time)?;
            let base = property.value_at_time(t);
            Ok(Value::from_property(&wiggle_property_value(
                &base,
                t,
                freq,
                amp,
                octaves.clamp(1.0, MAX_OCTAVES as f64) as i32,
                amp_mult,
                host.wiggle_seed(),
            )))
        }
        PropertyMember::LoopOut
        | PropertyMember::LoopIn
        | PropertyMember::LoopOutDuration
        | PropertyMember::LoopInDuration => {
            let loop_type = match args.get(0, "type") {
                Some(v) if !v.is_nullish() => LoopType::from_name(&v.to_string()),
                _ => LoopType::Cycle,
            };
            let span = match member {
                PropertyMember::LoopOut | PropertyMember::LoopIn => {
                    let n = optional_number(args, 1, "numKeyframes", name, 0.0)?;
                    LoopSpan::Keyframes(n.max(0.0) as usize)
                }
                _ => LoopSpan::Duration(optional_number(args, 1, "duration", name, 0.0)?),
            };
            let value = match member {
                PropertyMember::LoopOut | PropertyMember::LoopOutDuration => {
                    property::loop_out(property.as_ref(), loop_type, span, handle.time)
                }
                _ => property::loop_in(property.as_ref(), loop_type, span, handle.time),
            };
            Ok(Value::from_property(&value))
        }
    }
}

pub fn layer_member(
    host: &mut Host<'_>,
    layer: &LayerRef,
    member: LayerMember,
    args: &CallArgs,
) -> Result<Value> {
    let data = &layer.layer;
    let fps = if layer.comp.frame_rate > 0.0 {
        layer.comp.frame_rate
    } else {
        host.frame_rate()
    };
    let name = member.name();

    match member {
        LayerMember::Index => Ok(Value::Number(data.index as f64)),
        LayerMember::Name => Ok(Value::str(&data.name)),
        LayerMember::InPoint => Ok(Value::Number(data.in_point / fps)),
        LayerMember::OutPoint => Ok(Value::Number(data.out_point / fps)),
        LayerMember::StartTime => Ok(Value::Number(data.start_time / fps)),
        LayerMember::Source => Ok(data
            .source
            .clone()
            .map_or(Value::Null, |c| Value::Object(DomainObject::Comp(c)))),
        LayerMember::Active => Ok(Value::Bool(
            data.enabled && data.is_active(host.ctx.time * fps),
        )),
        LayerMember::Enabled => Ok(Value::Bool(data.enabled)),
        LayerMember::HasParent => Ok(Value::Bool(layer.parent().is_some())),
        LayerMember::Parent => Ok(layer
            .parent()
            .map_or(Value::Null, |p| Value::Object(DomainObject::Layer(p)))),
        LayerMember::Transform => Ok(Value::Object(DomainObject::Transform(data.transform.clone()))),
        LayerMember::AnchorPoint => Ok(property_value(host, &data.transform.anchor_point)),
        LayerMember::Position => Ok(property_value(host, &data.transform.position)),
        LayerMember::Scale => Ok(property_value(host, &data.transform.scale)),
        LayerMember::Rotation => Ok(property_value(host, &data.transform.rotation)),
        LayerMember::Opacity => Ok(property_value(host, &data.transform.opacity)),
        LayerMember::TimeRemap => Ok(data
            .time_remap
            .as_ref()
            .map_or(Value::Undefined, |p| property_value(host, p))),
        LayerMember::Width => Ok(Value::Number(data.width)),
        LayerMember::Height => Ok(Value::Number(data.height)),
        LayerMember::HasAudio | LayerMember::HasVideo | LayerMember::AudioActive => {
            Ok(Value::Bool(false))
        }
        LayerMember::Content => {
            let key = lookup_key(args, "name", name)?;
            data.content(&key)
                .map(|c| Value::Object(DomainObject::Content(c.clone())))
                .ok_or_else(|| not_found("content", &data.name, &key))
        }
        LayerMember::Effect => {
            let key = lookup_key(args, "name", name)?;
            data.effect(&key)
                .map(|e| Value::Object(DomainObject::Effect(e.clone())))
                .ok_or_else(|| not_found("effect", &data.name, &key))
        }
        LayerMember::ToComp | LayerMember::ToWorld => convert(host, layer, args, name, false),
        LayerMember::FromComp | LayerMember::FromWorld => convert(host, layer, args, name, true),
        LayerMember::SourceRectAtTime | LayerMember::SampleImage => {
            Err(ExpressionError::Unsupported(name.to_string()))
        }
    }
}

/// Maps a point between layer and composition space. A third component
/// passes through.
fn convert(
    host: &Host<'_>,
    layer: &LayerRef,
    args: &CallArgs,
    name: &str,
    inverse: bool,
) -> Result<Value> {
    let point = components_arg(args, 0, "point", name)?;
    let t = optional_number(args, 1, "t", name, host.ctx.time)?;
    let matrix = layer.to_comp_matrix(t);
    let matrix = if inverse { matrix.inverse() } else { matrix };

    let get = |i: usize| point.get(i).copied().unwrap_or(0.0);
    let mapped = matrix.transform_point2(DVec2::new(get(0), get(1)));
    let mut out = vec![mapped.x, mapped.y];
    out.extend(point.iter().skip(2));
    Ok(Value::from_components(out))
}

pub fn comp_member(comp: &Arc<CompObject>, member: CompMember, args: &CallArgs) -> Result<Value> {
    match member {
        CompMember::Layer => {
            let key = lookup_key(args, "index", member.name())?;
            let found = match &key {
                LookupKey::Index(index) => comp.layer_by_index(*index as u32),
                LookupKey::Name(name) => comp.layer_by_name(name),
            };
            found
                .map(|layer| {
                    Value::Object(DomainObject::Layer(LayerRef {
                        comp: comp.clone(),
                        layer: layer.clone(),
                    }))
                })
                .ok_or_else(|| not_found("layer", &comp.name, &key))
        }
        CompMember::NumLayers => Ok(Value::Number(comp.layers.len() as f64)),
        CompMember::Width => Ok(Value::Number(comp.width)),
        CompMember::Height => Ok(Value::Number(comp.height)),
        CompMember::FrameDuration => Ok(Value::Number(comp.frame_duration())),
        CompMember::Duration => Ok(Value::Number(comp.duration())),
        CompMember::Name => Ok(Value::str(&comp.name)),
    }
}

fn transform_member(host: &Host<'_>, transform: &TransformObject, member: TransformMember) -> Value {
    let property = match member {
        TransformMember::AnchorPoint => &transform.anchor_point,
        TransformMember::Position => &transform.position,
        TransformMember::Scale => &transform.scale,
        TransformMember::Rotation => &transform.rotation,
        TransformMember::Opacity => &transform.opacity,
    };
    property_value(host, property)
}

fn effect_member(
    host: &Host<'_>,
    effect: &EffectObject,
    member: EffectMember,
    args: &CallArgs,
) -> Result<Value> {
    match member {
        EffectMember::Name => Ok(Value::str(&effect.name)),
        EffectMember::NumProperties => Ok(Value::Number(effect.controls.len() as f64)),
        EffectMember::Active => Ok(Value::Bool(effect.enabled)),
        EffectMember::Param => {
            let key = lookup_key(args, "name", member.name())?;
            effect
                .control(&key)
                .map(|c| property_value(host, &c.property))
                .ok_or_else(|| not_found("property", &effect.name, &key))
        }
    }
}

fn content_member(
    content: &ContentObject,
    member: ContentMember,
    args: &CallArgs,
) -> Result<Value> {
    match member {
        ContentMember::Name => Ok(Value::str(&content.name)),
        ContentMember::NumProperties => Ok(Value::Number(
            (content.properties.len() + content.content.len()) as f64,
        )),
        ContentMember::Transform => Ok(content
            .transform
            .clone()
            .map_or(Value::Undefined, |t| Value::Object(DomainObject::Transform(t)))),
        ContentMember::Content => {
            let key = lookup_key(args, "name", member.name())?;
            content
                .content(&key)
                .map(|c| Value::Object(DomainObject::Content(c.clone())))
                .ok_or_else(|| not_found("content", &content.name, &key))
        }
    }
}

/// `shape.path`, `group.Ellipse`: named properties first, then child groups.
fn content_fallback(host: &Host<'_>, content: &ContentObject, name: &str) -> Value {
    if let Some(named) = content.property(name) {
        return property_value(host, &named.property);
    }
    content
        .content(&LookupKey::Name(name.to_string()))
        .map_or(Value::Undefined, |c| Value::Object(DomainObject::Content(c.clone())))
}
