//! Expression handles built from a parsed Lottie document.
//!
//! Keyframed properties are sampled by a small interpolator (linear, bezier
//! eased and hold segments). Expressions referencing other properties see
//! their keyframed values.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec2;
use lottie_data::model::{
    self as data, BezierTangent, Keyframe, LottieJson, PositionProperty, Property, Shape,
};
use tracing::{debug, warn};

use crate::builtins::interpolation::solve_cubic_bezier;
use crate::context::{
    CompObject, ContentObject, EffectObject, EvaluationContext, LayerObject, TransformObject,
};
use crate::evaluator::ExpressionEvaluator;
use crate::property::{AnimatedProperty, PropertyRef, PropertyValue, StaticProperty};

const MAX_PRECOMP_DEPTH: usize = 16;

struct Key {
    /// Seconds
    time: f64,
    start: PropertyValue,
    end: Option<PropertyValue>,
    out_tangent: DVec2,
    in_tangent: DVec2,
    hold: bool,
}

/// Keyframed property sampled in seconds.
pub struct KeyframedProperty {
    keys: Vec<Key>,
}

impl KeyframedProperty {
    /// Handle for `prop`: static and missing values become a [`StaticProperty`].
    pub fn shared<T>(
        prop: &Property<T>,
        frame_rate: f64,
        convert: impl Fn(&T) -> PropertyValue,
        default: PropertyValue,
    ) -> PropertyRef {
        match &prop.k {
            data::Value::Default => StaticProperty::shared(default),
            data::Value::Static(v) => StaticProperty::shared(convert(v)),
            data::Value::Animated(keyframes) => {
                let property = Self::from_keyframes(keyframes, frame_rate, &convert);
                if property.keys.is_empty() {
                    return StaticProperty::shared(default);
                }
                Arc::new(property)
            }
        }
    }

    fn from_keyframes<T>(
        keyframes: &[Keyframe<T>],
        frame_rate: f64,
        convert: &impl Fn(&T) -> PropertyValue,
    ) -> Self {
        let fps = if frame_rate > 0.0 { frame_rate } else { 1.0 };
        let keys = keyframes
            .iter()
            .filter_map(|kf| {
                let start = kf.s.as_ref().or(kf.e.as_ref()).map(convert)?;
                Some(Key {
                    time: kf.t as f64 / fps,
                    start,
                    end: kf.e.as_ref().map(convert),
                    out_tangent: tangent(kf.o.as_ref(), DVec2::ZERO),
                    in_tangent: tangent(kf.i.as_ref(), DVec2::ONE),
                    hold: kf.h == Some(1),
                })
            })
            .collect();
        Self { keys }
    }
}

fn tangent(handle: Option<&BezierTangent>, default: DVec2) -> DVec2 {
    match handle {
        Some(h) => DVec2::new(
            h.x.first().map_or(default.x, |x| *x as f64),
            h.y.first().map_or(default.y, |y| *y as f64),
        ),
        None => default,
    }
}

impl AnimatedProperty for KeyframedProperty {
    fn value_at_time(&self, time: f64) -> PropertyValue {
        let keys = &self.keys;
        let idx = keys.partition_point(|k| k.time <= time);

        if idx == 0 {
            return keys
                .first()
                .map(|k| k.start.clone())
                .unwrap_or_default();
        }
        if idx >= keys.len() {
            let last = &keys[keys.len() - 1];
            return last.end.clone().unwrap_or_else(|| last.start.clone());
        }

        let from = &keys[idx - 1];
        let to = &keys[idx];
        let end = from.end.clone().unwrap_or_else(|| to.start.clone());

        let duration = to.time - from.time;
        if duration <= 0.0 || from.hold {
            return from.start.clone();
        }
        let progress = solve_cubic_bezier(
            from.out_tangent,
            to.in_tangent,
            (time - from.time) / duration,
        );
        from.start.lerp(&end, progress)
    }

    fn key_times(&self) -> Vec<f64> {
        self.keys.iter().map(|k| k.time).collect()
    }
}

/// Position with separate x and y channels.
pub struct SplitPositionProperty {
    x: PropertyRef,
    y: PropertyRef,
}

impl AnimatedProperty for SplitPositionProperty {
    fn value_at_time(&self, time: f64) -> PropertyValue {
        PropertyValue::Vector(vec![
            self.x.value_at_time(time).as_scalar(),
            self.y.value_at_time(time).as_scalar(),
        ])
    }

    fn key_times(&self) -> Vec<f64> {
        let mut times = self.x.key_times();
        times.extend(self.y.key_times());
        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }
}

fn scalar(v: &f32) -> PropertyValue {
    PropertyValue::Scalar(*v as f64)
}

fn vector<const N: usize>(v: &[f32; N]) -> PropertyValue {
    PropertyValue::Vector(v.iter().map(|c| *c as f64).collect())
}

fn planar(v: &[f32; 3]) -> PropertyValue {
    PropertyValue::Vector(vec![v[0] as f64, v[1] as f64])
}

fn zeros(n: usize) -> PropertyValue {
    PropertyValue::Vector(vec![0.0; n])
}

fn json_value(v: &serde_json::Value) -> PropertyValue {
    match v {
        serde_json::Value::Number(n) => PropertyValue::Scalar(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::Bool(b) => PropertyValue::Scalar(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::Array(items) => {
            PropertyValue::Vector(items.iter().map(|i| i.as_f64().unwrap_or(0.0)).collect())
        }
        _ => PropertyValue::Scalar(0.0),
    }
}

/// An expression attached to one property of a layer.
#[derive(Clone)]
pub struct ExpressionBinding {
    pub comp: Arc<CompObject>,
    pub layer: Arc<LayerObject>,
    /// Where the property lives, e.g. `transform.position`.
    pub path: String,
    pub script: String,
    pub property: PropertyRef,
    pub property_index: u32,
}

struct PendingBinding {
    layer: u32,
    path: String,
    script: String,
    property: PropertyRef,
    property_index: u32,
}

/// Collects the handles and expressions of one layer.
struct LayerBuilder<'a> {
    frame_rate: f64,
    layer: u32,
    next_index: u32,
    bindings: &'a mut Vec<PendingBinding>,
}

impl LayerBuilder<'_> {
    fn property<T>(
        &mut self,
        path: impl Into<String>,
        prop: &Property<T>,
        convert: impl Fn(&T) -> PropertyValue,
        default: PropertyValue,
    ) -> PropertyRef {
        let handle = KeyframedProperty::shared(prop, self.frame_rate, convert, default);
        self.bind(path.into(), prop.expression(), &handle);
        handle
    }

    fn bind(&mut self, path: String, script: Option<&str>, property: &PropertyRef) {
        self.next_index += 1;
        if let Some(script) = script {
            self.bindings.push(PendingBinding {
                layer: self.layer,
                path,
                script: script.to_string(),
                property: property.clone(),
                property_index: self.next_index,
            });
        }
    }

    fn transform(&mut self, prefix: &str, transform: &data::Transform) -> TransformObject {
        let position: PropertyRef = match &transform.p {
            PositionProperty::Unified(p) => self.property(
                format!("{}.position", prefix),
                p,
                |v| planar(&v.0),
                zeros(2),
            ),
            PositionProperty::Split { x, y } => {
                let x = self.property(
                    format!("{}.xPosition", prefix),
                    x,
                    scalar,
                    PropertyValue::Scalar(0.0),
                );
                let y = self.property(
                    format!("{}.yPosition", prefix),
                    y,
                    scalar,
                    PropertyValue::Scalar(0.0),
                );
                Arc::new(SplitPositionProperty { x, y })
            }
        };
        TransformObject {
            anchor_point: self.property(
                format!("{}.anchorPoint", prefix),
                &transform.a,
                |v| planar(&v.0),
                zeros(2),
            ),
            position,
            scale: self.property(
                format!("{}.scale", prefix),
                &transform.s,
                |v| planar(&v.0),
                PropertyValue::Vector(vec![100.0, 100.0]),
            ),
            rotation: self.property(
                format!("{}.rotation", prefix),
                &transform.rz,
                scalar,
                PropertyValue::Scalar(0.0),
            ),
            opacity: self.property(
                format!("{}.opacity", prefix),
                &transform.o,
                scalar,
                PropertyValue::Scalar(100.0),
            ),
        }
    }

    fn effect(&mut self, effect: &data::Effect) -> EffectObject {
        let name = effect.nm.clone().unwrap_or_default();
        let mut object = EffectObject::new(name.clone());
        object.enabled = effect.en != Some(0);
        for (i, value) in effect.ef.iter().flatten().enumerate() {
            let control = value.nm.clone().unwrap_or_else(|| format!("Property {}", i + 1));
            let property = match &value.v {
                Some(v) => self.property(
                    format!("effect(\"{}\")(\"{}\")", name, control),
                    v,
                    json_value,
                    PropertyValue::Scalar(0.0),
                ),
                None => StaticProperty::shared(0.0),
            };
            object = object.with_control(control, property);
        }
        object
    }

    fn shapes(&mut self, prefix: &str, shapes: &[Shape]) -> Vec<Arc<ContentObject>> {
        shapes
            .iter()
            .filter_map(|shape| self.shape(prefix, shape))
            .map(Arc::new)
            .collect()
    }

    fn shape(&mut self, prefix: &str, shape: &Shape) -> Option<ContentObject> {
        let name = shape.name().unwrap_or_default().to_string();
        let path = format!("{}content(\"{}\")", prefix, name);
        let object = ContentObject::new(name);
        let object = match shape {
            Shape::Group(group) => {
                let mut object = object;
                let nested = format!("{}.", path);
                for item in &group.it {
                    if let Shape::Transform(t) = item {
                        object.transform =
                            Some(Arc::new(self.transform(&format!("{}transform", nested), &t.t)));
                    }
                }
                object.content = self.shapes(&nested, &group.it);
                object
            }
            Shape::Rect(rect) => {
                let size = self.property(format!("{}.size", path), &rect.s, vector, zeros(2));
                let position =
                    self.property(format!("{}.position", path), &rect.p, vector, zeros(2));
                let roundness = self.property(
                    format!("{}.roundness", path),
                    &rect.r,
                    scalar,
                    PropertyValue::Scalar(0.0),
                );
                object
                    .with_property("size", size)
                    .with_property("position", position)
                    .with_property("roundness", roundness)
            }
            Shape::Ellipse(ellipse) => {
                let size =
                    self.property(format!("{}.size", path), &ellipse.s, vector, zeros(2));
                let position =
                    self.property(format!("{}.position", path), &ellipse.p, vector, zeros(2));
                object.with_property("size", size).with_property("position", position)
            }
            Shape::Fill(fill) => {
                let color = self.property(format!("{}.color", path), &fill.c, vector, zeros(4));
                let opacity = self.property(
                    format!("{}.opacity", path),
                    &fill.o,
                    scalar,
                    PropertyValue::Scalar(100.0),
                );
                object.with_property("color", color).with_property("opacity", opacity)
            }
            Shape::Stroke(stroke) => {
                let color = self.property(format!("{}.color", path), &stroke.c, vector, zeros(4));
                let width =
                    self.property(
                        format!("{}.strokeWidth", path),
                        &stroke.w,
                        scalar,
                        PropertyValue::Scalar(1.0),
                    );
                let opacity = self.property(
                    format!("{}.opacity", path),
                    &stroke.o,
                    scalar,
                    PropertyValue::Scalar(100.0),
                );
                object
                    .with_property("color", color)
                    .with_property("strokeWidth", width)
                    .with_property("opacity", opacity)
            }
            // group transforms are attached to their group
            Shape::Transform(_) | Shape::Unknown => return None,
        };
        Some(object)
    }
}

/// Compositions of a document with their expression bindings.
pub struct Document {
    main: Arc<CompObject>,
    compositions: Vec<Arc<CompObject>>,
    bindings: Vec<ExpressionBinding>,
}

struct Builder<'a> {
    json: &'a LottieJson,
    precomps: HashMap<String, Arc<CompObject>>,
    building: Vec<String>,
    compositions: Vec<Arc<CompObject>>,
    bindings: Vec<ExpressionBinding>,
}

impl Builder<'_> {
    fn comp(
        &mut self,
        name: &str,
        layers: &[data::Layer],
        size: (f64, f64),
        frame_rate: f64,
        depth: usize,
    ) -> Arc<CompObject> {
        let mut pending = Vec::new();
        let mut objects = Vec::with_capacity(layers.len());

        for (i, layer) in layers.iter().enumerate() {
            let index = layer.ind.unwrap_or(i as u32 + 1);
            let mut object = LayerObject::new(index, layer.nm.clone().unwrap_or_default());
            object.parent = layer.parent;
            object.in_point = layer.ip as f64;
            object.out_point = layer.op as f64;
            object.start_time = layer.st as f64;
            object.enabled = !layer.hd.unwrap_or(false);
            object.width = layer.w.map_or(0.0, |w| w as f64);
            object.height = layer.h.map_or(0.0, |h| h as f64);

            let mut builder = LayerBuilder {
                frame_rate,
                layer: index,
                next_index: 0,
                bindings: &mut pending,
            };
            object.transform = Arc::new(builder.transform("transform", &layer.ks));
            object.effects = layer
                .ef
                .iter()
                .flatten()
                .map(|e| Arc::new(builder.effect(e)))
                .collect();
            if let Some(shapes) = &layer.shapes {
                object.content = builder.shapes("", shapes);
            }
            if let Some(tm) = &layer.tm {
                object.time_remap = Some(builder.property("timeRemap", tm, scalar, PropertyValue::Scalar(0.0)));
            }

            if layer.ty == 0 {
                if let Some(ref_id) = &layer.ref_id {
                    object.source = self.precomp(ref_id, size, frame_rate, depth);
                    if let Some(source) = &object.source {
                        object.width = source.width;
                        object.height = source.height;
                    }
                }
            }
            objects.push(object);
        }

        let mut comp = CompObject::new(name, size.0, size.1, frame_rate).with_layers(objects);
        comp.in_point = self.json.ip as f64;
        comp.out_point = self.json.op as f64;
        let comp = Arc::new(comp);

        for binding in pending {
            let Some(layer) = comp.layer_by_index(binding.layer) else {
                continue;
            };
            self.bindings.push(ExpressionBinding {
                comp: comp.clone(),
                layer: layer.clone(),
                path: binding.path,
                script: binding.script,
                property: binding.property,
                property_index: binding.property_index,
            });
        }
        self.compositions.push(comp.clone());
        comp
    }

    fn precomp(
        &mut self,
        id: &str,
        size: (f64, f64),
        frame_rate: f64,
        depth: usize,
    ) -> Option<Arc<CompObject>> {
        if let Some(comp) = self.precomps.get(id) {
            return Some(comp.clone());
        }
        if self.building.iter().any(|b| b == id) {
            warn!(asset = id, "precomp references itself, source left empty");
            return None;
        }
        if depth >= MAX_PRECOMP_DEPTH {
            warn!(asset = id, "precomp nesting too deep, source left empty");
            return None;
        }
        let json = self.json;
        let asset = json.assets.iter().find(|a| a.id == id)?;
        let layers = asset.layers.as_deref()?;
        let size = (
            asset.w.map_or(size.0, |w| w as f64),
            asset.h.map_or(size.1, |h| h as f64),
        );
        let frame_rate = asset.fr.map_or(frame_rate, |fr| fr as f64);
        let name = asset.nm.clone().unwrap_or_else(|| asset.id.clone());
        self.building.push(id.to_string());
        let comp = self.comp(&name, layers, size, frame_rate, depth + 1);
        self.building.pop();
        self.precomps.insert(id.to_string(), comp.clone());
        Some(comp)
    }
}

impl Document {
    pub fn from_json(json: &LottieJson) -> Document {
        let mut builder = Builder {
            json,
            precomps: HashMap::new(),
            building: Vec::new(),
            compositions: Vec::new(),
            bindings: Vec::new(),
        };
        let name = json.nm.clone().unwrap_or_else(|| "Main".to_string());
        let main = builder.comp(
            &name,
            &json.layers,
            (json.w as f64, json.h as f64),
            json.fr as f64,
            0,
        );
        debug!(
            compositions = builder.compositions.len(),
            expressions = builder.bindings.len(),
            "document loaded"
        );
        Document {
            main,
            compositions: builder.compositions,
            bindings: builder.bindings,
        }
    }

    pub fn parse(json: &str) -> Result<Document, serde_json::Error> {
        let json: LottieJson = serde_json::from_str(json)?;
        Ok(Self::from_json(&json))
    }

    pub fn main(&self) -> &Arc<CompObject> {
        &self.main
    }

    /// Main composition and every precomp, in build order.
    pub fn compositions(&self) -> &[Arc<CompObject>] {
        &self.compositions
    }

    pub fn expressions(&self) -> &[ExpressionBinding] {
        &self.bindings
    }

    /// Binding on the layer named or indexed `layer` with the given `path`.
    pub fn find(&self, layer: &str, path: &str) -> Option<&ExpressionBinding> {
        self.bindings.iter().find(|b| {
            b.path == path && (b.layer.name == layer || b.layer.index.to_string() == layer)
        })
    }

    /// Evaluation context for `binding` at `time` seconds.
    pub fn context(&self, binding: &ExpressionBinding, time: f64) -> EvaluationContext {
        EvaluationContext::new(time, binding.comp.frame_rate)
            .with_comp(binding.comp.clone())
            .with_layer(binding.layer.clone())
            .with_property(binding.property.clone())
            .with_property_index(binding.property_index)
            .with_compositions(self.compositions.clone())
    }

    /// Value of the bound property at `time`, with its expression applied.
    pub fn sample(
        &self,
        evaluator: &ExpressionEvaluator,
        binding: &ExpressionBinding,
        time: f64,
    ) -> PropertyValue {
        let ctx = self.context(binding, time);
        evaluator.resolve(
            binding.property.value_at_time(time),
            Some(&binding.script),
            &ctx,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(json: serde_json::Value) -> PropertyRef {
        let prop: Property<f32> = serde_json::from_value(json).unwrap();
        KeyframedProperty::shared(&prop, 10.0, scalar, PropertyValue::Scalar(0.0))
    }

    #[test]
    fn test_linear_keyframes() {
        let prop = property(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "o": { "x": [0], "y": [0] }, "i": { "x": [1], "y": [1] } },
                { "t": 10, "s": [100] }
            ]
        }));
        assert_eq!(prop.value_at_time(-1.0).as_scalar(), 0.0);
        assert!((prop.value_at_time(0.5).as_scalar() - 50.0).abs() < 1e-3);
        assert_eq!(prop.value_at_time(2.0).as_scalar(), 100.0);
        assert_eq!(prop.key_times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_hold_keyframe() {
        let prop = property(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [5], "h": 1 },
                { "t": 10, "s": [15] }
            ]
        }));
        assert_eq!(prop.value_at_time(0.9).as_scalar(), 5.0);
        assert_eq!(prop.value_at_time(1.0).as_scalar(), 15.0);
    }

    #[test]
    fn test_static_and_default() {
        let prop = property(json!({ "a": 0, "k": 7 }));
        assert_eq!(prop.value_at_time(3.0).as_scalar(), 7.0);
        assert!(prop.key_times().is_empty());
    }
}
