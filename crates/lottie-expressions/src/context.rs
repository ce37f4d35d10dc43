//! Read-only view of the composition graph an expression runs against.
//!
//! Everything here is immutable once built and shared behind `Arc`, so one
//! document can feed evaluations on any thread.

use glam::{DAffine2, DVec2};
use std::sync::Arc;

use crate::property::{PropertyRef, PropertyValue, StaticProperty};

/// Composition: the root document or a precomp asset.
pub struct CompObject {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub frame_rate: f64,
    /// In and out point in frames.
    pub in_point: f64,
    pub out_point: f64,
    pub layers: Vec<Arc<LayerObject>>,
}

impl CompObject {
    pub fn new(name: impl Into<String>, width: f64, height: f64, frame_rate: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            frame_rate,
            in_point: 0.0,
            out_point: 0.0,
            layers: Vec::new(),
        }
    }

    pub fn with_layers(mut self, layers: Vec<LayerObject>) -> Self {
        self.layers = layers.into_iter().map(Arc::new).collect();
        self
    }

    pub fn frame_duration(&self) -> f64 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            0.0
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        (self.out_point - self.in_point) * self.frame_duration()
    }

    /// Layer by its 1-based `index`.
    pub fn layer_by_index(&self, index: u32) -> Option<&Arc<LayerObject>> {
        self.layers.iter().find(|l| l.index == index)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&Arc<LayerObject>> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Layer with everything expressions can reach through `thisLayer`.
pub struct LayerObject {
    pub index: u32,
    pub name: String,
    /// Parent layer `index`
    pub parent: Option<u32>,
    /// In, out and start time in frames.
    pub in_point: f64,
    pub out_point: f64,
    pub start_time: f64,
    pub enabled: bool,
    pub width: f64,
    pub height: f64,
    pub transform: Arc<TransformObject>,
    pub effects: Vec<Arc<EffectObject>>,
    pub content: Vec<Arc<ContentObject>>,
    /// Precomp the layer renders.
    pub source: Option<Arc<CompObject>>,
    pub time_remap: Option<PropertyRef>,
}

impl LayerObject {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            parent: None,
            in_point: 0.0,
            out_point: f64::MAX,
            start_time: 0.0,
            enabled: true,
            width: 0.0,
            height: 0.0,
            transform: Arc::new(TransformObject::default()),
            effects: Vec::new(),
            content: Vec::new(),
            source: None,
            time_remap: None,
        }
    }

    pub fn with_transform(mut self, transform: TransformObject) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_effect(mut self, effect: EffectObject) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }

    pub fn with_content(mut self, content: ContentObject) -> Self {
        self.content.push(Arc::new(content));
        self
    }

    pub fn is_active(&self, frame: f64) -> bool {
        self.enabled && frame >= self.in_point && frame < self.out_point
    }

    /// Effect by name, or by 1-based position.
    pub fn effect(&self, key: &LookupKey) -> Option<&Arc<EffectObject>> {
        match key {
            LookupKey::Name(name) => self.effects.iter().find(|e| e.name == *name),
            LookupKey::Index(i) => i.checked_sub(1).and_then(|i| self.effects.get(i)),
        }
    }

    pub fn content(&self, key: &LookupKey) -> Option<&Arc<ContentObject>> {
        find_content(&self.content, key)
    }
}

/// Transform channels. Position and anchor are 2-D, scale is in percent,
/// rotation in degrees, opacity 0..100.
pub struct TransformObject {
    pub anchor_point: PropertyRef,
    pub position: PropertyRef,
    pub scale: PropertyRef,
    pub rotation: PropertyRef,
    pub opacity: PropertyRef,
}

impl Default for TransformObject {
    fn default() -> Self {
        Self {
            anchor_point: StaticProperty::shared(vec![0.0, 0.0]),
            position: StaticProperty::shared(vec![0.0, 0.0]),
            scale: StaticProperty::shared(vec![100.0, 100.0]),
            rotation: StaticProperty::shared(0.0),
            opacity: StaticProperty::shared(100.0),
        }
    }
}

impl TransformObject {
    /// Local matrix at `time`: translate(position) * rotate * scale * translate(-anchor).
    pub fn matrix_at(&self, time: f64) -> DAffine2 {
        let anchor = to_dvec2(&self.anchor_point.value_at_time(time));
        let position = to_dvec2(&self.position.value_at_time(time));
        let scale = to_dvec2(&self.scale.value_at_time(time)) / 100.0;
        let rotation = self.rotation.value_at_time(time).as_scalar().to_radians();

        DAffine2::from_scale_angle_translation(scale, rotation, position)
            * DAffine2::from_translation(-anchor)
    }
}

fn to_dvec2(value: &PropertyValue) -> DVec2 {
    match value {
        PropertyValue::Scalar(v) => DVec2::splat(*v),
        PropertyValue::Vector(v) => DVec2::new(
            v.first().copied().unwrap_or(0.0),
            v.get(1).copied().unwrap_or(0.0),
        ),
    }
}

/// Effect instance with its controls, e.g. "Slider Control" -> "Slider".
pub struct EffectObject {
    pub name: String,
    pub enabled: bool,
    pub controls: Vec<NamedProperty>,
}

impl EffectObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, name: impl Into<String>, property: PropertyRef) -> Self {
        self.controls.push(NamedProperty {
            name: name.into(),
            property,
        });
        self
    }

    pub fn control(&self, key: &LookupKey) -> Option<&NamedProperty> {
        match key {
            LookupKey::Name(name) => self.controls.iter().find(|c| c.name == *name),
            LookupKey::Index(i) => i.checked_sub(1).and_then(|i| self.controls.get(i)),
        }
    }
}

/// Shape content item: a group or a leaf shape/style.
pub struct ContentObject {
    pub name: String,
    pub properties: Vec<NamedProperty>,
    pub transform: Option<Arc<TransformObject>>,
    pub content: Vec<Arc<ContentObject>>,
}

impl ContentObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            transform: None,
            content: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, property: PropertyRef) -> Self {
        self.properties.push(NamedProperty {
            name: name.into(),
            property,
        });
        self
    }

    pub fn with_child(mut self, child: ContentObject) -> Self {
        self.content.push(Arc::new(child));
        self
    }

    pub fn property(&self, name: &str) -> Option<&NamedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn content(&self, key: &LookupKey) -> Option<&Arc<ContentObject>> {
        find_content(&self.content, key)
    }
}

fn find_content<'a>(items: &'a [Arc<ContentObject>], key: &LookupKey) -> Option<&'a Arc<ContentObject>> {
    match key {
        LookupKey::Name(name) => items.iter().find(|c| c.name == *name),
        LookupKey::Index(i) => i.checked_sub(1).and_then(|i| items.get(i)),
    }
}

pub struct NamedProperty {
    pub name: String,
    pub property: PropertyRef,
}

/// Argument of `layer()`, `effect()`, `content()`: a name or a 1-based index.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupKey {
    Name(String),
    Index(usize),
}

/// Layer handle that remembers its composition for parent lookups.
#[derive(Clone)]
pub struct LayerRef {
    pub comp: Arc<CompObject>,
    pub layer: Arc<LayerObject>,
}

impl LayerRef {
    pub fn parent(&self) -> Option<LayerRef> {
        let parent = self.comp.layer_by_index(self.layer.parent?)?;
        Some(LayerRef {
            comp: self.comp.clone(),
            layer: parent.clone(),
        })
    }

    /// Layer space to composition space at `time`, following the parent chain.
    pub fn to_comp_matrix(&self, time: f64) -> DAffine2 {
        let mut matrix = self.layer.transform.matrix_at(time);
        let mut current = self.parent();
        let mut depth = 0;
        while let Some(parent) = current {
            if depth >= MAX_PARENT_DEPTH {
                break;
            }
            matrix = parent.layer.transform.matrix_at(time) * matrix;
            current = parent.parent();
            depth += 1;
        }
        matrix
    }
}

const MAX_PARENT_DEPTH: usize = 64;

/// Everything an evaluation sample sees. Immutable per sample.
#[derive(Clone)]
pub struct EvaluationContext {
    /// Seconds
    pub time: f64,
    pub frame_rate: f64,
    pub comp: Option<Arc<CompObject>>,
    pub layer: Option<Arc<LayerObject>>,
    pub property: Option<PropertyRef>,
    /// Distinguishes properties of one layer when seeding `random()`.
    pub property_index: u32,
    /// Compositions reachable through `comp(name)`.
    pub compositions: Vec<Arc<CompObject>>,
}

impl EvaluationContext {
    pub fn new(time: f64, frame_rate: f64) -> Self {
        Self {
            time,
            frame_rate,
            comp: None,
            layer: None,
            property: None,
            property_index: 0,
            compositions: Vec::new(),
        }
    }

    pub fn with_comp(mut self, comp: Arc<CompObject>) -> Self {
        self.comp = Some(comp);
        self
    }

    pub fn with_layer(mut self, layer: Arc<LayerObject>) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_property(mut self, property: PropertyRef) -> Self {
        self.property = Some(property);
        self
    }

    pub fn with_property_index(mut self, index: u32) -> Self {
        self.property_index = index;
        self
    }

    pub fn with_compositions(mut self, compositions: Vec<Arc<CompObject>>) -> Self {
        self.compositions = compositions;
        self
    }

    pub fn frame(&self) -> f64 {
        self.time * self.frame_rate
    }

    pub fn this_layer(&self) -> Option<LayerRef> {
        Some(LayerRef {
            comp: self.comp.clone()?,
            layer: self.layer.clone()?,
        })
    }

    pub fn composition(&self, name: &str) -> Option<Arc<CompObject>> {
        self.compositions
            .iter()
            .chain(self.comp.iter())
            .find(|c| c.name == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(position: [f64; 2], rotation: f64, scale: f64) -> TransformObject {
        TransformObject {
            position: StaticProperty::shared(position.to_vec()),
            rotation: StaticProperty::shared(rotation),
            scale: StaticProperty::shared(vec![scale, scale]),
            ..TransformObject::default()
        }
    }

    #[test]
    fn test_parented_matrix() {
        let comp = Arc::new(CompObject::new("Main", 100.0, 100.0, 30.0).with_layers(vec![
            LayerObject::new(1, "Parent").with_transform(transform([10.0, 0.0], 0.0, 200.0)),
            LayerObject::new(2, "Child")
                .with_parent(1)
                .with_transform(transform([5.0, 5.0], 0.0, 100.0)),
        ]));

        let child = LayerRef {
            comp: comp.clone(),
            layer: comp.layers[1].clone(),
        };
        let p = child.to_comp_matrix(0.0).transform_point2(DVec2::ZERO);
        assert!((p - DVec2::new(20.0, 10.0)).length() < 1e-9, "got {:?}", p);
    }

    #[test]
    fn test_rotation_is_degrees() {
        let t = transform([0.0, 0.0], 90.0, 100.0);
        let p = t.matrix_at(0.0).transform_point2(DVec2::new(1.0, 0.0));
        assert!((p - DVec2::new(0.0, 1.0)).length() < 1e-9, "got {:?}", p);
    }

    #[test]
    fn test_lookup_keys_are_one_based() {
        let layer = LayerObject::new(1, "L")
            .with_effect(EffectObject::new("First"))
            .with_effect(EffectObject::new("Second"));
        assert_eq!(layer.effect(&LookupKey::Index(2)).unwrap().name, "Second");
        assert!(layer.effect(&LookupKey::Index(0)).is_none());
        assert!(layer.effect(&LookupKey::Name("Third".into())).is_none());
    }
}
