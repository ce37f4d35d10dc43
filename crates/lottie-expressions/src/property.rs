//! Property values and the sampling protocol behind `thisProperty`.
//!
//! Implements the AE property attributes (`value`, `velocity`, `speed`) and the
//! time based helpers (`valueAtTime`, `loopOut`, `loopIn`) on top of any
//! [`AnimatedProperty`].

use serde::Serialize;
use std::sync::Arc;

/// Represents a property value - either scalar or vector
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl PropertyValue {
    /// Get value as scalar (returns first component for vectors)
    pub fn as_scalar(&self) -> f64 {
        match self {
            PropertyValue::Scalar(v) => *v,
            PropertyValue::Vector(v) => v.first().copied().unwrap_or(0.0),
        }
    }

    /// Get value as vector (wraps scalar in single-element vec)
    pub fn as_vector(&self) -> Vec<f64> {
        match self {
            PropertyValue::Scalar(v) => vec![*v],
            PropertyValue::Vector(v) => v.clone(),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            PropertyValue::Scalar(_) => 1,
            PropertyValue::Vector(v) => v.len(),
        }
    }

    /// Same shape as `self`, all components zero.
    pub fn zeroed(&self) -> PropertyValue {
        match self {
            PropertyValue::Scalar(_) => PropertyValue::Scalar(0.0),
            PropertyValue::Vector(v) => PropertyValue::Vector(vec![0.0; v.len()]),
        }
    }

    pub fn add(&self, other: &PropertyValue) -> PropertyValue {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &PropertyValue) -> PropertyValue {
        self.zip_with(other, |a, b| a - b)
    }

    /// Scale property value by factor
    pub fn scale(&self, factor: f64) -> PropertyValue {
        match self {
            PropertyValue::Scalar(v) => PropertyValue::Scalar(v * factor),
            PropertyValue::Vector(v) => {
                PropertyValue::Vector(v.iter().map(|x| x * factor).collect())
            }
        }
    }

    pub fn lerp(&self, other: &PropertyValue, t: f64) -> PropertyValue {
        self.zip_with(other, |a, b| a + (b - a) * t)
    }

    /// Euclidean length, used for `speed`.
    pub fn magnitude(&self) -> f64 {
        match self {
            PropertyValue::Scalar(v) => v.abs(),
            PropertyValue::Vector(v) => v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        }
    }

    fn zip_with(&self, other: &PropertyValue, f: impl Fn(f64, f64) -> f64) -> PropertyValue {
        match (self, other) {
            (PropertyValue::Scalar(a), PropertyValue::Scalar(b)) => PropertyValue::Scalar(f(*a, *b)),
            (PropertyValue::Vector(a), PropertyValue::Vector(b)) => {
                let len = a.len().max(b.len());
                let result = (0..len)
                    .map(|i| {
                        f(
                            a.get(i).copied().unwrap_or(0.0),
                            b.get(i).copied().unwrap_or(0.0),
                        )
                    })
                    .collect();
                PropertyValue::Vector(result)
            }
            (PropertyValue::Scalar(a), PropertyValue::Vector(b)) => {
                PropertyValue::Vector(b.iter().map(|x| f(*a, *x)).collect())
            }
            (PropertyValue::Vector(a), PropertyValue::Scalar(b)) => {
                PropertyValue::Vector(a.iter().map(|x| f(*x, *b)).collect())
            }
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Scalar(0.0)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Scalar(v)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(v: Vec<f64>) -> Self {
        PropertyValue::Vector(v)
    }
}

/// Trait for animated properties that can be sampled. Times are in seconds.
pub trait AnimatedProperty: Send + Sync {
    /// Get value at specific time
    fn value_at_time(&self, time: f64) -> PropertyValue;

    /// Get velocity at specific time
    fn velocity_at_time(&self, time: f64) -> PropertyValue {
        let h = VELOCITY_STEP;
        let before = self.value_at_time(time - h);
        let after = self.value_at_time(time + h);
        after.sub(&before).scale(1.0 / (2.0 * h))
    }

    /// Get speed at specific time
    fn speed_at_time(&self, time: f64) -> f64 {
        self.velocity_at_time(time).magnitude()
    }

    /// Keyframe times in seconds, ascending. Empty for static properties.
    fn key_times(&self) -> Vec<f64> {
        Vec::new()
    }
}

pub type PropertyRef = Arc<dyn AnimatedProperty>;

const VELOCITY_STEP: f64 = 1e-3;

/// A property that never changes.
#[derive(Clone, Debug)]
pub struct StaticProperty(pub PropertyValue);

impl AnimatedProperty for StaticProperty {
    fn value_at_time(&self, _time: f64) -> PropertyValue {
        self.0.clone()
    }

    fn velocity_at_time(&self, _time: f64) -> PropertyValue {
        self.0.zeroed()
    }

    fn speed_at_time(&self, _time: f64) -> f64 {
        0.0
    }
}

impl StaticProperty {
    pub fn shared(value: impl Into<PropertyValue>) -> PropertyRef {
        Arc::new(StaticProperty(value.into()))
    }
}

/// Loop type for `loopOut` / `loopIn`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopType {
    Cycle,
    PingPong,
    Continue,
    Offset,
}

impl LoopType {
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pingpong" => LoopType::PingPong,
            "continue" => LoopType::Continue,
            "offset" => LoopType::Offset,
            _ => LoopType::Cycle,
        }
    }
}

/// How far back from the boundary key the loop segment reaches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoopSpan {
    /// Number of keyframe segments, 0 meaning all of them.
    Keyframes(usize),
    /// Duration in seconds, 0 meaning the whole keyframed range.
    Duration(f64),
}

/// `loopOut(type, numKeyframes)` evaluated at `time`.
pub fn loop_out(
    property: &dyn AnimatedProperty,
    loop_type: LoopType,
    span: LoopSpan,
    time: f64,
) -> PropertyValue {
    let keys = property.key_times();
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return property.value_at_time(time);
    };
    if keys.len() < 2 || time <= last {
        return property.value_at_time(time);
    }

    let start = match span {
        LoopSpan::Keyframes(0) => first,
        LoopSpan::Keyframes(n) => keys[keys.len() - 1 - n.min(keys.len() - 1)],
        LoopSpan::Duration(d) if d > 0.0 => (last - d).max(first),
        LoopSpan::Duration(_) => first,
    };
    let duration = last - start;
    if duration <= 0.0 {
        return property.value_at_time(last);
    }

    let elapsed = time - last;
    let cycles = (elapsed / duration).floor();
    let phase = elapsed - cycles * duration;

    match loop_type {
        LoopType::Cycle => property.value_at_time(start + phase),
        LoopType::PingPong => {
            if cycles as i64 % 2 == 0 {
                property.value_at_time(last - phase)
            } else {
                property.value_at_time(start + phase)
            }
        }
        LoopType::Offset => {
            let delta = property.value_at_time(last).sub(&property.value_at_time(start));
            property
                .value_at_time(start + phase)
                .add(&delta.scale(cycles + 1.0))
        }
        LoopType::Continue => {
            let velocity = property.velocity_at_time(last - VELOCITY_STEP);
            property.value_at_time(last).add(&velocity.scale(elapsed))
        }
    }
}

/// `loopIn(type, numKeyframes)` evaluated at `time`.
pub fn loop_in(
    property: &dyn AnimatedProperty,
    loop_type: LoopType,
    span: LoopSpan,
    time: f64,
) -> PropertyValue {
    let keys = property.key_times();
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return property.value_at_time(time);
    };
    if keys.len() < 2 || time >= first {
        return property.value_at_time(time);
    }

    let end = match span {
        LoopSpan::Keyframes(0) => last,
        LoopSpan::Keyframes(n) => keys[n.min(keys.len() - 1)],
        LoopSpan::Duration(d) if d > 0.0 => (first + d).min(last),
        LoopSpan::Duration(_) => last,
    };
    let duration = end - first;
    if duration <= 0.0 {
        return property.value_at_time(first);
    }

    let elapsed = first - time;
    let cycles = (elapsed / duration).floor();
    let phase = elapsed - cycles * duration;

    match loop_type {
        LoopType::Cycle => property.value_at_time(end - phase),
        LoopType::PingPong => {
            if cycles as i64 % 2 == 0 {
                property.value_at_time(first + phase)
            } else {
                property.value_at_time(end - phase)
            }
        }
        LoopType::Offset => {
            let delta = property.value_at_time(end).sub(&property.value_at_time(first));
            property
                .value_at_time(end - phase)
                .sub(&delta.scale(cycles + 1.0))
        }
        LoopType::Continue => {
            let velocity = property.velocity_at_time(first + VELOCITY_STEP);
            property.value_at_time(first).sub(&velocity.scale(elapsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear ramp 0 -> 10 between t=0 and t=1.
    struct Ramp;

    impl AnimatedProperty for Ramp {
        fn value_at_time(&self, time: f64) -> PropertyValue {
            PropertyValue::Scalar(time.clamp(0.0, 1.0) * 10.0)
        }

        fn key_times(&self) -> Vec<f64> {
            vec![0.0, 1.0]
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_property_value_vector() {
        let val = PropertyValue::Vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(val.as_vector(), vec![1.0, 2.0, 3.0]);
        assert_eq!(val.dimension(), 3);
        assert_eq!(val.as_scalar(), 1.0);
    }

    #[test]
    fn test_property_value_add_pads_shorter_vector() {
        let a = PropertyValue::Vector(vec![1.0, 2.0, 3.0]);
        let b = PropertyValue::Vector(vec![10.0, 10.0]);
        assert_eq!(a.add(&b), PropertyValue::Vector(vec![11.0, 12.0, 3.0]));
    }

    #[test]
    fn test_property_value_scale() {
        let val = PropertyValue::Vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(val.scale(2.0), PropertyValue::Vector(vec![2.0, 4.0, 6.0]));
    }

    #[test]
    fn test_static_property_has_no_velocity() {
        let prop = StaticProperty(PropertyValue::Vector(vec![5.0, 5.0]));
        assert_eq!(prop.velocity_at_time(3.0), PropertyValue::Vector(vec![0.0, 0.0]));
        assert_eq!(prop.speed_at_time(3.0), 0.0);
        assert!(prop.key_times().is_empty());
    }

    #[test]
    fn test_default_velocity_is_derivative() {
        let v = Ramp.velocity_at_time(0.5).as_scalar();
        assert!(approx(v, 10.0), "velocity was {}", v);
    }

    #[test]
    fn test_loop_out_cycle() {
        let v = loop_out(&Ramp, LoopType::Cycle, LoopSpan::Keyframes(0), 1.25);
        assert!(approx(v.as_scalar(), 2.5));
    }

    #[test]
    fn test_loop_out_pingpong() {
        let v = loop_out(&Ramp, LoopType::PingPong, LoopSpan::Keyframes(0), 1.25);
        assert!(approx(v.as_scalar(), 7.5));
        let v = loop_out(&Ramp, LoopType::PingPong, LoopSpan::Keyframes(0), 2.25);
        assert!(approx(v.as_scalar(), 2.5));
    }

    #[test]
    fn test_loop_out_offset_accumulates() {
        let v = loop_out(&Ramp, LoopType::Offset, LoopSpan::Keyframes(0), 2.5);
        assert!(approx(v.as_scalar(), 25.0), "got {:?}", v);
    }

    #[test]
    fn test_loop_out_inside_range_is_value() {
        let v = loop_out(&Ramp, LoopType::Cycle, LoopSpan::Keyframes(0), 0.5);
        assert!(approx(v.as_scalar(), 5.0));
    }

    #[test]
    fn test_loop_in_cycle() {
        let v = loop_in(&Ramp, LoopType::Cycle, LoopSpan::Keyframes(0), -0.25);
        assert!(approx(v.as_scalar(), 7.5));
    }

    #[test]
    fn test_loop_type_names() {
        assert_eq!(LoopType::from_name("pingPong"), LoopType::PingPong);
        assert_eq!(LoopType::from_name("offset"), LoopType::Offset);
        assert_eq!(LoopType::from_name("whatever"), LoopType::Cycle);
    }
}
