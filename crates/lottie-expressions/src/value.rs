//! Runtime values, coercion and operators.

use glam::DVec2;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{BinaryOp, Literal};
use crate::context::{CompObject, ContentObject, EffectObject, LayerRef, TransformObject};
use crate::error::{ExpressionError, Result};
use crate::function::Closure;
use crate::property::{PropertyRef, PropertyValue};

/// Property handle sampled at the time it was obtained.
#[derive(Clone)]
pub struct PropertyHandle {
    pub property: PropertyRef,
    pub time: f64,
}

impl PropertyHandle {
    pub fn current(&self) -> PropertyValue {
        self.property.value_at_time(self.time)
    }
}

/// Host objects reachable from expressions.
#[derive(Clone)]
pub enum DomainObject {
    Comp(Arc<CompObject>),
    Layer(LayerRef),
    Property(PropertyHandle),
    Transform(Arc<TransformObject>),
    Content(Arc<ContentObject>),
    Effect(Arc<EffectObject>),
    Math,
}

impl DomainObject {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainObject::Comp(_) => "Comp",
            DomainObject::Layer(_) => "Layer",
            DomainObject::Property(_) => "Property",
            DomainObject::Transform(_) => "Transform",
            DomainObject::Content(_) => "Content",
            DomainObject::Effect(_) => "Effect",
            DomainObject::Math => "Math",
        }
    }

    fn same(&self, other: &DomainObject) -> bool {
        match (self, other) {
            (DomainObject::Comp(a), DomainObject::Comp(b)) => Arc::ptr_eq(a, b),
            (DomainObject::Layer(a), DomainObject::Layer(b)) => Arc::ptr_eq(&a.layer, &b.layer),
            (DomainObject::Property(a), DomainObject::Property(b)) => {
                Arc::ptr_eq(&a.property, &b.property) && a.time == b.time
            }
            (DomainObject::Transform(a), DomainObject::Transform(b)) => Arc::ptr_eq(a, b),
            (DomainObject::Content(a), DomainObject::Content(b)) => Arc::ptr_eq(a, b),
            (DomainObject::Effect(a), DomainObject::Effect(b)) => Arc::ptr_eq(a, b),
            (DomainObject::Math, DomainObject::Math) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Vector(DVec2),
    Array(Rc<Vec<Value>>),
    Function(Rc<Closure>),
    Object(DomainObject),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::str(s),
        }
    }

    pub fn from_property(value: &PropertyValue) -> Value {
        match value {
            PropertyValue::Scalar(v) => Value::Number(*v),
            PropertyValue::Vector(v) => Value::from_components(v.clone()),
        }
    }

    /// Two components make a vector, anything else an array of numbers.
    pub fn from_components(components: Vec<f64>) -> Value {
        match components.as_slice() {
            [x, y] => Value::Vector(DVec2::new(*x, *y)),
            _ => Value::Array(Rc::new(components.into_iter().map(Value::Number).collect())),
        }
    }

    /// Array literal: two numbers make a vector.
    pub fn from_elements(elements: Vec<Value>) -> Value {
        match elements.as_slice() {
            [Value::Number(x), Value::Number(y)] => Value::Vector(DVec2::new(*x, *y)),
            _ => Value::Array(Rc::new(elements)),
        }
    }

    /// Property handles become their current value, everything else is unchanged.
    pub fn resolve(self) -> Value {
        match self {
            Value::Object(DomainObject::Property(handle)) => Value::from_property(&handle.current()),
            other => other,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Vector(_) => "vector",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Object(o) => o.kind(),
        }
    }

    /// Numeric coercion; strings go through float parsing.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Object(DomainObject::Property(h)) => match h.current() {
                PropertyValue::Scalar(v) => Some(v),
                PropertyValue::Vector(_) => None,
            },
            _ => None,
        }
    }

    /// Numeric components of a vector, an array of numbers or a single number.
    pub fn components(&self) -> Option<Vec<f64>> {
        match self {
            Value::Vector(v) => Some(vec![v.x, v.y]),
            Value::Array(items) => items.iter().map(Value::to_number).collect(),
            Value::Object(DomainObject::Property(h)) => Some(h.current().as_vector()),
            other => other.to_number().map(|n| vec![n]),
        }
    }

    pub fn is_vector_like(&self) -> bool {
        match self {
            Value::Vector(_) | Value::Array(_) => true,
            Value::Object(DomainObject::Property(h)) => {
                matches!(h.current(), PropertyValue::Vector(_))
            }
            _ => false,
        }
    }

    /// Value handed back to the host; `None` when it has no numeric shape.
    pub fn to_property_value(&self) -> Option<PropertyValue> {
        match self {
            Value::Number(n) => Some(PropertyValue::Scalar(*n)),
            Value::Bool(b) => Some(PropertyValue::Scalar(if *b { 1.0 } else { 0.0 })),
            Value::Vector(v) => Some(PropertyValue::Vector(vec![v.x, v.y])),
            Value::Array(_) => self.components().map(PropertyValue::Vector),
            Value::Str(_) => self.to_number().map(PropertyValue::Scalar),
            Value::Object(DomainObject::Property(h)) => Some(h.current()),
            _ => None,
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value> {
        let target = self.clone().resolve();
        let Some(i) = index.to_number() else {
            return Err(ExpressionError::type_error(format!(
                "cannot index {} with {}",
                target.type_name(),
                index
            )));
        };
        match &target {
            Value::Vector(v) => match i {
                i if i == 0.0 => Ok(Value::Number(v.x)),
                i if i == 1.0 => Ok(Value::Number(v.y)),
                _ => Err(ExpressionError::type_error(format!(
                    "cannot get index {} of a 2D vector",
                    Value::Number(i)
                ))),
            },
            Value::Array(items) => Ok(as_slot(i)
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default()),
            Value::Str(s) => Ok(as_slot(i)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                .unwrap_or_default()),
            other => Err(ExpressionError::type_error(format!(
                "cannot read index {} of {}",
                Value::Number(i),
                other.type_name()
            ))),
        }
    }

    /// Copy of `self` with one component replaced, for `v[i] = x`.
    pub fn with_index(self, index: &Value, element: Value) -> Result<Value> {
        let target = self.resolve();
        let slot = index.to_number().and_then(as_slot).ok_or_else(|| {
            ExpressionError::type_error(format!("invalid index {}", index))
        })?;
        match target {
            Value::Vector(mut v) => {
                let n = element.to_number().ok_or_else(|| {
                    ExpressionError::type_error(format!("cannot store {} in a vector", element))
                })?;
                match slot {
                    0 => v.x = n,
                    1 => v.y = n,
                    _ => {
                        let mut items = vec![Value::Number(v.x), Value::Number(v.y)];
                        items.resize(slot + 1, Value::Undefined);
                        items[slot] = Value::Number(n);
                        return Ok(Value::Array(Rc::new(items)));
                    }
                }
                Ok(Value::Vector(v))
            }
            Value::Array(mut items) => {
                let items_mut = Rc::make_mut(&mut items);
                if slot >= items_mut.len() {
                    items_mut.resize(slot + 1, Value::Undefined);
                }
                items_mut[slot] = element;
                Ok(Value::Array(items))
            }
            other => Err(ExpressionError::type_error(format!(
                "cannot assign index of {}",
                other.type_name()
            ))),
        }
    }
}

fn as_slot(i: f64) -> Option<usize> {
    (i >= 0.0 && i.fract() == 0.0).then_some(i as usize)
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        write!(f, "0")
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::Str(s) => write!(f, "{}", s),
            Value::Vector(v) => {
                format_number(v.x, f)?;
                write!(f, ",")?;
                format_number(v.y, f)
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Function(c) => write!(f, "function {}()", c.decl.display_name()),
            Value::Object(DomainObject::Property(h)) => {
                write!(f, "{}", Value::from_property(&h.current()))
            }
            Value::Object(o) => write!(f, "[object {}]", o.kind()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Vector(v) => write!(f, "[{}, {}]", v.x, v.y),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<DVec2> for Value {
    fn from(v: DVec2) -> Self {
        Value::Vector(v)
    }
}

/// `==` (loose) and `===` (strict).
pub fn equals(a: &Value, b: &Value, strict: bool) -> bool {
    let a = a.clone().resolve();
    let b = b.clone().resolve();

    if a.is_nullish() || b.is_nullish() {
        return if strict {
            matches!(
                (&a, &b),
                (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null)
            )
        } else {
            a.is_nullish() && b.is_nullish()
        };
    }
    if let (Value::Number(x), Value::Number(y)) = (&a, &b) {
        return x == y;
    }
    if strict || std::mem::discriminant(&a) == std::mem::discriminant(&b) {
        return same_type_equals(&a, &b);
    }
    match (&a, &b) {
        (Value::Str(s), Value::Number(n)) | (Value::Number(n), Value::Str(s)) => {
            s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
        }
        _ => a.to_string() == b.to_string(),
    }
}

fn same_type_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Vector(x), Value::Vector(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| equals(p, q, true))
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => x.same(y),
        _ => false,
    }
}

fn operand_error(op: BinaryOp, a: &Value, b: &Value) -> ExpressionError {
    ExpressionError::type_error(format!(
        "cannot apply operator '{}' to operands {} and {}",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

/// Component-wise combination, broadcasting a scalar and padding the shorter side with 0.
fn zip_components(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    match (a, b) {
        ([x], _) if b.len() != 1 => b.iter().map(|y| f(*x, *y)).collect(),
        (_, [y]) if a.len() != 1 => a.iter().map(|x| f(*x, *y)).collect(),
        _ => (0..a.len().max(b.len()))
            .map(|i| f(a.get(i).copied().unwrap_or(0.0), b.get(i).copied().unwrap_or(0.0)))
            .collect(),
    }
}

fn numeric(op: BinaryOp, a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    match (a.to_number(), b.to_number()) {
        (Some(x), Some(y)) => Ok(Value::Number(f(x, y))),
        _ => Err(operand_error(op, a, b)),
    }
}

/// Arithmetic and relational operators. Equality goes through [`equals`].
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    let a = a.clone().resolve();
    let b = b.clone().resolve();

    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(&a, &b, false))),
        BinaryOp::NotEq => Ok(Value::Bool(!equals(&a, &b, false))),
        BinaryOp::StrictEq => Ok(Value::Bool(equals(&a, &b, true))),
        BinaryOp::StrictNotEq => Ok(Value::Bool(!equals(&a, &b, true))),
        BinaryOp::Add => {
            if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                return Ok(Value::str(&format!("{}{}", a, b)));
            }
            vector_or_numeric(op, &a, &b, |x, y| x + y)
        }
        BinaryOp::Sub => vector_or_numeric(op, &a, &b, |x, y| x - y),
        BinaryOp::Mul => scale(op, &a, &b, true, |x, y| x * y),
        BinaryOp::Div => scale(op, &a, &b, false, |x, y| x / y),
        BinaryOp::Rem => scale(op, &a, &b, false, |x, y| x % y),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => compare(op, &a, &b),
    }
}

fn vector_or_numeric(
    op: BinaryOp,
    a: &Value,
    b: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if a.is_vector_like() || b.is_vector_like() {
        return match (a.components(), b.components()) {
            (Some(x), Some(y)) => Ok(Value::from_components(zip_components(&x, &y, f))),
            _ => Err(operand_error(op, a, b)),
        };
    }
    numeric(op, a, b, f)
}

/// `vector op number` element-wise; `number * vector` too when `commutes`.
fn scale(
    op: BinaryOp,
    a: &Value,
    b: &Value,
    commutes: bool,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a.is_vector_like(), b.is_vector_like()) {
        (false, false) => numeric(op, a, b, f),
        (true, false) => match (a.components(), b.to_number()) {
            (Some(v), Some(s)) => Ok(Value::from_components(v.iter().map(|x| f(*x, s)).collect())),
            _ => Err(operand_error(op, a, b)),
        },
        (false, true) if commutes => match (a.to_number(), b.components()) {
            (Some(s), Some(v)) => Ok(Value::from_components(v.iter().map(|y| f(s, *y)).collect())),
            _ => Err(operand_error(op, a, b)),
        },
        _ => Err(operand_error(op, a, b)),
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    let ordering = match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => match (a.to_number(), b.to_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => return Err(operand_error(op, a, b)),
        },
    };
    let Some(ordering) = ordering else {
        // NaN compares false
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Bool(result))
}

/// Unary minus, vectors included.
pub fn negate(v: &Value) -> Result<Value> {
    let v = v.clone().resolve();
    if v.is_vector_like() {
        if let Some(c) = v.components() {
            return Ok(Value::from_components(c.into_iter().map(|x| -x).collect()));
        }
    }
    v.to_number()
        .map(|n| Value::Number(-n))
        .ok_or_else(|| ExpressionError::type_error(format!("cannot negate {}", v.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn vec2(x: f64, y: f64) -> Value {
        Value::Vector(DVec2::new(x, y))
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(equals(&Value::str("3"), &Value::Number(3.0), false));
        assert!(!equals(&Value::str("3"), &Value::Number(3.0), true));
        assert!(equals(&Value::Number(3.0), &Value::Number(3.0), true));
        assert!(!equals(&Value::str("abc"), &Value::Number(3.0), false));
        assert!(equals(&Value::Null, &Value::Undefined, false));
        assert!(!equals(&Value::Null, &Value::Undefined, true));
        assert!(!equals(&Value::Number(0.0), &Value::Undefined, false));
        assert!(equals(&vec2(1.0, 2.0), &vec2(1.0, 2.0), true));
        // different types fall back to string forms
        assert!(equals(&Value::Bool(true), &Value::str("true"), false));
    }

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::Number(0.0),
            Value::str(""),
            Value::Undefined,
            Value::Bool(false),
            Value::Number(f64::NAN),
        ] {
            assert!(!falsy.is_truthy(), "{:?} should be falsy", falsy);
        }
        assert!(vec2(0.0, 0.0).is_truthy());
        assert!(Value::str("0").is_truthy());
    }

    #[test]
    fn test_vector_arithmetic() {
        let sum = binary(BinaryOp::Add, &vec2(1.0, 2.0), &vec2(10.0, 20.0)).unwrap();
        assert!(equals(&sum, &vec2(11.0, 22.0), true));

        let scaled = binary(BinaryOp::Mul, &vec2(1.0, 2.0), &Value::Number(3.0)).unwrap();
        assert!(equals(&scaled, &vec2(3.0, 6.0), true));

        let scaled = binary(BinaryOp::Mul, &Value::Number(2.0), &vec2(1.0, 2.0)).unwrap();
        assert!(equals(&scaled, &vec2(2.0, 4.0), true));

        let halved = binary(BinaryOp::Div, &vec2(4.0, 2.0), &Value::Number(2.0)).unwrap();
        assert!(equals(&halved, &vec2(2.0, 1.0), true));

        let err = binary(BinaryOp::Div, &Value::Number(2.0), &vec2(1.0, 2.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_string_coercion() {
        let concat = binary(BinaryOp::Add, &Value::str("a"), &Value::Number(1.0)).unwrap();
        assert_eq!(concat.to_string(), "a1");

        let diff = binary(BinaryOp::Sub, &Value::str("5"), &Value::Number(2.0)).unwrap();
        assert!(equals(&diff, &Value::Number(3.0), true));

        let err = binary(BinaryOp::Sub, &Value::str("x"), &Value::Number(2.0)).unwrap_err();
        assert!(err.to_string().contains("cannot apply operator"));
    }

    #[test]
    fn test_array_literal_shapes() {
        let v = Value::from_elements(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(v, Value::Vector(_)));
        let a = Value::from_elements(vec![1.0.into(), 2.0.into(), 3.0.into()]);
        assert!(matches!(a, Value::Array(_)));
        assert_eq!(a.to_string(), "1,2,3");
    }

    #[test]
    fn test_vector_index() {
        let v = vec2(4.0, 5.0);
        assert!(equals(&v.index(&Value::Number(1.0)).unwrap(), &Value::Number(5.0), true));
        assert!(v.index(&Value::Number(2.0)).is_err());

        let updated = v.with_index(&Value::Number(0.0), Value::Number(9.0)).unwrap();
        assert!(equals(&updated, &vec2(9.0, 5.0), true));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
    }
}
