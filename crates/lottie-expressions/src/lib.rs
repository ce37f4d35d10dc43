//! After Effects style expressions for Lottie properties.
//!
//! Scripts are split into statements, parsed against a fixed set of
//! built-in names and evaluated by a tree-walking interpreter with lexical
//! scopes. Property, layer and composition objects are exposed through
//! [`EvaluationContext`].

pub mod ast;
pub mod builtins;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod property;
pub mod resolver;
pub mod scope;
pub mod script;
pub mod splitter;
mod stack;
pub mod value;
pub mod wiggle;

pub use config::{ConfigError, ExpressionConfig};
pub use context::{
    CompObject, ContentObject, EffectObject, EvaluationContext, LayerObject, TransformObject,
};
pub use document::{Document, ExpressionBinding, KeyframedProperty};
pub use error::{ErrorKind, ExpressionError, Result};
pub use evaluator::ExpressionEvaluator;
pub use property::{
    AnimatedProperty, LoopSpan, LoopType, PropertyRef, PropertyValue, StaticProperty,
};
pub use script::{Diagnostic, RunOptions, Script};
pub use value::Value;
pub use wiggle::{wiggle_property_value, WiggleState};
