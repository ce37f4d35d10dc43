//! Function values and argument binding.

use std::sync::Arc;

use crate::ast::{Expr, FunctionDecl, Name, Param};
use crate::error::{ExpressionError, Result};
use crate::scope::ScopeId;
use crate::value::Value;

/// A function together with the scope it was defined in.
pub struct Closure {
    pub decl: Arc<FunctionDecl>,
    pub scope: ScopeId,
}

/// Evaluated call arguments, optionally named.
#[derive(Clone, Default)]
pub struct CallArgs {
    items: Vec<(Option<Name>, Value)>,
}

impl CallArgs {
    pub fn new(items: Vec<(Option<Name>, Value)>) -> Self {
        Self { items }
    }

    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: values.into_iter().map(|v| (None, v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Argument passed as `name = ...`, else the unnamed argument at `index`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .or_else(|| self.items.get(index).filter(|(n, _)| n.is_none()))
            .map(|(_, v)| v)
    }

    /// Like [`CallArgs::get`] with the name taken from a parameter list.
    pub fn param(&self, index: usize, params: &[&str]) -> Option<&Value> {
        match params.get(index) {
            Some(name) => self.get(index, name),
            None => self.items.get(index).map(|(_, v)| v),
        }
    }

    /// Unnamed arguments from `index` on, for a rest parameter.
    pub fn rest(&self, index: usize) -> Vec<Value> {
        self.items
            .iter()
            .skip(index)
            .filter(|(n, _)| n.is_none())
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|(_, v)| v)
    }
}

/// Where the value of one parameter comes from.
pub enum ParamSource<'a> {
    Value(Value),
    /// Evaluated lazily in the new call scope.
    Default(&'a Expr),
}

/// Resolves parameter `index` of `decl` against `args`.
pub fn param_source<'a>(
    decl: &'a FunctionDecl,
    param: &'a Param,
    index: usize,
    args: &CallArgs,
) -> Result<ParamSource<'a>> {
    if param.rest {
        return Ok(ParamSource::Value(Value::from_elements(args.rest(index))));
    }
    if let Some(value) = args.get(index, &param.name) {
        return Ok(ParamSource::Value(value.clone()));
    }
    match &param.default {
        Some(default) => Ok(ParamSource::Default(default)),
        None => Err(ExpressionError::MissingArgument {
            parameter: param.name.to_string(),
            function: decl.display_name().to_string(),
        }),
    }
}
