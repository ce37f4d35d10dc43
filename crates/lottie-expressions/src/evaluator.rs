use std::sync::Arc;

use tracing::warn;

use crate::config::ExpressionConfig;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::property::PropertyValue;
use crate::script::{compile_cached, RunOptions, Script};
use crate::value::Value;

/// Evaluates expression scripts attached to animated properties.
///
/// Cheap to clone; compiled scripts are shared through the process-wide
/// cache.
#[derive(Clone, Debug, Default)]
pub struct ExpressionEvaluator {
    config: ExpressionConfig,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExpressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpressionConfig {
        &self.config
    }

    /// Compiled form of `script`, memoized by source text.
    pub fn compile(&self, script: &str) -> Arc<Script> {
        compile_cached(script, self.config.cache_capacity)
    }

    /// Runs `script` and returns its raw value. Errors only surface in
    /// strict mode or when the script cannot start at all.
    pub fn evaluate(&self, script: &str, ctx: &EvaluationContext) -> Result<Value> {
        let compiled = self.compile(script);
        let options = RunOptions {
            strict: self.config.strict,
            trace: self.config.trace_statements,
        };
        Ok(compiled.run(ctx, options)?.resolve())
    }

    /// Value of `script` for the property in `ctx`, or `None` when the
    /// property should keep its keyframed value.
    pub fn evaluate_on_property(
        &self,
        script: &str,
        ctx: &EvaluationContext,
    ) -> Option<PropertyValue> {
        if !self.config.enabled || script.trim().is_empty() {
            return None;
        }
        match self.evaluate(script, ctx) {
            Ok(value) => {
                let converted = value.to_property_value();
                if converted.is_none() && !matches!(value, Value::Undefined) {
                    warn!(
                        "Expression result {} ({}) is not a property value: {}",
                        value,
                        value.type_name(),
                        script.trim()
                    );
                }
                converted
            }
            Err(error) => {
                warn!("Expression failed: {} ({})", script.trim(), error);
                None
            }
        }
    }

    /// `base` with the expression applied when there is one.
    pub fn resolve(
        &self,
        base: PropertyValue,
        script: Option<&str>,
        ctx: &EvaluationContext,
    ) -> PropertyValue {
        script
            .and_then(|s| self.evaluate_on_property(s, ctx))
            .unwrap_or(base)
    }
}
