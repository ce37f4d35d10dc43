//! Compiled scripts and the process-wide script cache.
//!
//! A script is split into statements and each statement is parsed on its
//! own. A statement that fails to split, parse or run is logged and skipped;
//! the rest of the script still runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, trace, warn};

use crate::ast::{hoisted_vars, Expr, FunctionDecl, Name};
use crate::context::EvaluationContext;
use crate::error::{ExpressionError, Result};
use crate::interpreter::Interpreter;
use crate::parser::{self, DeclaredNames};
use crate::splitter;
use crate::value::Value;

#[derive(Debug)]
pub struct Statement {
    /// Statement text as produced by the splitter.
    pub text: String,
    pub expr: Expr,
}

/// A statement dropped at compile time.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub statement: String,
    pub error: ExpressionError,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Fail on the first statement error instead of skipping the statement.
    pub strict: bool,
    pub trace: bool,
}

#[derive(Debug)]
pub struct Script {
    source: String,
    statements: Vec<Statement>,
    hoisted: Vec<Name>,
    diagnostics: Vec<Diagnostic>,
}

impl Script {
    /// Compiles leniently: statements that do not parse are recorded as
    /// diagnostics and left out.
    pub fn compile(source: &str) -> Script {
        let mut script = Script {
            source: source.to_string(),
            statements: Vec::new(),
            hoisted: Vec::new(),
            diagnostics: Vec::new(),
        };

        let pieces = match splitter::split(source) {
            Ok(pieces) => pieces,
            Err(error) => {
                warn!("Unsupported or invalid Lottie expression: {} ({})", source.trim(), error);
                script.diagnostics.push(Diagnostic {
                    statement: source.trim().to_string(),
                    error,
                });
                return script;
            }
        };

        let mut names = DeclaredNames::hoisted(&pieces);
        for text in pieces {
            match parser::parse(&text, &mut names) {
                Ok(exprs) => script.statements.extend(exprs.into_iter().map(|expr| Statement {
                    text: text.clone(),
                    expr,
                })),
                Err(error) => {
                    warn!("Unsupported or invalid Lottie expression: {} ({})", text, error);
                    script.diagnostics.push(Diagnostic {
                        statement: text,
                        error,
                    });
                }
            }
        }

        for statement in &script.statements {
            for name in hoisted_vars(std::slice::from_ref(&statement.expr)) {
                if !script.hoisted.contains(&name) {
                    script.hoisted.push(name);
                }
            }
        }

        debug!(
            statements = script.statements.len(),
            dropped = script.diagnostics.len(),
            "compiled expression"
        );
        script
    }

    /// Compiles strictly: any dropped statement is an error.
    pub fn parse(source: &str) -> Result<Script> {
        let script = Self::compile(source);
        script.check()?;
        Ok(script)
    }

    /// First compile error, if any.
    pub fn check(&self) -> Result<()> {
        match self.diagnostics.first() {
            Some(diagnostic) => Err(diagnostic.error.clone()),
            None => Ok(()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn functions(&self) -> impl Iterator<Item = &Arc<FunctionDecl>> {
        self.statements.iter().filter_map(|s| match &s.expr {
            Expr::Function(decl) => Some(decl),
            _ => None,
        })
    }

    /// Runs every statement in order and returns the last value that is not
    /// `undefined`.
    pub fn run(&self, ctx: &EvaluationContext, options: RunOptions) -> Result<Value> {
        if options.strict {
            self.check()?;
        }

        let mut interpreter = Interpreter::new(ctx);
        interpreter.hoist(&self.hoisted, self.functions())?;

        let mut last = Value::Undefined;
        for statement in &self.statements {
            if options.trace {
                trace!(time = ctx.time, statement = %statement.text, "executing statement");
            }
            match interpreter.run_statement(&statement.expr) {
                Ok(Value::Undefined) => {}
                Ok(value) => last = value,
                Err(error) if options.strict => return Err(error),
                Err(error) => {
                    warn!("Unsupported or invalid Lottie expression: {} ({})", statement.text, error);
                }
            }
        }
        Ok(last)
    }
}

fn cache() -> &'static Mutex<HashMap<String, Arc<Script>>> {
    static SCRIPTS: OnceLock<Mutex<HashMap<String, Arc<Script>>>> = OnceLock::new();
    SCRIPTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compiled script for `source`, memoized by source text. The cache is
/// emptied once it holds `capacity` scripts.
pub fn compile_cached(source: &str, capacity: usize) -> Arc<Script> {
    if let Ok(scripts) = cache().lock() {
        if let Some(script) = scripts.get(source) {
            return script.clone();
        }
    }

    let script = Arc::new(Script::compile(source));
    if capacity == 0 {
        return script;
    }
    if let Ok(mut scripts) = cache().lock() {
        if scripts.len() >= capacity {
            debug!(entries = scripts.len(), "expression cache full, clearing");
            scripts.clear();
        }
        scripts.insert(source.to_string(), script.clone());
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(1.0, 30.0)
    }

    #[test]
    fn test_bad_statement_is_skipped() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let script = Script::compile("var a = 2\nvar b = )\na * 5");
        assert_eq!(script.statements().len(), 2);
        assert_eq!(script.diagnostics().len(), 1);
        let value = script.run(&ctx(), RunOptions::default()).unwrap();
        assert_eq!(value.to_number(), Some(10.0));
    }

    #[test]
    fn test_runtime_error_skips_statement() {
        let script = Script::compile("var a = 1\na = missing + 1\na + 1");
        let value = script.run(&ctx(), RunOptions::default()).unwrap();
        assert_eq!(value.to_number(), Some(2.0));

        let strict = RunOptions {
            strict: true,
            ..RunOptions::default()
        };
        let err = script.run(&ctx(), strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_unbalanced_script_is_empty() {
        let script = Script::compile("if (time > 1) {\n 5");
        assert!(script.is_empty());
        assert!(matches!(
            script.run(&ctx(), RunOptions::default()).unwrap(),
            Value::Undefined
        ));
        assert_eq!(
            Script::parse("if (time > 1) {\n 5").unwrap_err().kind(),
            ErrorKind::UnexpectedEndOfInput
        );
    }

    #[test]
    fn test_functions_are_hoisted() {
        let script = Script::compile("double(21)\nfunction double(x) { return x * 2 }");
        assert_eq!(
            script.run(&ctx(), RunOptions::default()).unwrap().to_number(),
            Some(42.0)
        );
    }

    #[test]
    fn test_cache_returns_same_script() {
        let source = "time * 2 + 0.125";
        let a = compile_cached(source, 16);
        let b = compile_cached(source, 16);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
