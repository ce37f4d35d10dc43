//! Tree-walking evaluation of parsed statements.

use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{AssignTarget, DeclKind, Expr, FunctionDecl, LogicalOp, Name, UnaryOp};
use crate::builtins::{self, Host};
use crate::context::EvaluationContext;
use crate::error::{ExpressionError, Result};
use crate::function::{param_source, CallArgs, Closure, ParamSource};
use crate::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::stack::ensure_sufficient_stack;
use crate::value::{self, Value};

const MAX_CALL_DEPTH: usize = 1000;

/// Completion of a statement.
#[derive(Debug)]
pub enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

/// One evaluation: the scopes and random state live as long as the sample.
pub struct Interpreter<'a> {
    host: Host<'a>,
    scopes: ScopeArena,
    root: ScopeId,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        let mut scopes = ScopeArena::new();
        let root = scopes.push(ScopeKind::Function, None);
        Self {
            host: Host::new(ctx),
            scopes,
            root,
            depth: 0,
        }
    }

    /// Declares the hoisted `var` names and top-level functions of a script
    /// before its first statement runs.
    pub fn hoist<'d>(
        &mut self,
        vars: &[Name],
        functions: impl IntoIterator<Item = &'d Arc<FunctionDecl>>,
    ) -> Result<()> {
        self.declare_vars(self.root, vars)?;
        for decl in functions {
            self.define_function(self.root, decl)?;
        }
        Ok(())
    }

    /// Runs one top-level statement and returns its value.
    pub fn run_statement(&mut self, expr: &Expr) -> Result<Value> {
        match self.exec(expr, self.root)? {
            Flow::Normal(v) | Flow::Return(v) => Ok(v),
            Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    pub fn live_scopes(&self) -> usize {
        self.scopes.live_scopes()
    }

    fn declare_vars(&mut self, scope: ScopeId, vars: &[Name]) -> Result<()> {
        for name in vars {
            self.scopes.declare(scope, name, DeclKind::Var, None)?;
        }
        Ok(())
    }

    fn define_function(&mut self, scope: ScopeId, decl: &Arc<FunctionDecl>) -> Result<()> {
        let closure = self.make_closure(decl, scope);
        match &decl.name {
            Some(name) => self.scopes.declare(scope, name, DeclKind::Function, Some(closure)),
            None => Ok(()),
        }
    }

    fn make_closure(&mut self, decl: &Arc<FunctionDecl>, scope: ScopeId) -> Value {
        self.scopes.pin(scope);
        Value::Function(Rc::new(Closure {
            decl: decl.clone(),
            scope,
        }))
    }

    fn exec(&mut self, expr: &Expr, scope: ScopeId) -> Result<Flow> {
        match expr {
            Expr::Declare { kind, items } => {
                for (name, init) in items {
                    let value = match init {
                        Some(init) => Some(self.eval(init, scope)?),
                        None if *kind == DeclKind::Var => None,
                        None => Some(Value::Undefined),
                    };
                    self.scopes.declare(scope, name, *kind, value)?;
                }
                Ok(Flow::Normal(Value::Undefined))
            }
            Expr::Function(decl) => {
                self.define_function(scope, decl)?;
                Ok(Flow::Normal(Value::Undefined))
            }
            Expr::Block(items) => {
                let block = self.scopes.push(ScopeKind::Block, Some(scope));
                let result = self.exec_list(items, block);
                self.scopes.release(block);
                result
            }
            Expr::If {
                test,
                then,
                otherwise,
            } => {
                if self.truthy(test, scope)? {
                    self.exec(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, scope)
                } else {
                    Ok(Flow::Normal(Value::Undefined))
                }
            }
            Expr::While { test, body } => {
                let mut last = Value::Undefined;
                while self.truthy(test, scope)? {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal(v) => keep(&mut last, v),
                        Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal(last))
            }
            Expr::DoWhile { body, test } => {
                let mut last = Value::Undefined;
                loop {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal(v) => keep(&mut last, v),
                        Flow::Continue => {}
                    }
                    if !self.truthy(test, scope)? {
                        break;
                    }
                }
                Ok(Flow::Normal(last))
            }
            Expr::For {
                init,
                test,
                update,
                body,
            } => {
                let header = self.scopes.push(ScopeKind::Block, Some(scope));
                let mut env = header;
                let result = self.exec_for(
                    &mut env,
                    header,
                    init.as_deref(),
                    test.as_deref(),
                    update.as_deref(),
                    body,
                );
                if env != header {
                    self.scopes.release(env);
                }
                self.scopes.release(header);
                result
            }
            Expr::Break => Ok(Flow::Break),
            Expr::Continue => Ok(Flow::Continue),
            Expr::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Expr::Empty => Ok(Flow::Normal(Value::Undefined)),
            _ => Ok(Flow::Normal(self.eval(expr, scope)?)),
        }
    }

    fn exec_list(&mut self, items: &[Expr], scope: ScopeId) -> Result<Flow> {
        for item in items {
            if let Expr::Function(decl) = item {
                self.define_function(scope, decl)?;
            }
        }
        let mut last = Value::Undefined;
        for item in items {
            match self.exec(item, scope)? {
                Flow::Normal(v) => keep(&mut last, v),
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    /// `let` and `const` loop variables get a fresh copy per iteration so
    /// closures capture the value of their own iteration. `env` always holds
    /// the live iteration scope for the caller to release.
    fn exec_for(
        &mut self,
        env: &mut ScopeId,
        header: ScopeId,
        init: Option<&Expr>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Expr,
    ) -> Result<Flow> {
        let per_iteration = matches!(
            init,
            Some(Expr::Declare { kind, .. }) if kind.is_block_scoped()
        );
        if let Some(init) = init {
            self.exec(init, header)?;
        }
        if per_iteration {
            *env = self.scopes.fork(header);
        }

        let mut last = Value::Undefined;
        loop {
            if let Some(test) = test {
                if !self.truthy(test, *env)? {
                    break;
                }
            }
            match self.exec(body, *env)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal(v) => keep(&mut last, v),
                Flow::Continue => {}
            }
            if per_iteration {
                let next = self.scopes.fork(*env);
                self.scopes.release(*env);
                *env = next;
            }
            if let Some(update) = update {
                self.eval(update, *env)?;
            }
        }
        Ok(Flow::Normal(last))
    }

    fn truthy(&mut self, expr: &Expr, scope: ScopeId) -> Result<bool> {
        Ok(self.eval(expr, scope)?.resolve().is_truthy())
    }

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from_literal(literal)),
            Expr::Array(items) => {
                let elements = items
                    .iter()
                    .map(|item| Ok(self.eval(item, scope)?.resolve()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::from_elements(elements))
            }
            Expr::Ident(name) => self.scopes.lookup(scope, name),
            Expr::Builtin { builtin, args } => {
                let args = self.eval_args(args, scope)?;
                builtins::call_builtin(&mut self.host, *builtin, &args)
            }
            Expr::Member { object, name } => {
                let object = self.eval(object, scope)?;
                self.member(object, name, None)
            }
            Expr::MethodCall { object, name, args } => {
                let object = self.eval(object, scope)?;
                let args = self.eval_args(args, scope)?;
                self.member(object, name, Some(&args))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?.resolve();
                object.resolve().index(&index)
            }
            Expr::Call { callee, args } => self.call(callee, args, scope),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, scope)?.resolve();
                match op {
                    UnaryOp::Neg => value::negate(&v),
                    UnaryOp::Plus => Ok(Value::Number(v.to_number().unwrap_or(f64::NAN))),
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, scope)?.resolve();
                let r = self.eval(rhs, scope)?.resolve();
                value::binary(*op, &l, &r)
            }
            Expr::Logical { op, lhs, rhs } => {
                let l = self.eval(lhs, scope)?.resolve();
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => Ok(self.eval(rhs, scope)?.resolve()),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.truthy(test, scope)? {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { target, op, value } => {
                let rhs = self.eval(value, scope)?;
                let new = match op {
                    None => rhs,
                    Some(op) => {
                        let current = self.read_target(target, scope)?.resolve();
                        value::binary(*op, &current, &rhs.resolve())?
                    }
                };
                self.write_target(target, new.clone(), scope)?;
                Ok(new)
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let old = self
                    .read_target(target, scope)?
                    .resolve()
                    .to_number()
                    .unwrap_or(f64::NAN);
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_target(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Lambda(decl) => Ok(self.make_closure(decl, scope)),
            Expr::Declare { .. }
            | Expr::Function(_)
            | Expr::Block(_)
            | Expr::If { .. }
            | Expr::While { .. }
            | Expr::DoWhile { .. }
            | Expr::For { .. }
            | Expr::Break
            | Expr::Continue
            | Expr::Return(_)
            | Expr::Empty => match self.exec(expr, scope)? {
                Flow::Normal(v) => Ok(v),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn eval_args(&mut self, args: &[crate::ast::Arg], scope: ScopeId) -> Result<CallArgs> {
        let items = args
            .iter()
            .map(|arg| Ok((arg.name.clone(), self.eval(&arg.value, scope)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CallArgs::new(items))
    }

    fn read_target(&mut self, target: &AssignTarget, scope: ScopeId) -> Result<Value> {
        match target {
            AssignTarget::Variable(name) => self.scopes.lookup(scope, name),
            AssignTarget::Index { name, index } => {
                let base = self.scopes.lookup(scope, name)?;
                let index = self.eval(index, scope)?.resolve();
                base.resolve().index(&index)
            }
        }
    }

    fn write_target(&mut self, target: &AssignTarget, value: Value, scope: ScopeId) -> Result<()> {
        match target {
            AssignTarget::Variable(name) => self.scopes.assign(scope, name, value),
            AssignTarget::Index { name, index } => {
                let base = self.scopes.lookup(scope, name)?;
                let index = self.eval(index, scope)?.resolve();
                let updated = base.resolve().with_index(&index, value.resolve())?;
                self.scopes.assign(scope, name, updated)
            }
        }
    }

    fn member(&mut self, object: Value, name: &str, call: Option<&CallArgs>) -> Result<Value> {
        match object {
            Value::Object(object) => builtins::domain::member(&mut self.host, &object, name, call),
            Value::Undefined | Value::Null => Err(ExpressionError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                object, name
            ))),
            Value::Str(s) if name == "length" && call.is_none() => {
                Ok(Value::Number(s.chars().count() as f64))
            }
            Value::Array(items) if name == "length" && call.is_none() => {
                Ok(Value::Number(items.len() as f64))
            }
            Value::Vector(_) if name == "length" && call.is_none() => Ok(Value::Number(2.0)),
            other => match call {
                Some(_) => Err(ExpressionError::type_error(format!(
                    "{}.{} is not a function",
                    other.type_name(),
                    name
                ))),
                None => Ok(Value::Undefined),
            },
        }
    }

    fn call(&mut self, callee: &Expr, args: &[crate::ast::Arg], scope: ScopeId) -> Result<Value> {
        let target = self.eval(callee, scope)?;
        let args = self.eval_args(args, scope)?;
        match target {
            Value::Function(closure) => self.invoke(&closure, &args),
            Value::Object(object) => builtins::domain::invoke(&mut self.host, &object, &args),
            other => {
                let name = match callee {
                    Expr::Ident(name) => name.to_string(),
                    _ => other.type_name().to_string(),
                };
                Err(ExpressionError::type_error(format!("{} is not a function", name)))
            }
        }
    }

    fn invoke(&mut self, closure: &Closure, args: &CallArgs) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ExpressionError::type_error("Maximum call stack size exceeded"));
        }
        let decl = closure.decl.clone();
        let frame = self.scopes.push(ScopeKind::Function, Some(closure.scope));
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.invoke_in(frame, &decl, args));
        self.depth -= 1;
        self.scopes.release(frame);
        result
    }

    fn invoke_in(&mut self, frame: ScopeId, decl: &FunctionDecl, args: &CallArgs) -> Result<Value> {
        for (index, param) in decl.params.iter().enumerate() {
            let value = match param_source(decl, param, index, args)? {
                ParamSource::Value(value) => value,
                ParamSource::Default(default) => self.eval(default, frame)?,
            };
            self.scopes
                .declare(frame, &param.name, DeclKind::Param, Some(value))?;
        }
        self.declare_vars(frame, &decl.hoisted)?;
        match self.exec_list(&decl.body, frame)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }
}

fn keep(last: &mut Value, value: Value) {
    if !matches!(value, Value::Undefined) {
        *last = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ast::hoisted_vars;
    use crate::parser::{parse, DeclaredNames};

    fn functions(statements: &[Expr]) -> impl Iterator<Item = &Arc<FunctionDecl>> {
        statements.iter().filter_map(|s| match s {
            Expr::Function(decl) => Some(decl),
            _ => None,
        })
    }

    fn run(source: &str) -> Result<Value> {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let mut names = DeclaredNames::new();
        let statements = parse(source, &mut names)?;
        let mut interpreter = Interpreter::new(&ctx);
        interpreter.hoist(&hoisted_vars(&statements), functions(&statements))?;
        let mut last = Value::Undefined;
        for statement in &statements {
            keep(&mut last, interpreter.run_statement(statement)?);
        }
        Ok(last)
    }

    #[test]
    fn test_arithmetic_and_variables() {
        assert_eq!(run("var a = 2; var b = a * 3; b + 1").unwrap().to_number(), Some(7.0));
        assert_eq!(run("let s = 'ab'; s.length").unwrap().to_number(), Some(2.0));
    }

    #[test]
    fn test_logical_returns_operand() {
        assert_eq!(run("null || 5").unwrap().to_number(), Some(5.0));
        assert_eq!(run("0 && 5").unwrap().to_number(), Some(0.0));
    }

    #[test]
    fn test_recursion_depth_is_bounded() {
        let err = run("function f(n) { return f(n + 1) } f(0)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("call stack"));
    }

    #[test]
    fn test_deep_recursion_below_the_limit() {
        let sum = "function r(n) { if (n <= 0) { return 0 } return n + r(n - 1) }";
        let value = run(&format!("{} r(100)", sum)).unwrap();
        assert_eq!(value.to_number(), Some(5050.0));
        let value = run(&format!("{} r(900)", sum)).unwrap();
        assert_eq!(value.to_number(), Some(405450.0));
        assert!(run(&format!("{} r(1200)", sum)).is_err());
    }

    #[test]
    fn test_for_let_closures_capture_iteration() {
        let source = "var fs = []; for (let i = 0; i < 3; i++) { fs = [fs, function() { return i }] } fs[1]()";
        assert_eq!(run(source).unwrap().to_number(), Some(2.0));
    }

    #[test]
    fn test_scopes_are_released() {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let mut names = DeclaredNames::new();
        let statements = parse("var x = 0; while (x < 5) { let y = x; x = y + 1 }", &mut names).unwrap();
        let mut interpreter = Interpreter::new(&ctx);
        interpreter
            .hoist(&hoisted_vars(&statements), functions(&statements))
            .unwrap();
        for statement in &statements {
            interpreter.run_statement(statement).unwrap();
        }
        assert_eq!(interpreter.live_scopes(), 1);
    }

    #[test]
    fn test_member_of_undefined() {
        let err = run("var o; o.x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("reading 'x'"));
    }
}
