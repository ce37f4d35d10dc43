//! Lexical environments.
//!
//! Scopes live in an arena and refer to their parent by [`ScopeId`]; a parent
//! never owns its children. A scope is released when its block or call exits,
//! unless a closure pinned it, in which case it stays for the rest of the
//! evaluation together with its ancestors.

use std::collections::HashMap;

use crate::ast::{DeclKind, Name};
use crate::error::{ExpressionError, Result};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Script root or function body: target of `var` hoisting.
    Function,
    Block,
}

#[derive(Clone)]
struct Binding {
    kind: DeclKind,
    value: Value,
}

#[derive(Clone)]
struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    bindings: HashMap<Name, Binding>,
    pinned: bool,
}

#[derive(Default)]
pub struct ScopeArena {
    slots: Vec<Option<Scope>>,
    free: Vec<usize>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let scope = Scope {
            kind,
            parent,
            bindings: HashMap::new(),
            pinned: false,
        };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(scope);
                ScopeId(slot)
            }
            None => {
                self.slots.push(Some(scope));
                ScopeId(self.slots.len() - 1)
            }
        }
    }

    /// New scope with the same parent and a copy of the bindings of `id`.
    pub fn fork(&mut self, id: ScopeId) -> ScopeId {
        let copy = self.scope(id).map(|s| Scope {
            pinned: false,
            ..s.clone()
        });
        match copy {
            Some(scope) => {
                let new = self.push(scope.kind, scope.parent);
                if let Some(slot) = self.slots[new.0].as_mut() {
                    slot.bindings = scope.bindings;
                }
                new
            }
            None => self.push(ScopeKind::Block, None),
        }
    }

    /// Exit of the block or call owning `id`.
    pub fn release(&mut self, id: ScopeId) {
        if self.scope(id).is_some_and(|s| !s.pinned) {
            self.slots[id.0] = None;
            self.free.push(id.0);
        }
    }

    /// Keeps `id` and its ancestors alive for a closure.
    pub fn pin(&mut self, id: ScopeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.slots.get_mut(id.0).and_then(Option::as_mut) {
                Some(scope) if !scope.pinned => {
                    scope.pinned = true;
                    current = scope.parent;
                }
                _ => break,
            }
        }
    }

    pub fn live_scopes(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Nearest enclosing function (or script) scope.
    fn function_scope(&self, id: ScopeId) -> ScopeId {
        let mut current = id;
        while let Some(scope) = self.scope(current) {
            match (scope.kind, scope.parent) {
                (ScopeKind::Block, Some(parent)) => current = parent,
                _ => break,
            }
        }
        current
    }

    /// Declares `name` in `scope`, or in the enclosing function scope for
    /// `var` and `function`.
    ///
    /// `var` without a value keeps an existing binding. Redeclaring a `let`
    /// or `const` in the same scope is a syntax error.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &Name,
        kind: DeclKind,
        value: Option<Value>,
    ) -> Result<()> {
        let target = if kind.is_block_scoped() || kind == DeclKind::Param {
            scope
        } else {
            self.function_scope(scope)
        };
        let Some(target) = self.scope_mut(target) else {
            return Err(ExpressionError::reference(name.to_string()));
        };

        match target.bindings.get_mut(name) {
            Some(existing) if existing.kind.is_block_scoped() || kind.is_block_scoped() => {
                Err(ExpressionError::syntax(format!(
                    "Identifier '{}' has already been declared",
                    name
                )))
            }
            Some(existing) => {
                if let Some(value) = value {
                    existing.value = value;
                }
                Ok(())
            }
            None => {
                target.bindings.insert(
                    name.clone(),
                    Binding {
                        kind,
                        value: value.unwrap_or_default(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Result<Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(scope) = self.scope(id) else { break };
            if let Some(binding) = scope.bindings.get(name) {
                return Ok(binding.value.clone());
            }
            current = scope.parent;
        }
        Err(ExpressionError::reference(name))
    }

    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<()> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(scope) = self.scope_mut(id) else { break };
            if let Some(binding) = scope.bindings.get_mut(name) {
                if binding.kind == DeclKind::Const {
                    return Err(ExpressionError::type_error(format!(
                        "Assignment to constant variable '{}'",
                        name
                    )));
                }
                binding.value = value;
                return Ok(());
            }
            current = scope.parent;
        }
        Err(ExpressionError::reference(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn name(s: &str) -> Name {
        Name::from(s)
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        let block = arena.push(ScopeKind::Block, Some(root));
        arena
            .declare(root, &name("x"), DeclKind::Let, Some(Value::Number(1.0)))
            .unwrap();
        assert_eq!(arena.lookup(block, "x").unwrap().to_number(), Some(1.0));
        assert_eq!(arena.lookup(block, "y").unwrap_err().kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        let block = arena.push(ScopeKind::Block, Some(root));
        arena
            .declare(block, &name("v"), DeclKind::Var, Some(Value::Number(2.0)))
            .unwrap();
        arena.release(block);
        assert_eq!(arena.lookup(root, "v").unwrap().to_number(), Some(2.0));
    }

    #[test]
    fn test_var_redeclaration_keeps_value() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        arena
            .declare(root, &name("v"), DeclKind::Var, Some(Value::Number(2.0)))
            .unwrap();
        arena.declare(root, &name("v"), DeclKind::Var, None).unwrap();
        assert_eq!(arena.lookup(root, "v").unwrap().to_number(), Some(2.0));
    }

    #[test]
    fn test_duplicate_let_is_syntax_error() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        arena.declare(root, &name("x"), DeclKind::Let, None).unwrap();
        let err = arena.declare(root, &name("x"), DeclKind::Const, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);

        // shadowing in a child block is fine
        let block = arena.push(ScopeKind::Block, Some(root));
        assert!(arena.declare(block, &name("x"), DeclKind::Let, None).is_ok());
    }

    #[test]
    fn test_const_assignment_is_type_error() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        arena
            .declare(root, &name("c"), DeclKind::Const, Some(Value::Number(1.0)))
            .unwrap();
        let err = arena.assign(root, "c", Value::Number(2.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(arena.assign(root, "nope", Value::Null).unwrap_err().kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_pinned_scope_survives_release() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        let call = arena.push(ScopeKind::Function, Some(root));
        arena
            .declare(call, &name("count"), DeclKind::Let, Some(Value::Number(0.0)))
            .unwrap();
        arena.pin(call);
        arena.release(call);
        assert_eq!(arena.lookup(call, "count").unwrap().to_number(), Some(0.0));

        let temp = arena.push(ScopeKind::Block, Some(root));
        arena.release(temp);
        assert_eq!(arena.live_scopes(), 2);
    }

    #[test]
    fn test_fork_copies_bindings() {
        let mut arena = ScopeArena::new();
        let root = arena.push(ScopeKind::Function, None);
        let iteration = arena.push(ScopeKind::Block, Some(root));
        arena
            .declare(iteration, &name("i"), DeclKind::Let, Some(Value::Number(0.0)))
            .unwrap();
        let next = arena.fork(iteration);
        arena.assign(next, "i", Value::Number(1.0)).unwrap();
        assert_eq!(arena.lookup(iteration, "i").unwrap().to_number(), Some(0.0));
        assert_eq!(arena.lookup(next, "i").unwrap().to_number(), Some(1.0));
    }
}
