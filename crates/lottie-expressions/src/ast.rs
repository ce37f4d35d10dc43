//! Expression tree.
//!
//! Statements and expressions share one node type: every node evaluates to a
//! value, control-flow nodes additionally produce a non-local exit. Nodes are
//! immutable and `Send + Sync` so a parsed script can be shared across threads.

use std::sync::Arc;

use crate::error::{ExpressionError, Result};
use crate::resolver::Builtin;

pub type Name = Arc<str>;

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    Param,
}

impl DeclKind {
    /// `let` and `const` live in the enclosing block, the rest in the function.
    pub fn is_block_scoped(self) -> bool {
        matches!(self, DeclKind::Let | DeclKind::Const)
    }
}

/// Call argument, optionally named: `loopOut(type = "pingpong")`.
#[derive(Clone, Debug)]
pub struct Arg {
    pub name: Option<Name>,
    pub value: Expr,
}

#[derive(Clone, Debug)]
pub enum AssignTarget {
    Variable(Name),
    Index { name: Name, index: Box<Expr> },
}

impl AssignTarget {
    pub fn name(&self) -> &Name {
        match self {
            AssignTarget::Variable(name) | AssignTarget::Index { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Name,
    pub rest: bool,
    pub default: Option<Expr>,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Option<Name>,
    pub params: Vec<Param>,
    pub body: Vec<Expr>,
    /// `var` names declared anywhere in the body, hoisted on entry.
    pub hoisted: Vec<Name>,
}

impl FunctionDecl {
    /// Rejects more than one rest parameter or a rest parameter that is not last.
    pub fn new(name: Option<Name>, params: Vec<Param>, body: Vec<Expr>) -> Result<Self> {
        let rest = params.iter().filter(|p| p.rest).count();
        if rest > 1 || (rest == 1 && !params.last().is_some_and(|p| p.rest)) {
            return Err(ExpressionError::syntax(
                "Rest parameter must be last formal parameter",
            ));
        }
        let hoisted = hoisted_vars(&body);
        Ok(Self {
            name,
            params,
            body,
            hoisted,
        })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal),
    /// `[a, b]`; two numbers form a vector at runtime.
    Array(Vec<Expr>),
    Ident(Name),
    /// Name bound by the resolver to a built-in of one of the context levels.
    Builtin {
        builtin: Builtin,
        args: Vec<Arg>,
    },
    Member {
        object: Box<Expr>,
        name: Name,
    },
    MethodCall {
        object: Box<Expr>,
        name: Name,
        args: Vec<Arg>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: AssignTarget,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    Update {
        target: AssignTarget,
        increment: bool,
        prefix: bool,
    },
    Lambda(Arc<FunctionDecl>),

    // statements
    Declare {
        kind: DeclKind,
        items: Vec<(Name, Option<Expr>)>,
    },
    Function(Arc<FunctionDecl>),
    Block(Vec<Expr>),
    If {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    While {
        test: Box<Expr>,
        body: Box<Expr>,
    },
    DoWhile {
        body: Box<Expr>,
        test: Box<Expr>,
    },
    For {
        init: Option<Box<Expr>>,
        test: Option<Box<Expr>>,
        update: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    Break,
    Continue,
    Return(Option<Box<Expr>>),
    Empty,
}

/// Collects `var` names of a body without descending into nested functions.
pub fn hoisted_vars(body: &[Expr]) -> Vec<Name> {
    let mut names = Vec::new();
    for expr in body {
        collect_vars(expr, &mut names);
    }
    names
}

fn collect_vars(expr: &Expr, names: &mut Vec<Name>) {
    match expr {
        Expr::Declare {
            kind: DeclKind::Var,
            items,
        } => {
            for (name, _) in items {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        Expr::Block(items) => items.iter().for_each(|e| collect_vars(e, names)),
        Expr::If {
            then, otherwise, ..
        } => {
            collect_vars(then, names);
            if let Some(otherwise) = otherwise {
                collect_vars(otherwise, names);
            }
        }
        Expr::While { body, .. } | Expr::DoWhile { body, .. } => collect_vars(body, names),
        Expr::For { init, body, .. } => {
            if let Some(init) = init {
                collect_vars(init, names);
            }
            collect_vars(body, names);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, rest: bool) -> Param {
        Param {
            name: name.into(),
            rest,
            default: None,
        }
    }

    #[test]
    fn test_rest_parameter_must_be_last() {
        let err = FunctionDecl::new(
            Some("f".into()),
            vec![param("a", true), param("b", false)],
            Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Rest parameter must be last"));

        assert!(FunctionDecl::new(None, vec![param("a", true), param("b", true)], Vec::new())
            .is_err());
        assert!(FunctionDecl::new(None, vec![param("a", false), param("b", true)], Vec::new())
            .is_ok());
    }

    #[test]
    fn test_hoisting_skips_nested_functions() {
        let inner = FunctionDecl::new(
            Some("inner".into()),
            Vec::new(),
            vec![Expr::Declare {
                kind: DeclKind::Var,
                items: vec![("hidden".into(), None)],
            }],
        )
        .unwrap();
        let body = vec![
            Expr::While {
                test: Box::new(Expr::Literal(Literal::Bool(false))),
                body: Box::new(Expr::Block(vec![Expr::Declare {
                    kind: DeclKind::Var,
                    items: vec![("x".into(), None)],
                }])),
            },
            Expr::Declare {
                kind: DeclKind::Let,
                items: vec![("y".into(), None)],
            },
            Expr::Function(Arc::new(inner)),
        ];
        let names = hoisted_vars(&body);
        assert_eq!(names, vec![Name::from("x")]);
    }
}
