//! Recursive-descent parser for one statement.
//!
//! Identifiers are bound while parsing: a name declared in the script (hoisted
//! `var`s and functions count from the first line) or a parameter of an
//! enclosing function stays a variable, anything else is
//! offered to [`resolver::resolve`] first and only becomes a variable when no
//! context level claims it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{
    hoisted_vars, Arg, AssignTarget, BinaryOp, DeclKind, Expr, FunctionDecl, Literal, LogicalOp,
    Name, Param, UnaryOp,
};
use crate::error::{ExpressionError, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::resolver;

const KEYWORDS: &[&str] = &[
    "var", "let", "const", "function", "if", "else", "while", "do", "for", "break", "continue",
    "return", "true", "false", "null", "undefined",
];

const EQUALITY: &[(&str, BinaryOp)] = &[
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::NotEq),
    ("===", BinaryOp::StrictEq),
    ("!==", BinaryOp::StrictNotEq),
];

const RELATIONAL: &[(&str, BinaryOp)] = &[
    ("<", BinaryOp::Lt),
    ("<=", BinaryOp::LtEq),
    (">", BinaryOp::Gt),
    (">=", BinaryOp::GtEq),
];

const ADDITIVE: &[(&str, BinaryOp)] = &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)];

const MULTIPLICATIVE: &[(&str, BinaryOp)] = &[
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Rem),
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

struct Frame {
    function: bool,
    names: HashMap<Name, DeclKind>,
}

/// Names declared so far, shared by all statements of one script.
pub struct DeclaredNames {
    frames: Vec<Frame>,
}

impl Default for DeclaredNames {
    fn default() -> Self {
        Self {
            frames: vec![Frame {
                function: true,
                names: HashMap::new(),
            }],
        }
    }
}

impl DeclaredNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level `var` and function names of a split script, declared up
    /// front so a name used before its declaration still shadows a built-in.
    pub fn hoisted(statements: &[String]) -> Self {
        let mut scratch = Self::new();
        let mut names = Self::new();
        for text in statements {
            let Ok(exprs) = parse(text, &mut scratch) else {
                continue;
            };
            let root = &mut names.frames[0].names;
            for name in hoisted_vars(&exprs) {
                root.entry(name).or_insert(DeclKind::Var);
            }
            for expr in &exprs {
                if let Expr::Function(decl) = expr {
                    if let Some(name) = &decl.name {
                        root.insert(name.clone(), DeclKind::Function);
                    }
                }
            }
        }
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.names.contains_key(name))
    }

    fn push(&mut self, function: bool) {
        self.frames.push(Frame {
            function,
            names: HashMap::new(),
        });
    }

    fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn declare(&mut self, name: &Name, kind: DeclKind) -> Result<()> {
        let index = if kind.is_block_scoped() || kind == DeclKind::Param {
            self.frames.len() - 1
        } else {
            self.frames.iter().rposition(|f| f.function).unwrap_or(0)
        };
        let Some(frame) = self.frames.get_mut(index) else {
            return Ok(());
        };
        if let Some(existing) = frame.names.get(name) {
            if existing.is_block_scoped() || kind.is_block_scoped() {
                return Err(ExpressionError::syntax(format!(
                    "Identifier '{}' has already been declared",
                    name
                )));
            }
        }
        frame.names.insert(name.clone(), kind);
        Ok(())
    }
}

/// Parses one statement produced by the splitter. A `for` header or an
/// `if`/`else` chain still parses to a single node; stray `;` separated
/// statements yield one node each.
pub fn parse(source: &str, names: &mut DeclaredNames) -> Result<Vec<Expr>> {
    let tokens = tokenize(source)?;
    let depth = names.frames.len();
    let mut parser = Parser {
        tokens,
        pos: 0,
        names,
        loop_depth: 0,
        function_depth: 0,
    };
    let result = parser.program();
    parser.names.frames.truncate(depth);
    result
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    names: &'a mut DeclaredNames,
    loop_depth: usize,
    function_depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check_punct(&self, p: &str) -> bool {
        self.peek().is_punct(p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(self.peek()))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.peek().is_ident(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(self.peek()))
        }
    }

    fn expect_ident(&mut self) -> Result<Name> {
        match &self.peek().kind {
            TokenKind::Ident(word) if !is_keyword(word) => {
                let name = Name::from(word.as_str());
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(self.peek())),
        }
    }

    fn unexpected(&self, token: &Token) -> ExpressionError {
        let message = match token.kind {
            TokenKind::Eof => "Unexpected end of input",
            _ => "Unexpected token",
        };
        self.error_at(token, message)
    }

    fn error_at(&self, token: &Token, message: &str) -> ExpressionError {
        ExpressionError::Syntax {
            message: message.to_string(),
            token: token.text(),
            position: token.position,
        }
    }

    fn program(&mut self) -> Result<Vec<Expr>> {
        let mut statements = Vec::new();
        while !self.at_end() {
            if self.eat_punct(";") {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    // statements

    fn statement(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let expr = match &token.kind {
            TokenKind::Punct(";") => {
                self.advance();
                return Ok(Expr::Empty);
            }
            // compound statements end with their body, which already ended itself
            TokenKind::Punct("{") => return self.block(),
            TokenKind::Ident(word) => match word.as_str() {
                "var" => self.declaration(DeclKind::Var)?,
                "let" => self.declaration(DeclKind::Let)?,
                "const" => self.declaration(DeclKind::Const)?,
                "function" if matches!(self.peek_at(1).kind, TokenKind::Ident(_)) => {
                    return self.function_declaration();
                }
                "if" => return self.if_statement(),
                "while" => return self.while_statement(),
                "do" => self.do_while_statement()?,
                "for" => return self.for_statement(),
                "break" | "continue" => {
                    self.advance();
                    if self.loop_depth == 0 {
                        let message = format!("Illegal {} statement", word);
                        return Err(self.error_at(&token, &message));
                    }
                    if word == "break" {
                        Expr::Break
                    } else {
                        Expr::Continue
                    }
                }
                "return" => self.return_statement()?,
                _ => self.expression()?,
            },
            _ => self.expression()?,
        };
        self.end_statement()?;
        Ok(expr)
    }

    fn end_statement(&mut self) -> Result<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        let closed_block = self.pos > 0 && self.tokens[self.pos - 1].is_punct("}");
        let next = self.peek();
        if closed_block
            || next.kind == TokenKind::Eof
            || next.is_punct("}")
            || next.is_ident("else")
            || next.is_ident("while")
        {
            Ok(())
        } else {
            Err(self.unexpected(next))
        }
    }

    fn block(&mut self) -> Result<Expr> {
        self.expect_punct("{")?;
        self.names.push(false);
        let body = self.statements_until_brace()?;
        self.names.pop();
        Ok(Expr::Block(body))
    }

    fn statements_until_brace(&mut self) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(items);
            }
            if self.at_end() {
                return Err(self.unexpected(self.peek()));
            }
            if self.eat_punct(";") {
                continue;
            }
            items.push(self.statement()?);
        }
    }

    fn declaration(&mut self, kind: DeclKind) -> Result<Expr> {
        let keyword = self.advance();
        let mut items = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(self.error_at(&keyword, "Missing initializer in const declaration"));
            }
            self.names.declare(&name, kind)?;
            items.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Expr::Declare { kind, items })
    }

    fn function_declaration(&mut self) -> Result<Expr> {
        self.advance();
        let name = self.expect_ident()?;
        self.names.declare(&name, DeclKind::Function)?;
        let decl = self.function_rest(Some(name))?;
        Ok(Expr::Function(Arc::new(decl)))
    }

    /// Parameter list and body, after the optional function name.
    fn function_rest(&mut self, name: Option<Name>) -> Result<FunctionDecl> {
        let start = self.peek().clone();
        self.expect_punct("(")?;
        self.names.push(true);

        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                let rest = self.eat_punct("...");
                let param = self.expect_ident()?;
                let default = if !rest && self.eat_punct("=") {
                    Some(self.assignment()?)
                } else {
                    None
                };
                self.names.declare(&param, DeclKind::Param)?;
                params.push(Param {
                    name: param,
                    rest,
                    default,
                });
                if !self.eat_punct(",") {
                    self.expect_punct(")")?;
                    break;
                }
            }
        }

        self.expect_punct("{")?;
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.statements_until_brace();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        self.names.pop();

        FunctionDecl::new(name, params, body?).map_err(|err| match err {
            ExpressionError::Syntax { message, .. } => ExpressionError::Syntax {
                message,
                token: start.text(),
                position: start.position,
            },
            other => other,
        })
    }

    fn if_statement(&mut self) -> Result<Expr> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let then = self.statement()?;
        let otherwise = if self.peek().is_ident("else") {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Expr::If {
            test: Box::new(test),
            then: Box::new(then),
            otherwise,
        })
    }

    fn loop_body(&mut self) -> Result<Expr> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn while_statement(&mut self) -> Result<Expr> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let body = self.loop_body()?;
        Ok(Expr::While {
            test: Box::new(test),
            body: Box::new(body),
        })
    }

    fn do_while_statement(&mut self) -> Result<Expr> {
        self.advance();
        let body = self.loop_body()?;
        self.expect_keyword("while")?;
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        Ok(Expr::DoWhile {
            body: Box::new(body),
            test: Box::new(test),
        })
    }

    fn for_statement(&mut self) -> Result<Expr> {
        self.advance();
        self.expect_punct("(")?;
        self.names.push(false);

        let init = if self.eat_punct(";") {
            None
        } else {
            let kind = match &self.peek().kind {
                TokenKind::Ident(word) => match word.as_str() {
                    "var" => Some(DeclKind::Var),
                    "let" => Some(DeclKind::Let),
                    "const" => Some(DeclKind::Const),
                    _ => None,
                },
                _ => None,
            };
            let init = match kind {
                Some(kind) => self.declaration(kind)?,
                None => self.expression()?,
            };
            self.expect_punct(";")?;
            Some(Box::new(init))
        };
        let test = if self.check_punct(";") {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect_punct(";")?;
        let update = if self.check_punct(")") {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect_punct(")")?;

        let body = self.loop_body()?;
        self.names.pop();
        Ok(Expr::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn return_statement(&mut self) -> Result<Expr> {
        let token = self.advance();
        if self.function_depth == 0 {
            return Err(self.error_at(&token, "Illegal return statement"));
        }
        let next = self.peek();
        if next.is_punct(";") || next.is_punct("}") || next.kind == TokenKind::Eof {
            return Ok(Expr::Return(None));
        }
        Ok(Expr::Return(Some(Box::new(self.expression()?))))
    }

    // expressions

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let start = self.peek().clone();
        let lhs = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            _ => return Ok(lhs),
        };
        self.advance();
        let target = self.assign_target(lhs, &start)?;
        let value = self.assignment()?;
        Ok(Expr::Assign {
            target,
            op,
            value: Box::new(value),
        })
    }

    fn assign_target(&self, expr: Expr, token: &Token) -> Result<AssignTarget> {
        match expr {
            Expr::Ident(name) => Ok(AssignTarget::Variable(name)),
            Expr::Index { object, index } => match *object {
                Expr::Ident(name) => Ok(AssignTarget::Index { name, index }),
                _ => Err(self.error_at(token, "Invalid left-hand side in assignment")),
            },
            _ => Err(self.error_at(token, "Invalid left-hand side in assignment")),
        }
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.logical(LogicalOp::Or)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical(&mut self, op: LogicalOp) -> Result<Expr> {
        let (symbol, next): (&str, fn(&mut Self) -> Result<Expr>) = match op {
            LogicalOp::Or => ("||", |p| p.logical(LogicalOp::And)),
            LogicalOp::And => ("&&", Self::equality),
        };
        let mut lhs = next(self)?;
        while self.eat_punct(symbol) {
            let rhs = next(self)?;
            lhs = Expr::Logical {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(symbol, _)| self.check_punct(symbol))
                .map(|(_, op)| *op)
            else {
                return Ok(lhs);
            };
            self.advance();
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(EQUALITY, Self::relational)
    }

    fn relational(&mut self) -> Result<Expr> {
        self.binary_level(RELATIONAL, Self::additive)
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary_level(ADDITIVE, Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary_level(MULTIPLICATIVE, Self::unary)
    }

    fn unary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Punct("!") => UnaryOp::Not,
            TokenKind::Punct("-") => UnaryOp::Neg,
            TokenKind::Punct("+") => UnaryOp::Plus,
            TokenKind::Punct("++") | TokenKind::Punct("--") => {
                self.advance();
                let operand = self.unary()?;
                return Ok(Expr::Update {
                    target: self.assign_target(operand, &token)?,
                    increment: token.is_punct("++"),
                    prefix: true,
                });
            }
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Literal::Number(n))) => Expr::Literal(Literal::Number(-n)),
            (op, operand) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let start = self.peek().clone();
        let expr = self.call_member()?;
        let increment = match self.peek().kind {
            TokenKind::Punct("++") => true,
            TokenKind::Punct("--") => false,
            _ => return Ok(expr),
        };
        self.advance();
        Ok(Expr::Update {
            target: self.assign_target(expr, &start)?,
            increment,
            prefix: false,
        })
    }

    fn call_member(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = match &self.peek().kind {
                    TokenKind::Ident(word) => Name::from(word.as_str()),
                    _ => return Err(self.unexpected(self.peek())),
                };
                self.advance();
                expr = if self.check_punct("(") {
                    Expr::MethodCall {
                        object: Box::new(expr),
                        name,
                        args: self.arguments()?,
                    }
                } else {
                    Expr::Member {
                        object: Box::new(expr),
                        name,
                    }
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.check_punct("(") {
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: self.arguments()?,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Arg>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            let name = match (&self.peek().kind, &self.peek_at(1).kind) {
                (TokenKind::Ident(word), TokenKind::Punct("=")) if !is_keyword(word) => {
                    let name = Name::from(word.as_str());
                    self.advance();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let value = self.assignment()?;
            args.push(Arg { name, value });
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                return Ok(args);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            TokenKind::Str(ref s) => Ok(Expr::Literal(Literal::Str(Arc::from(s.as_str())))),
            TokenKind::Punct("(") => {
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                let mut elements = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        elements.push(self.assignment()?);
                        if !self.eat_punct(",") {
                            self.expect_punct("]")?;
                            break;
                        }
                    }
                }
                Ok(Expr::Array(elements))
            }
            TokenKind::Ident(ref word) => match word.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                "undefined" => Ok(Expr::Literal(Literal::Undefined)),
                "NaN" => Ok(Expr::Literal(Literal::Number(f64::NAN))),
                "Infinity" => Ok(Expr::Literal(Literal::Number(f64::INFINITY))),
                "function" => {
                    let name = match &self.peek().kind {
                        TokenKind::Ident(word) if !is_keyword(word) => {
                            let name = Name::from(word.as_str());
                            self.advance();
                            Some(name)
                        }
                        _ => None,
                    };
                    Ok(Expr::Lambda(Arc::new(self.function_rest(name)?)))
                }
                word if is_keyword(word) => Err(self.unexpected(&token)),
                word => self.identifier(Name::from(word)),
            },
            _ => Err(self.unexpected(&token)),
        }
    }

    fn identifier(&mut self, name: Name) -> Result<Expr> {
        let declared = self.names.contains(&name);
        if self.check_punct("(") {
            let args = self.arguments()?;
            if !declared {
                if let Some(builtin) = resolver::resolve(&name, Some(args.len()))? {
                    return Ok(Expr::Builtin { builtin, args });
                }
                // `thisComp("Layer")` calls the object an accessor returns
                if let Some(builtin) = resolver::resolve(&name, None)? {
                    return Ok(Expr::Call {
                        callee: Box::new(Expr::Builtin {
                            builtin,
                            args: Vec::new(),
                        }),
                        args,
                    });
                }
            }
            return Ok(Expr::Call {
                callee: Box::new(Expr::Ident(name)),
                args,
            });
        }
        if !declared {
            if let Some(builtin) = resolver::resolve(&name, None)? {
                return Ok(Expr::Builtin {
                    builtin,
                    args: Vec::new(),
                });
            }
        }
        Ok(Expr::Ident(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resolver::{Builtin, GlobalOp, PropertyMember};

    fn parse_one(source: &str) -> Result<Expr> {
        let mut names = DeclaredNames::new();
        let mut statements = parse(source, &mut names)?;
        assert_eq!(statements.len(), 1, "{:?}", statements);
        Ok(statements.remove(0))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_one("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected tree {:?}", other),
        }

        let expr = parse_one("a || b && c").unwrap();
        match expr {
            Expr::Logical {
                op: LogicalOp::Or,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::Logical { op: LogicalOp::And, .. })),
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_builtins_and_declared_names() {
        assert!(matches!(
            parse_one("value").unwrap(),
            Expr::Builtin {
                builtin: Builtin::Property(PropertyMember::Value),
                ..
            }
        ));

        let mut names = DeclaredNames::new();
        parse("var value = 1", &mut names).unwrap();
        let statements = parse("value", &mut names).unwrap();
        assert!(matches!(&statements[0], Expr::Ident(n) if &**n == "value"));
    }

    #[test]
    fn test_hoisted_names_shadow_builtins_before_declaration() {
        let pieces = vec![
            "ease(1, 2, 3)".to_string(),
            "function ease(a, b, c) { return a }".to_string(),
            "var time = 2".to_string(),
        ];
        let mut names = DeclaredNames::hoisted(&pieces);
        assert!(names.contains("ease") && names.contains("time"));
        let statements = parse(&pieces[0], &mut names).unwrap();
        assert!(matches!(
            &statements[0],
            Expr::Call { callee, .. } if matches!(**callee, Expr::Ident(_))
        ));
        for piece in &pieces[1..] {
            assert!(parse(piece, &mut names).is_ok());
        }
        assert!(matches!(
            parse("time", &mut names).unwrap()[0],
            Expr::Ident(_)
        ));
    }

    #[test]
    fn test_parameters_shadow_builtins() {
        let expr = parse_one("function f(time) { return time }").unwrap();
        let Expr::Function(decl) = expr else {
            panic!("expected a function declaration");
        };
        assert!(matches!(&decl.body[0], Expr::Return(Some(e)) if matches!(**e, Expr::Ident(_))));
    }

    #[test]
    fn test_named_arguments() {
        let expr = parse_one("loopOut(type = \"pingpong\")").unwrap();
        match expr {
            Expr::Builtin {
                builtin: Builtin::Property(PropertyMember::LoopOut),
                args,
            } => assert_eq!(args[0].name.as_deref(), Some("type")),
            other => panic!("unexpected tree {:?}", other),
        }
        // `==` is a comparison, not a named argument
        let expr = parse_one("add(a == 1, 2)").unwrap();
        match expr {
            Expr::Builtin {
                builtin: Builtin::Global(GlobalOp::Add),
                args,
            } => assert!(args[0].name.is_none()),
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_builtin_arity_is_checked() {
        let err = parse_one("clamp(1, 2)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn test_illegal_jumps() {
        let err = parse_one("break").unwrap_err();
        assert!(err.to_string().contains("Illegal break statement"));
        let err = parse_one("return 1").unwrap_err();
        assert!(err.to_string().contains("Illegal return statement"));
        // loops do not reach into nested functions
        let err = parse_one("while (a) { function f() { continue } }").unwrap_err();
        assert!(err.to_string().contains("Illegal continue statement"));
        assert!(parse_one("function f() { while (1) { break }; return 2 }").is_ok());
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_one("1 = 2").unwrap_err();
        assert!(err.to_string().contains("Invalid left-hand side"));
        assert!(parse_one("v[0] = 2").is_ok());
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let err = parse_one("x = 1 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_declarations() {
        let err = parse_one("const c").unwrap_err();
        assert!(err.to_string().contains("Missing initializer"));

        let mut names = DeclaredNames::new();
        parse("let x = 1", &mut names).unwrap();
        let err = parse("let x = 2", &mut names).unwrap_err();
        assert!(err.to_string().contains("already been declared"));
        // a nested block may shadow
        assert!(parse("if (true) { let x = 3 }", &mut names).is_ok());
    }

    #[test]
    fn test_rest_parameter_rejected_at_definition() {
        let err = parse_one("function f(...a, b) { return a }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().contains("Rest parameter must be last"));
    }

    #[test]
    fn test_control_flow_shapes() {
        assert!(matches!(
            parse_one("if (a) x = 1 else x = 2").unwrap(),
            Expr::If {
                otherwise: Some(_),
                ..
            }
        ));
        assert!(matches!(
            parse_one("do {x += 1;} while (x != 3)").unwrap(),
            Expr::DoWhile { .. }
        ));
        assert!(matches!(
            parse_one("for(;;){i++;if (i >= 3) break}").unwrap(),
            Expr::For {
                init: None,
                test: None,
                update: None,
                ..
            }
        ));
    }

    #[test]
    fn test_statement_after_nested_block() {
        assert!(parse_one("function f() {var x = 0;while (x < 3) {x++;};return x;}").is_ok());
        assert!(parse_one("function g(a) {if (a > 1) {a = 1;};return a;}").is_ok());
        assert!(parse_one("{ if (n == 0) n = 2; n = n + 1 }").is_ok());
        let statements = parse("for (;;) {} x = 1", &mut DeclaredNames::new()).unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_negative_literal_is_folded() {
        assert!(matches!(
            parse_one("-5").unwrap(),
            Expr::Literal(Literal::Number(n)) if n == -5.0
        ));
    }

    #[test]
    fn test_accessor_result_can_be_called() {
        match parse_one("thisComp(\"Ball\")").unwrap() {
            Expr::Call { callee, args } => {
                assert_eq!(args.len(), 1);
                assert!(matches!(
                    *callee,
                    Expr::Builtin {
                        builtin: Builtin::Global(GlobalOp::ThisComp),
                        ..
                    }
                ));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }
}
