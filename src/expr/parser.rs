//! Recursive-descent parser producing a [`Program`].
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary.

use crate::expr::ExpressionError;
use crate::expr::lexer::{Tok, Token, tokenize};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
}

/// Built-in numeric functions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Func {
    Round,
    Floor,
    Ceil,
    Abs,
    Sqrt,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "round" => Func::Round,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    fn arity_ok(self, n: usize) -> bool {
        match self {
            Func::Pow => n == 2,
            Func::Min | Func::Max => n >= 1,
            _ => n == 1,
        }
    }
}

/// Per-feature geometry properties, read as `$.name` or `this.name`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeomVar {
    Area,
    Perimeter,
    Length,
    PartCount,
    IsNull,
    X,
    Y,
    CentroidX,
    CentroidY,
    Id,
}

impl GeomVar {
    fn lookup(name: &str) -> Option<GeomVar> {
        Some(match name {
            "area" => GeomVar::Area,
            "perimeter" => GeomVar::Perimeter,
            "length" => GeomVar::Length,
            "partCount" => GeomVar::PartCount,
            "isNull" => GeomVar::IsNull,
            "x" => GeomVar::X,
            "y" => GeomVar::Y,
            "centroidX" => GeomVar::CentroidX,
            "centroidY" => GeomVar::CentroidY,
            "id" => GeomVar::Id,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Field(String),
    Geom(GeomVar),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Visits every attribute field read by this expression.
    pub(crate) fn for_each_field(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Field(name) => f(name),
            Expr::Unary(_, e) => e.for_each_field(f),
            Expr::Binary(_, a, b) => {
                a.for_each_field(f);
                b.for_each_field(f);
            }
            Expr::Cond(c, a, b) => {
                c.for_each_field(f);
                a.for_each_field(f);
                b.for_each_field(f);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.for_each_field(f)),
            _ => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Assign(String, Expr),
    Expr(Expr),
}

/// A compiled expression program: statements run in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Deepest expression tree the parser will build. Bounds recursion in both
/// parsing and evaluation.
pub const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    at: usize,
    depth: usize,
}

fn syntax(pos: usize, msg: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        pos,
        msg: msg.into(),
    }
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.at].tok
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let i = (self.at + n).min(self.tokens.len() - 1);
        &self.tokens[i].tok
    }

    fn pos(&self) -> usize {
        self.tokens[self.at].pos
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tokens[self.at].tok.clone();
        if self.at + 1 < self.tokens.len() {
            self.at += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ExpressionError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(syntax(self.pos(), format!("expected {what}")))
        }
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.pos(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn nested(
        &mut self,
        inner: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let e = inner(self)?;
        self.depth -= 1;
        Ok(e)
    }

    fn program(&mut self) -> Result<Program, ExpressionError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Tok::Semi) {}
            if *self.peek() == Tok::Eof {
                break;
            }
            statements.push(self.statement()?);
            if !matches!(self.peek(), Tok::Semi | Tok::Eof) {
                return Err(syntax(self.pos(), "expected `;` or end of expression"));
            }
        }
        if statements.is_empty() {
            return Err(syntax(0, "empty expression"));
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Statement, ExpressionError> {
        if *self.peek_at(1) == Tok::Assign {
            if let Tok::Ident(name) = self.peek().clone() {
                self.bump();
                self.bump();
                return Ok(Statement::Assign(name, self.expr()?));
            }
        }
        Ok(Statement::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let cond = self.or()?;
        if self.eat(&Tok::Question) {
            let a = self.expr()?;
            self.expect(Tok::Colon, "`:`")?;
            let b = self.expr()?;
            return Ok(Expr::Cond(Box::new(cond), Box::new(a), Box::new(b)));
        }
        Ok(cond)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExpressionError>,
        ops: &[(Tok, BinaryOp)],
    ) -> Result<Expr, ExpressionError> {
        let start = self.depth;
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.eat(tok) {
                    // a left-leaning chain deepens the tree by one per operator
                    self.descend()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            self.depth = start;
            return Ok(lhs);
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(Self::and, &[(Tok::Or, BinaryOp::Or)])
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(Self::equality, &[(Tok::And, BinaryOp::And)])
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::relational,
            &[
                (Tok::StrictEq, BinaryOp::StrictEq),
                (Tok::StrictNe, BinaryOp::StrictNe),
                (Tok::Eq, BinaryOp::Eq),
                (Tok::Ne, BinaryOp::Ne),
            ],
        )
    }

    fn relational(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::additive,
            &[
                (Tok::Le, BinaryOp::Le),
                (Tok::Ge, BinaryOp::Ge),
                (Tok::Lt, BinaryOp::Lt),
                (Tok::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::multiplicative,
            &[(Tok::Plus, BinaryOp::Add), (Tok::Minus, BinaryOp::Sub)],
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            Self::unary,
            &[
                (Tok::Star, BinaryOp::Mul),
                (Tok::Slash, BinaryOp::Div),
                (Tok::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Plus,
            Tok::Not => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.bump();
        Ok(Expr::Unary(op, Box::new(self.nested(Self::unary)?)))
    }

    fn call(&mut self, name: &str) -> Result<Expr, ExpressionError> {
        let pos = self.pos();
        let func =
            Func::lookup(name).ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
        self.expect(Tok::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Tok::RParen) {
                    break;
                }
                self.expect(Tok::Comma, "`,` or `)`")?;
            }
        }
        if !func.arity_ok(args.len()) {
            return Err(syntax(
                pos,
                format!("{name}() does not take {} argument(s)", args.len()),
            ));
        }
        Ok(Expr::Call(func, args))
    }

    fn member_name(&mut self) -> Result<String, ExpressionError> {
        self.expect(Tok::Dot, "`.`")?;
        match self.bump() {
            Tok::Ident(name) => Ok(name),
            _ => Err(syntax(self.pos(), "expected a member name")),
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let pos = self.pos();
        match self.bump() {
            Tok::Num(n) => Ok(Expr::Num(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::LParen => {
                let e = self.expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(e)
            }
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "$" | "this" => {
                    let member = self.member_name()?;
                    GeomVar::lookup(&member)
                        .map(Expr::Geom)
                        .ok_or_else(|| ExpressionError::UnknownField(format!("{name}.{member}")))
                }
                "Math" => {
                    let member = self.member_name()?;
                    self.call(&member)
                }
                _ if *self.peek() == Tok::LParen => self.call(&name),
                _ => Ok(Expr::Field(name)),
            },
            Tok::Eof => Err(syntax(pos, "unexpected end of expression")),
            other => Err(syntax(pos, format!("unexpected token {other:?}"))),
        }
    }
}

/// Parses an expression program.
pub fn parse(src: &str) -> Result<Program, ExpressionError> {
    let tokens = tokenize(src)?;
    Parser {
        tokens,
        at: 0,
        depth: 0,
    }
    .program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(src: &str) -> Expr {
        match parse(src).unwrap().statements.remove(0) {
            Statement::Expr(e) => e,
            s => panic!("not an expression: {s:?}"),
        }
    }

    #[test]
    fn precedence() {
        assert_eq!(
            one("1 + 2 * 3"),
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Num(2.0)),
                    Box::new(Expr::Num(3.0))
                ))
            )
        );
    }

    #[test]
    fn assignments_and_geometry() {
        let p = parse("a = $.area; b = a > 1 ? 'big' : 'small'").unwrap();
        assert_eq!(p.statements.len(), 2);
        assert_eq!(
            p.statements[0],
            Statement::Assign("a".into(), Expr::Geom(GeomVar::Area))
        );
        assert!(matches!(p.statements[1], Statement::Assign(_, Expr::Cond(..))));
    }

    #[test]
    fn math_namespace() {
        assert_eq!(
            one("Math.max(a, 2)"),
            Expr::Call(Func::Max, vec![Expr::Field("a".into()), Expr::Num(2.0)])
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            parse("eval('x')"),
            Err(ExpressionError::UnknownFunction("eval".into()))
        );
        assert_eq!(
            parse("$.volume"),
            Err(ExpressionError::UnknownField("$.volume".into()))
        );
        assert!(matches!(parse("a +"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("(a"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse(""), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("pow(2)"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(ExpressionError::Syntax { .. })));
    }

    fn too_deep(src: &str) -> bool {
        matches!(
            parse(src),
            Err(ExpressionError::Syntax { ref msg, .. }) if msg.contains("too deeply")
        )
    }

    #[test]
    fn nesting_is_bounded() {
        let parens = format!("{}v{}", "(".repeat(3_000), ")".repeat(3_000));
        assert!(too_deep(&parens));
        assert!(too_deep(&format!("{}v", "!".repeat(3_000))));
        assert!(too_deep(&format!("{}v", "-".repeat(3_000))));
        assert!(too_deep(&vec!["1"; 3_000].join(" + ")));
        assert!(too_deep(&format!("{}0", "pow(2, ".repeat(1_000))));

        let shallow = format!("{}v{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(one(&shallow), Expr::Field("v".into()));
        assert!(parse(&vec!["1"; 100].join(" + ")).is_ok());
    }
}
