//! Parser producing the expression tree for a filter script.
//!
//! Everything is an expression; a program is a `;`-separated list of them.
//! Binary operators are resolved by precedence climbing.

use std::rc::Rc;

use crate::script::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::script::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    FloorDiv,
}

impl BinOp {
    fn from_op(op: &str) -> Option<Self> {
        Some(match op {
            "||" => BinOp::Or,
            "&&" => BinOp::And,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "//" => BinOp::FloorDiv,
            _ => return None,
        })
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => 7,
            BinOp::Add | BinOp::Sub => 10,
            BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::FloorDiv => 20,
        }
    }
}

/// Binary precedence levels, loosest first. Assignment sits below all of them.
const PRECEDENCE_LEVELS: [u8; 5] = [2, 3, 7, 10, 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Left-hand side of `=`.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Var(String),
    Pixel { x: Box<Expr>, y: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Bool(bool),
    Var(String),
    Assign {
        target: Target,
        value: Box<Expr>,
    },
    /// A left-associative run of operators sharing one precedence level:
    /// `a - b + c` is `first: a, rest: [(Sub, b), (Add, c)]`.
    Binary {
        first: Box<Expr>,
        rest: Vec<(BinOp, Expr)>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Lambda {
        params: Vec<String>,
        body: Rc<Expr>,
    },
    For {
        init: Box<Expr>,
        cond: Box<Expr>,
        incr: Box<Expr>,
        body: Box<Expr>,
    },
    Block(Vec<Expr>),
}

/// Name the interpreter binds to the working image.
pub const PIXELS: &str = "pixels";

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Descend one nesting level; paired with `self.depth -= 1`.
    fn enter(&mut self) -> Result<(), ScriptError> {
        if self.depth >= self.max_depth {
            let token = self.peek();
            return Err(self.error_at(
                token,
                format!("expression nested deeper than {} levels", self.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn error_at(&self, token: Option<&Token>, message: String) -> ScriptError {
        let (line, col) = token
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.col))
            .unwrap_or((1, 0));
        ScriptError::Syntax { line, col, message }
    }

    fn describe(token: Option<&Token>) -> String {
        match token.map(|t| &t.kind) {
            None => "end of input".to_string(),
            Some(TokenKind::Num(n)) => format!("number {n}"),
            Some(TokenKind::Ident(name)) => format!("\"{name}\""),
            Some(TokenKind::Keyword(kw)) => format!("keyword {kw:?}").to_lowercase(),
            Some(TokenKind::Punc(ch)) => format!("\"{ch}\""),
            Some(TokenKind::Op(op)) => format!("\"{op}\""),
        }
    }

    fn is_punc(&self, ch: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punc(c), .. }) if *c == ch)
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Keyword(k), .. }) if *k == kw)
    }

    fn skip_punc(&mut self, ch: char) -> Result<(), ScriptError> {
        if self.is_punc(ch) {
            self.pos += 1;
            return Ok(());
        }
        let token = self.peek();
        Err(self.error_at(token, format!("expected \"{ch}\", got {}", Self::describe(token))))
    }

    /// `start item (sep item)* sep? stop`, where the list may be empty.
    fn delimited<T>(
        &mut self,
        start: char,
        stop: char,
        sep: char,
        mut item: impl FnMut(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<Vec<T>, ScriptError> {
        self.skip_punc(start)?;
        let mut items = Vec::new();
        let mut first = true;
        while !self.eof() {
            if self.is_punc(stop) {
                break;
            }
            if first {
                first = false;
            } else {
                self.skip_punc(sep)?;
            }
            if self.is_punc(stop) {
                break;
            }
            items.push(item(self)?);
        }
        self.skip_punc(stop)?;
        Ok(items)
    }

    fn parse_program(&mut self) -> Result<Expr, ScriptError> {
        let mut exprs = Vec::new();
        while !self.eof() {
            exprs.push(self.parse_expression()?);
            if !self.eof() {
                self.skip_punc(';')?;
            }
        }
        Ok(Expr::Block(exprs))
    }

    fn parse_expression(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let result = self.parse_assignment();
        self.depth -= 1;
        result
    }

    fn parse_assignment(&mut self) -> Result<Expr, ScriptError> {
        let left = self.parse_level(0)?;
        let Some(Token { kind: TokenKind::Op(op), .. }) = self.peek() else {
            return Ok(left);
        };
        let op = *op;
        let token = self.advance();
        if op != "=" {
            return Err(self.error_at(token.as_ref(), format!("\"{op}\" is not a binary operator")));
        }
        let target = self.assign_target(left, token.as_ref())?;
        // Right-associative: a = b = c assigns c to both
        let value = self.parse_expression()?;
        Ok(Expr::Assign {
            target,
            value: Box::new(value),
        })
    }

    /// Fold every operator of `PRECEDENCE_LEVELS[level]` into one flat run.
    fn parse_level(&mut self, level: usize) -> Result<Expr, ScriptError> {
        let first = self.parse_operand(level)?;
        let mut rest = Vec::new();
        while let Some(Token { kind: TokenKind::Op(op), .. }) = self.peek() {
            let Some(bin) = BinOp::from_op(op) else {
                break;
            };
            if bin.precedence() != PRECEDENCE_LEVELS[level] {
                break;
            }
            self.pos += 1;
            rest.push((bin, self.parse_operand(level)?));
        }

        if rest.is_empty() {
            return Ok(first);
        }
        Ok(Expr::Binary {
            first: Box::new(first),
            rest,
        })
    }

    fn parse_operand(&mut self, level: usize) -> Result<Expr, ScriptError> {
        if level + 1 < PRECEDENCE_LEVELS.len() {
            self.parse_level(level + 1)
        } else {
            self.parse_atom()
        }
    }

    fn assign_target(&self, left: Expr, token: Option<&Token>) -> Result<Target, ScriptError> {
        match left {
            Expr::Var(name) => Ok(Target::Var(name)),
            Expr::Index { target, index } if *target == Expr::Var(PIXELS.to_string()) => {
                let [x, y]: [Expr; 2] = index
                    .try_into()
                    .map_err(|_| self.error_at(token, "pixels index must be [x, y]".to_string()))?;
                Ok(Target::Pixel {
                    x: Box::new(x),
                    y: Box::new(y),
                })
            }
            _ => Err(self.error_at(token, "can only assign to a variable or pixels[x, y]".to_string())),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ScriptError> {
        let entered = self.depth;
        let result = self.parse_postfix();
        self.depth = entered;
        result
    }

    /// A primary followed by any number of calls and indexes. Each one wraps
    /// the tree a level deeper.
    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_punc('(') {
                self.enter()?;
                let args = self.delimited('(', ')', ',', Self::parse_expression)?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.is_punc('[') {
                self.enter()?;
                let index = self.delimited('[', ']', ',', Self::parse_expression)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        if self.is_punc('(') {
            self.pos += 1;
            let expr = self.parse_expression()?;
            self.skip_punc(')')?;
            return Ok(expr);
        }
        if self.is_punc('{') {
            return self.parse_block();
        }

        let token = self.advance();
        match token.as_ref().map(|t| &t.kind) {
            Some(TokenKind::Num(n)) => Ok(Expr::Num(*n)),
            Some(TokenKind::Ident(name)) => Ok(Expr::Var(name.clone())),
            Some(TokenKind::Keyword(Keyword::True)) => Ok(Expr::Bool(true)),
            Some(TokenKind::Keyword(Keyword::False)) => Ok(Expr::Bool(false)),
            Some(TokenKind::Keyword(Keyword::If)) => self.parse_if(),
            Some(TokenKind::Keyword(Keyword::Lambda)) => self.parse_lambda(),
            Some(TokenKind::Keyword(Keyword::For)) => self.parse_for(),
            Some(TokenKind::Op("-")) => self.parse_unary(UnaryOp::Neg),
            Some(TokenKind::Op("!")) => self.parse_unary(UnaryOp::Not),
            _ => Err(self.error_at(
                token.as_ref(),
                format!("unexpected {}", Self::describe(token.as_ref())),
            )),
        }
    }

    fn parse_unary(&mut self, op: UnaryOp) -> Result<Expr, ScriptError> {
        self.enter()?;
        let operand = self.parse_atom();
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    /// `{ a; b; c }`. An empty block is `false`, a single expression is
    /// returned as-is.
    fn parse_block(&mut self) -> Result<Expr, ScriptError> {
        let mut exprs = self.delimited('{', '}', ';', Self::parse_expression)?;
        Ok(match exprs.len() {
            0 => Expr::Bool(false),
            1 => exprs.remove(0),
            _ => Expr::Block(exprs),
        })
    }

    fn parse_if(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.parse_expression()?;
        let then = self.parse_expression()?;
        let otherwise = if self.is_keyword(Keyword::Else) {
            self.pos += 1;
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise,
        })
    }

    fn parse_lambda(&mut self) -> Result<Expr, ScriptError> {
        let params = self.delimited('(', ')', ',', Self::parse_param)?;
        let body = self.parse_expression()?;
        Ok(Expr::Lambda {
            params,
            body: Rc::new(body),
        })
    }

    fn parse_param(&mut self) -> Result<String, ScriptError> {
        let token = self.advance();
        match token.as_ref().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => Ok(name.clone()),
            _ => Err(self.error_at(
                token.as_ref(),
                format!("expected parameter name, got {}", Self::describe(token.as_ref())),
            )),
        }
    }

    fn parse_for(&mut self) -> Result<Expr, ScriptError> {
        self.skip_punc('(')?;
        let init = self.parse_expression()?;
        self.skip_punc(';')?;
        let cond = self.parse_expression()?;
        self.skip_punc(';')?;
        let incr = self.parse_expression()?;
        self.skip_punc(')')?;
        let body = self.parse_block()?;
        Ok(Expr::For {
            init: Box::new(init),
            cond: Box::new(cond),
            incr: Box::new(incr),
            body: Box::new(body),
        })
    }
}

/// Parse a whole script into a top-level [`Expr::Block`].
///
/// Expressions nested deeper than `max_depth` levels are a syntax error.
pub fn parse(source: &str, max_depth: usize) -> Result<Expr, ScriptError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    }
    .parse_program()
}
