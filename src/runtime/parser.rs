//! Recursive-descent parser for macro bodies.
//!
//! Works on the token list produced by the plain tokenizer. The accepted language is the
//! statement and expression core of the scripting language; `goto`, labels and the
//! bitwise operators are rejected with a compile error.

use std::rc::Rc;

use crate::runtime::ast::{BinOp, Block, Expr, Field, FuncBody, Stat, UnOp};
use crate::syntax::Token;
use crate::{err_msg, MacroError};

const UNARY_PRIORITY: u8 = 12;

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    chunk: Rc<str>,
    eof: (Token, usize),
}

impl Parser {
    pub fn new(chunk: &str, tokens: Vec<(Token, usize)>) -> Self {
        let last_line = tokens.last().map(|(_, l)| *l).unwrap_or(1);
        Self {
            tokens,
            pos: 0,
            chunk: Rc::from(chunk),
            eof: (Token::Eof, last_line),
        }
    }

    /// Parses a whole chunk as the body of a vararg function.
    pub fn parse_chunk(mut self) -> Result<Rc<FuncBody>, MacroError> {
        let body = self.block()?;
        if !self.peek().is_eof() {
            return Err(self.error_near("'<eof>' expected"));
        }
        Ok(Rc::new(FuncBody {
            name: "main chunk".to_string(),
            chunk: Rc::clone(&self.chunk),
            line: 0,
            params: Vec::new(),
            vararg: true,
            body,
        }))
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens.get(self.pos).unwrap_or(&self.eof).0
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens.get(self.pos + offset).unwrap_or(&self.eof).0
    }

    fn line(&self) -> usize {
        self.tokens.get(self.pos).unwrap_or(&self.eof).1
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, token: Token) -> Result<(), MacroError> {
        if self.check(&token) {
            return Ok(());
        }
        Err(self.error_near(format!("'{}' expected", token.symbol().unwrap_or("?"))))
    }

    fn expect_match(&mut self, what: Token, who: &str, line: usize) -> Result<(), MacroError> {
        if self.check(&what) {
            return Ok(());
        }
        let symbol = what.symbol().unwrap_or("?");
        if line == self.line() {
            return Err(self.error_near(format!("'{}' expected", symbol)));
        }
        Err(self.error_near(format!(
            "'{}' expected (to close '{}' at line {})",
            symbol, who, line
        )))
    }

    fn expect_name(&mut self) -> Result<String, MacroError> {
        match self.next() {
            Token::Name(name) => Ok(name),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error_near("<name> expected"))
            }
        }
    }

    fn error_near(&self, message: impl std::fmt::Display) -> MacroError {
        let near = match self.peek() {
            Token::Eof => "<eof>".to_string(),
            Token::Name(n) => n.clone(),
            Token::Str(s) => s.clone(),
            other => other.to_source(),
        };
        err_msg!(Invocation, "{}:{}: {} near '{}'", self.chunk, self.line(), message, near)
    }

    fn block_follows(&self, with_until: bool) -> bool {
        match self.peek() {
            Token::Else | Token::Elseif | Token::End | Token::Eof => true,
            Token::Until => with_until,
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn block(&mut self) -> Result<Block, MacroError> {
        let mut block = Block::default();
        while !self.block_follows(true) {
            if matches!(self.peek(), Token::Return) {
                let line = self.line();
                self.next();
                let exprs = if self.block_follows(true) || matches!(self.peek(), Token::Semi) {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                self.check(&Token::Semi);
                block.stats.push((Stat::Return(exprs), line));
                break;
            }
            let line = self.line();
            if let Some(stat) = self.statement()? {
                block.stats.push((stat, line));
            }
        }
        Ok(block)
    }

    fn statement(&mut self) -> Result<Option<Stat>, MacroError> {
        let line = self.line();
        let stat = match self.peek().clone() {
            Token::Semi => {
                self.next();
                return Ok(None);
            }
            Token::If => self.if_stat(line)?,
            Token::While => {
                self.next();
                let cond = self.expr()?;
                self.expect(Token::Do)?;
                let body = self.block()?;
                self.expect_match(Token::End, "while", line)?;
                Stat::While(cond, body)
            }
            Token::Do => {
                self.next();
                let body = self.block()?;
                self.expect_match(Token::End, "do", line)?;
                Stat::Do(body)
            }
            Token::For => self.for_stat(line)?,
            Token::Repeat => {
                self.next();
                let body = self.block()?;
                self.expect_match(Token::Until, "repeat", line)?;
                let cond = self.expr()?;
                Stat::Repeat(body, cond)
            }
            Token::Function => self.function_stat(line)?,
            Token::Local => {
                self.next();
                if self.check(&Token::Function) {
                    let name = self.expect_name()?;
                    let body = self.func_body(name.clone(), false, line)?;
                    Stat::LocalFunction(name, body)
                } else {
                    let mut names = vec![self.expect_name()?];
                    while self.check(&Token::Comma) {
                        names.push(self.expect_name()?);
                    }
                    let exprs = if self.check(&Token::Assign) {
                        self.expr_list()?
                    } else {
                        Vec::new()
                    };
                    Stat::Local(names, exprs)
                }
            }
            Token::Break => {
                self.next();
                Stat::Break
            }
            Token::Goto | Token::DoubleColon => {
                return Err(self.error_near("goto and labels are not supported"));
            }
            _ => self.expr_stat()?,
        };
        Ok(Some(stat))
    }

    fn if_stat(&mut self, line: usize) -> Result<Stat, MacroError> {
        self.next();
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect(Token::Then)?;
        arms.push((cond, self.block()?));
        let mut otherwise = None;
        loop {
            match self.peek() {
                Token::Elseif => {
                    self.next();
                    let cond = self.expr()?;
                    self.expect(Token::Then)?;
                    arms.push((cond, self.block()?));
                }
                Token::Else => {
                    self.next();
                    otherwise = Some(self.block()?);
                    self.expect_match(Token::End, "if", line)?;
                    break;
                }
                _ => {
                    self.expect_match(Token::End, "if", line)?;
                    break;
                }
            }
        }
        Ok(Stat::If(arms, otherwise))
    }

    fn for_stat(&mut self, line: usize) -> Result<Stat, MacroError> {
        self.next();
        let first = self.expect_name()?;
        if self.check(&Token::Assign) {
            let start = self.expr()?;
            self.expect(Token::Comma)?;
            let limit = self.expr()?;
            let step = if self.check(&Token::Comma) {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(Token::Do)?;
            let body = self.block()?;
            self.expect_match(Token::End, "for", line)?;
            return Ok(Stat::NumericFor {
                var: first,
                start,
                limit,
                step,
                body,
            });
        }
        let mut names = vec![first];
        while self.check(&Token::Comma) {
            names.push(self.expect_name()?);
        }
        if !self.check(&Token::In) {
            return Err(self.error_near("'=' or 'in' expected"));
        }
        let exprs = self.expr_list()?;
        self.expect(Token::Do)?;
        let body = self.block()?;
        self.expect_match(Token::End, "for", line)?;
        Ok(Stat::GenericFor { names, exprs, body })
    }

    /// `function a.b.c:m() ... end` becomes an assignment to `a.b.c.m`.
    fn function_stat(&mut self, line: usize) -> Result<Stat, MacroError> {
        self.next();
        let first = self.expect_name()?;
        let mut full_name = first.clone();
        let mut target = Expr::Name(first);
        let mut method = false;
        loop {
            if self.check(&Token::Dot) {
                let key = self.expect_name()?;
                full_name = format!("{}.{}", full_name, key);
                target = Expr::Index(Box::new(target), Box::new(Expr::Str(Rc::from(key.as_str()))));
            } else if self.check(&Token::Colon) {
                let key = self.expect_name()?;
                full_name = format!("{}:{}", full_name, key);
                target = Expr::Index(Box::new(target), Box::new(Expr::Str(Rc::from(key.as_str()))));
                method = true;
                break;
            } else {
                break;
            }
        }
        let body = self.func_body(full_name, method, line)?;
        Ok(Stat::Assign(vec![target], vec![Expr::Function(body)]))
    }

    fn expr_stat(&mut self) -> Result<Stat, MacroError> {
        let first = self.suffixed_expr()?;
        if matches!(self.peek(), Token::Assign | Token::Comma) {
            let mut targets = vec![first];
            while self.check(&Token::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            self.expect(Token::Assign)?;
            for target in &targets {
                if !matches!(target, Expr::Name(_) | Expr::Index(..)) {
                    return Err(self.error_near("syntax error"));
                }
            }
            let exprs = self.expr_list()?;
            return Ok(Stat::Assign(targets, exprs));
        }
        if !matches!(first, Expr::Call(..) | Expr::Method(..)) {
            return Err(self.error_near("syntax error"));
        }
        Ok(Stat::Call(first))
    }

    fn func_body(&mut self, name: String, method: bool, line: usize) -> Result<Rc<FuncBody>, MacroError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if method {
            params.push("self".to_string());
        }
        let mut vararg = false;
        if !matches!(self.peek(), Token::RParen) {
            loop {
                match self.next() {
                    Token::Name(param) => params.push(param),
                    Token::Ellipsis => {
                        vararg = true;
                        break;
                    }
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.error_near("<name> expected"));
                    }
                }
                if !self.check(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        let body = self.block()?;
        self.expect_match(Token::End, "function", line)?;
        Ok(Rc::new(FuncBody {
            name,
            chunk: Rc::clone(&self.chunk),
            line,
            params,
            vararg,
            body,
        }))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr_list(&mut self) -> Result<Vec<Expr>, MacroError> {
        let mut exprs = vec![self.expr()?];
        while self.check(&Token::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    pub fn expr(&mut self) -> Result<Expr, MacroError> {
        self.sub_expr(0)
    }

    fn sub_expr(&mut self, limit: u8) -> Result<Expr, MacroError> {
        let unary = match self.peek() {
            Token::Not => Some(UnOp::Not),
            Token::Minus => Some(UnOp::Neg),
            Token::Hash => Some(UnOp::Len),
            Token::Tilde => return Err(self.error_near("bitwise operators are not supported")),
            _ => None,
        };
        let mut left = match unary {
            Some(op) => {
                self.next();
                let operand = self.sub_expr(UNARY_PRIORITY)?;
                Expr::Unary(op, Box::new(operand))
            }
            None => self.simple_expr()?,
        };
        loop {
            let token = self.peek().clone();
            if matches!(
                token,
                Token::Amp | Token::Pipe | Token::Tilde | Token::Shl | Token::Shr
            ) {
                return Err(self.error_near("bitwise operators are not supported"));
            }
            let Some((left_prio, right_prio)) = priority(&token) else {
                break;
            };
            if left_prio <= limit {
                break;
            }
            self.next();
            let right = self.sub_expr(right_prio)?;
            left = match token {
                Token::And => Expr::And(Box::new(left), Box::new(right)),
                Token::Or => Expr::Or(Box::new(left), Box::new(right)),
                other => {
                    let op = binary_op(&other).ok_or_else(|| self.error_near("unexpected operator"))?;
                    Expr::Binary(op, Box::new(left), Box::new(right))
                }
            };
        }
        Ok(left)
    }

    fn simple_expr(&mut self) -> Result<Expr, MacroError> {
        let line = self.line();
        let expr = match self.peek().clone() {
            Token::Int(i) => Expr::Int(i),
            Token::Float(f) => Expr::Float(f),
            Token::Str(s) => Expr::Str(Rc::from(s.as_str())),
            Token::Nil => Expr::Nil,
            Token::True => Expr::True,
            Token::False => Expr::False,
            Token::Ellipsis => Expr::Vararg,
            Token::LBrace => return self.table(),
            Token::Function => {
                self.next();
                let body = self.func_body("anonymous".to_string(), false, line)?;
                return Ok(Expr::Function(body));
            }
            _ => return self.suffixed_expr(),
        };
        self.next();
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, MacroError> {
        match self.peek().clone() {
            Token::Name(name) => {
                self.next();
                Ok(Expr::Name(name))
            }
            Token::LParen => {
                let line = self.line();
                self.next();
                let inner = self.expr()?;
                self.expect_match(Token::RParen, "(", line)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => Err(self.error_near("unexpected symbol")),
        }
    }

    fn suffixed_expr(&mut self) -> Result<Expr, MacroError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.next();
                    let key = self.expect_name()?;
                    expr = Expr::Index(Box::new(expr), Box::new(Expr::Str(Rc::from(key.as_str()))));
                }
                Token::LBracket => {
                    self.next();
                    let key = self.expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Token::Colon => {
                    self.next();
                    let name = self.expect_name()?;
                    let args = self.call_args()?;
                    expr = Expr::Method(Box::new(expr), name, args);
                }
                Token::LParen | Token::Str(_) | Token::LBrace => {
                    let args = self.call_args()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, MacroError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.next();
                Ok(vec![Expr::Str(Rc::from(s.as_str()))])
            }
            Token::LBrace => Ok(vec![self.table()?]),
            Token::LParen => {
                let line = self.line();
                self.next();
                if self.check(&Token::RParen) {
                    return Ok(Vec::new());
                }
                let args = self.expr_list()?;
                self.expect_match(Token::RParen, "(", line)?;
                Ok(args)
            }
            _ => Err(self.error_near("function arguments expected")),
        }
    }

    fn table(&mut self) -> Result<Expr, MacroError> {
        let line = self.line();
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while !matches!(self.peek(), Token::RBrace) {
            match (self.peek().clone(), self.peek_at(1)) {
                (Token::Name(key), Token::Assign) => {
                    self.next();
                    self.next();
                    let value = self.expr()?;
                    fields.push(Field::Keyed(Expr::Str(Rc::from(key.as_str())), value));
                }
                (Token::LBracket, _) => {
                    self.next();
                    let key = self.expr()?;
                    self.expect(Token::RBracket)?;
                    self.expect(Token::Assign)?;
                    let value = self.expr()?;
                    fields.push(Field::Keyed(key, value));
                }
                _ => fields.push(Field::Positional(self.expr()?)),
            }
            if !self.check(&Token::Comma) && !self.check(&Token::Semi) {
                break;
            }
        }
        self.expect_match(Token::RBrace, "{", line)?;
        Ok(Expr::Table(fields))
    }
}

/// Left and right binding priorities of binary operators.
fn priority(token: &Token) -> Option<(u8, u8)> {
    let prio = match token {
        Token::Or => (1, 1),
        Token::And => (2, 2),
        Token::Lt | Token::Gt | Token::Le | Token::Ge | Token::Ne | Token::Eq => (3, 3),
        Token::Concat => (9, 8),
        Token::Plus | Token::Minus => (10, 10),
        Token::Star | Token::Slash | Token::DoubleSlash | Token::Percent => (11, 11),
        Token::Caret => (14, 13),
        _ => return None,
    };
    Some(prio)
}

fn binary_op(token: &Token) -> Option<BinOp> {
    let op = match token {
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::DoubleSlash => BinOp::IDiv,
        Token::Percent => BinOp::Mod,
        Token::Caret => BinOp::Pow,
        Token::Concat => BinOp::Concat,
        Token::Eq => BinOp::Eq,
        Token::Ne => BinOp::Ne,
        Token::Lt => BinOp::Lt,
        Token::Le => BinOp::Le,
        Token::Gt => BinOp::Gt,
        Token::Ge => BinOp::Ge,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::tokenize_plain;

    fn parse(src: &str) -> Result<Rc<FuncBody>, MacroError> {
        Parser::new("test", tokenize_plain("test", src)?).parse_chunk()
    }

    #[test]
    fn precedence_and_associativity() {
        let chunk = parse("return 1 + 2 * 3 .. 'x' .. 'y'").unwrap();
        let (Stat::Return(exprs), _) = &chunk.body.stats[0] else {
            panic!("expected return");
        };
        // `..` binds looser than `+` and associates to the right.
        let Expr::Binary(BinOp::Concat, left, right) = &exprs[0] else {
            panic!("expected concat at the top");
        };
        assert!(matches!(**left, Expr::Binary(BinOp::Add, ..)));
        assert!(matches!(**right, Expr::Binary(BinOp::Concat, ..)));
    }

    #[test]
    fn function_statement_desugars_to_assignment() {
        let chunk = parse("function t.a:m(x) return self end").unwrap();
        let (Stat::Assign(targets, values), _) = &chunk.body.stats[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(targets[0], Expr::Index(..)));
        let Expr::Function(body) = &values[0] else {
            panic!("expected function");
        };
        assert_eq!(body.params, vec!["self".to_string(), "x".to_string()]);
    }

    #[test]
    fn errors_name_the_missing_closer() {
        let err = parse("if x then\n return 1\n").unwrap_err();
        assert!(err.to_string().contains("'end' expected (to close 'if' at line 1)"), "{}", err);
        let err = parse("x = 1 | 2").unwrap_err();
        assert!(err.to_string().contains("bitwise"));
    }
}
