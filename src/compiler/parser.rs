//! Recursive-descent parser: `Vec<Spanned>` tokens -> `ast::Program` (C4).

use crate::compiler::ast::*;
use crate::compiler::lexer::{LexError, Lexer, Spanned, Tok};
use crate::value::Var;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {0:?} at line {1}")]
    Unexpected(Tok, usize),
    #[error("unexpected end of input")]
    Eof,
}

pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let toks = Lexer::new(src).tokenize()?;
    let mut p = Parser { toks, pos: 0 };
    p.parse_stmts(&[Tok::Eof])
}

struct Parser {
    toks: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn line(&self) -> usize {
        self.toks[self.pos.min(self.toks.len() - 1)].line
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].tok.clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, t: &Tok) -> Result<(), ParseError> {
        if self.peek() == t {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::Unexpected(self.peek().clone(), self.line()))
        }
    }

    fn at(&self, t: &Tok) -> bool {
        self.peek() == t
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(ParseError::Unexpected(other, self.line())),
        }
    }

    // ---- statements ----

    fn parse_stmts(&mut self, terminators: &[Tok]) -> Result<Vec<Stmt>, ParseError> {
        let mut out = Vec::new();
        while !terminators.iter().any(|t| self.at(t)) {
            out.push(self.parse_stmt()?);
        }
        Ok(out)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().clone() {
            Tok::If => self.parse_if(),
            Tok::While => self.parse_while(),
            Tok::For => self.parse_for(),
            Tok::Fork => self.parse_fork(),
            Tok::Try => self.parse_try(),
            Tok::Return => {
                self.bump();
                if self.at(&Tok::Semi) {
                    self.bump();
                    Ok(Stmt::Return(None))
                } else {
                    let e = self.parse_expr()?;
                    self.expect(&Tok::Semi)?;
                    Ok(Stmt::Return(Some(e)))
                }
            }
            Tok::Break => {
                self.bump();
                let label = if let Tok::Ident(name) = self.peek().clone() {
                    self.bump();
                    Some(name)
                } else {
                    None
                };
                self.expect(&Tok::Semi)?;
                Ok(Stmt::Break(label))
            }
            Tok::Continue => {
                self.bump();
                let label = if let Tok::Ident(name) = self.peek().clone() {
                    self.bump();
                    Some(name)
                } else {
                    None
                };
                self.expect(&Tok::Semi)?;
                Ok(Stmt::Continue(label))
            }
            _ => {
                let e = self.parse_expr()?;
                self.expect(&Tok::Semi)?;
                Ok(Stmt::Expr(e))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::If)?;
        self.expect(&Tok::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Tok::RParen)?;
        let body = self.parse_stmts(&[Tok::Elseif, Tok::Else, Tok::Endif])?;
        let mut arms = vec![(cond, body)];
        loop {
            match self.peek().clone() {
                Tok::Elseif => {
                    self.bump();
                    self.expect(&Tok::LParen)?;
                    let c = self.parse_expr()?;
                    self.expect(&Tok::RParen)?;
                    let b = self.parse_stmts(&[Tok::Elseif, Tok::Else, Tok::Endif])?;
                    arms.push((c, b));
                }
                _ => break,
            }
        }
        let else_body = if self.at(&Tok::Else) {
            self.bump();
            self.parse_stmts(&[Tok::Endif])?
        } else {
            Vec::new()
        };
        self.expect(&Tok::Endif)?;
        self.expect(&Tok::Semi).or::<ParseError>(Ok(())).ok();
        Ok(Stmt::If(arms, else_body))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::While)?;
        // `while name (cond)` labeled form
        let label = if matches!(self.peek(), Tok::Ident(_)) && self.looks_like_paren_next_is_ident_then_lparen() {
            if let Tok::Ident(n) = self.bump() {
                Some(n)
            } else {
                None
            }
        } else {
            None
        };
        self.expect(&Tok::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Tok::RParen)?;
        let body = self.parse_stmts(&[Tok::Endwhile])?;
        self.expect(&Tok::Endwhile)?;
        self.bump_if_semi();
        Ok(Stmt::While { label, cond, body })
    }

    fn looks_like_paren_next_is_ident_then_lparen(&self) -> bool {
        matches!(self.toks.get(self.pos + 1).map(|s| &s.tok), Some(Tok::LParen))
    }

    fn bump_if_semi(&mut self) {
        if self.at(&Tok::Semi) {
            self.bump();
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::For)?;
        let var = self.ident()?;
        let index_var = if self.at(&Tok::Comma) {
            self.bump();
            Some(self.ident()?)
        } else {
            None
        };
        self.expect(&Tok::In)?;
        if self.at(&Tok::LParen) {
            self.bump();
            let from = self.parse_expr()?;
            self.expect(&Tok::DotDot)?;
            let to = self.parse_expr()?;
            self.expect(&Tok::RParen)?;
            let body = self.parse_stmts(&[Tok::Endfor])?;
            self.expect(&Tok::Endfor)?;
            self.bump_if_semi();
            Ok(Stmt::ForRange {
                var,
                label: None,
                from,
                to,
                body,
            })
        } else {
            self.expect(&Tok::LBracket)?;
            let list = self.parse_expr()?;
            self.expect(&Tok::RBracket)?;
            let body = self.parse_stmts(&[Tok::Endfor])?;
            self.expect(&Tok::Endfor)?;
            self.bump_if_semi();
            Ok(Stmt::ForList {
                var,
                index_var,
                label: None,
                list,
                body,
            })
        }
    }

    fn parse_fork(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::Fork)?;
        let var = if let Tok::Ident(_) = self.peek().clone() {
            if self.looks_like_paren_next_is_ident_then_lparen() {
                if let Tok::Ident(n) = self.bump() {
                    Some(n)
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        };
        self.expect(&Tok::LParen)?;
        let delay = self.parse_expr()?;
        self.expect(&Tok::RParen)?;
        let body = self.parse_stmts(&[Tok::Endfork])?;
        self.expect(&Tok::Endfork)?;
        self.bump_if_semi();
        Ok(Stmt::Fork { var, delay, body })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::Try)?;
        let body = self.parse_stmts(&[Tok::Except, Tok::Finally, Tok::Endtry])?;
        let mut excepts = Vec::new();
        while self.at(&Tok::Except) {
            self.bump();
            let var = if let Tok::Ident(_) = self.peek().clone() {
                if self.looks_like_paren_next_is_ident_then_lparen() {
                    if let Tok::Ident(n) = self.bump() {
                        Some(n)
                    } else {
                        None
                    }
                } else {
                    None
                }
            } else {
                None
            };
            self.expect(&Tok::LParen)?;
            let codes = self.parse_catch_codes()?;
            self.expect(&Tok::RParen)?;
            let b = self.parse_stmts(&[Tok::Except, Tok::Finally, Tok::Endtry])?;
            excepts.push(ExceptClause { var, codes, body: b });
        }
        let finally = if self.at(&Tok::Finally) {
            self.bump();
            Some(self.parse_stmts(&[Tok::Endtry])?)
        } else {
            None
        };
        self.expect(&Tok::Endtry)?;
        self.bump_if_semi();
        Ok(Stmt::Try {
            body,
            excepts,
            finally,
        })
    }

    fn parse_catch_codes(&mut self) -> Result<Vec<CatchCode>, ParseError> {
        if self.at(&Tok::AnyKw) {
            self.bump();
            return Ok(vec![CatchCode::Any]);
        }
        let mut out = Vec::new();
        loop {
            let name = self.ident()?;
            out.push(CatchCode::Named(name));
            if self.at(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    // ---- expressions (precedence climbing) ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        // `{a, b} = expr` scatter assignment
        if self.at(&Tok::LBrace) {
            let save = self.pos;
            if let Ok(targets) = self.try_parse_scatter_targets() {
                if self.at(&Tok::Assign) {
                    self.bump();
                    let rhs = self.parse_assign()?;
                    return Ok(Expr::ScatterAssign(targets, Box::new(rhs)));
                }
            }
            self.pos = save;
        }
        let lhs = self.parse_cond()?;
        if self.at(&Tok::Assign) {
            self.bump();
            let rhs = self.parse_assign()?;
            return Ok(assign_target(lhs, rhs));
        }
        Ok(lhs)
    }

    fn try_parse_scatter_targets(&mut self) -> Result<Vec<ScatterTarget>, ParseError> {
        self.expect(&Tok::LBrace)?;
        let mut out = Vec::new();
        while !self.at(&Tok::RBrace) {
            if self.at(&Tok::Question) {
                self.bump();
                let name = self.ident()?;
                let default = if self.at(&Tok::Assign) {
                    self.bump();
                    Some(Box::new(self.parse_cond()?))
                } else {
                    None
                };
                out.push(ScatterTarget::Optional(name, default));
            } else if self.at(&Tok::At) {
                self.bump();
                let name = self.ident()?;
                out.push(ScatterTarget::Rest(name));
            } else {
                let name = self.ident()?;
                out.push(ScatterTarget::Required(name));
            }
            if self.at(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(&Tok::RBrace)?;
        Ok(out)
    }

    fn parse_cond(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.at(&Tok::Question) {
            self.bump();
            let t = self.parse_assign()?;
            self.expect(&Tok::Bang)?;
            let f = self.parse_assign()?;
            Ok(Expr::Cond(Box::new(cond), Box::new(t), Box::new(f)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.at(&Tok::Or) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.at(&Tok::And) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Tok::Eq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_in()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_in()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_in(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bitor()?;
        while self.at(&Tok::In) {
            self.bump();
            let rhs = self.parse_bitor()?;
            lhs = Expr::Binary(BinOp::In, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bitxor()?;
        while self.at(&Tok::Pipe) {
            self.bump();
            let rhs = self.parse_bitxor()?;
            lhs = Expr::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bitand()?;
        while self.at(&Tok::Tilde) {
            self.bump();
            let rhs = self.parse_bitand()?;
            lhs = Expr::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_shift()?;
        while self.at(&Tok::Amp) {
            self.bump();
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Shl => BinOp::Shl,
                Tok::Shr => BinOp::Shr,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_pow()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_pow(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_unary()?;
        if self.at(&Tok::Caret) {
            self.bump();
            let rhs = self.parse_pow()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Tok::Minus => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Tok::Bang => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Tok::Dot => {
                    self.bump();
                    let name = self.parse_prop_or_verb_name()?;
                    if self.at(&Tok::LParen) {
                        self.bump();
                        let args = self.parse_arg_list(&Tok::RParen)?;
                        self.expect(&Tok::RParen)?;
                        e = Expr::VerbCall(Box::new(e), to_verb_name(name), args);
                    } else if self.at(&Tok::Assign) {
                        // handled by caller via assign_target(); just build PropGet here
                        e = Expr::PropGet(Box::new(e), to_prop_name(name));
                    } else {
                        e = Expr::PropGet(Box::new(e), to_prop_name(name));
                    }
                }
                Tok::Colon => {
                    self.bump();
                    let name = self.parse_prop_or_verb_name()?;
                    self.expect(&Tok::LParen)?;
                    let args = self.parse_arg_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen)?;
                    e = Expr::VerbCall(Box::new(e), to_verb_name(name), args);
                }
                Tok::LBracket => {
                    self.bump();
                    if self.at(&Tok::DotDot) {
                        // shouldn't happen; guard
                    }
                    let first = self.parse_range_index_expr()?;
                    if self.at(&Tok::DotDot) {
                        self.bump();
                        let second = self.parse_range_index_expr()?;
                        self.expect(&Tok::RBracket)?;
                        e = Expr::Range(Box::new(e), Box::new(first), Box::new(second));
                    } else {
                        self.expect(&Tok::RBracket)?;
                        e = Expr::Index(Box::new(e), Box::new(first));
                    }
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_range_index_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Tok::Caret => {
                self.bump();
                Ok(Expr::RangeStart)
            }
            Tok::Dollar => {
                self.bump();
                Ok(Expr::RangeEnd)
            }
            _ => self.parse_expr(),
        }
    }

    fn parse_prop_or_verb_name(&mut self) -> Result<NameTok, ParseError> {
        if self.at(&Tok::LParen) {
            self.bump();
            let e = self.parse_expr()?;
            self.expect(&Tok::RParen)?;
            Ok(NameTok::Dynamic(e))
        } else {
            let name = self.ident()?;
            Ok(NameTok::Literal(name))
        }
    }

    fn parse_arg_list(&mut self, end: &Tok) -> Result<Vec<Expr>, ParseError> {
        let mut out = Vec::new();
        while !self.at(end) {
            if self.at(&Tok::At) {
                self.bump();
                out.push(self.parse_assign()?);
            } else {
                out.push(self.parse_assign()?);
            }
            if self.at(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(out)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Tok::Int(n) => {
                self.bump();
                Ok(Expr::Literal(Var::Int(n)))
            }
            Tok::Float(f) => {
                self.bump();
                Ok(Expr::Literal(Var::Float(f)))
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Expr::Literal(Var::Str(std::sync::Arc::new(s))))
            }
            Tok::ObjNum(n) => {
                self.bump();
                Ok(Expr::Literal(Var::Obj(crate::value::ObjId(n))))
            }
            Tok::True => {
                self.bump();
                Ok(Expr::Literal(Var::Bool(true)))
            }
            Tok::False => {
                self.bump();
                Ok(Expr::Literal(Var::Bool(false)))
            }
            Tok::Sysprop(name) => {
                self.bump();
                if self.at(&Tok::LParen) {
                    self.bump();
                    let args = self.parse_arg_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen)?;
                    Ok(Expr::SystemVerbCall(name, args))
                } else {
                    Ok(Expr::SystemProp(name))
                }
            }
            Tok::Ident(name) => {
                self.bump();
                if self.at(&Tok::LParen) {
                    self.bump();
                    let args = self.parse_arg_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen)?;
                    Ok(Expr::BuiltinCall(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Tok::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            Tok::LBrace => {
                self.bump();
                let mut items = Vec::new();
                while !self.at(&Tok::RBrace) {
                    if self.at(&Tok::At) {
                        self.bump();
                        items.push(ListItem::Splice(self.parse_assign()?));
                    } else {
                        items.push(ListItem::Single(self.parse_assign()?));
                    }
                    if self.at(&Tok::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RBrace)?;
                Ok(Expr::List(items))
            }
            Tok::LAngleMap => {
                self.bump();
                let mut pairs = Vec::new();
                while !self.at(&Tok::RAngleMap) {
                    let k = self.parse_assign()?;
                    self.expect(&Tok::Arrow)?;
                    let v = self.parse_assign()?;
                    pairs.push((k, v));
                    if self.at(&Tok::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RAngleMap)?;
                Ok(Expr::Map(pairs))
            }
            Tok::BackTick => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(&Tok::Bang)?;
                let codes = self.parse_catch_codes()?;
                let default = if self.at(&Tok::Arrow) {
                    self.bump();
                    Some(Box::new(self.parse_assign()?))
                } else {
                    None
                };
                self.expect(&Tok::BackTick)?;
                Ok(Expr::Catch(Box::new(e), codes, default))
            }
            other => Err(ParseError::Unexpected(other, self.line())),
        }
    }
}

enum NameTok {
    Literal(String),
    Dynamic(Expr),
}

fn to_prop_name(n: NameTok) -> PropName {
    match n {
        NameTok::Literal(s) => PropName::Literal(s),
        NameTok::Dynamic(e) => PropName::Dynamic(Box::new(e)),
    }
}

fn to_verb_name(n: NameTok) -> VerbName {
    match n {
        NameTok::Literal(s) => VerbName::Literal(s),
        NameTok::Dynamic(e) => VerbName::Dynamic(Box::new(e)),
    }
}

/// Rewrites a parsed lvalue expression plus an rhs into the corresponding
/// `*Set` assignment node (property/index/range targets), or a plain
/// `Assign` for a bare variable.
fn assign_target(lhs: Expr, rhs: Expr) -> Expr {
    match lhs {
        Expr::PropGet(obj, name) => Expr::PropSet(obj, name, Box::new(rhs)),
        Expr::Index(obj, idx) => Expr::IndexSet(obj, idx, Box::new(rhs)),
        Expr::Range(obj, a, b) => Expr::RangeSet(obj, a, b, Box::new(rhs)),
        other => Expr::Assign(Box::new(other), Box::new(rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignment() {
        let prog = parse_program("x = 1 + 2;").unwrap();
        assert_eq!(prog.len(), 1);
        match &prog[0] {
            Stmt::Expr(Expr::Assign(lhs, rhs)) => {
                assert!(matches!(**lhs, Expr::Var(ref n) if n == "x"));
                assert!(matches!(**rhs, Expr::Binary(BinOp::Add, _, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_if_elseif_else() {
        let prog = parse_program("if (x) return 1; elseif (y) return 2; else return 3; endif").unwrap();
        assert_eq!(prog.len(), 1);
        assert!(matches!(&prog[0], Stmt::If(arms, els) if arms.len() == 2 && !els.is_empty()));
    }

    #[test]
    fn parses_try_except_finally() {
        let prog = parse_program(
            "try x = 1/0; except e (ANY) x = 0; finally y = 1; endtry",
        )
        .unwrap();
        assert!(matches!(&prog[0], Stmt::Try { excepts, finally: Some(_), .. } if excepts.len() == 1));
    }

    #[test]
    fn parses_verb_call_and_prop_get() {
        let prog = parse_program("x = obj:verb(1, 2); y = obj.name;").unwrap();
        assert_eq!(prog.len(), 2);
    }

    #[test]
    fn parses_scatter_assign() {
        let prog = parse_program("{a, ?b = 1, @rest} = args;").unwrap();
        match &prog[0] {
            Stmt::Expr(Expr::ScatterAssign(targets, _)) => assert_eq!(targets.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }
}
