// src/parser.rs
use crate::ast::*;
use crate::error::Error;
use crate::lexer::{Tok, Token};

type PResult<T> = Result<T, Error>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn cur(&self) -> &Tok {
        self.tokens.get(self.pos).map(|t| &t.tok).unwrap_or(&Tok::Eof)
    }

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos + 1).map(|t| &t.tok).unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> &Tok {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1].tok
    }

    fn eat(&mut self, expected: Tok) -> PResult<()> {
        if std::mem::discriminant(self.cur()) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", expected, self.cur())))
        }
    }

    fn err(&self, message: String) -> Error {
        Error::Parse { line: self.line(), message }
    }

    /// programa : "program" ID ";" [vars] {func} "main" body "end"
    pub fn parse(&mut self) -> PResult<Program> {
        self.eat(Tok::Program)?;
        let name = self.ident()?;
        self.eat(Tok::Semicolon)?;

        let globals = if matches!(self.cur(), Tok::Vars) {
            self.vars_section()?
        } else {
            vec![]
        };

        let mut functions = vec![];
        while matches!(self.cur(), Tok::IntKw | Tok::FloatKw | Tok::Void) {
            functions.push(self.func_decl()?);
        }

        self.eat(Tok::Main)?;
        let main = self.body()?;
        self.eat(Tok::End)?;
        if !matches!(self.cur(), Tok::Eof) {
            return Err(self.err(format!("trailing input after 'end': {:?}", self.cur())));
        }

        Ok(Program { name, globals, functions, main })
    }

    /// vars : "vars" ID {"," ID} ":" type ";" {more declaration lines}
    fn vars_section(&mut self) -> PResult<Vec<VarDecl>> {
        self.eat(Tok::Vars)?;
        let mut decls = vec![];
        loop {
            let mut names = vec![self.ident()?];
            while matches!(self.cur(), Tok::Comma) {
                self.advance();
                names.push(self.ident()?);
            }
            self.eat(Tok::Colon)?;
            let ty = self.type_name()?;
            self.eat(Tok::Semicolon)?;
            decls.push(VarDecl { names, ty });
            if !matches!(self.cur(), Tok::Ident(_)) {
                break;
            }
        }
        Ok(decls)
    }

    /// func : ("int" | "float" | "void") ID "(" params ")" "{" [vars] body "}" ";"
    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let return_type = match self.advance().clone() {
            Tok::IntKw => Some(Type::Int),
            Tok::FloatKw => Some(Type::Float),
            Tok::Void => None,
            t => return Err(self.err(format!("expected a return type, found {:?}", t))),
        };
        let name = self.ident()?;
        self.eat(Tok::LParen)?;
        let params = self.params()?;
        self.eat(Tok::RParen)?;
        self.eat(Tok::LBrace)?;
        let locals = if matches!(self.cur(), Tok::Vars) {
            self.vars_section()?
        } else {
            vec![]
        };
        let body = self.body()?;
        self.eat(Tok::RBrace)?;
        self.eat(Tok::Semicolon)?;
        Ok(FuncDecl { name, return_type, params, locals, body })
    }

    fn params(&mut self) -> PResult<Vec<Param>> {
        let mut p = vec![];
        if matches!(self.cur(), Tok::RParen) {
            return Ok(p);
        }
        loop {
            let name = self.ident()?;
            self.eat(Tok::Colon)?;
            let ty = self.type_name()?;
            p.push(Param { name, ty });
            if !matches!(self.cur(), Tok::Comma) {
                break;
            }
            self.advance();
        }
        Ok(p)
    }

    fn type_name(&mut self) -> PResult<Type> {
        match self.advance().clone() {
            Tok::IntKw => Ok(Type::Int),
            Tok::FloatKw => Ok(Type::Float),
            t => Err(self.err(format!("expected 'int' or 'float', found {:?}", t))),
        }
    }

    fn body(&mut self) -> PResult<Vec<Stmt>> {
        self.eat(Tok::LBrace)?;
        let mut stmts = vec![];
        while !matches!(self.cur(), Tok::RBrace) {
            stmts.push(self.stmt()?);
        }
        self.eat(Tok::RBrace)?;
        Ok(stmts)
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        match self.cur() {
            Tok::Ident(_) => {
                if matches!(self.peek(), Tok::LParen) {
                    let callee = self.ident()?;
                    let args = self.call_args()?;
                    self.eat(Tok::Semicolon)?;
                    Ok(Stmt::Call { callee, args })
                } else {
                    let name = self.ident()?;
                    self.eat(Tok::Assign)?;
                    let value = self.expr()?;
                    self.eat(Tok::Semicolon)?;
                    Ok(Stmt::Assign { name, value })
                }
            }
            Tok::If => self.conditional(),
            Tok::While => self.while_loop(),
            Tok::Print => self.print_stmt(),
            Tok::Return => {
                self.advance();
                let value = self.expr()?;
                self.eat(Tok::Semicolon)?;
                Ok(Stmt::Return(value))
            }
            t => Err(self.err(format!("expected a statement, found {:?}", t))),
        }
    }

    /// conditional : "if" "(" expr ")" body ["else" body] ";"
    fn conditional(&mut self) -> PResult<Stmt> {
        self.eat(Tok::If)?;
        self.eat(Tok::LParen)?;
        let cond = self.expr()?;
        self.eat(Tok::RParen)?;
        let then = self.body()?;
        let otherwise = if matches!(self.cur(), Tok::Else) {
            self.advance();
            Some(self.body()?)
        } else {
            None
        };
        self.eat(Tok::Semicolon)?;
        Ok(Stmt::If { cond, then, otherwise })
    }

    /// loop : "while" "(" expr ")" "do" body ";"
    fn while_loop(&mut self) -> PResult<Stmt> {
        self.eat(Tok::While)?;
        self.eat(Tok::LParen)?;
        let cond = self.expr()?;
        self.eat(Tok::RParen)?;
        self.eat(Tok::Do)?;
        let body = self.body()?;
        self.eat(Tok::Semicolon)?;
        Ok(Stmt::While { cond, body })
    }

    fn print_stmt(&mut self) -> PResult<Stmt> {
        self.eat(Tok::Print)?;
        self.eat(Tok::LParen)?;
        let mut items = vec![self.print_item()?];
        while matches!(self.cur(), Tok::Comma) {
            self.advance();
            items.push(self.print_item()?);
        }
        self.eat(Tok::RParen)?;
        self.eat(Tok::Semicolon)?;
        Ok(Stmt::Print(items))
    }

    fn print_item(&mut self) -> PResult<PrintItem> {
        if let Tok::StrLit(s) = self.cur() {
            let text = s.clone();
            self.advance();
            Ok(PrintItem::Text(text))
        } else {
            Ok(PrintItem::Value(self.expr()?))
        }
    }

    fn ident(&mut self) -> PResult<String> {
        if let Tok::Ident(s) = self.cur() {
            let n = s.clone();
            self.advance();
            Ok(n)
        } else {
            Err(self.err(format!("expected identifier, found {:?}", self.cur())))
        }
    }

    /// expr : additive [("<" | ">" | "==" | "!=") additive]
    ///
    /// A single, non-chaining relational level over the arithmetic levels.
    fn expr(&mut self) -> PResult<Expr> {
        let left = self.additive()?;
        let op = match self.cur() {
            Tok::Lt => BinOp::Lt,
            Tok::Gt => BinOp::Gt,
            Tok::EqEq => BinOp::Eq,
            Tok::NotEq => BinOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.cur() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.cur() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn factor(&mut self) -> PResult<Expr> {
        match self.cur() {
            Tok::LParen => {
                self.advance();
                let e = self.expr()?;
                self.eat(Tok::RParen)?;
                Ok(e)
            }
            Tok::Plus => {
                self.advance();
                self.factor()
            }
            Tok::Minus => {
                self.advance();
                let e = self.factor()?;
                Ok(Expr::Neg(Box::new(e)))
            }
            Tok::IntLit(v) => {
                let v = *v;
                self.advance();
                Ok(Expr::Int(v))
            }
            Tok::FloatLit(v) => {
                let v = *v;
                self.advance();
                Ok(Expr::Float(v))
            }
            Tok::Ident(_) => {
                let name = self.ident()?;
                if matches!(self.cur(), Tok::LParen) {
                    let args = self.call_args()?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            t => Err(self.err(format!("unexpected token in expression: {:?}", t))),
        }
    }

    fn call_args(&mut self) -> PResult<Vec<Expr>> {
        self.eat(Tok::LParen)?;
        let mut args = vec![];
        if !matches!(self.cur(), Tok::RParen) {
            args.push(self.expr()?);
            while matches!(self.cur(), Tok::Comma) {
                self.advance();
                args.push(self.expr()?);
            }
        }
        self.eat(Tok::RParen)?;
        Ok(args)
    }
}
