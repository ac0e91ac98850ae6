// src/lexer.rs
use crate::error::{Error, LexError};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Program, Vars, Main, End,
    IntKw, FloatKw, Void,
    If, Else, While, Do, Print, Return,
    Ident(String), IntLit(i64), FloatLit(f64), StrLit(String),
    Plus, Minus, Star, Slash,
    Lt, Gt, EqEq, NotEq, Assign,
    Semicolon, Comma, Colon,
    LParen, RParen, LBrace, RBrace,
    Eof,
}

/// A token plus the source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { input: source.as_bytes(), pos: 0, line: 1 }
    }

    fn advance(&mut self) {
        if self.cur() == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
    }
    fn cur(&self) -> u8 { self.input.get(self.pos).copied().unwrap_or(0) }
    fn peek(&self) -> u8 { self.input.get(self.pos + 1).copied().unwrap_or(0) }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.cur() {
                b' ' | b'\t' | b'\n' | b'\r' => self.advance(),
                b'/' if self.peek() == b'/' => self.skip_line_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.input.len() && self.cur() != b'\n' {
            self.advance();
        }
    }

    /// Tokenizes the whole input. Unrecognized characters are skipped and
    /// collected; if any were seen the program is rejected after the pass.
    pub fn lex(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::with_capacity(self.input.len() / 6);
        let mut errors = Vec::new();

        while self.pos < self.input.len() {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }

            let line = self.line;
            let mut push = |tok| tokens.push(Token { tok, line });

            match self.cur() {
                b'0'..=b'9' => {
                    let start = self.pos;
                    while matches!(self.cur(), b'0'..=b'9') {
                        self.advance();
                    }

                    if self.cur() == b'.' && matches!(self.peek(), b'0'..=b'9') {
                        self.advance();
                        while matches!(self.cur(), b'0'..=b'9') {
                            self.advance();
                        }
                    }

                    let s = std::str::from_utf8(&self.input[start..self.pos])
                        .expect("digit run is ASCII");

                    if s.contains('.') {
                        match s.parse() {
                            Ok(v) => push(Tok::FloatLit(v)),
                            Err(_) => errors.push(LexError {
                                line,
                                message: format!("invalid float literal '{}'", s),
                            }),
                        }
                    } else {
                        match s.parse() {
                            Ok(v) => push(Tok::IntLit(v)),
                            Err(_) => errors.push(LexError {
                                line,
                                message: format!("invalid integer literal '{}'", s),
                            }),
                        }
                    }
                }
                b'"' => {
                    self.advance();
                    let start = self.pos;
                    while self.pos < self.input.len() && self.cur() != b'"' && self.cur() != b'\n' {
                        self.advance();
                    }
                    if self.cur() == b'"' {
                        let s = String::from_utf8_lossy(&self.input[start..self.pos]).to_string();
                        self.advance();
                        push(Tok::StrLit(s));
                    } else {
                        errors.push(LexError { line, message: "unterminated string".to_string() });
                    }
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    let start = self.pos;
                    while matches!(self.cur(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                        self.advance();
                    }
                    let word = std::str::from_utf8(&self.input[start..self.pos])
                        .expect("identifier run is ASCII");
                    let tok = match word {
                        "program" => Tok::Program,
                        "vars" => Tok::Vars,
                        "main" => Tok::Main,
                        "end" => Tok::End,
                        "int" => Tok::IntKw,
                        "float" => Tok::FloatKw,
                        "void" => Tok::Void,
                        "if" => Tok::If,
                        "else" => Tok::Else,
                        "while" => Tok::While,
                        "do" => Tok::Do,
                        "print" => Tok::Print,
                        "return" => Tok::Return,
                        _ => Tok::Ident(word.to_string()),
                    };
                    push(tok);
                }
                b'+' => { push(Tok::Plus); self.advance(); }
                b'-' => { push(Tok::Minus); self.advance(); }
                b'*' => { push(Tok::Star); self.advance(); }
                b'/' => { push(Tok::Slash); self.advance(); }
                b'=' => {
                    self.advance();
                    if self.cur() == b'=' {
                        self.advance();
                        push(Tok::EqEq);
                    } else {
                        push(Tok::Assign);
                    }
                }
                b'!' => {
                    self.advance();
                    if self.cur() == b'=' {
                        self.advance();
                        push(Tok::NotEq);
                    } else {
                        errors.push(LexError {
                            line,
                            message: "unexpected character '!'".to_string(),
                        });
                    }
                }
                b'<' => { push(Tok::Lt); self.advance(); }
                b'>' => { push(Tok::Gt); self.advance(); }
                b';' => { push(Tok::Semicolon); self.advance(); }
                b',' => { push(Tok::Comma); self.advance(); }
                b':' => { push(Tok::Colon); self.advance(); }
                b'(' => { push(Tok::LParen); self.advance(); }
                b')' => { push(Tok::RParen); self.advance(); }
                b'{' => { push(Tok::LBrace); self.advance(); }
                b'}' => { push(Tok::RBrace); self.advance(); }
                ch => {
                    errors.push(LexError {
                        line,
                        message: format!("unexpected character '{}'", ch as char),
                    });
                    self.advance();
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::Lex(errors));
        }
        tokens.push(Token { tok: Tok::Eof, line: self.line });
        Ok(tokens)
    }
}
