//! SQL lexer for DDL scripts and view definitions.

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Drop,
    Table,
    View,
    Schema,
    Database,
    Use,
    Only,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Delete,
    Update,
    Cascade,
    Restrict,
    Constraint,
    Index,
    If,
    Exists,
    Increment, // AUTO_INCREMENT
    Check,

    // Identifiers and literals
    Ident(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Star,

    // End of input
    Eof,
}

/// A token with the byte range it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Splits DDL source into tokens, tracking byte offsets for spans.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { src: input, pos: 0 }
    }

    fn current(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    /// Character after the current one.
    fn lookahead(&self) -> Option<char> {
        let mut rest = self.src[self.pos..].chars();
        rest.next();
        rest.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume characters while `pred` holds and return the consumed slice.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.current().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn skip_block_comment(&mut self) {
        // positioned after "/*"
        while let Some(c) = self.bump() {
            if c == '*' && self.current() == Some('/') {
                self.bump();
                return;
            }
        }
    }

    /// Body of a quoted identifier or string. A doubled `close` stands for
    /// itself; backslash escapes only apply to strings.
    fn read_quoted(&mut self, close: char, escapes: bool) -> String {
        self.bump();
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == close {
                if self.current() != Some(close) {
                    break;
                }
                self.bump();
                out.push(close);
            } else if escapes && c == '\\' {
                match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.current() == Some('-') {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_digit());
        if self.current() == Some('.') {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        self.src[start..self.pos].to_string()
    }

    fn word(word: &str) -> Token {
        match word.to_ascii_uppercase().as_str() {
            "CREATE" => Token::Create,
            "ALTER" => Token::Alter,
            "ADD" => Token::Add,
            "DROP" => Token::Drop,
            "TABLE" => Token::Table,
            "VIEW" => Token::View,
            "SCHEMA" => Token::Schema,
            "DATABASE" => Token::Database,
            "USE" => Token::Use,
            "ONLY" => Token::Only,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "DELETE" => Token::Delete,
            "UPDATE" => Token::Update,
            "CASCADE" => Token::Cascade,
            "RESTRICT" => Token::Restrict,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "IF" => Token::If,
            "EXISTS" => Token::Exists,
            "AUTO_INCREMENT" | "AUTOINCREMENT" => Token::Increment,
            "CHECK" => Token::Check,
            // SET, NO, ACTION, AS, SELECT, FROM stay identifiers
            _ => Token::Ident(word.to_string()),
        }
    }

    /// Next token and the offset it starts at.
    fn scan(&mut self) -> (Token, usize) {
        loop {
            self.take_while(char::is_whitespace);
            let start = self.pos;
            let Some(c) = self.current() else {
                return (Token::Eof, start);
            };

            let token = match (c, self.lookahead()) {
                ('-', Some('-')) | ('#', _) => {
                    self.take_while(|c| c != '\n');
                    continue;
                }
                ('/', Some('*')) => {
                    self.pos += 2;
                    self.skip_block_comment();
                    continue;
                }
                ('-', Some(d)) if d.is_ascii_digit() => Token::Num(self.read_number()),
                (d, _) if d.is_ascii_digit() => Token::Num(self.read_number()),
                ('"', _) => Token::Ident(self.read_quoted('"', false)),
                ('`', _) => Token::Ident(self.read_quoted('`', false)),
                // SQL Server style [identifier]
                ('[', _) => Token::Ident(self.read_quoted(']', false)),
                ('\'', _) => Token::Str(self.read_quoted('\'', true)),
                (a, _) if a.is_alphabetic() || a == '_' => {
                    let word = self.take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '#'));
                    Self::word(word)
                }
                _ => {
                    self.bump();
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        ';' => Token::Semicolon,
                        '.' => Token::Dot,
                        '*' => Token::Star,
                        // operators carry no meaning for DDL
                        _ => continue,
                    }
                }
            };
            return (token, start);
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.scan().0
    }

    /// Collect all tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        self.tokenize_spanned().into_iter().map(|s| s.token).collect()
    }

    /// Collect all tokens with their source ranges. The last one is `Eof`.
    pub fn tokenize_spanned(&mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let (token, start) = self.scan();
            let done = token == Token::Eof;
            tokens.push(Spanned {
                token,
                start,
                end: self.pos,
            });
            if done {
                return tokens;
            }
        }
    }
}
