//! Parser turning a DDL script into catalog statements.

use thiserror::Error;

use super::ColumnEntry;
use super::lexer::{Lexer, Spanned, Token};
use crate::model::ForeignKeyAction;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DdlParseError {
    #[error("Expected {expected}, found {found:?}")]
    Expected {
        expected: &'static str,
        found: Token,
    },
    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// Possibly schema-qualified object name, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

/// Table-level constraint, inline column constraints included.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    /// MySQL `KEY` / `INDEX` entries of a table body.
    Index {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        table: QualifiedName,
        /// Empty when the reference names no columns (the primary key).
        referenced: Vec<String>,
        on_delete: ForeignKeyAction,
        on_update: ForeignKeyAction,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: QualifiedName,
    pub columns: Vec<ColumnEntry>,
    pub constraints: Vec<TableConstraint>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    CreateIndex {
        name: String,
        table: QualifiedName,
        unique: bool,
        columns: Vec<String>,
    },
    CreateView {
        name: QualifiedName,
        sql: String,
    },
    AddConstraint {
        table: QualifiedName,
        constraint: TableConstraint,
    },
    DropTable(QualifiedName),
    DropView(QualifiedName),
    CreateSchema(String),
    Use(String),
    /// Anything the catalog does not track (INSERT, SET, GRANT...).
    Other,
}

/// Parse a DDL script into statements.
pub fn parse_statements(input: &str) -> Result<Vec<Statement>, DdlParseError> {
    let tokens = Lexer::new(input).tokenize_spanned();
    let mut parser = Parser::new(input, tokens);
    parser.parse()
}

fn is_word(token: &Token, word: &str) -> bool {
    matches!(token, Token::Ident(s) if s.eq_ignore_ascii_case(word))
}

/// Words that end a column's type name.
const TYPE_STOP_WORDS: &[&str] = &[
    "UNSIGNED", "SIGNED", "ZEROFILL", "COLLATE", "COMMENT", "GENERATED", "CHARSET", "IDENTITY",
];

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if is_word(self.current(), word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, expected: &'static str) -> DdlParseError {
        match self.current() {
            Token::Eof => DdlParseError::UnexpectedEof,
            found => DdlParseError::Expected {
                expected,
                found: found.clone(),
            },
        }
    }

    fn parse(&mut self) -> Result<Vec<Statement>, DdlParseError> {
        let mut statements = Vec::new();
        while self.current() != &Token::Eof {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            let statement = match self.current() {
                Token::Create => self.parse_create()?,
                Token::Alter => self.parse_alter()?,
                Token::Drop => self.parse_drop()?,
                Token::Use => {
                    self.advance();
                    let name = self.parse_ident("database name")?;
                    self.skip_statement();
                    Statement::Use(name)
                }
                _ => {
                    self.skip_statement();
                    Statement::Other
                }
            };
            statements.push(statement);
        }
        Ok(statements)
    }

    fn parse_ident(&mut self, expected: &'static str) -> Result<String, DdlParseError> {
        match self.current() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected(expected)),
        }
    }

    fn parse_qualified_name(&mut self, expected: &'static str) -> Result<QualifiedName, DdlParseError> {
        let first = self.parse_ident(expected)?;
        if self.eat(&Token::Dot) {
            let name = self.parse_ident(expected)?;
            return Ok(QualifiedName {
                schema: Some(first),
                name,
            });
        }
        Ok(QualifiedName {
            schema: None,
            name: first,
        })
    }

    fn skip_if_not_exists(&mut self) {
        if self.eat(&Token::If) {
            self.eat(&Token::Not);
            self.eat(&Token::Exists);
        }
    }

    fn parse_create(&mut self) -> Result<Statement, DdlParseError> {
        self.advance(); // CREATE

        // OR REPLACE, TEMPORARY, ALGORITHM=..., DEFINER=... before the object kind
        while !matches!(
            self.current(),
            Token::Table
                | Token::View
                | Token::Index
                | Token::Unique
                | Token::Schema
                | Token::Database
                | Token::Semicolon
                | Token::Eof
        ) {
            self.advance();
        }

        match self.current() {
            Token::Table => {
                self.advance();
                self.skip_if_not_exists();
                self.parse_create_table().map(Statement::CreateTable)
            }
            Token::View => {
                self.advance();
                self.skip_if_not_exists();
                self.parse_create_view()
            }
            Token::Unique | Token::Index => {
                let unique = self.eat(&Token::Unique);
                if !self.eat(&Token::Index) {
                    return Err(self.expected("INDEX"));
                }
                self.skip_if_not_exists();
                let name = self.parse_ident("index name")?;
                if !self.eat(&Token::On) {
                    return Err(self.expected("ON"));
                }
                self.eat(&Token::Only);
                let table = self.parse_qualified_name("table name")?;
                let columns = self.parse_column_list();
                self.skip_statement();
                Ok(Statement::CreateIndex {
                    name,
                    table,
                    unique,
                    columns,
                })
            }
            Token::Schema | Token::Database => {
                self.advance();
                self.skip_if_not_exists();
                let name = self.parse_ident("schema name")?;
                self.skip_statement();
                Ok(Statement::CreateSchema(name))
            }
            _ => {
                self.skip_statement();
                Ok(Statement::Other)
            }
        }
    }

    fn parse_create_view(&mut self) -> Result<Statement, DdlParseError> {
        let name = self.parse_qualified_name("view name")?;
        // optional column list
        if self.current() == &Token::LParen {
            self.skip_parenthesized();
        }
        if !self.eat_word("AS") {
            return Err(self.expected("AS"));
        }

        let start = self.tokens.get(self.pos).map_or(self.source.len(), |s| s.start);
        let mut end = start;
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            if let Some(spanned) = self.tokens.get(self.pos) {
                end = spanned.end;
            }
            self.advance();
        }
        self.eat(&Token::Semicolon);

        let sql = self.source.get(start..end).unwrap_or_default().trim().to_string();
        Ok(Statement::CreateView { name, sql })
    }

    fn parse_create_table(&mut self) -> Result<CreateTable, DdlParseError> {
        let name = self.parse_qualified_name("table name")?;
        if !self.eat(&Token::LParen) {
            // CREATE TABLE ... AS SELECT / LIKE: nothing to learn
            self.skip_statement();
            return Ok(CreateTable {
                name,
                columns: Vec::new(),
                constraints: Vec::new(),
                comment: None,
            });
        }

        let mut columns = Vec::new();
        let mut constraints = Vec::new();

        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => self.advance(),
                Token::Eof => return Err(DdlParseError::UnexpectedEof),
                Token::Constraint
                | Token::Primary
                | Token::Foreign
                | Token::Unique
                | Token::Index
                | Token::Key
                | Token::Check => {
                    if let Some(constraint) = self.parse_table_constraint()? {
                        constraints.push(constraint);
                    }
                }
                Token::Ident(_) => {
                    let (column, inline) = self.parse_column()?;
                    columns.push(column);
                    constraints.extend(inline);
                }
                _ => self.advance(),
            }
        }

        // table options: ENGINE=..., COMMENT='...'
        let mut comment = None;
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            if self.eat_word("COMMENT") {
                if let Token::Str(s) = self.current() {
                    comment = Some(s.clone());
                }
            }
            self.advance();
        }
        self.eat(&Token::Semicolon);

        Ok(CreateTable {
            name,
            columns,
            constraints,
            comment,
        })
    }

    /// Parse `[CONSTRAINT name] PRIMARY KEY | UNIQUE | FOREIGN KEY | KEY | INDEX | CHECK`.
    fn parse_table_constraint(&mut self) -> Result<Option<TableConstraint>, DdlParseError> {
        let mut name = None;
        if self.eat(&Token::Constraint) {
            if let Token::Ident(n) = self.current() {
                name = Some(n.clone());
                self.advance();
            }
        }

        match self.current() {
            Token::Primary => {
                self.advance();
                self.eat(&Token::Key);
                let columns = self.parse_column_list();
                self.skip_until_item_end();
                Ok(Some(TableConstraint::PrimaryKey { name, columns }))
            }
            Token::Unique => {
                self.advance();
                if !self.eat(&Token::Key) {
                    self.eat(&Token::Index);
                }
                if let Token::Ident(n) = self.current() {
                    name = name.or_else(|| Some(n.clone()));
                    self.advance();
                }
                let columns = self.parse_column_list();
                self.skip_until_item_end();
                Ok(Some(TableConstraint::Unique { name, columns }))
            }
            Token::Key | Token::Index => {
                self.advance();
                if let Token::Ident(n) = self.current() {
                    name = Some(n.clone());
                    self.advance();
                }
                let columns = self.parse_column_list();
                self.skip_until_item_end();
                Ok(Some(TableConstraint::Index { name, columns }))
            }
            Token::Foreign => {
                self.advance();
                if !self.eat(&Token::Key) {
                    return Err(self.expected("KEY"));
                }
                // MySQL allows an index name here
                if let Token::Ident(_) = self.current() {
                    self.advance();
                }
                let columns = self.parse_column_list();
                if !self.eat(&Token::References) {
                    return Err(self.expected("REFERENCES"));
                }
                let (table, referenced) = self.parse_reference()?;
                let (on_delete, on_update) = self.parse_on_actions();
                self.skip_until_item_end();
                Ok(Some(TableConstraint::ForeignKey {
                    name,
                    columns,
                    table,
                    referenced,
                    on_delete,
                    on_update,
                }))
            }
            _ => {
                // CHECK and anything unknown
                self.skip_until_item_end();
                Ok(None)
            }
        }
    }

    fn parse_column(&mut self) -> Result<(ColumnEntry, Vec<TableConstraint>), DdlParseError> {
        let name = self.parse_ident("column name")?;
        let mut column = ColumnEntry::new(name.clone(), "");
        let mut inline = Vec::new();

        // type name, possibly several words (DOUBLE PRECISION, CHARACTER VARYING)
        let mut words: Vec<String> = Vec::new();
        while let Token::Ident(word) = self.current() {
            let upper = word.to_uppercase();
            if TYPE_STOP_WORDS.contains(&upper.as_str())
                || (upper == "CHARACTER" && is_word(self.peek(1), "SET"))
                || (upper == "AS" && !words.is_empty())
            {
                break;
            }
            if !word.is_empty() {
                words.push(word.clone());
            }
            self.advance();
        }
        column.type_name = words.join(" ");

        if self.eat(&Token::LParen) {
            let mut numbers = Vec::new();
            let mut literals = Vec::new();
            while !matches!(self.current(), Token::RParen | Token::Eof) {
                match self.current() {
                    Token::Num(n) => numbers.push(n.clone()),
                    Token::Str(s) => literals.push(format!("'{}'", s.replace('\'', "''"))),
                    _ => {}
                }
                self.advance();
            }
            self.eat(&Token::RParen);
            column.size = numbers.first().and_then(|n| n.parse().ok());
            column.fraction = numbers.get(1).and_then(|n| n.parse().ok());
            if !literals.is_empty() {
                column.extra = Some(format!("({})", literals.join(",")));
            }
        }

        let mut extras: Vec<String> = column.extra.take().into_iter().collect();
        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Not => {
                    self.advance();
                    if self.eat(&Token::Null) {
                        column.nullable = false;
                    }
                }
                Token::Null => {
                    self.advance();
                    column.nullable = true;
                }
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.nullable = false;
                    inline.push(TableConstraint::PrimaryKey {
                        name: None,
                        columns: vec![name.clone()],
                    });
                }
                Token::Unique => {
                    self.advance();
                    self.eat(&Token::Key);
                    inline.push(TableConstraint::Unique {
                        name: None,
                        columns: vec![name.clone()],
                    });
                }
                Token::Default => {
                    self.advance();
                    column.default_value = Some(self.parse_default_value());
                }
                Token::References => {
                    self.advance();
                    let (table, referenced) = self.parse_reference()?;
                    let (on_delete, on_update) = self.parse_on_actions();
                    inline.push(TableConstraint::ForeignKey {
                        name: None,
                        columns: vec![name.clone()],
                        table,
                        referenced,
                        on_delete,
                        on_update,
                    });
                }
                Token::Increment => {
                    self.advance();
                    extras.push("AUTO_INCREMENT".to_string());
                }
                Token::Check => {
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::Constraint => {
                    self.advance();
                    if let Token::Ident(_) = self.current() {
                        self.advance();
                    }
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("COMMENT") => {
                    self.advance();
                    if let Token::Str(s) = self.current() {
                        column.comment = Some(s.clone());
                        self.advance();
                    }
                }
                Token::Ident(word)
                    if word.eq_ignore_ascii_case("UNSIGNED") || word.eq_ignore_ascii_case("ZEROFILL") =>
                {
                    extras.push(word.to_uppercase());
                    self.advance();
                }
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
        if !extras.is_empty() {
            column.extra = Some(extras.join(" "));
        }

        Ok((column, inline))
    }

    fn parse_default_value(&mut self) -> String {
        match self.current().clone() {
            Token::Str(s) => {
                self.advance();
                format!("'{}'", s.replace('\'', "''"))
            }
            Token::Num(n) => {
                self.advance();
                n
            }
            Token::Null => {
                self.advance();
                "NULL".to_string()
            }
            Token::Ident(s) => {
                self.advance();
                let mut value = s;
                // function calls like NOW()
                if self.eat(&Token::LParen) {
                    value.push('(');
                    value.push_str(&self.collect_until_paren());
                    value.push(')');
                }
                value
            }
            Token::LParen => {
                self.advance();
                format!("({})", self.collect_until_paren())
            }
            _ => String::new(),
        }
    }

    /// Collect tokens up to the matching close paren, which is consumed.
    fn collect_until_paren(&mut self) -> String {
        let mut parts = Vec::new();
        let mut depth = 1;

        loop {
            match self.current() {
                Token::LParen => {
                    depth += 1;
                    parts.push("(".to_string());
                }
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    parts.push(")".to_string());
                }
                Token::Ident(s) | Token::Num(s) => parts.push(s.clone()),
                Token::Str(s) => parts.push(format!("'{s}'")),
                Token::Comma => parts.push(",".to_string()),
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }

        parts.join(" ")
    }

    fn parse_reference(&mut self) -> Result<(QualifiedName, Vec<String>), DdlParseError> {
        let table = self.parse_qualified_name("referenced table")?;
        let columns = self.parse_column_list();
        Ok((table, columns))
    }

    fn parse_on_actions(&mut self) -> (ForeignKeyAction, ForeignKeyAction) {
        let mut on_delete = ForeignKeyAction::default();
        let mut on_update = ForeignKeyAction::default();
        while self.current() == &Token::On {
            self.advance();
            let is_delete = match self.current() {
                Token::Delete => true,
                Token::Update => false,
                _ => break,
            };
            self.advance();

            let action = match self.current().clone() {
                Token::Cascade => {
                    self.advance();
                    ForeignKeyAction::Cascade
                }
                Token::Restrict => {
                    self.advance();
                    ForeignKeyAction::Restrict
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("SET") => {
                    self.advance();
                    let action = match self.current() {
                        Token::Null => ForeignKeyAction::SetNull,
                        Token::Default => ForeignKeyAction::SetDefault,
                        _ => ForeignKeyAction::NoAction,
                    };
                    self.advance();
                    action
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("NO") => {
                    self.advance();
                    self.eat_word("ACTION");
                    ForeignKeyAction::NoAction
                }
                _ => ForeignKeyAction::NoAction,
            };
            if is_delete {
                on_delete = action;
            } else {
                on_update = action;
            }
        }
        (on_delete, on_update)
    }

    /// Column names of a parenthesized list; sort order and prefix lengths are dropped.
    fn parse_column_list(&mut self) -> Vec<String> {
        let mut cols = Vec::new();

        if !self.eat(&Token::LParen) {
            return cols;
        }

        let mut expect_name = true;
        loop {
            match self.current() {
                Token::Ident(name) if expect_name => {
                    cols.push(name.clone());
                    expect_name = false;
                    self.advance();
                }
                Token::Comma => {
                    expect_name = true;
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::LParen => self.skip_parenthesized(),
                Token::Eof => break,
                _ => self.advance(),
            }
        }

        cols
    }

    fn parse_alter(&mut self) -> Result<Statement, DdlParseError> {
        self.advance(); // ALTER

        if !self.eat(&Token::Table) {
            self.skip_statement();
            return Ok(Statement::Other);
        }
        self.eat(&Token::Only);
        self.skip_if_not_exists();
        let table = self.parse_qualified_name("table name")?;

        if !self.eat(&Token::Add) {
            self.skip_statement();
            return Ok(Statement::Other);
        }
        let constraint = match self.current() {
            Token::Constraint | Token::Primary | Token::Foreign | Token::Unique | Token::Index | Token::Key => {
                self.parse_table_constraint()?
            }
            _ => None,
        };
        self.skip_statement();

        Ok(match constraint {
            Some(constraint) => Statement::AddConstraint { table, constraint },
            None => Statement::Other,
        })
    }

    fn parse_drop(&mut self) -> Result<Statement, DdlParseError> {
        self.advance(); // DROP
        let statement = match self.current() {
            Token::Table => {
                self.advance();
                if self.eat(&Token::If) {
                    self.eat(&Token::Exists);
                }
                Statement::DropTable(self.parse_qualified_name("table name")?)
            }
            Token::View => {
                self.advance();
                if self.eat(&Token::If) {
                    self.eat(&Token::Exists);
                }
                Statement::DropView(self.parse_qualified_name("view name")?)
            }
            _ => Statement::Other,
        };
        self.skip_statement();
        Ok(statement)
    }

    fn skip_parenthesized(&mut self) {
        if self.current() != &Token::LParen {
            self.advance();
            return;
        }
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        self.eat(&Token::Semicolon);
    }

    /// Skip to the comma or close paren ending a table body item.
    fn skip_until_item_end(&mut self) {
        while !matches!(self.current(), Token::Comma | Token::RParen | Token::Eof | Token::Semicolon) {
            if self.current() == &Token::LParen {
                self.skip_parenthesized();
            } else {
                self.advance();
            }
        }
    }
}
