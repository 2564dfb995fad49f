use serde::{Deserialize, Serialize};

use super::item::{ModelItem, SystemId};
use crate::catalog::lexer::{Lexer, Token};

/// A named SQL query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    id: SystemId,
    pub name: String,
    pub sql: String,
    /// Output columns, derived from the select list.
    pub attributes: Vec<String>,
}

impl View {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let attributes = derive_attributes(&sql);
        Self {
            id: SystemId::new(),
            name: name.into(),
            sql,
            attributes,
        }
    }
}

impl ModelItem for View {
    const KIND: &'static str = "View";

    fn system_id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

fn is_word(token: &Token, word: &str) -> bool {
    matches!(token, Token::Ident(s) if s.eq_ignore_ascii_case(word))
}

/// Output column names of the outermost select list.
///
/// Each item is named by its alias, otherwise by its last identifier.
pub fn derive_attributes(sql: &str) -> Vec<String> {
    let tokens = Lexer::new(sql).tokenize();
    let Some(start) = tokens.iter().position(|t| is_word(t, "SELECT")) else {
        return Vec::new();
    };

    let mut items: Vec<Vec<&Token>> = vec![Vec::new()];
    let mut depth = 0usize;
    for token in &tokens[start + 1..] {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                items.push(Vec::new());
                continue;
            }
            Token::Semicolon | Token::Eof => break,
            t if depth == 0 && is_word(t, "FROM") => break,
            t if depth == 0 && is_word(t, "DISTINCT") && items.len() == 1 && items[0].is_empty() => {
                continue;
            }
            _ => {}
        }
        if let Some(current) = items.last_mut() {
            current.push(token);
        }
    }

    items
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| {
            if let Some(pos) = item.iter().rposition(|t| is_word(t, "AS")) {
                if let Some(Token::Ident(alias)) = item.get(pos + 1) {
                    return alias.clone();
                }
            }
            match item.last() {
                Some(Token::Ident(name)) => name.clone(),
                Some(Token::Star) => "*".to_string(),
                _ => item
                    .iter()
                    .rev()
                    .find_map(|t| match t {
                        Token::Ident(name) => Some(name.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "?column?".to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_plain_columns() {
        let attrs = derive_attributes("select tb2_1, tb2_2 from table1");
        assert_eq!(attrs, ["tb2_1", "tb2_2"]);
    }

    #[test]
    fn test_derive_aliases_and_qualified_names() {
        let attrs = derive_attributes(
            "SELECT DISTINCT t.id, count(x.a, x.b) AS total, t.name label FROM t JOIN x ON t.id = x.id",
        );
        assert_eq!(attrs, ["id", "total", "label"]);
    }

    #[test]
    fn test_derive_star() {
        assert_eq!(derive_attributes("SELECT * FROM t"), ["*"]);
        assert!(derive_attributes("VALUES (1)").is_empty());
    }
}
