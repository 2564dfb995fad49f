//! Plain-text summary of a model, aligned by display width.

use unicode_width::UnicodeWidthStr;

use crate::dialect::Dialect;
use crate::model::{IndexKind, Model, TableSnapshot};

pub struct ReportStyle {
    pub indent: usize,
    /// Spaces between columns.
    pub gap: usize,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self { indent: 2, gap: 2 }
    }
}

impl ReportStyle {
    pub fn text_width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }

    /// Pad `text` with spaces to `width` display columns.
    fn pad(&self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(self.text_width(text));
        format!("{text}{}", " ".repeat(fill))
    }

    /// Lay out rows as columns, each as wide as its widest cell.
    pub fn align(&self, rows: &[Vec<String>]) -> Vec<String> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                rows.iter()
                    .filter_map(|r| r.get(c))
                    .map(|cell| self.text_width(cell))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        rows.iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, width)| self.pad(cell, *width))
                    .collect();
                let line = cells.join(&" ".repeat(self.gap));
                format!("{}{}", " ".repeat(self.indent), line.trim_end())
            })
            .collect()
    }

    fn table_lines(&self, table: &TableSnapshot, dialect: Dialect) -> Vec<String> {
        let key_columns = |kind: IndexKind| -> Vec<&str> {
            table
                .indexes
                .iter()
                .filter(|i| i.kind == kind)
                .flat_map(|i| i.expressions.iter().map(String::as_str))
                .collect()
        };
        let primary = key_columns(IndexKind::PrimaryKey);
        let unique = key_columns(IndexKind::Unique);

        let rows: Vec<Vec<String>> = table
            .attributes
            .iter()
            .map(|a| {
                let datatype = dialect
                    .find_data_type(&a.datatype)
                    .map(|t| t.render(a.size, a.fraction))
                    .unwrap_or_else(|| a.datatype.clone());
                let mut flags = Vec::new();
                if primary.contains(&a.name.as_str()) {
                    flags.push("PK");
                } else if unique.contains(&a.name.as_str()) {
                    flags.push("UK");
                }
                if !a.nullable {
                    flags.push("NOT NULL");
                }
                vec![a.name.clone(), datatype, flags.join(" ")]
            })
            .collect();

        let mut lines = vec![match &table.comment {
            Some(comment) => format!("{}  -- {comment}", table.name),
            None => table.name.clone(),
        }];
        lines.extend(self.align(&rows));
        lines
    }

    pub fn describe(&self, model: &Model) -> String {
        let snapshot = model.snapshot();
        let mut lines = Vec::new();

        for table in &snapshot.tables {
            lines.extend(self.table_lines(table, model.dialect()));
            lines.push(String::new());
        }

        if !snapshot.relations.is_empty() {
            lines.push("Relations".to_string());
            let rows: Vec<Vec<String>> = snapshot
                .relations
                .iter()
                .map(|r| {
                    let (keys, values): (Vec<&str>, Vec<&str>) = r
                        .mapping
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .unzip();
                    vec![
                        r.name.clone(),
                        format!("{}({})", r.importing_table, values.join(", ")),
                        "->".to_string(),
                        format!("{}({})", r.exporting_table, keys.join(", ")),
                    ]
                })
                .collect();
            lines.extend(self.align(&rows));
            lines.push(String::new());
        }

        if !snapshot.views.is_empty() {
            lines.push("Views".to_string());
            let rows: Vec<Vec<String>> = snapshot
                .views
                .iter()
                .map(|v| vec![v.name.clone(), v.attributes.join(", ")])
                .collect();
            lines.extend(self.align(&rows));
            lines.push(String::new());
        }

        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, Index, ModelItem, Table};

    #[test]
    fn test_ascii_width() {
        let style = ReportStyle::default();
        assert_eq!(style.text_width("User"), 4);
    }

    #[test]
    fn test_unicode_width() {
        let style = ReportStyle::default();
        // 全角文字は幅2
        assert_eq!(style.text_width("ユーザー"), 8);
        assert_eq!(style.pad("ユーザ", 8), "ユーザ  ");
    }

    #[test]
    fn test_align_uses_display_width() {
        let style = ReportStyle::default();
        let lines = style.align(&[
            vec!["名前".to_string(), "VARCHAR".to_string()],
            vec!["id".to_string(), "INT".to_string()],
        ]);
        assert_eq!(lines, ["  名前  VARCHAR", "  id    INT"]);
    }

    #[test]
    fn test_describe_model() {
        let mut model = Model::new(Dialect::MySQL);
        let id = Attribute::new("id", "INT").not_null();
        let pk = Index::primary_key("pk").with_attribute(id.system_id());
        model
            .add_table(
                Table::new("customer")
                    .with_attribute(id)
                    .with_attribute(Attribute::new("name", "VARCHAR").size(40))
                    .with_index(pk),
            )
            .unwrap();

        let report = ReportStyle::default().describe(&model);
        assert_eq!(
            report,
            "CUSTOMER\n  ID    INT          PK NOT NULL\n  NAME  VARCHAR(40)\n"
        );
    }
}
