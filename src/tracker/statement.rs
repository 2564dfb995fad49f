use super::{ModelEvent, ModificationTracker};
use crate::dialect::Dialect;
use crate::error::VetoError;
use crate::forward::SqlGenerator;
use crate::model::Model;

/// Translates every accepted change into SQL of one dialect.
///
/// Changes the dialect cannot express are vetoed.
#[derive(Debug, Clone)]
pub struct StatementTracker {
    generator: SqlGenerator,
    statements: Vec<String>,
}

impl StatementTracker {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            generator: SqlGenerator::new(dialect),
            statements: Vec::new(),
        }
    }

    pub fn into_statements(self) -> Vec<String> {
        self.statements
    }
}

impl ModificationTracker for StatementTracker {
    fn announce(&self, event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
        self.generator
            .check(event)
            .map_err(|e| VetoError::new(e.to_string()))
    }

    fn record(&mut self, event: ModelEvent, model: &Model) {
        let statements = self.generator.render(&event, model);
        tracing::trace!(kind = event.kind(), count = statements.len(), "rendered statements");
        self.statements.extend(statements);
    }

    fn statements(&self) -> Option<&[String]> {
        Some(&self.statements)
    }
}
