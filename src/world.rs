//! Hooks into the host application.

use crate::dialect::Dialect;
use crate::model::Model;

/// Capabilities a host exposes to the model lifecycle and to reverse
/// engineering. The core never assumes a user interface.
pub trait WorldConnector {
    /// A fresh model for the host's current settings.
    fn create_new_model(&self, dialect: Dialect) -> Model {
        Model::new(dialect)
    }

    /// Called once a model has been loaded or populated.
    fn initialize_loaded_model(&self, _model: &mut Model) {}

    fn notify_about_exception(&self, error: &dyn std::error::Error);

    fn set_status_text(&self, text: &str);

    fn supports_classpath_editor(&self) -> bool {
        false
    }

    fn supports_connection_editor(&self) -> bool {
        false
    }

    fn supports_exit_application(&self) -> bool {
        false
    }

    fn supports_preferences(&self) -> bool {
        false
    }

    fn supports_repositories(&self) -> bool {
        false
    }
}

/// Host without a user interface: status and errors go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessWorldConnector;

impl WorldConnector for HeadlessWorldConnector {
    fn initialize_loaded_model(&self, model: &mut Model) {
        tracing::debug!(
            dialect = %model.dialect(),
            tables = model.tables().len(),
            "model initialized"
        );
    }

    fn notify_about_exception(&self, error: &dyn std::error::Error) {
        tracing::error!("{error}");
    }

    fn set_status_text(&self, text: &str) {
        tracing::info!("{text}");
    }
}
