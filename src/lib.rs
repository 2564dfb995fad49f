pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod forward;
pub mod model;
pub mod report;
pub mod reverse;
pub mod tracker;
pub mod world;


use wasm_bindgen::prelude::*;

use dialect::Dialect;
use forward::SqlGenerator;
use reverse::{EmptyReverseEngineeringNotifier, ReverseEngineeringOptions, reverse_engineer_script};
use tracker::{EmptyTracker, HistoryTracker};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Dialect by name, or detected from the DDL when absent or `auto`.
pub fn resolve_dialect(name: Option<&str>, source: &str) -> Result<Dialect, String> {
    match name {
        None | Some("auto") => Ok(Dialect::detect(source)),
        Some(name) => Dialect::from_str(name).ok_or_else(|| format!("Unknown dialect: {name}")),
    }
}

/// Reverse engineer a DDL dump and render the model as a create script.
#[wasm_bindgen(js_name = "reverseEngineerDdl")]
pub fn reverse_engineer_ddl(source: &str, dialect: Option<String>) -> Result<String, String> {
    let dialect = resolve_dialect(dialect.as_deref(), source)?;
    let (model, _) = reverse_engineer_script(
        source,
        dialect,
        Box::new(EmptyTracker),
        &ReverseEngineeringOptions::default(),
        &EmptyReverseEngineeringNotifier,
    )
    .map_err(|e| e.to_string())?;

    let statements = SqlGenerator::new(dialect).create_script(&model);
    Ok(statements
        .iter()
        .map(|s| format!("{s};\n"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Reverse engineer a DDL dump and return the change journal as JSON.
#[wasm_bindgen(js_name = "journalFromDdl")]
pub fn journal_from_ddl(source: &str, dialect: Option<String>) -> Result<String, String> {
    let dialect = resolve_dialect(dialect.as_deref(), source)?;
    let (model, _) = reverse_engineer_script(
        source,
        dialect,
        Box::new(HistoryTracker::new()),
        &ReverseEngineeringOptions::default(),
        &EmptyReverseEngineeringNotifier,
    )
    .map_err(|e| e.to_string())?;

    model
        .tracker()
        .journal()
        .ok_or_else(|| "model has no journal".to_string())?
        .to_json()
        .map_err(|e| e.to_string())
}
