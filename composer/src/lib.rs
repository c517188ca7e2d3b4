pub mod binding;
pub mod context;
pub mod directive;
pub mod error;
pub mod repeat;
pub mod scanner;
pub mod table;

pub use error::{ComposeDiagnostic, ComposeError};
pub use scanner::Engine;

use std::io::Write;

use doctree::Document;
use serde_json::Value;

/// A finished composition: the privately mutated tree plus any
/// structural diagnostics gathered along the way.
#[derive(Debug)]
pub struct Composed {
    pub document: Document,
    pub diagnostics: Vec<ComposeDiagnostic>,
}

/// Resolve every directive in `template` against `data`.
///
/// The template is cloned into private working memory first and never
/// mutated; the data root must be a JSON object (the only fatal data
/// error). Directive-level failures degrade to no-ops, so the worst
/// outcome is a partially resolved document.
pub fn compose(template: &Document, data: &Value) -> Result<Composed, ComposeError> {
    let root = data.as_object().ok_or(ComposeError::DataNotObject)?;
    let mut engine = Engine::new(template, root);
    engine.run();
    Ok(Composed {
        document: engine.doc,
        diagnostics: engine.diagnostics,
    })
}

/// Compose and serialize in one step, writing the rendered bytes to the
/// caller's sink.
pub fn compose_to(
    template: &Document,
    data: &Value,
    sink: &mut dyn Write,
) -> Result<Vec<ComposeDiagnostic>, ComposeError> {
    let composed = compose(template, data)?;
    composed.document.save(sink)?;
    Ok(composed.diagnostics)
}
