use std::fmt;
use std::io;
use std::ops::Range;

/// Fatal composition errors. Data-related directive failures never reach
/// this type; they degrade to per-directive no-ops.
#[derive(Debug)]
pub enum ComposeError {
    /// The data context root was not a JSON object.
    DataNotObject,
    /// Writing the serialized output to the caller's sink failed.
    Io(io::Error),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::DataNotObject => {
                write!(f, "data context root must be a JSON object")
            }
            ComposeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ComposeError {}

impl From<io::Error> for ComposeError {
    fn from(e: io::Error) -> Self {
        ComposeError::Io(e)
    }
}

/// A structural problem found while composing, enriched with the source
/// location of the offending placeholder. Never fatal: composition
/// continues with the affected pass truncated.
#[derive(Debug, Clone)]
pub struct ComposeDiagnostic {
    pub message: String,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
    pub is_warning: bool,
}

impl ComposeDiagnostic {
    /// A `@Repeat` whose matching `@EndRepeat` never arrived: the seek
    /// swallowed the remainder of the pass.
    pub fn mismatched_repeat(array_path: &str, span: Range<usize>, source_id: usize) -> Self {
        ComposeDiagnostic {
            message: format!(
                "@Repeat{{{}}} has no matching @EndRepeat; directives after it were left unresolved",
                array_path
            ),
            span: Some(span),
            source_id,
            is_warning: false,
        }
    }
}

impl fmt::Display for ComposeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
