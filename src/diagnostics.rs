use crate::language::errors::SyntaxError;
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{message}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message,
        }
    }
}

/// Renders every syntax error of a unit against its source text.
pub fn emit_syntax_errors(unit: &str, source: &str, errors: &[SyntaxError]) {
    let src = NamedSource::new(unit, source.to_string());
    for err in errors {
        let diagnostic = SyntaxDiagnostic::from_error(src.clone(), err.clone());
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

/// Prints a runtime failure with its reconstructed script stack trace.
pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
    if let Some(trace) = error.trace() {
        eprint!("{}", trace);
    }
}
