pub mod ansi;
pub mod json;
pub mod registry;
pub mod source_map;

use crate::fault::Fault;
use crate::loader::LoadError;

pub use source_map::SourceMap;

/// Byte range into a loaded source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into() });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// How diagnostics are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text { use_color: bool },
    Json,
}

impl Output {
    pub fn render(self, d: &Diagnostic) -> String {
        match self {
            Output::Text { use_color } => ansi::AnsiRenderer { use_color }.render(d),
            Output::Json => json::render(d),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

pub const LOAD_ERROR_CODE: &str = "C0VM-L001";

impl From<&Fault> for Diagnostic {
    fn from(f: &Fault) -> Self {
        let mut d = Diagnostic::error(f.to_string()).with_code(f.kind.code());
        if let Some(loc) = f.location {
            d = d
                .with_note(format!("in function #{} at pc {}", loc.function, loc.pc))
                .with_note(format!("call depth {}", loc.depth));
        }
        if f.kind == crate::fault::FaultKind::Malformed {
            d = d.with_suggestion("the module is corrupt or was built by an incompatible compiler");
        }
        d
    }
}

impl From<&LoadError> for Diagnostic {
    fn from(e: &LoadError) -> Self {
        let d = Diagnostic::error(e.to_string()).with_code(LOAD_ERROR_CODE);
        match e.span() {
            Some(span) => d.with_span(span, "here"),
            None => d,
        }
    }
}
