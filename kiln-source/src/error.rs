use std::path::PathBuf;

use kiln_core::codes;
use kiln_ir::SourceLocation;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Result type for source operations (boxed to reduce size on stack)
pub type Result<T> = std::result::Result<T, Box<Error>>;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("undefined preprocessor variable '$({name})'")]
    #[diagnostic(
        code(kiln::undefined_variable),
        help("define it with -d {name}=<value> or <?define {name} = value ?>")
    )]
    UndefinedVariable {
        #[source_code]
        src: NamedSource<String>,
        #[label("used here")]
        span: SourceSpan,
        location: SourceLocation,
        name: String,
    },

    #[error("{message}")]
    #[diagnostic(code(kiln::unmatched_conditional))]
    UnmatchedConditional {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        location: SourceLocation,
        message: String,
    },

    #[error("included file '{file}' was not found")]
    #[diagnostic(
        code(kiln::include_not_found),
        help("add its directory to the include search paths with -I")
    )]
    IncludeNotFound {
        #[source_code]
        src: NamedSource<String>,
        #[label("included here")]
        span: SourceSpan,
        location: SourceLocation,
        file: String,
    },

    #[error("'{file}' includes itself")]
    #[diagnostic(code(kiln::recursive_include))]
    RecursiveInclude {
        #[source_code]
        src: NamedSource<String>,
        #[label("recursive include")]
        span: SourceSpan,
        location: SourceLocation,
        file: String,
    },

    #[error("invalid preprocessor directive '{directive}'")]
    #[diagnostic(
        code(kiln::invalid_directive),
        help("valid directives are: define, undef, if, ifdef, ifndef, else, endif, include, error, warning")
    )]
    InvalidDirective {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        location: SourceLocation,
        directive: String,
    },

    #[error("{message}")]
    #[diagnostic(code(kiln::user_error))]
    User {
        #[source_code]
        src: NamedSource<String>,
        #[label("raised here")]
        span: SourceSpan,
        location: SourceLocation,
        message: String,
    },

    #[error("failed to parse source document")]
    #[diagnostic(code(kiln::syntax_error))]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error here")]
        span: Option<SourceSpan>,
        location: Option<SourceLocation>,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown record kind '{kind}'")]
    #[diagnostic(
        code(kiln::unknown_record_kind),
        help("is the extension that defines '{kind}' enabled?")
    )]
    UnknownRecordKind {
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown kind")]
        span: SourceSpan,
        location: SourceLocation,
        kind: String,
    },

    #[error("{kind} '{id}' has unknown field '{field}'")]
    #[diagnostic(code(kiln::unknown_field))]
    UnknownField {
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown field")]
        span: SourceSpan,
        location: SourceLocation,
        kind: String,
        id: String,
        field: String,
    },

    #[error("{kind} '{id}' is missing required field '{field}'")]
    #[diagnostic(code(kiln::missing_field))]
    MissingField {
        #[source_code]
        src: NamedSource<String>,
        #[label("declared here")]
        span: SourceSpan,
        location: SourceLocation,
        kind: String,
        id: String,
        field: String,
    },

    #[error("field '{field}' expects {expected}, found {found}")]
    #[diagnostic(code(kiln::invalid_field_value))]
    InvalidFieldValue {
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid value")]
        span: SourceSpan,
        location: SourceLocation,
        field: String,
        expected: String,
        found: String,
    },

    #[error("duplicate {kind} '{id}'")]
    #[diagnostic(code(kiln::duplicate_record))]
    DuplicateRecord {
        #[source_code]
        src: NamedSource<String>,
        #[label("already declared in this document")]
        span: SourceSpan,
        location: SourceLocation,
        kind: String,
        id: String,
    },

    #[error("{extension}: {message}")]
    #[diagnostic(code(kiln::extension_validation))]
    Validation {
        #[source_code]
        src: NamedSource<String>,
        #[label("rejected here")]
        span: SourceSpan,
        location: SourceLocation,
        extension: String,
        message: String,
    },

    #[error("failed to parse localization file")]
    #[diagnostic(code(kiln::localization_parse))]
    Localization {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error here")]
        span: Option<SourceSpan>,
        location: Option<SourceLocation>,
        #[source]
        source: toml::de::Error,
    },
}

impl Error {
    /// Diagnostic code for this error.
    pub fn number(&self) -> i32 {
        match self {
            Error::Io { .. } => codes::PREPROCESS_IO,
            Error::UndefinedVariable { .. } => codes::UNDEFINED_VARIABLE,
            Error::UnmatchedConditional { .. } => codes::UNMATCHED_CONDITIONAL,
            Error::IncludeNotFound { .. } => codes::INCLUDE_NOT_FOUND,
            Error::RecursiveInclude { .. } => codes::RECURSIVE_INCLUDE,
            Error::InvalidDirective { .. } => codes::INVALID_DIRECTIVE,
            Error::User { .. } => codes::USER_ERROR,
            Error::Syntax { .. } => codes::SYNTAX_ERROR,
            Error::UnknownRecordKind { .. } => codes::UNKNOWN_RECORD_KIND,
            Error::UnknownField { .. } => codes::UNKNOWN_FIELD,
            Error::MissingField { .. } => codes::MISSING_FIELD,
            Error::InvalidFieldValue { .. } | Error::Validation { .. } => {
                codes::INVALID_FIELD_VALUE
            }
            Error::DuplicateRecord { .. } => codes::DUPLICATE_RECORD_IN_UNIT,
            Error::Localization { .. } => codes::LOCALIZATION_PARSE,
        }
    }

    /// Location in the original source, where one is known.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Error::Io { .. } => None,
            Error::Syntax { location, .. } | Error::Localization { location, .. } => {
                location.as_ref()
            }
            Error::UndefinedVariable { location, .. }
            | Error::UnmatchedConditional { location, .. }
            | Error::IncludeNotFound { location, .. }
            | Error::RecursiveInclude { location, .. }
            | Error::InvalidDirective { location, .. }
            | Error::User { location, .. }
            | Error::UnknownRecordKind { location, .. }
            | Error::UnknownField { location, .. }
            | Error::MissingField { location, .. }
            | Error::InvalidFieldValue { location, .. }
            | Error::DuplicateRecord { location, .. }
            | Error::Validation { location, .. } => Some(location),
        }
    }
}

/// Every error found while compiling one document.
#[derive(Debug, Error, Diagnostic)]
#[error("compilation failed with {} error(s)", errors.len())]
pub struct CompileErrors {
    #[related]
    pub errors: Vec<Error>,
}

impl From<Box<Error>> for CompileErrors {
    fn from(error: Box<Error>) -> Self {
        Self {
            errors: vec![*error],
        }
    }
}
