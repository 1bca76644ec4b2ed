//! Numeric diagnostic codes.
//!
//! Every error written to the diagnostics sink carries one of these codes.
//! The code of the last recorded error becomes the process exit status, so
//! none of them may be zero.

/// Reserved exit status when the compile stage produced no usable units.
pub const NO_INTERMEDIATES: i32 = 1;

// Preprocessor
pub const PREPROCESS_IO: i32 = 100;
pub const UNDEFINED_VARIABLE: i32 = 101;
pub const UNMATCHED_CONDITIONAL: i32 = 102;
pub const INCLUDE_NOT_FOUND: i32 = 103;
pub const RECURSIVE_INCLUDE: i32 = 104;
pub const INVALID_DIRECTIVE: i32 = 105;
pub const USER_ERROR: i32 = 106;

// Compiler
pub const SYNTAX_ERROR: i32 = 110;
pub const UNKNOWN_RECORD_KIND: i32 = 111;
pub const UNKNOWN_FIELD: i32 = 112;
pub const MISSING_FIELD: i32 = 113;
pub const INVALID_FIELD_VALUE: i32 = 114;
pub const DUPLICATE_RECORD_IN_UNIT: i32 = 115;
pub const NO_SOURCES: i32 = 116;

// Librarian
pub const LIBRARY_DUPLICATE_RECORD: i32 = 200;
pub const LIBRARY_FILE_NOT_FOUND: i32 = 201;
pub const LIBRARY_WRITE: i32 = 202;

// Library loading
pub const CORRUPT_CONTAINER: i32 = 300;
pub const UNSUPPORTED_CONTAINER_VERSION: i32 = 301;
pub const CONTAINER_IO: i32 = 302;

// Linker
pub const DUPLICATE_SYMBOL: i32 = 310;
pub const UNRESOLVED_REFERENCE: i32 = 311;
pub const MISSING_ENTRY_SECTION: i32 = 312;
pub const MULTIPLE_ENTRY_SECTIONS: i32 = 313;
pub const OUTPUT_WRITE: i32 = 314;

// Localization
pub const LOCALIZATION_PARSE: i32 = 400;

// Resolver
pub const UNRESOLVED_LOCALIZATION: i32 = 410;
pub const EMBEDDED_FILE_NOT_FOUND: i32 = 411;

// Binder
pub const BIND_IO: i32 = 500;
pub const INVALID_DELAYED_FIELD: i32 = 501;
pub const UNRESOLVED_DELAYED_FIELD: i32 = 502;

// Layout
pub const TRANSFER_FAILED: i32 = 600;
pub const MANIFEST_WRITE: i32 = 601;

// Extensions
pub const EXTENSION_FAILED: i32 = 900;
