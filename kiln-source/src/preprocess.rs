//! Line-oriented preprocessor.
//!
//! Text lines have `$(prefix.Name)` references substituted. Lines of the
//! form `<?directive args ?>` control the output:
//!
//! ```text
//! <?define Name = value ?>    <?undef Name ?>
//! <?ifdef Name ?>             <?ifndef Name ?>
//! <?if Name = "value" ?>      <?if $(var.Name) != "value" ?>
//! <?else ?>                   <?endif ?>
//! <?include "common.kiln" ?>
//! <?error "message" ?>        <?warning "message" ?>
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use kiln_core::Platform;
use kiln_ir::SourceLocation;
use miette::{NamedSource, SourceSpan};
use tracing::debug;

use crate::{Error, PreprocessorExtension, Result};

/// Everything the preprocessor needs for one source file.
#[derive(Clone, Default)]
pub struct PreprocessContext {
    pub source_file: PathBuf,
    pub platform: Platform,
    pub include_search_paths: Vec<PathBuf>,
    pub variables: IndexMap<String, String>,
    pub extensions: Vec<Arc<dyn PreprocessorExtension>>,
}

/// A fully preprocessed document.
#[derive(Debug, Clone)]
pub struct Document {
    /// The source file the document was produced from.
    pub path: PathBuf,
    pub text: String,
    /// Raised by `<?warning ?>` directives.
    pub warnings: Vec<(SourceLocation, String)>,
    line_map: Vec<SourceLocation>,
}

impl Document {
    /// A document that needed no preprocessing.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let text = text.into();
        let line_map = (1..=text.lines().count())
            .map(|line| SourceLocation::new(&path, line))
            .collect();
        Self {
            path,
            text,
            warnings: Vec::new(),
            line_map,
        }
    }

    /// Original location of an output line (zero-based).
    pub fn origin(&self, line: usize) -> Option<&SourceLocation> {
        self.line_map.get(line)
    }

    /// Original location of a byte offset into [`Document::text`].
    pub fn location_at(&self, offset: usize) -> SourceLocation {
        let clamped = offset.min(self.text.len());
        let line = self.text.as_bytes()[..clamped]
            .iter()
            .filter(|b| **b == b'\n')
            .count();
        self.origin(line)
            .cloned()
            .unwrap_or_else(|| SourceLocation::new(&self.path, line + 1))
    }

    pub(crate) fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.path.display().to_string(), self.text.clone())
    }
}

/// Preprocess the context's source file.
pub fn preprocess(ctx: &PreprocessContext) -> Result<Document> {
    let mut preprocessor = Preprocessor {
        ctx,
        variables: ctx.variables.clone(),
        include_stack: Vec::new(),
        lines: Vec::new(),
        line_map: Vec::new(),
        warnings: Vec::new(),
    };

    preprocessor.process_file(&ctx.source_file)?;

    debug!(
        file = %ctx.source_file.display(),
        lines = preprocessor.lines.len(),
        "preprocessed source"
    );

    let mut text = preprocessor.lines.join("\n");
    text.push('\n');
    Ok(Document {
        path: ctx.source_file.clone(),
        text,
        warnings: preprocessor.warnings,
        line_map: preprocessor.line_map,
    })
}

struct SourceText {
    path: PathBuf,
    text: String,
}

/// A position in a source file, used to build errors.
struct Site<'a> {
    source: &'a SourceText,
    span: SourceSpan,
    location: SourceLocation,
}

impl Site<'_> {
    fn src(&self) -> NamedSource<String> {
        NamedSource::new(
            self.source.path.display().to_string(),
            self.source.text.clone(),
        )
    }

    fn unmatched(&self, message: impl Into<String>) -> Box<Error> {
        Box::new(Error::UnmatchedConditional {
            src: self.src(),
            span: self.span,
            location: self.location.clone(),
            message: message.into(),
        })
    }

    fn invalid_directive(&self, directive: &str) -> Box<Error> {
        Box::new(Error::InvalidDirective {
            src: self.src(),
            span: self.span,
            location: self.location.clone(),
            directive: directive.to_string(),
        })
    }
}

struct Conditional {
    active: bool,
    /// Whether some branch of this conditional has been taken.
    taken: bool,
    else_seen: bool,
    opened_span: SourceSpan,
    opened_line: usize,
}

struct Preprocessor<'a> {
    ctx: &'a PreprocessContext,
    variables: IndexMap<String, String>,
    include_stack: Vec<PathBuf>,
    lines: Vec<String>,
    line_map: Vec<SourceLocation>,
    warnings: Vec<(SourceLocation, String)>,
}

impl Preprocessor<'_> {
    fn process_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            Box::new(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let source = SourceText {
            path: path.to_path_buf(),
            text,
        };

        self.include_stack.push(canonical(path));
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut offset = 0;

        for (index, raw) in source.text.split_inclusive('\n').enumerate() {
            let line = raw.trim_end_matches(['\n', '\r']);
            let site = Site {
                source: &source,
                span: SourceSpan::from((offset, line.len())),
                location: SourceLocation::new(path, index + 1),
            };
            offset += raw.len();

            let active = conditionals.iter().all(|c| c.active);
            match parse_directive(line) {
                Some((keyword, args)) => {
                    self.directive(keyword, args, active, &site, &mut conditionals)?
                }
                None if active => {
                    let expanded = self.substitute(line, &site)?;
                    self.lines.push(expanded);
                    self.line_map.push(site.location.clone());
                }
                None => {}
            }
        }

        if let Some(open) = conditionals.last() {
            let site = Site {
                source: &source,
                span: open.opened_span,
                location: SourceLocation::new(path, open.opened_line),
            };
            return Err(site.unmatched("conditional is missing its <?endif ?>"));
        }

        self.include_stack.pop();
        Ok(())
    }

    fn directive(
        &mut self,
        keyword: &str,
        args: &str,
        active: bool,
        site: &Site<'_>,
        conditionals: &mut Vec<Conditional>,
    ) -> Result<()> {
        match keyword {
            "if" | "ifdef" | "ifndef" => {
                let condition = if !active {
                    false
                } else if keyword == "if" {
                    self.evaluate(args, site)?
                } else {
                    let defined = self.variables.contains_key(unquote(args));
                    (keyword == "ifdef") == defined
                };
                conditionals.push(Conditional {
                    active: condition,
                    taken: condition || !active,
                    else_seen: false,
                    opened_span: site.span,
                    opened_line: site.location.line,
                });
            }
            "else" => {
                let parent_active = conditionals
                    .iter()
                    .rev()
                    .skip(1)
                    .all(|c| c.active);
                let Some(current) = conditionals.last_mut() else {
                    return Err(site.unmatched("<?else ?> without a matching <?if ?>"));
                };
                if current.else_seen {
                    return Err(site.unmatched("duplicate <?else ?>"));
                }
                current.else_seen = true;
                current.active = parent_active && !current.taken;
                current.taken = true;
            }
            "endif" => {
                if conditionals.pop().is_none() {
                    return Err(site.unmatched("<?endif ?> without a matching <?if ?>"));
                }
            }
            _ if !active => {}
            "define" => {
                let (name, value) = match args.split_once('=') {
                    Some((name, value)) => (name.trim(), self.substitute(unquote(value), site)?),
                    None => (args.trim(), String::new()),
                };
                if name.is_empty() {
                    return Err(site.invalid_directive("define"));
                }
                self.variables.insert(name.to_string(), value);
            }
            "undef" => {
                self.variables.shift_remove(unquote(args));
            }
            "include" => {
                let file = self.substitute(unquote(args), site)?;
                self.include(&file, site)?;
            }
            "error" => {
                let message = self.substitute(unquote(args), site)?;
                return Err(Box::new(Error::User {
                    src: site.src(),
                    span: site.span,
                    location: site.location.clone(),
                    message,
                }));
            }
            "warning" => {
                let message = self.substitute(unquote(args), site)?;
                self.warnings.push((site.location.clone(), message));
            }
            other => return Err(site.invalid_directive(other)),
        }
        Ok(())
    }

    fn include(&mut self, file: &str, site: &Site<'_>) -> Result<()> {
        let including_dir = site.source.path.parent().map(Path::to_path_buf);
        let candidates = including_dir
            .iter()
            .chain(self.ctx.include_search_paths.iter())
            .map(|dir| dir.join(file));
        let found = if Path::new(file).is_absolute() {
            Some(PathBuf::from(file)).filter(|p| p.is_file())
        } else {
            candidates.into_iter().find(|p| p.is_file())
        };

        let Some(path) = found else {
            return Err(Box::new(Error::IncludeNotFound {
                src: site.src(),
                span: site.span,
                location: site.location.clone(),
                file: file.to_string(),
            }));
        };

        if self.include_stack.contains(&canonical(&path)) {
            return Err(Box::new(Error::RecursiveInclude {
                src: site.src(),
                span: site.span,
                location: site.location.clone(),
                file: file.to_string(),
            }));
        }

        debug!(file = %path.display(), "including file");
        self.process_file(&path)
    }

    /// Evaluate `<?if ?>` arguments: `a = b`, `a != b` or a defined name.
    fn evaluate(&self, args: &str, site: &Site<'_>) -> Result<bool> {
        let expanded = self.substitute(args, site)?;
        let operand = |s: &str| -> String {
            let trimmed = s.trim();
            if is_quoted(trimmed) {
                unquote(trimmed).to_string()
            } else {
                self.variables
                    .get(trimmed)
                    .cloned()
                    .unwrap_or_else(|| trimmed.to_string())
            }
        };

        if let Some((lhs, rhs)) = expanded.split_once("!=") {
            return Ok(operand(lhs) != operand(rhs));
        }
        if let Some((lhs, rhs)) = expanded.split_once('=') {
            return Ok(operand(lhs) == operand(rhs));
        }
        let name = expanded.trim();
        if name.is_empty() {
            return Err(site.invalid_directive("if"));
        }
        Ok(self.variables.contains_key(name))
    }

    fn substitute(&self, text: &str, site: &Site<'_>) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find(')') else {
                // unterminated reference is kept verbatim
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let reference = &after[..end];
            let value = self.lookup(reference, site).ok_or_else(|| {
                Box::new(Error::UndefinedVariable {
                    src: site.src(),
                    span: site.span,
                    location: site.location.clone(),
                    name: reference.to_string(),
                })
            })?;
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn lookup(&self, reference: &str, site: &Site<'_>) -> Option<String> {
        let (prefix, name) = reference.split_once('.').unwrap_or(("var", reference));
        match prefix {
            "var" => self.variables.get(name).cloned(),
            "env" => std::env::var(name).ok(),
            "sys" => match name.to_ascii_uppercase().as_str() {
                "PLATFORM" => Some(self.ctx.platform.to_string()),
                "SOURCEFILEPATH" => Some(site.source.path.display().to_string()),
                "SOURCEFILEDIR" => site
                    .source
                    .path
                    .parent()
                    .map(|dir| dir.display().to_string()),
                "CURRENTDIR" => std::env::current_dir()
                    .ok()
                    .map(|dir| dir.display().to_string()),
                _ => None,
            },
            _ => self
                .ctx
                .extensions
                .iter()
                .find(|ext| ext.prefixes().contains(&prefix))
                .and_then(|ext| ext.variable(prefix, name)),
        }
    }
}

fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let inner = line.trim().strip_prefix("<?")?.strip_suffix("?>")?.trim();
    Some(match inner.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (inner, ""),
    })
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

fn unquote(s: &str) -> &str {
    let trimmed = s.trim();
    if is_quoted(trimmed) {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
