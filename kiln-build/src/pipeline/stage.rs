use serde::Serialize;

/// A stage of the build, used to attribute diagnostics and tracing spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Library,
    Link,
    Localize,
    Resolve,
    Bind,
    Layout,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Library => "library",
            Stage::Link => "link",
            Stage::Localize => "localize",
            Stage::Resolve => "resolve",
            Stage::Bind => "bind",
            Stage::Layout => "layout",
        }
    }

    /// A human-readable description of what this stage does.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Compile => "Preprocess and compile source documents",
            Stage::Library => "Combine compiled units into a library",
            Stage::Link => "Link compiled units and libraries",
            Stage::Localize => "Load localization files",
            Stage::Resolve => "Apply localizations and locate referenced files",
            Stage::Bind => "Emit the package and its debug symbols",
            Stage::Layout => "Place outputs and write build manifests",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
