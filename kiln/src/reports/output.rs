//! Output trait for rendering reports.

/// Target output for reports.
///
/// Reports describe *what* to output using these semantic methods.
/// Implementations decide *how* to render it.
pub trait Output {
    /// Render an error line.
    fn error(&mut self, text: &str);

    /// Render a warning line.
    fn warning(&mut self, text: &str);

    /// Render an informational line.
    fn info(&mut self, text: &str);

    /// Render a blank line.
    fn newline(&mut self);
}

/// A report that can render itself to an output.
pub trait Report {
    /// Render this report to the given output.
    fn render(&self, out: &mut dyn Output);
}

/// Terminal output; everything goes to stderr so stdout stays free for
/// tooling.
pub struct TerminalOutput;

impl TerminalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for TerminalOutput {
    fn error(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn warning(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn info(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn newline(&mut self) {
        eprintln!();
    }
}

/// Collects rendered lines, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct BufferOutput {
    pub lines: Vec<String>,
}

#[cfg(test)]
impl BufferOutput {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
impl Output for BufferOutput {
    fn error(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn warning(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn info(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn newline(&mut self) {
        self.lines.push(String::new());
    }
}
