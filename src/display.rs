//! Console styling for user-facing messages.
//!
//! [`Styles`] is an explicit, immutable configuration value the caller passes
//! to whatever prints; there is no process-wide styling state. Errors carry a
//! distinguishing visual marker so they stand out from progress output.

use std::io::IsTerminal;

/// ANSI styling configuration for console output.
#[derive(Clone, Copy, Debug)]
pub struct Styles {
    colored: bool,
}

impl Styles {
    /// Styling with ANSI colors enabled.
    pub fn colored() -> Self {
        Self { colored: true }
    }

    /// Styling with colors disabled (pipes, dumb terminals, tests).
    pub fn plain() -> Self {
        Self { colored: false }
    }

    /// Colored when stderr is a terminal, plain otherwise.
    pub fn auto() -> Self {
        if std::io::stderr().is_terminal() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    fn wrap(&self, code: &str, s: &str) -> String {
        if self.colored {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    /// Render an error message with its marker.
    pub fn error(&self, s: &str) -> String {
        self.wrap("91", &format!("error: {s}"))
    }

    /// Render a warning message with its marker.
    pub fn warning(&self, s: &str) -> String {
        self.wrap("93", &format!("warning: {s}"))
    }

    /// Render a success/OK tag.
    pub fn ok(&self, s: &str) -> String {
        self.wrap("92", s)
    }

    /// Render a mismatch/failure tag.
    pub fn bad(&self, s: &str) -> String {
        self.wrap("91", s)
    }
}

/// Print a warning to stderr. Warnings never abort a run.
pub fn print_warning(styles: &Styles, msg: &str) {
    eprintln!("{}", styles.warning(msg));
}

/// Print an error to stderr. The caller decides whether to exit.
pub fn print_error(styles: &Styles, msg: &str) {
    eprintln!("{}", styles.error(msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_styles_add_markers_without_escape_codes() {
        let s = Styles::plain();
        assert_eq!(s.error("boom"), "error: boom");
        assert_eq!(s.warning("careful"), "warning: careful");
        assert_eq!(s.ok("OK"), "OK");
    }

    #[test]
    fn colored_styles_wrap_in_ansi() {
        let s = Styles::colored();
        assert!(s.error("boom").starts_with("\x1b[91m"));
        assert!(s.error("boom").ends_with("\x1b[0m"));
    }
}
