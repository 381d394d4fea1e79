//! Diagnostics accumulated while processing one device.
//!
//! Every stage reports problems as [`Diagnostic`]s carrying the
//! device/peripheral/register path they arose in, so a batch driver can
//! decide per kind whether to skip, warn, or abort.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Processing continued with a heuristic choice.
    Warning,
    /// The affected peripheral or device produced no output.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A single problem with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Slash-separated path, e.g. `ATSAME54P20A/SERCOM/SERCOM_SPIM`.
    pub context: String,
    /// Short machine-friendly kind, e.g. `overlap-ambiguity`.
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(
        context: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            context: context.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn error(
        context: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            context: context.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Prefix the context with an outer scope (`outer/context`).
    pub fn within(mut self, outer: &str) -> Self {
        self.context = if self.context.is_empty() {
            outer.to_string()
        } else {
            format!("{outer}/{}", self.context)
        };
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.context, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_all_parts() {
        let d = Diagnostic::warning("SAME54/SERCOM", "overlap-ambiguity", "regions overlap");
        assert_eq!(
            d.to_string(),
            "warning[overlap-ambiguity] SAME54/SERCOM: regions overlap"
        );
    }

    #[test]
    fn within_prefixes_context() {
        let d = Diagnostic::error("SERCOM", "layout-overflow", "too big").within("SAME54");
        assert_eq!(d.context, "SAME54/SERCOM");
        assert!(d.is_error());

        let d = Diagnostic::error("", "missing-region", "no RAM").within("SAME54");
        assert_eq!(d.context, "SAME54");
    }

    #[test]
    fn severity_orders_warning_below_error() {
        assert!(Severity::Warning < Severity::Error);
    }
}
