//! Run-level accumulator for warnings and errors.
//!
//! Every stage receives a `&mut Diagnostics` and keeps going after a
//! data-quality problem; the caller reads `has_errors()` afterwards to decide
//! whether the dependent stage may run.  Each entry is mirrored to `tracing`
//! at the moment it is recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Feature type a diagnostic is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Network,
    Catchment,
    Groundwater,
    River,
    DemandSite,
    Connectivity,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Network => "network",
            Scope::Catchment => "catchment",
            Scope::Groundwater => "groundwater",
            Scope::River => "river",
            Scope::DemandSite => "demand site",
            Scope::Connectivity => "connectivity",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub scope: Scope,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, scope: Scope, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(scope = %scope, "{message}");
        self.entries.push(Diagnostic { severity: Severity::Warning, scope, message });
    }

    pub fn error(&mut self, scope: Scope, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(scope = %scope, "{message}");
        self.entries.push(Diagnostic { severity: Severity::Error, scope, message });
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn has_errors_in(&self, scope: Scope) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error && d.scope == scope)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn in_scope(&self, scope: Scope) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.scope == scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries grouped by scope, then severity; insertion order is kept inside
    /// each group.  This is the shape of the end-of-run report.
    pub fn grouped(&self) -> Vec<DiagnosticGroup<'_>> {
        let mut groups: Vec<DiagnosticGroup<'_>> = Vec::new();
        for d in &self.entries {
            match groups
                .iter_mut()
                .find(|g| g.scope == d.scope && g.severity == d.severity)
            {
                Some(g) => g.messages.push(&d.message),
                None => groups.push(DiagnosticGroup {
                    scope: d.scope,
                    severity: d.severity,
                    messages: vec![&d.message],
                }),
            }
        }
        groups.sort_by_key(|g| (g.scope, g.severity));
        groups
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticGroup<'a> {
    pub scope: Scope,
    pub severity: Severity,
    pub messages: Vec<&'a str>,
}
