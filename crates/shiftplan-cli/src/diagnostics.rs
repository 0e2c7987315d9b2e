//! Diagnostic formatting for CLI output
//!
//! - `TerminalEmitter`: rustc-style output to stderr
//! - `JsonEmitter`: collects diagnostics for the JSON report
//!
//! Both emitters honour `--strict` (warnings escalate to errors) and
//! `--quiet` (only errors are shown).
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success: no errors (warnings/hints/info allowed) |
//! | 1 | Failure: one or more errors emitted |
//!
//! `--quiet` never changes the exit code; `--strict` does.

use std::io::Write;
use std::process;

use serde::Serialize;
use shiftplan_core::{Diagnostic, DiagnosticEmitter, Severity};

// ============================================================================
// Exit Code
// ============================================================================

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// No errors (warnings/hints/info allowed)
    Success = 0,
    /// One or more errors emitted
    Failure = 1,
}

impl ExitCode {
    /// Exit code for a number of errors, already escalated by policy
    pub fn from_error_count(count: usize) -> Self {
        if count > 0 {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Diagnostic Config
// ============================================================================

/// Configuration for diagnostic output
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticConfig {
    /// Warnings become errors, hints become warnings
    pub strict: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}

impl DiagnosticConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Default::default()
        }
    }

    /// Escalate severity according to strict mode rules
    pub fn effective_severity(&self, severity: Severity) -> Severity {
        if self.strict {
            match severity {
                Severity::Warning => Severity::Error,
                Severity::Hint => Severity::Warning,
                s => s,
            }
        } else {
            severity
        }
    }

    pub fn should_show(&self, severity: Severity) -> bool {
        !self.quiet || self.effective_severity(severity) == Severity::Error
    }
}

// ============================================================================
// Terminal
// ============================================================================

/// Writes rustc-style diagnostics
pub struct TerminalEmitter<W: Write> {
    writer: W,
    config: DiagnosticConfig,
    error_count: usize,
    warning_count: usize,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, config: DiagnosticConfig) -> Self {
        Self {
            writer,
            config,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }

    fn write_diagnostic(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let severity = self.config.effective_severity(diagnostic.severity);
        match severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            _ => {}
        }
        if !self.config.should_show(diagnostic.severity) {
            return Ok(());
        }

        writeln!(
            self.writer,
            "{}[{}]: {}",
            severity, diagnostic.code, diagnostic.message
        )?;
        if !diagnostic.notes.is_empty() {
            writeln!(self.writer, "   |")?;
            for note in &diagnostic.notes {
                writeln!(self.writer, "   = {}", note)?;
            }
        }
        for hint in &diagnostic.hints {
            writeln!(self.writer, "   = hint: {}", hint)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        // stderr may be closed
        let _ = self.write_diagnostic(&diagnostic);
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Collects diagnostics for machine-readable output
pub struct JsonEmitter {
    diagnostics: Vec<JsonDiagnostic>,
    config: DiagnosticConfig,
    error_count: usize,
}

/// JSON representation of a diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct JsonDiagnostic {
    pub code: String,
    pub severity: String,
    pub message: String,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl JsonEmitter {
    pub fn new(config: DiagnosticConfig) -> Self {
        Self {
            diagnostics: Vec::new(),
            config,
            error_count: 0,
        }
    }

    pub fn diagnostics(&self) -> &[JsonDiagnostic] {
        &self.diagnostics
    }

    /// Drain the collected diagnostics, keeping the error count
    pub fn take(&mut self) -> Vec<JsonDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }
}

impl DiagnosticEmitter for JsonEmitter {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let severity = self.config.effective_severity(diagnostic.severity);
        if severity == Severity::Error {
            self.error_count += 1;
        }
        if !self.config.should_show(diagnostic.severity) {
            return;
        }
        self.diagnostics.push(JsonDiagnostic {
            code: diagnostic.code.as_str().to_string(),
            severity: severity.to_string(),
            message: diagnostic.message,
            notes: diagnostic.notes,
            hints: diagnostic.hints,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftplan_core::DiagnosticCode;

    fn warning() -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::S001UnassignableShift,
            "No participant is available for shift 2025-03-03 14:00",
        )
        .note("poll slot 2")
        .hint("ask participants to add availability")
    }

    fn error() -> Diagnostic {
        Diagnostic::new(DiagnosticCode::S004Infeasible, "No assignment satisfies the constraints")
    }

    #[test]
    fn terminal_output_format() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::default());
        emitter.emit(warning());
        assert_eq!(emitter.warning_count(), 1);
        assert!(emitter.exit_code().is_success());
        drop(emitter);

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("warning[S001]: No participant is available"));
        assert!(text.contains("   = poll slot 2"));
        assert!(text.contains("   = hint: ask participants"));
    }

    #[test]
    fn strict_escalates_warnings() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::strict());
        emitter.emit(warning());
        assert_eq!(emitter.error_count(), 1);
        assert_eq!(emitter.exit_code(), ExitCode::Failure);
        drop(emitter);
        assert!(String::from_utf8(output).unwrap().contains("error[S001]"));
    }

    #[test]
    fn quiet_hides_warnings_but_not_errors() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::quiet());
        emitter.emit(warning());
        emitter.emit(error());
        assert_eq!(emitter.exit_code(), ExitCode::Failure);
        drop(emitter);

        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("S001"));
        assert!(text.contains("error[S004]"));
    }

    #[test]
    fn json_collects_effective_severity() {
        let mut emitter = JsonEmitter::new(DiagnosticConfig::strict());
        emitter.emit_all(&[warning(), Diagnostic::new(DiagnosticCode::S003Solved, "ok")]);

        assert_eq!(emitter.diagnostics().len(), 2);
        assert_eq!(emitter.diagnostics()[0].severity, "error");
        assert_eq!(emitter.diagnostics()[1].severity, "info");
        assert_eq!(emitter.exit_code(), ExitCode::Failure);

        let taken = emitter.take();
        assert_eq!(taken.len(), 2);
        assert!(emitter.diagnostics().is_empty());
        assert_eq!(emitter.error_count(), 1);
    }

    #[test]
    fn exit_code_from_error_count() {
        assert!(ExitCode::from_error_count(0).is_success());
        assert_eq!(ExitCode::from_error_count(2), ExitCode::Failure);
    }
}
