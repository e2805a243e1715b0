//! Colored terminal output for release stages
//!
//! Provides consistent, colored CLI output with proper formatting

use crate::stages::{StageResult, StageStatus, VerificationReport};
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn marked(&self, marker: &str, color: Color, bold_marker: bool, message: &str) {
        if self.quiet {
            return;
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold_marker));
        let _ = write!(&mut buffer, "{}", marker);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print an info message (normal output)
    pub fn info(&self, message: &str) {
        self.marked("ℹ", Color::Cyan, false, message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.marked("✓", Color::Green, true, message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.marked("⚠", Color::Yellow, true, message);
    }

    /// Print a dry-run record
    pub fn dry_run(&self, message: &str) {
        self.marked("◇", Color::Magenta, true, message);
    }

    /// Print an error message (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();

        if buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true)).is_err()
            || write!(&mut buffer, "✗").is_err()
            || buffer.reset().is_err()
            || buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red))).is_err()
            || writeln!(&mut buffer, " {}", message).is_err()
            || buffer.reset().is_err()
            || bufwtr.print(&buffer).is_err()
        {
            eprintln!("✗ {}", message);
        }
    }

    /// Print a verbose/debug message (only in verbose mode)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.marked("→", Color::Blue, false, message);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(&mut buffer, "═══ {} ═══", title);
        let _ = buffer.reset();
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        if self.quiet {
            return;
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "    {}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.quiet {
            return;
        }

        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        let _ = self.bufwtr.print(&buffer);
    }

    /// Print a finished stage with its notes and outputs
    pub fn stage_result(&self, result: &StageResult) {
        let line = format!("{} {}", result.stage_name, result.status);
        match result.status {
            StageStatus::Succeeded => self.success(&line),
            StageStatus::Skipped => self.info(&line),
            StageStatus::Failed => self.error(&line),
            StageStatus::Pending | StageStatus::Running => self.println(&line),
        }

        for note in &result.notes {
            if note.starts_with("would ") {
                self.dry_run(note);
            } else {
                self.indent(note);
            }
        }
        for (key, value) in &result.outputs {
            self.verbose(&format!("{} = {}", key, value));
        }
    }

    /// Print every item of a verification report
    pub fn report(&self, report: &VerificationReport) {
        for item in &report.items {
            let detail = item.detail.as_deref().unwrap_or("");
            let line = format!("{}: {}", item.name, detail);
            if item.passed {
                self.success(&line);
            } else {
                self.error(&line);
            }
        }
        self.println(&report.summary());
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
