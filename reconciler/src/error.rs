use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::fmt::Write;

use reconcile::error::ReconcileError;
use sqlx::migrate::MigrateError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for reconciler operations.
pub type ReconcilerResult<T> = Result<T, ReconcilerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the reconciler binary.
///
/// Wraps [`ReconcileError`] for run faults and provides variants for startup failures.
#[derive(Debug)]
pub enum ReconcilerError {
    /// Fault raised by the reconciliation run.
    Reconcile(ReconcileError),
    /// Configuration or telemetry setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Sink database migration error.
    Migration(MigrateError, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReconcilerError {
    /// Returns the fault category reported to the operator.
    pub fn category(&self) -> &'static str {
        match self {
            ReconcilerError::Reconcile(err) => err.category().as_str(),
            ReconcilerError::Config(_, _) => "configuration fault",
            ReconcilerError::Migration(_, _) => "migration fault",
            ReconcilerError::Io(_, _) => "i/o fault",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReconcilerError::Reconcile(err) => err.backtrace(),
            ReconcilerError::Config(_, cb) => Some(&cb.0),
            ReconcilerError::Migration(_, cb) => Some(&cb.0),
            ReconcilerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error type.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReconcilerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "reconciler failed");
        let _ = writeln!(out, "category: {}", self.category());
        let _ = writeln!(out, "error: {self}");

        let aggregated = match self {
            ReconcilerError::Reconcile(err) => err.errors(),
            _ => None,
        };

        if let Some(errors) = aggregated {
            for (idx, inner) in errors.iter().enumerate() {
                let _ = writeln!(out, "fault {}: {}: {inner}", idx + 1, inner.category());
            }
        } else {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                let _ = writeln!(out, "cause {idx}: {err}");
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReconcilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcilerError::Reconcile(err) => write!(f, "{err}"),
            ReconcilerError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReconcilerError::Migration(source, _) => write!(f, "migration error: {source}"),
            ReconcilerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReconcilerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReconcilerError::Reconcile(err) => err.source(),
            ReconcilerError::Config(source, _) => Some(source.as_ref()),
            ReconcilerError::Migration(source, _) => Some(source),
            ReconcilerError::Io(source, _) => Some(source),
        }
    }
}

impl From<MigrateError> for ReconcilerError {
    fn from(err: MigrateError) -> Self {
        ReconcilerError::Migration(err, CapturedBacktrace::capture())
    }
}

impl From<std::io::Error> for ReconcilerError {
    fn from(err: std::io::Error) -> Self {
        ReconcilerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<ReconcileError> for ReconcilerError {
    fn from(err: ReconcileError) -> Self {
        ReconcilerError::Reconcile(err)
    }
}
