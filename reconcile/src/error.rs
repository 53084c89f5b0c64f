//! Error types and result definitions for reconciliation runs.
//!
//! Every failure in the pipeline is represented by a [`ReconcileError`], which carries an
//! [`ErrorKind`], a static description, optional dynamic detail, an optional source error and the
//! callsite where it was raised. Failures coming from several tasks at once (for example both
//! producers) are aggregated into a single error.
//!
//! Kinds are grouped into [`FaultCategory`] values, which is what gets reported to the operator
//! when a run aborts.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use reconcile_config::shared::ValidationError;

/// Convenient result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Detailed payload stored for single [`ReconcileError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for reconciliation runs.
#[derive(Debug, Clone)]
pub struct ReconcileError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, used when more than one task failed.
    Many {
        errors: Vec<ReconcileError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur during a run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source Errors
    SourceConnectionFailed,
    SourceFetchFailed,
    SourceQueryFailed,
    SourceDecodeFailed,

    // Data Integrity Errors
    DuplicateMatchKey,

    // Sink Errors
    SinkConnectionFailed,
    SinkWriteFailed,

    // Configuration Errors
    ConfigError,

    // Serialization Errors
    SerializationError,

    // Task Errors
    ProducerPanic,
    ProducerCancelled,

    // Unknown / Uncategorized
    Unknown,
}

/// Operator-facing grouping of [`ErrorKind`]s.
///
/// A run that aborts reports exactly one category per underlying error.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum FaultCategory {
    /// Network or database I/O against one of the two upstream sources.
    SourceFetch,
    /// The relational population violated the unique full-name contract.
    DataIntegrity,
    /// The durable sink rejected a write or delete.
    SinkWrite,
    /// The run configuration was invalid.
    Configuration,
    /// A task crashed or the pipeline reached an unexpected state.
    Internal,
}

impl FaultCategory {
    /// Returns a stable label for the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCategory::SourceFetch => "source fetch fault",
            FaultCategory::DataIntegrity => "data integrity fault",
            FaultCategory::SinkWrite => "sink write fault",
            FaultCategory::Configuration => "configuration fault",
            FaultCategory::Internal => "internal fault",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    /// Returns the [`FaultCategory`] this kind belongs to.
    pub fn category(&self) -> FaultCategory {
        match self {
            ErrorKind::SourceConnectionFailed
            | ErrorKind::SourceFetchFailed
            | ErrorKind::SourceQueryFailed
            | ErrorKind::SourceDecodeFailed => FaultCategory::SourceFetch,
            ErrorKind::DuplicateMatchKey => FaultCategory::DataIntegrity,
            ErrorKind::SinkConnectionFailed | ErrorKind::SinkWriteFailed => {
                FaultCategory::SinkWrite
            }
            ErrorKind::ConfigError => FaultCategory::Configuration,
            ErrorKind::SerializationError
            | ErrorKind::ProducerPanic
            | ErrorKind::ProducerCancelled
            | ErrorKind::Unknown => FaultCategory::Internal,
        }
    }
}

impl ReconcileError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns the [`FaultCategory`] of the first underlying error.
    pub fn category(&self) -> FaultCategory {
        self.kind().category()
    }

    /// Returns the detailed error information if available.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, or [`None`] for a single error.
    pub fn errors(&self) -> Option<&[ReconcileError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors because aggregates forward the first contained error as
    /// their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ReconcileError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for ReconcileError {
    fn eq(&self, other: &ReconcileError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail", detail)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes a labelled multi-line block with one level of indentation.
fn write_indented(f: &mut fmt::Formatter<'_>, label: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {label}: <empty>");
    }

    write!(f, "\n  {label}:")?;
    for line in body.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

/// Creates a [`ReconcileError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ReconcileError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ReconcileError {
        ReconcileError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`ReconcileError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ReconcileError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ReconcileError {
        ReconcileError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`ReconcileError`] from a vector of errors for aggregation.
///
/// A vector holding exactly one error returns that error unchanged.
impl<E> From<Vec<E>> for ReconcileError
where
    E: Into<ReconcileError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> ReconcileError {
        let location = Location::caller();

        let mut errors: Vec<ReconcileError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        ReconcileError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`serde_json::Error`] to [`ReconcileError`].
///
/// Syntax and data errors mean the directory answered with a body we cannot decode, which is a
/// source fault; anything else is a local serialization failure.
impl From<serde_json::Error> for ReconcileError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ReconcileError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::SourceDecodeFailed, "JSON deserialization failed")
            }
            serde_json::error::Category::Io => {
                (ErrorKind::SerializationError, "JSON I/O operation failed")
            }
        };

        let detail = err.to_string();
        ReconcileError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`reqwest::Error`] to [`ReconcileError`].
///
/// Body decoding failures map to [`ErrorKind::SourceDecodeFailed`], connect and timeout
/// failures to [`ErrorKind::SourceConnectionFailed`], everything else to
/// [`ErrorKind::SourceFetchFailed`].
impl From<reqwest::Error> for ReconcileError {
    #[track_caller]
    fn from(err: reqwest::Error) -> ReconcileError {
        let kind = if err.is_decode() {
            ErrorKind::SourceDecodeFailed
        } else if err.is_connect() || err.is_timeout() {
            ErrorKind::SourceConnectionFailed
        } else {
            ErrorKind::SourceFetchFailed
        };

        let detail = err.to_string();
        ReconcileError::from_components(
            kind,
            Cow::Borrowed("Directory request failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`ReconcileError`] on the source side.
///
/// Sink code maps its own `sqlx` failures explicitly to the sink kinds, so this conversion is
/// only reached by the relational source.
impl From<sqlx::Error> for ReconcileError {
    #[track_caller]
    fn from(err: sqlx::Error) -> ReconcileError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => ErrorKind::SourceConnectionFailed,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ErrorKind::SourceDecodeFailed
            }
            _ => ErrorKind::SourceQueryFailed,
        };

        let detail = err.to_string();
        ReconcileError::from_components(
            kind,
            Cow::Borrowed("Database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts a configuration [`ValidationError`] to [`ReconcileError`] with
/// [`ErrorKind::ConfigError`].
impl From<ValidationError> for ReconcileError {
    #[track_caller]
    fn from(err: ValidationError) -> ReconcileError {
        let detail = err.to_string();
        ReconcileError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
