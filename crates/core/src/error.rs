use thiserror::Error;

/// Classification used across crates to decide retry, circuit-breaker, and
/// reporting behavior. Every error in this workspace maps onto exactly one
/// of these kinds, regardless of which crate raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  InvalidInput,
  NotFound,
  Conflict,
  TransientThrottled,
  TransientTransport,
  PermanentAuthorization,
  PermanentParse,
  CircuitOpen,
  ResourceExhausted,
  Internal,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::InvalidInput => "invalid_input",
      ErrorKind::NotFound => "not_found",
      ErrorKind::Conflict => "conflict",
      ErrorKind::TransientThrottled => "transient.throttled",
      ErrorKind::TransientTransport => "transient.transport",
      ErrorKind::PermanentAuthorization => "permanent.authorization",
      ErrorKind::PermanentParse => "permanent.parse",
      ErrorKind::CircuitOpen => "circuit_open",
      ErrorKind::ResourceExhausted => "resource_exhausted",
      ErrorKind::Internal => "internal",
    }
  }

  /// Whether an operation that failed with this kind is safe to retry.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ErrorKind::TransientThrottled | ErrorKind::TransientTransport)
  }
}

impl std::str::FromStr for ErrorKind {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "invalid_input" => Ok(ErrorKind::InvalidInput),
      "not_found" => Ok(ErrorKind::NotFound),
      "conflict" => Ok(ErrorKind::Conflict),
      "transient.throttled" => Ok(ErrorKind::TransientThrottled),
      "transient.transport" => Ok(ErrorKind::TransientTransport),
      "permanent.authorization" => Ok(ErrorKind::PermanentAuthorization),
      "permanent.parse" => Ok(ErrorKind::PermanentParse),
      "circuit_open" => Ok(ErrorKind::CircuitOpen),
      "resource_exhausted" => Ok(ErrorKind::ResourceExhausted),
      "internal" => Ok(ErrorKind::Internal),
      other => Err(format!("unknown error kind: {other}")),
    }
  }
}

#[derive(Error, Debug)]
#[error("{kind:?}: {message}")]
pub struct Error {
  pub kind: ErrorKind,
  pub message: String,
  #[source]
  pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into(), source: None }
  }

  pub fn with_source(
    kind: ErrorKind,
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self { kind, message: message.into(), source: Some(Box::new(source)) }
  }

  pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
    Self::new(ErrorKind::NotFound, format!("{entity} {id} not found"))
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidInput, message)
  }

  pub fn conflict(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Conflict, message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Internal, message)
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Self {
    Self::with_source(ErrorKind::TransientTransport, err.to_string(), err)
  }
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Self::with_source(ErrorKind::PermanentParse, err.to_string(), err)
  }
}

pub type Result<T> = std::result::Result<T, Error>;
