use thiserror::Error;

/// The kind of the error of the hala-meshlet crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HalaMeshletErrorKind {
  /// A programming mistake at the call site, e.g. an invalid budget or a bad selection.
  Configuration,
  /// A meshlet does not fit into the requested fixed GPU layout.
  Capacity,
  /// Reading or writing a cache file failed.
  Io,
  /// Encoding or decoding a value failed.
  Serialization,
  /// Loading a model failed.
  Loading,
}

/// The error type of the hala-meshlet crate.
#[derive(Error, Debug)]
pub struct HalaMeshletError {
  kind: HalaMeshletErrorKind,
  msg: String,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The implementation of the error type of the hala-meshlet crate.
impl HalaMeshletError {
  /// Create a new error.
  /// param kind: The kind of the error.
  /// param msg: The message of the error.
  /// param source: The source of the error.
  /// return: The error.
  pub fn new(kind: HalaMeshletErrorKind, msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      kind,
      msg: msg.to_string(),
      source,
    }
  }

  /// Create a new configuration error.
  /// param msg: The message of the error.
  /// return: The error.
  pub fn configuration(msg: &str) -> Self {
    Self::new(HalaMeshletErrorKind::Configuration, msg, None)
  }

  /// Create a new capacity error.
  /// param msg: The message of the error.
  /// return: The error.
  pub fn capacity(msg: &str) -> Self {
    Self::new(HalaMeshletErrorKind::Capacity, msg, None)
  }

  pub fn kind(&self) -> HalaMeshletErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.msg
  }
}

impl std::convert::From<std::io::Error> for HalaMeshletError {
  fn from(err: std::io::Error) -> Self {
    Self {
      kind: HalaMeshletErrorKind::Io,
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

impl std::convert::From<bincode::Error> for HalaMeshletError {
  fn from(err: bincode::Error) -> Self {
    Self {
      kind: HalaMeshletErrorKind::Serialization,
      msg: err.to_string(),
      source: Some(err as Box<dyn std::error::Error + Send + Sync>),
    }
  }
}

impl std::convert::From<serde_json::Error> for HalaMeshletError {
  fn from(err: serde_json::Error) -> Self {
    Self {
      kind: HalaMeshletErrorKind::Configuration,
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

impl std::convert::From<gltf::Error> for HalaMeshletError {
  fn from(err: gltf::Error) -> Self {
    Self {
      kind: HalaMeshletErrorKind::Loading,
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

/// The implementation Display trait for the error type of the hala-meshlet crate.
impl std::fmt::Display for HalaMeshletError {
  /// Format the error.
  /// param f: The formatter.
  /// return: The result.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.msg)
  }
}
