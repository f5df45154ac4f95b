use std::fmt;

/// Structured cache key: an ordered list of string segments.
///
/// `["projects"]` is a prefix of `["projects", "42", "findings"]`, which is
/// what invalidation matches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
  pub fn new<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(segments.into_iter().map(Into::into).collect())
  }

  /// Key under which a dashboard module's state is cached.
  pub fn module(name: &str) -> Self {
    Self::new(["module", name])
  }

  #[cfg(test)]
  pub fn segments(&self) -> &[String] {
    &self.0
  }

  /// Whether `prefix` matches the leading segments of this key.
  pub fn starts_with(&self, prefix: &CacheKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
  fn from(segments: [&str; N]) -> Self {
    Self::new(segments)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.0.join(", "))
  }
}
