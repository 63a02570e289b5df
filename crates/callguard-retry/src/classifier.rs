//! Decides which errors are worth another attempt.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Classification of operation errors as retryable or not.
///
/// Classification is plain data so it can be configured from settings and
/// tested on its own.
///
/// ```rust
/// use callguard_retry::ErrorClassifier;
/// use std::io;
///
/// let classifier = ErrorClassifier::patterns(["timeout", "connection reset"]);
///
/// let timed_out = io::Error::new(io::ErrorKind::TimedOut, "read Timeout after 30s");
/// let denied = io::Error::new(io::ErrorKind::PermissionDenied, "401 unauthorized");
/// assert!(classifier.is_retryable(&timed_out));
/// assert!(!classifier.is_retryable(&denied));
/// ```
#[derive(Clone, Default)]
pub enum ErrorClassifier {
    /// Every error is retryable.
    #[default]
    All,
    /// An error is retryable when its message, the message of any error in
    /// its source chain, or its type name contains one of the patterns.
    /// Matching is case-insensitive.
    Patterns(Vec<String>),
    /// An error is retryable when the predicate returns `true`.
    Predicate(Predicate),
}

impl ErrorClassifier {
    /// Builds a pattern classifier.
    pub fn patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ErrorClassifier::Patterns(
            patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        )
    }

    /// Builds a predicate classifier.
    ///
    /// The predicate sees the error as `dyn Error`, so it can downcast to the
    /// concrete type:
    ///
    /// ```rust
    /// use callguard_retry::ErrorClassifier;
    /// use std::io;
    ///
    /// let classifier = ErrorClassifier::predicate(|err| {
    ///     err.downcast_ref::<io::Error>()
    ///         .map(|e| e.kind() == io::ErrorKind::ConnectionReset)
    ///         .unwrap_or(false)
    /// });
    /// # let _ = classifier;
    /// ```
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        ErrorClassifier::Predicate(Arc::new(f))
    }

    /// Returns whether `error` should be retried.
    pub fn is_retryable<E>(&self, error: &E) -> bool
    where
        E: Error + 'static,
    {
        match self {
            ErrorClassifier::All => true,
            ErrorClassifier::Patterns(patterns) => {
                let type_name = std::any::type_name::<E>().to_lowercase();
                let mut haystacks = vec![type_name];
                let mut current = Some(error as &(dyn Error + 'static));
                while let Some(err) = current {
                    haystacks.push(err.to_string().to_lowercase());
                    current = err.source();
                }

                patterns.iter().any(|pattern| {
                    let pattern = pattern.to_lowercase();
                    haystacks.iter().any(|text| text.contains(&pattern))
                })
            }
            ErrorClassifier::Predicate(predicate) => predicate(error as &(dyn Error + 'static)),
        }
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClassifier::All => f.write_str("All"),
            ErrorClassifier::Patterns(patterns) => {
                f.debug_tuple("Patterns").field(patterns).finish()
            }
            ErrorClassifier::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
