use core::fmt;

/// A semantic "no" from the peer, carrying its reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rejection {
    cause: String,
}

impl Rejection {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cause)
    }
}

/// Normal result of a dialog or node operation.
///
/// Failures that break the connection are reported through
/// [`NetworkError`](crate::NetworkError) instead.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Done(T),
    Rejected(Rejection),
    /// The caller cancelled before the exchange finished.
    Aborted,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Done(value) => Outcome::Done(f(value)),
            Self::Rejected(rejection) => Outcome::Rejected(rejection),
            Self::Aborted => Outcome::Aborted,
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Rejected(_) | Self::Aborted => None,
        }
    }

    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
