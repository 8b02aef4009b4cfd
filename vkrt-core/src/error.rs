use core::fmt;

/// Error produced by the backend-agnostic layer of the scene core.
///
/// A flat enum with a manual `Display` impl rather than `thiserror`, since
/// nothing in this call path needs error-source chaining.
#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    /// A capacity limit was hit; the caller should drop the offending item
    /// and keep going.
    CapacityExceeded { what: &'static str, limit: usize },
    /// A lookup by index or key failed.
    NotFound(&'static str),
    /// A value supplied by the host engine violated an invariant the core
    /// promises to its GPU-side consumers.
    InvalidParameter(&'static str),
    /// An operation required a slot/model/light that is no longer owned by
    /// the caller (double free, or using a handle past its lifetime).
    UseAfterRelease(&'static str),
    /// Generic unmapped condition, carrying a human-readable reason.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded { what, limit } => {
                write!(f, "capacity exceeded: {what} (limit {limit})")
            }
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Error::UseAfterRelease(what) => write!(f, "use after release: {what}"),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
