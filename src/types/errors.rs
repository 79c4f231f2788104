//! Error types returned by methods on a [`crate::RouteTable`].
//!
//! Mirrors `rotonda-store`'s split between a recoverable, retryable error
//! enum (`PrefixStoreError`) and a distinct marker type for unrecoverable
//! invariant violations (`FatalError`), whose `Display` text warns that the
//! store must be considered corrupted (`types/errors.rs`).

use std::fmt;

/// Possible errors returned by the public operations on a [`crate::RouteTable`].
///
/// All public operations are total: they either succeed or return one of
/// these variants, never silently mutate state on failure (§7).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LpmError {
    /// A prefix length outside `0..=32` (v4) / `0..=128` (v6), or an
    /// unrecognized family/backend selector at construction.
    InvalidArgument,
    /// The live route count is already at `max_routes`.
    CapacityExceeded,
    /// Insert of a `(prefix, length)` that is already present.
    AlreadyExists,
    /// Delete, set, get, LPM, or `route_next_get` target not present.
    NotFound,
    /// `route_first_get` called on a table with no live routes.
    Empty,
    /// Enumeration (`route_first_get` / `route_next_get`) called on a table
    /// created without `next_get` enabled.
    Unsupported,
}

impl std::error::Error for LpmError {}

impl fmt::Display for LpmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LpmError::InvalidArgument => {
                write!(f, "Error: prefix length out of range or invalid argument.")
            }
            LpmError::CapacityExceeded => {
                write!(f, "Error: route table has reached its maximum route count.")
            }
            LpmError::AlreadyExists => {
                write!(f, "Error: a route for this prefix already exists.")
            }
            LpmError::NotFound => {
                write!(f, "Error: no route matches the requested prefix.")
            }
            LpmError::Empty => {
                write!(f, "Error: the route table has no routes to enumerate.")
            }
            LpmError::Unsupported => {
                write!(
                    f,
                    "Error: enumeration was not enabled for this table \
                     (create it with `next_get` set)."
                )
            }
        }
    }
}

/// An unrecoverable internal invariant violation: arena over-release, an
/// impossible index, or similar library-bug conditions (§4.8, §7). A
/// correct implementation never produces this; production builds should
/// treat it as corruption and terminate.
#[derive(Debug, Copy, Clone)]
pub struct FatalError(pub &'static str);

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: a fatal internal invariant was violated ({}). The \
             route table must be considered corrupted; the application \
             should terminate.",
            self.0
        )
    }
}

impl std::error::Error for FatalError {}

pub type FatalResult<T> = Result<T, FatalError>;
