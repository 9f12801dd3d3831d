use std::fmt;

// ---------------------------------------------------------------------------
// Rewrite-time errors
// ---------------------------------------------------------------------------

/// Errors raised while rewriting a class. All of these are fatal for the
/// class being rewritten: no partial output is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RewriteError {
    /// The type predicate matched the declared superclass or an implemented
    /// interface. Class hierarchy cannot be changed after compilation.
    HierarchyChange {
        position: &'static str,
        internal_name: String,
    },
    /// A field or method descriptor could not be parsed.
    MalformedDescriptor { descriptor: String },
    /// Two expansions feeding the same dispatch site produced candidate
    /// lists of different lengths.
    CandidateLengthMismatch {
        symbol: String,
        expected: usize,
        found: usize,
    },
    /// An expansion function returned no candidates for a matched symbol.
    EmptyExpansion { symbol: String },
    /// A constructor call needs dynamic dispatch but its owner is not
    /// covered by the type predicate, so the preceding allocation cannot
    /// be collapsed into the dispatch.
    UnsupportedConstructorDispatch { owner: String, descriptor: String },
    /// A dropped allocation was not followed by the duplicate the
    /// construction pattern requires (labels and frames aside), so the
    /// stream cannot be rewritten consistently.
    UnsupportedAllocationPattern { internal_name: String },
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::HierarchyChange {
                position,
                internal_name,
            } => write!(
                f,
                "illegal {position} name: {internal_name}; changing class hierarchy is not possible"
            ),
            RewriteError::MalformedDescriptor { descriptor } => {
                write!(f, "malformed descriptor: {descriptor}")
            }
            RewriteError::CandidateLengthMismatch {
                symbol,
                expected,
                found,
            } => write!(
                f,
                "candidate lists for {symbol} have mismatched lengths: expected {expected}, found {found}"
            ),
            RewriteError::EmptyExpansion { symbol } => {
                write!(f, "expansion for {symbol} returned no candidates")
            }
            RewriteError::UnsupportedConstructorDispatch { owner, descriptor } => write!(
                f,
                "constructor {owner}.<init>{descriptor} needs dispatch but its owner is not remappable; the allocation cannot be collapsed"
            ),
            RewriteError::UnsupportedAllocationPattern { internal_name } => write!(
                f,
                "allocation of {internal_name} is not followed by the duplicate of the construction pattern"
            ),
        }
    }
}

impl std::error::Error for RewriteError {}

// ---------------------------------------------------------------------------
// Resolution-time errors
// ---------------------------------------------------------------------------

/// Errors raised while resolving a dispatch site at run time. These surface
/// at the call site on first use and are never retried: a resolution failure
/// means the remapping configuration is wrong, not that the condition is
/// transient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The dispatch-site payload does not follow the documented layout.
    MalformedPayload { reason: String },
    /// The environment selector returned an index outside `[0, count)`.
    EnvironmentOutOfRange { index: usize, count: usize },
    /// A descriptor selected for this environment could not be parsed.
    MalformedDescriptor { descriptor: String },
    /// No class with the remapped name is visible from the calling context.
    ClassNotFound { internal_name: String },
    /// The remapped owner exists but has no such member.
    MemberNotFound {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// The member exists but is not accessible from the calling context.
    IllegalAccess {
        owner: String,
        name: String,
    },
    /// The resolved handle could not be adapted to the static shape of the
    /// dispatch site.
    AdaptationFailed { from: String, to: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MalformedPayload { reason } => {
                write!(f, "malformed dispatch payload: {reason}")
            }
            ResolveError::EnvironmentOutOfRange { index, count } => {
                write!(f, "environment index {index} out of range for {count} candidates")
            }
            ResolveError::MalformedDescriptor { descriptor } => {
                write!(f, "malformed descriptor: {descriptor}")
            }
            ResolveError::ClassNotFound { internal_name } => {
                write!(f, "class not found: {internal_name}")
            }
            ResolveError::MemberNotFound {
                owner,
                name,
                descriptor,
            } => write!(f, "member not found: {owner}.{name} {descriptor}"),
            ResolveError::IllegalAccess { owner, name } => {
                write!(f, "illegal access to {owner}.{name}")
            }
            ResolveError::AdaptationFailed { from, to } => {
                write!(f, "cannot adapt handle of type {from} to {to}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}
