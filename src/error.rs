use derive_more::Display;

/// The structural error kinds the Controller facade can return.
///
/// These map directly onto RPC status codes in whatever outward-facing
/// surface wraps the Controller; this crate only ever constructs them at the
/// boundary (validation, registry lookups) and never downcasts them deeper
/// in the stack.
#[derive(Debug, Display, Eq, PartialEq, Clone)]
pub enum ControllerError {
    #[display(fmt = "invalid argument: {}", _0)]
    InvalidArgument(String),

    #[display(fmt = "learner already registered")]
    AlreadyExists,

    #[display(fmt = "learner not found")]
    NotFound,

    #[display(fmt = "missing or malformed credentials")]
    Unauthenticated,

    #[display(fmt = "auth token does not match the registered learner")]
    PermissionDenied,

    #[display(fmt = "internal error: {}", _0)]
    Internal(String),

    #[display(fmt = "coordinator is unavailable")]
    Unavailable,
}

impl ::std::error::Error for ControllerError {}
