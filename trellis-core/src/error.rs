//! Error types shared by the planner and the runtime.

use thiserror::Error;

/// Errors surfaced at plan time or construction time.
///
/// Update-time conditions (null selectors, repeated destroys, binding echoes)
/// are not errors; they are structurally guarded no-ops.
#[derive(Debug, Error)]
pub enum Error {
    /// A strict top-level instance was constructed without a target.
    #[error("'target' is a required option")]
    MissingTarget,

    /// A schema declared more fields than the dirty mask can address.
    #[error("component declares {count} fields, at most {max} are supported")]
    TooManyFields { count: usize, max: usize },

    /// A field name that the schema does not declare.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// A static usage names a component that is not registered.
    #[error("component `{0}` is not registered")]
    UnresolvedComponent(String),

    /// A binding expression that is not an assignable location.
    #[error("cannot bind `{name}` to `{snippet}`: not an assignable location")]
    InvalidBinding { name: String, snippet: String },

    /// A named attribute without a name.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Compile options could not be decoded.
    #[error("invalid compile options: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
