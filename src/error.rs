use thiserror::Error;

/// Lookup failures raised while resolving Cloudflare resources.
///
/// Every lookup error aborts the update before any write is issued.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{0} couldn't be found")]
    NotFound(String),
    #[error("more than one {0} matches; refusing to pick one")]
    Ambiguous(String),
}
