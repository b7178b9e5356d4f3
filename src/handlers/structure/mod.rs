pub mod delete;
pub mod get;
pub mod post;
pub mod put;

// Re-export handler functions for use in routing
pub use delete::delete as element_delete;
pub use get::element as element_get;
pub use get::tree as tree_get;
pub use post::post as element_post;
pub use put::put as element_put;

use crate::error::{ApiError, ErrorResponse};
use crate::params::DebugMode;

/// Attaches the request's `dbg` choice to a failed step
pub(crate) trait Debugged<T> {
    fn debugged(self, debug: DebugMode) -> Result<T, ErrorResponse>;
}

impl<T, E> Debugged<T> for Result<T, E>
where
    E: Into<ApiError>,
{
    fn debugged(self, debug: DebugMode) -> Result<T, ErrorResponse> {
        self.map_err(|e| {
            let error: ApiError = e.into();
            error.with_debug(debug)
        })
    }
}
