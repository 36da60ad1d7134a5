//! Request layer: one JSON request per stdin line, routed by `method` to a
//! handler family and answered with one envelope per stdout line.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use error::err;
pub use handlers::core::select_workspace;
pub use router::handle_request;
pub use types::{AppState, Request};
