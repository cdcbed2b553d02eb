//! HTTP API for examroom.

mod error;
mod extract;
mod handlers;
mod routes;
mod server;
mod state;

pub use error::{AuthFailure, WebError};
pub use extract::{AuthUser, Student, Teacher};
pub use server::{build_router, run_server, ServerConfig};
pub use state::WebAppState;
