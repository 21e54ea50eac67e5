//! Websocket server surface: per-connection sessions and the HTTP router.

pub mod routes;
pub mod session;

pub use routes::{create_router, AppState, RouterConfig};
pub use session::{run_session, Outbound, ViewerSession, OUTBOUND_QUEUE_DEPTH};
