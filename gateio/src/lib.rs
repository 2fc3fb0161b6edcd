pub mod auth;
pub mod config;
pub mod error;
pub mod rest;
pub mod types;
pub mod ws;

// ---- Top-level re-exports for ergonomic usage ----

pub use auth::Credentials;
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use rest::GateHttpClient;

// REST wire types
pub use types::{
    BookLevel, BookSnapshot, CancelResult, OrderResult, OrderSpec, PositionEntry,
};

// WebSocket client + events
pub use ws::events::{BalanceUpdate, BookUpdateMsg, UserOrder, UserTrade};
pub use ws::{GateWsClient, StreamHandle};
