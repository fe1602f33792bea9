//! WebSocket Gateway
//!
//! Real-time socket connections, their channel subscriptions and the
//! cross-process fan-out that feeds them.

pub mod events;
pub mod fanout;
pub mod handler;
pub mod messages;
pub mod registry;

pub use events::SocketEventRouter;
pub use fanout::FanoutAdapter;
pub use handler::ws_handler;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::{Connection, ConnectionId, ConnectionRegistry};
