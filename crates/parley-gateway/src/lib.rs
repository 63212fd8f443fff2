pub mod connection;
pub mod error;
pub mod hub;

pub use connection::{Connection, connect};
pub use error::GatewayError;
pub use hub::{CommandQueue, Hub, Subscription};
