//! Order Relay Client
//!
//! Subscribes to the hub, keeps only the `order:updated` events addressed to
//! the local customer, and turns them into notifications.

pub mod error;
pub mod filter;
pub mod listener;
pub mod sink;
pub mod store;

pub use error::{ClientError, ClientResult};
pub use filter::{EventFilter, Notification};
pub use listener::{mount, scoped_url, ListenerHandle};
pub use sink::{sink_fn, FnSink, NotificationSink};
pub use store::{CustomerStore, FileStore, MemoryStore};
