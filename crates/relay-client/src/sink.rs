//! Notification sinks.

use tokio::sync::mpsc;

use crate::filter::Notification;

/// Receives notifications the filter lets through (the toast layer).
pub trait NotificationSink: Send + 'static {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&mut self, notification: Notification) {
        // The receiver being gone just means nobody renders it.
        let _ = self.send(notification);
    }
}

/// Sink backed by a closure.
pub struct FnSink<F>(F);

/// Wrap a closure as a [`NotificationSink`].
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(Notification) + Send + 'static,
{
    FnSink(f)
}

impl<F> NotificationSink for FnSink<F>
where
    F: FnMut(Notification) + Send + 'static,
{
    fn notify(&mut self, notification: Notification) {
        (self.0)(notification)
    }
}
