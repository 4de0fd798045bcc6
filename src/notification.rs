// src/notification.rs

//! Desktop notifications for failed builds.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, warn};

/// Delivers `(title, message)` to the user out of band.
///
/// Delivery failures are logged by the caller's implementation and never
/// surface as errors.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Uses the platform notification tool (`notify-send`, `osascript`).
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let Some(mut cmd) = notification_command(title, message) else {
                debug!("desktop notifications not supported on this platform");
                return;
            };

            match cmd.output().await {
                Ok(out) if out.status.success() => {
                    debug!(title, "notification sent");
                }
                Ok(out) => {
                    warn!(
                        title,
                        status = %out.status,
                        "notification command exited unsuccessfully"
                    );
                }
                Err(e) => {
                    warn!(title, error = %e, "failed to send notification");
                }
            }
        })
    }
}

fn notification_command(title: &str, message: &str) -> Option<Command> {
    if cfg!(target_os = "linux") {
        let mut cmd = Command::new("notify-send");
        cmd.arg(title).arg(message);
        Some(cmd)
    } else if cfg!(target_os = "macos") {
        let script = format!(
            "display notification {:?} with title {:?}",
            message, title
        );
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(script);
        Some(cmd)
    } else {
        None
    }
}

/// Swallows every notification (`--no-notify`, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send<'a>(
        &'a self,
        _title: &'a str,
        _message: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

pub fn notifier(enabled: bool) -> SharedNotifier {
    if enabled {
        Arc::new(DesktopNotifier)
    } else {
        Arc::new(NoopNotifier)
    }
}
