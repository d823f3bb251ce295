use std::sync::Arc;

use axum::async_trait;
use tracing::{info, warn};

/// Outbound notification seam. Registration emits a welcome message through
/// this trait; delivery failures never fail the surrounding operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, email: &str, name: &str) -> anyhow::Result<()>;
}

/// Default mailer: records the send in the logs. Swap in a real transport
/// behind the same trait when one is wired up.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, email: &str, name: &str) -> anyhow::Result<()> {
        info!(%email, %name, "welcome mail sent");
        Ok(())
    }
}

/// Fire-and-forget welcome mail. The spawned task owns its inputs; a failed
/// send is logged and otherwise dropped.
pub fn send_welcome_detached(mailer: Arc<dyn Mailer>, email: String, name: String) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send_welcome(&email, &name).await {
            warn!(error = %e, %email, "welcome mail failed");
        }
    });
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Records every send so tests can assert on delivery without a transport.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_welcome(&self, email: &str, name: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unreachable");
            }
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), name.to_string()));
            Ok(())
        }
    }
}
