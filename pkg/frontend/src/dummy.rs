use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Frontend, FrontendKind, StoppedSink};

/// Terminal no-op frontend used as the fallback when no real frontend can be
/// resolved. `start` just flips a flag; `stop` flips it back and tells the
/// owner it stopped.
pub struct Dummy {
    name: String,
    running: AtomicBool,
    sink: Arc<dyn StoppedSink>,
}

impl Dummy {
    pub fn new(name: impl Into<String>, sink: Arc<dyn StoppedSink>) -> Self {
        Self {
            name: name.into(),
            running: AtomicBool::new(false),
            sink,
        }
    }
}

#[async_trait]
impl Frontend for Dummy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FrontendKind {
        FrontendKind::Dummy
    }

    fn stop_on_shutdown(&self) -> bool {
        false
    }

    fn instant_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(0)
    }

    fn prepare_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(0)
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.sink.on_stopped(&self.name).await;
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    #[async_trait]
    impl StoppedSink for NullSink {
        async fn on_stopped(&self, _caller_name: &str) {}
    }

    #[tokio::test]
    async fn start_then_stop_toggles_running() {
        let dummy = Dummy::new("dummy", Arc::new(NullSink));
        assert!(!dummy.is_running().await);
        dummy.start().await.unwrap();
        assert!(dummy.is_running().await);
        dummy.stop().await.unwrap();
        assert!(!dummy.is_running().await);
    }
}
