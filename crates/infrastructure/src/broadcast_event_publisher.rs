use async_trait::async_trait;
use council_application::{EventPublisher, GovernanceEvent};
use council_core::{AppError, AppResult};
use tokio::sync::broadcast;
use tracing::debug;

/// Fans governance events out to live subscribers over a tokio broadcast channel.
///
/// Publishing without subscribers is not an error; lagging subscribers skip
/// the events they missed.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<GovernanceEvent>,
}

impl BroadcastEventPublisher {
    /// Creates a publisher buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::Validation(
                "event channel capacity must be greater than zero".to_owned(),
            ));
        }

        let (sender, _) = broadcast::channel(capacity);
        Ok(Self { sender })
    }

    /// Opens a new subscription starting at the next published event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: GovernanceEvent) -> AppResult<()> {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "governance event published"),
            Err(_) => debug!("governance event dropped without subscribers"),
        }

        Ok(())
    }
}
