use crate::Repo;
use marketpay_types::{NotificationEvent, NotificationStatus};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Drains queued payment-outcome events and pushes them to the socket
/// gateway that fans them out to connected clients.
pub struct NotificationWorker {
    repo: Repo,
    client: reqwest::Client,
    target_url: String,
}

impl NotificationWorker {
    pub fn new(repo: Repo, target_url: String) -> Self {
        Self {
            repo,
            client: reqwest::Client::new(),
            target_url,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting notification worker sending to {}", self.target_url);
        loop {
            match self.repo.get_pending_notifications(10).await {
                Ok(events) => {
                    if !events.is_empty() {
                        info!("Processing {} pending notifications", events.len());
                        for event in events {
                            self.process_event(event).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to fetch notifications: {}", e);
                }
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, user_id = %event.user_id))]
    async fn process_event(&self, event: NotificationEvent) {
        info!(
            "Sending notification {} to {}",
            event.event_type, self.target_url
        );

        let body = serde_json::json!({
            "user_id": event.user_id,
            "event": event.event_type,
            "payload": event.payload,
        });

        let result = self.client.post(&self.target_url).json(&body).send().await;

        let (status, last_error) = match result {
            Ok(resp) => {
                if resp.status().is_success() {
                    (NotificationStatus::Completed, None)
                } else {
                    (
                        NotificationStatus::Failed,
                        Some(format!("HTTP {}", resp.status())),
                    )
                }
            }
            Err(e) => (NotificationStatus::Failed, Some(e.to_string())),
        };

        if let Err(e) = self
            .repo
            .update_notification_status(event.id, status, last_error)
            .await
        {
            error!("Failed to update notification status: {}", e);
        }
    }
}
