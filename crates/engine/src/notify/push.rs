use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::channel::{NotifyError, PushPayload, PushSender};
use domainwatch_common::signing::sign_payload;

/// Signed POST to the push delivery relay. The relay resolves the owner's
/// device subscriptions; the engine only authenticates itself via the
/// signature header.
pub struct WebPushRelay {
    url: String,
    secret: Vec<u8>,
    client: Client,
}

#[derive(Serialize)]
struct RelayBody<'a> {
    owner: &'a str,
    #[serde(flatten)]
    payload: &'a PushPayload,
}

impl WebPushRelay {
    pub fn new(url: String, secret: Vec<u8>) -> Self {
        Self {
            url,
            secret,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl PushSender for WebPushRelay {
    fn name(&self) -> &str {
        "web-push-relay"
    }

    async fn send_push(&self, owner: &str, payload: &PushPayload) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&RelayBody { owner, payload })
            .map_err(|e| NotifyError(e.to_string()))?;
        let signature = sign_payload(&self.secret, &body);

        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Domainwatch-Signature", &signature)
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?
            .error_for_status()
            .map_err(|e| NotifyError(e.to_string()))?;

        Ok(())
    }
}
