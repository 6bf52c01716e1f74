//! REST client and the [`SchedulerBackend`] implementation on top of it.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use quicktimer_app::ports::SchedulerBackend;
use quicktimer_app::runtime::{Signal, SignalSender};
use quicktimer_domain::entity::Entity;
use quicktimer_domain::error::QuickTimerError;
use quicktimer_domain::id::EntityId;
use quicktimer_domain::preferences::PreferencesPatch;
use quicktimer_domain::schedule::{CancelRequest, ScheduleRequest};
use quicktimer_domain::service::{DomainServices, ServiceCatalog};
use quicktimer_domain::snapshot::HostSnapshot;

use crate::config::HomeAssistantConfig;
use crate::error::HomeAssistantError;
use crate::payload::{
    BACKEND_DOMAIN, CANCEL_ACTION, RUN_ACTION, SET_PREFERENCES, api_url, parse_snapshot,
    parse_states, service_path, set_preferences_body, state_path,
};

/// Home Assistant REST client. Cloning shares the connection pool.
#[derive(Clone)]
pub struct HomeAssistantClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    token: String,
    monitor_entity: String,
    client: reqwest::Client,
}

impl HomeAssistantClient {
    #[must_use]
    pub fn new(config: &HomeAssistantConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: config.base_url.clone(),
                token: config.token.clone(),
                monitor_entity: config.monitor_entity.clone(),
                client: reqwest::Client::new(),
            }),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HomeAssistantError> {
        let response = self
            .inner
            .client
            .get(api_url(&self.inner.base_url, path))
            .bearer_auth(&self.inner.token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn call_service<B: Serialize + Sync>(
        &self,
        service: &str,
        body: &B,
    ) -> Result<(), HomeAssistantError> {
        let response = self
            .inner
            .client
            .post(api_url(
                &self.inner.base_url,
                &service_path(BACKEND_DOMAIN, service),
            ))
            .bearer_auth(&self.inner.token)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        debug!(service, "backend service called");
        Ok(())
    }

    /// Every declared service, as a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the listing does not parse.
    pub async fn fetch_services(&self) -> Result<ServiceCatalog, HomeAssistantError> {
        let domains: Vec<DomainServices> = self.get("services").await?;
        Ok(ServiceCatalog::from_domains(domains))
    }

    /// Every entity state the instance reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fetch_states(&self) -> Result<Vec<Entity>, HomeAssistantError> {
        let states: Vec<serde_json::Value> = self.get("states").await?;
        Ok(parse_states(states))
    }

    /// The monitor sensor's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`HomeAssistantError::MonitorMissing`] when the sensor does
    /// not exist, or another error if the request fails.
    pub async fn fetch_snapshot(&self) -> Result<HostSnapshot, HomeAssistantError> {
        let monitor = &self.inner.monitor_entity;
        match self.get::<serde_json::Value>(&state_path(monitor)).await {
            Ok(state) => Ok(parse_snapshot(state)),
            Err(HomeAssistantError::Status { status: 404, .. }) => {
                Err(HomeAssistantError::MonitorMissing(monitor.clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// Send the catalog once, then states and the snapshot every `interval`.
    ///
    /// Fetch failures are logged and retried on the next round. Returns
    /// when the runtime stops listening.
    pub async fn poll(self, interval: std::time::Duration, sender: SignalSender) {
        match self.fetch_services().await {
            Ok(catalog) => {
                if sender.send(Signal::Catalog(catalog)).is_err() {
                    return;
                }
            }
            Err(err) => warn!(error = %err, "failed to load service catalog"),
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if sender.is_closed() {
                info!("runtime gone, stopping Home Assistant poller");
                return;
            }
            let mut signals = Vec::with_capacity(2);
            match self.fetch_states().await {
                Ok(entities) => signals.push(Signal::Entities(entities)),
                Err(err) => warn!(error = %err, "failed to load entity states"),
            }
            match self.fetch_snapshot().await {
                Ok(snapshot) => signals.push(Signal::Snapshot(snapshot)),
                Err(err) => warn!(error = %err, "failed to load monitor snapshot"),
            }
            for signal in signals {
                if sender.send(signal).is_err() {
                    info!("runtime gone, stopping Home Assistant poller");
                    return;
                }
            }
        }
    }
}

async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, HomeAssistantError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HomeAssistantError::Status {
        status: status.as_u16(),
        body,
    })
}

impl SchedulerBackend for HomeAssistantClient {
    fn schedule(
        &self,
        request: ScheduleRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let client = self.clone();
        async move {
            info!(task_key = %request.task_key, "calling run_action");
            client
                .call_service(RUN_ACTION, &request)
                .await
                .map_err(HomeAssistantError::into_domain)
        }
    }

    fn cancel(
        &self,
        request: CancelRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let client = self.clone();
        async move {
            info!(task_key = %request.task_key, "calling cancel_action");
            client
                .call_service(CANCEL_ACTION, &request)
                .await
                .map_err(HomeAssistantError::into_domain)
        }
    }

    fn persist_preferences(
        &self,
        entity_id: EntityId,
        patch: PreferencesPatch,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let client = self.clone();
        async move {
            let body = set_preferences_body(&entity_id, &patch)
                .map_err(|err| HomeAssistantError::from(err).into_domain())?;
            client
                .call_service(SET_PREFERENCES, &body)
                .await
                .map_err(HomeAssistantError::into_domain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicktimer_app::runtime::signal_channel;

    fn unreachable_config() -> HomeAssistantConfig {
        HomeAssistantConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            token: "token".to_string(),
            ..HomeAssistantConfig::default()
        }
    }

    #[tokio::test]
    async fn should_report_backend_error_when_host_is_unreachable() {
        let client = HomeAssistantClient::new(&unreachable_config());
        let result = client
            .cancel(CancelRequest {
                task_key: quicktimer_domain::id::TaskKey::new("qt_12345678").unwrap(),
            })
            .await;
        assert!(matches!(result, Err(QuickTimerError::Backend(_))));
    }

    #[tokio::test]
    async fn should_stop_polling_when_runtime_is_gone() {
        let client = HomeAssistantClient::new(&unreachable_config());
        let (sender, receiver) = signal_channel();
        drop(receiver);

        tokio::time::timeout(
            std::time::Duration::from_secs(30),
            client.poll(std::time::Duration::from_millis(10), sender),
        )
        .await
        .unwrap();
    }
}
