//! # quicktimerd — quick-timer daemon
//!
//! Composition root that wires one host adapter to the quick-timer runtime.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Construct the host adapter selected by `host.mode`
//! - Construct the runtime, injecting the adapter via port traits
//! - Feed host updates into the runtime and run it
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quicktimer_adapter_homeassistant::HomeAssistantClient;
use quicktimer_adapter_virtual::{MoreInfoLayout, VirtualHost, demo_entities};
use quicktimer_app::document::{InMemoryDocument, TreePanelRenderer};
use quicktimer_app::ports::SchedulerBackend;
use quicktimer_app::runtime::{
    Adapters, Runtime, Signal, SignalReceiver, SignalSender, signal_channel,
};
use quicktimer_app::timer::{TokioClock, TokioIntervalTimer};

use crate::config::{Config, HostMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (sender, receiver) = signal_channel();
    let document = InMemoryDocument::new();
    let clock = TokioClock::new();

    match config.host.mode {
        HostMode::Virtual => {
            let host = VirtualHost::new(demo_entities()?, clock, config.engine.history_limit);
            host.forward_to(sender.clone());
            host.announce(&sender);
            if let Some(entity_id) = config.demo_entity()? {
                match host.entity(&entity_id) {
                    Some(entity) => {
                        MoreInfoLayout::from(config.demo.layout).open(&document, &entity);
                        let _ = sender.send(Signal::DetailRequested);
                        info!(entity_id = %entity_id, "demo detail view opened");
                    }
                    None => warn!(entity_id = %entity_id, "demo entity does not exist"),
                }
            }
            info!("starting with the virtual host");
            serve(host, document, clock, &config, (sender, receiver)).await;
        }
        HostMode::HomeAssistant => {
            let client = HomeAssistantClient::new(&config.homeassistant);
            tokio::spawn(
                client
                    .clone()
                    .poll(config.homeassistant.poll_interval(), sender.clone()),
            );
            info!(base_url = %config.homeassistant.base_url, "starting with Home Assistant");
            serve(client, document, clock, &config, (sender, receiver)).await;
        }
    }

    Ok(())
}

/// Build the runtime around `backend` and run it until shutdown.
async fn serve<B>(
    backend: B,
    document: InMemoryDocument,
    clock: TokioClock,
    config: &Config,
    (sender, receiver): (SignalSender, SignalReceiver),
) where
    B: SchedulerBackend + Clone + 'static,
{
    let runtime = Runtime::new(
        Adapters {
            backend,
            renderer: TreePanelRenderer::new(document.clone()),
            document,
            timer: TokioIntervalTimer::new(sender.clone()),
            clock,
        },
        config.runtime_config(),
        config.cards.clone(),
        (sender.clone(), receiver),
    );

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = sender.send(Signal::Shutdown);
        }
    });

    runtime.run().await;
}
