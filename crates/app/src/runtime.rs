//! Single-threaded signal loop.
//!
//! Every host event, timer tick, user action and backend completion is a
//! [`Signal`] on one channel. Handlers run to completion one at a time;
//! backend calls are spawned and report back with [`Signal::Completed`].

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use quicktimer_domain::entity::Entity;
use quicktimer_domain::schedule::{CancelRequest, ScheduleRequest};
use quicktimer_domain::service::ServiceCatalog;
use quicktimer_domain::snapshot::HostSnapshot;
use quicktimer_domain::time::EpochSeconds;

use crate::host::HostState;
use crate::panel::{PanelAction, PanelCommand, PanelConfig, PanelManager, PanelView};
use crate::ports::{Clock, HostDocument, IntervalTimer, PanelRenderer, SchedulerBackend, SurfaceId};
use crate::services::preferences_cache::PreferencesCache;
use crate::services::timer_card::{CardAction, CardCommand, CardView, TimerCard, TimerCardConfig};

pub type SignalSender = mpsc::UnboundedSender<Signal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Create the channel a [`Runtime`] consumes.
#[must_use]
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}

/// Everything the engine reacts to.
#[derive(Debug, Clone)]
pub enum Signal {
    /// The host changed its document structure.
    Mutation,
    DetailRequested,
    DetailClosed,
    RetryTick,
    Tick(SurfaceId),
    Catalog(ServiceCatalog),
    Entities(Vec<Entity>),
    EntityChanged(Entity),
    Snapshot(HostSnapshot),
    Panel(PanelAction),
    Card { index: usize, action: CardAction },
    Completed {
        surface: SurfaceId,
        result: Result<(), String>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub panel: PanelConfig,
    pub history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            panel: PanelConfig::default(),
            history_limit: quicktimer_domain::preferences::DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// The ports a runtime is assembled from.
pub struct Adapters<B, D, R, T, C> {
    pub backend: B,
    pub document: D,
    pub renderer: R,
    pub timer: T,
    pub clock: C,
}

enum BackendCall {
    Schedule(ScheduleRequest),
    Cancel(CancelRequest),
}

pub struct Runtime<B, D, R, T, C>
where
    D: HostDocument,
    R: PanelRenderer<Node = D::Node>,
    T: IntervalTimer,
{
    backend: B,
    clock: C,
    timer: T,
    host: HostState,
    prefs: PreferencesCache<B>,
    panels: PanelManager<D, R, T>,
    cards: Vec<TimerCard>,
    card_timers: HashMap<usize, T::Handle>,
    tick_interval: Duration,
    retry_pending: bool,
    sender: SignalSender,
    receiver: SignalReceiver,
}

impl<B, D, R, T, C> Runtime<B, D, R, T, C>
where
    B: SchedulerBackend + Clone + 'static,
    D: HostDocument,
    R: PanelRenderer<Node = D::Node>,
    T: IntervalTimer + Clone,
    C: Clock,
{
    pub fn new(
        adapters: Adapters<B, D, R, T, C>,
        config: RuntimeConfig,
        cards: Vec<TimerCardConfig>,
        (sender, receiver): (SignalSender, SignalReceiver),
    ) -> Self {
        let Adapters {
            backend,
            document,
            renderer,
            timer,
            clock,
        } = adapters;
        Self {
            prefs: PreferencesCache::new(backend.clone()).with_history_limit(config.history_limit),
            panels: PanelManager::new(document, renderer, timer.clone(), config.panel),
            backend,
            clock,
            timer,
            host: HostState::new(),
            cards: cards
                .into_iter()
                .enumerate()
                .map(|(index, config)| {
                    let card = TimerCard::new(config);
                    debug!(card = index, task_key = %card.own_key(), "timer card ready");
                    card
                })
                .collect(),
            card_timers: HashMap::new(),
            tick_interval: config.panel.tick_interval,
            retry_pending: false,
            sender,
            receiver,
        }
    }

    /// A sender for host adapters and user input.
    #[must_use]
    pub fn sender(&self) -> SignalSender {
        self.sender.clone()
    }

    #[must_use]
    pub fn panel_view(&self) -> Option<&PanelView> {
        self.panels.view()
    }

    #[must_use]
    pub fn card_views(&self) -> Vec<CardView> {
        let now = self.clock.now();
        self.cards.iter().map(|card| card.view(now)).collect()
    }

    /// Process signals until [`Signal::Shutdown`] or until every sender is gone.
    pub async fn run(mut self) {
        info!(cards = self.cards.len(), "quick-timer runtime started");
        while let Some(signal) = self.receiver.recv().await {
            if self.handle(signal).is_break() {
                break;
            }
        }
        self.shutdown();
        info!("quick-timer runtime stopped");
    }

    /// Handle one signal to completion.
    pub fn handle(&mut self, signal: Signal) -> ControlFlow<()> {
        let now = self.clock.now();
        match signal {
            Signal::Mutation => {
                let next = self.panels.on_mutation(&self.host, &mut self.prefs, now);
                self.arm_retry(next);
            }
            Signal::DetailRequested => {
                let next = self
                    .panels
                    .on_detail_requested(&self.host, &mut self.prefs, now);
                self.arm_retry(next);
            }
            Signal::DetailClosed => self.panels.on_detail_closed(),
            Signal::RetryTick => {
                self.retry_pending = false;
                let next = self.panels.on_retry(&self.host, &mut self.prefs, now);
                self.arm_retry(next);
            }
            Signal::Tick(SurfaceId::Panel(id)) => self.panels.on_tick(id, &self.host, now),
            Signal::Tick(SurfaceId::Card(index)) => self.tick_card(index, now),
            Signal::Catalog(catalog) => {
                self.host.set_catalog(catalog);
                self.panels.on_host_changed(&self.host, now);
            }
            Signal::Entities(entities) => {
                self.host.set_entities(entities);
                self.panels.on_host_changed(&self.host, now);
            }
            Signal::EntityChanged(entity) => {
                self.host.upsert_entity(entity);
                self.panels.on_host_changed(&self.host, now);
            }
            Signal::Snapshot(snapshot) => {
                debug!(tasks = snapshot.active_tasks.len(), "host snapshot received");
                let shared = self.host.set_snapshot(snapshot);
                self.prefs.refresh_all(shared);
                for index in 0..self.cards.len() {
                    self.reconcile_card(index, now);
                }
                self.panels.on_host_changed(&self.host, now);
            }
            Signal::Panel(action) => {
                if let Some(command) =
                    self.panels
                        .on_action(action, &self.host, &mut self.prefs, now)
                {
                    match command {
                        PanelCommand::Schedule { panel, request } => {
                            self.spawn_call(
                                SurfaceId::Panel(panel),
                                BackendCall::Schedule(request),
                            );
                        }
                        PanelCommand::Cancel { panel, request } => {
                            self.spawn_call(SurfaceId::Panel(panel), BackendCall::Cancel(request));
                        }
                    }
                }
            }
            Signal::Card { index, action } => self.card_action(index, &action, now),
            Signal::Completed { surface, result } => match surface {
                SurfaceId::Panel(id) => self.panels.on_completed(id, result, &mut self.prefs, now),
                SurfaceId::Card(index) => {
                    if let Some(card) = self.cards.get_mut(index) {
                        card.complete(result, now);
                    }
                    self.sync_card_timer(index, now);
                }
            },
            Signal::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn arm_retry(&mut self, next: Option<Duration>) {
        if let Some(delay) = next
            && !self.retry_pending
        {
            self.timer.retry_after(delay);
            self.panels.consume_retry();
            self.retry_pending = true;
        }
    }

    fn reconcile_card(&mut self, index: usize, now: EpochSeconds) {
        if let Some(card) = self.cards.get_mut(index) {
            card.reconcile(&self.host.snapshot().active_tasks, now);
        }
        self.sync_card_timer(index, now);
    }

    /// Re-project a card's countdown; once it runs out, re-check the registry.
    fn tick_card(&mut self, index: usize, now: EpochSeconds) {
        let Some(card) = self.cards.get_mut(index) else {
            return;
        };
        if !card.tick(now) {
            card.reconcile(&self.host.snapshot().active_tasks, now);
        }
        self.sync_card_timer(index, now);
    }

    fn card_action(&mut self, index: usize, action: &CardAction, now: EpochSeconds) {
        let Some(card) = self.cards.get_mut(index) else {
            debug!(card = index, "action for unknown card");
            return;
        };
        match card.begin(action, now) {
            Ok(CardCommand::Schedule(request)) => {
                info!(card = index, task_key = %request.task_key, "scheduling from card");
                self.spawn_call(SurfaceId::Card(index), BackendCall::Schedule(request));
            }
            Ok(CardCommand::Cancel(request)) => {
                info!(card = index, task_key = %request.task_key, "cancelling from card");
                self.spawn_call(SurfaceId::Card(index), BackendCall::Cancel(request));
            }
            Err(feedback) => debug!(card = index, ?feedback, "card action not issued"),
        }
        self.sync_card_timer(index, now);
    }

    fn sync_card_timer(&mut self, index: usize, now: EpochSeconds) {
        let wants_ticks = self
            .cards
            .get(index)
            .is_some_and(|card| card.wants_ticks(now));
        match (wants_ticks, self.card_timers.remove(&index)) {
            (true, None) => {
                let handle = self
                    .timer
                    .start(SurfaceId::Card(index), self.tick_interval);
                self.card_timers.insert(index, handle);
            }
            (true, Some(handle)) => {
                self.card_timers.insert(index, handle);
            }
            (false, Some(handle)) => self.timer.stop(handle),
            (false, None) => {}
        }
    }

    fn spawn_call(&self, surface: SurfaceId, call: BackendCall) {
        let backend = self.backend.clone();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let outcome = match call {
                BackendCall::Schedule(request) => backend.schedule(request).await,
                BackendCall::Cancel(request) => backend.cancel(request).await,
            };
            let _ = sender.send(Signal::Completed {
                surface,
                result: outcome.map_err(|err| err.to_string()),
            });
        });
    }

    fn shutdown(&mut self) {
        self.panels.on_detail_closed();
        for handle in std::mem::take(&mut self.card_timers).into_values() {
            self.timer.stop(handle);
        }
    }
}
