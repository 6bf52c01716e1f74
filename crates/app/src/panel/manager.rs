//! Panel injection state machine.
//!
//! `Idle → Locating → Injected → (Updating | Removing) → Idle`, driven by
//! document mutations, detail-view requests and a bounded retry timer.
//! At most one panel exists at a time; its countdown timer is always
//! stopped before its node is detached.

use std::time::Duration;

use tracing::{debug, info, warn};

use quicktimer_domain::capability::resolve_operations;
use quicktimer_domain::id::EntityId;
use quicktimer_domain::preferences::PreferencesPatch;
use quicktimer_domain::schedule::{CancelRequest, ScheduleRequest};
use quicktimer_domain::time::EpochSeconds;

use crate::host::HostState;
use crate::panel::locator::{Located, locate};
use crate::panel::view::{PanelAction, PanelView};
use crate::ports::{HostDocument, IntervalTimer, PanelRenderer, SchedulerBackend, SurfaceId};
use crate::services::control::Control;
use crate::services::preferences_cache::PreferencesCache;
use crate::services::task_reconciler::TaskReconciler;

/// Retry and tick cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Locate attempts granted per detail-view request.
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            max_retries: 30,
            retry_interval: Duration::from_millis(100),
            tick_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Idle,
    Locating,
    Injected,
    Updating,
    Removing,
}

/// Backend call requested from a panel, tagged with the panel instance.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    Schedule { panel: u64, request: ScheduleRequest },
    Cancel { panel: u64, request: CancelRequest },
}

struct Panel<N, H, TH> {
    id: u64,
    mount: N,
    handle: H,
    view: PanelView,
    reconciler: TaskReconciler,
    control: Control,
    timer: Option<TH>,
    pending: Option<ScheduleRequest>,
}

pub struct PanelManager<D, R, T>
where
    D: HostDocument,
    R: PanelRenderer<Node = D::Node>,
    T: IntervalTimer,
{
    document: D,
    renderer: R,
    timer: T,
    config: PanelConfig,
    phase: PanelPhase,
    panel: Option<Panel<D::Node, R::Handle, T::Handle>>,
    retries_left: u32,
    next_id: u64,
}

impl<D, R, T> PanelManager<D, R, T>
where
    D: HostDocument,
    R: PanelRenderer<Node = D::Node>,
    T: IntervalTimer,
{
    pub fn new(document: D, renderer: R, timer: T, config: PanelConfig) -> Self {
        Self {
            document,
            renderer,
            timer,
            config,
            phase: PanelPhase::Idle,
            panel: None,
            retries_left: 0,
            next_id: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    #[must_use]
    pub fn view(&self) -> Option<&PanelView> {
        self.panel.as_ref().map(|panel| &panel.view)
    }

    /// Instance number of the current panel.
    #[must_use]
    pub fn panel_id(&self) -> Option<u64> {
        self.panel.as_ref().map(|panel| panel.id)
    }

    #[must_use]
    pub fn has_timer(&self) -> bool {
        self.panel.as_ref().is_some_and(|panel| panel.timer.is_some())
    }

    #[must_use]
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Charge one retry against the budget once its timer is armed.
    pub fn consume_retry(&mut self) {
        self.retries_left = self.retries_left.saturating_sub(1);
    }

    /// The host asked for a detail view: grant a fresh retry budget.
    ///
    /// Returns the delay before the next retry, if one is needed.
    pub fn on_detail_requested<B>(
        &mut self,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) -> Option<Duration>
    where
        B: SchedulerBackend + Clone + 'static,
    {
        self.retries_left = self.config.max_retries;
        self.revalidate(host, prefs, now)
    }

    /// The host rebuilt part of its document.
    pub fn on_mutation<B>(
        &mut self,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) -> Option<Duration>
    where
        B: SchedulerBackend + Clone + 'static,
    {
        self.revalidate(host, prefs, now)
    }

    pub fn on_retry<B>(
        &mut self,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) -> Option<Duration>
    where
        B: SchedulerBackend + Clone + 'static,
    {
        self.revalidate(host, prefs, now)
    }

    pub fn on_detail_closed(&mut self) {
        self.retries_left = 0;
        self.teardown("detail view closed");
    }

    /// New registry, entities or catalog: re-derive the current panel.
    pub fn on_host_changed(&mut self, host: &HostState, now: EpochSeconds) {
        if self.panel.is_some() {
            self.phase = PanelPhase::Updating;
            if !self.sync_operations(host) {
                return;
            }
            self.refresh(host, now);
            self.phase = PanelPhase::Injected;
        }
    }

    pub fn on_tick(&mut self, panel_id: u64, host: &HostState, now: EpochSeconds) {
        if self.panel_id() != Some(panel_id) {
            debug!(panel = panel_id, "tick for a panel that no longer exists");
            return;
        }
        self.refresh(host, now);
    }

    /// Apply a user action; returns the backend call to make, if any.
    pub fn on_action<B>(
        &mut self,
        action: PanelAction,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) -> Option<PanelCommand>
    where
        B: SchedulerBackend + Clone + 'static,
    {
        let panel = self.panel.as_mut()?;
        let entity_id = panel.view.entity_id.clone();
        let entity = host.entity(&entity_id);
        let mut command = None;

        match action {
            PanelAction::SelectOperation(operation) => {
                if panel
                    .view
                    .select_operation(&operation, host.catalog(), entity)
                {
                    prefs.write(
                        &entity_id,
                        PreferencesPatch {
                            last_service: Some(operation),
                            ..PreferencesPatch::default()
                        },
                    );
                }
            }
            PanelAction::SetParameter { key, value } => panel.view.set_parameter(key, value),
            PanelAction::SetDelay { delay, unit } => {
                panel.view.delay = delay;
                panel.view.unit = unit;
                prefs.write(
                    &entity_id,
                    PreferencesPatch {
                        delay: Some(delay),
                        unit: Some(unit),
                        ..PreferencesPatch::default()
                    },
                );
            }
            PanelAction::SetTimeMode(mode) => {
                panel.view.time_mode = mode;
                prefs.write(
                    &entity_id,
                    PreferencesPatch {
                        time_mode: Some(mode),
                        ..PreferencesPatch::default()
                    },
                );
            }
            PanelAction::SetAtTime(at_time) => {
                panel.view.at_time = Some(at_time.clone());
                prefs.write(
                    &entity_id,
                    PreferencesPatch {
                        at_time: Some(at_time),
                        ..PreferencesPatch::default()
                    },
                );
            }
            PanelAction::SetNotify { ha, mobile } => {
                panel.view.notify_ha = ha;
                panel.view.notify_mobile = mobile;
                prefs.write(
                    &entity_id,
                    PreferencesPatch {
                        notify_ha: Some(ha),
                        notify_mobile: Some(mobile),
                        ..PreferencesPatch::default()
                    },
                );
            }
            PanelAction::ApplyHistory(index) => {
                panel.view.apply_history(index, host.catalog(), entity);
            }
            PanelAction::Schedule => {
                if panel.control.begin().is_ok() {
                    match panel.view.schedule_request() {
                        Ok(request) => {
                            info!(
                                entity_id = %entity_id,
                                task_key = %request.task_key,
                                "scheduling from panel"
                            );
                            panel.pending = Some(request.clone());
                            command = Some(PanelCommand::Schedule {
                                panel: panel.id,
                                request,
                            });
                        }
                        Err(err) => {
                            debug!(entity_id = %entity_id, error = %err, "incomplete panel form");
                            panel.control.finish(Err(err.to_string()), now);
                        }
                    }
                } else {
                    debug!(entity_id = %entity_id, "schedule ignored, control busy");
                }
            }
            PanelAction::Cancel => {
                if panel.control.begin().is_ok() {
                    let task_key = panel
                        .reconciler
                        .active()
                        .map_or_else(|| panel.view.task_key(), |active| active.key.clone());
                    info!(entity_id = %entity_id, task_key = %task_key, "cancelling from panel");
                    command = Some(PanelCommand::Cancel {
                        panel: panel.id,
                        request: CancelRequest { task_key },
                    });
                } else {
                    debug!(entity_id = %entity_id, "cancel ignored, control busy");
                }
            }
        }

        self.render(now);
        self.sync_timer(now);
        command
    }

    /// Outcome of a backend call issued by panel `panel_id`.
    pub fn on_completed<B>(
        &mut self,
        panel_id: u64,
        result: Result<(), String>,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) where
        B: SchedulerBackend + Clone + 'static,
    {
        let Some(panel) = self.panel.as_mut().filter(|panel| panel.id == panel_id) else {
            debug!(panel = panel_id, "completion for a panel that no longer exists");
            return;
        };
        if let Err(message) = &result {
            warn!(entity_id = %panel.view.entity_id, error = %message, "panel action failed");
        }
        let pending = panel.pending.take();
        if let (Ok(()), Some(request)) = (&result, pending) {
            prefs.record_schedule(&panel.view.entity_id, &request);
            panel.view.history = prefs.read(&panel.view.entity_id).history;
        }
        panel.control.finish(result, now);
        self.render(now);
        self.sync_timer(now);
    }

    fn revalidate<B>(
        &mut self,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) -> Option<Duration>
    where
        B: SchedulerBackend + Clone + 'static,
    {
        self.phase = PanelPhase::Locating;
        let Some(located) = locate(&self.document) else {
            return self.on_lookup_miss();
        };

        if let Some(panel) = &self.panel {
            if panel.mount == located.mount
                && panel.view.entity_id == located.entity_id
                && self.renderer.is_mounted(&panel.handle)
            {
                debug!(entity_id = %located.entity_id, "detail view unchanged");
                self.retries_left = 0;
                self.phase = PanelPhase::Updating;
                if !self.sync_operations(host) {
                    return None;
                }
                self.refresh(host, now);
                self.phase = PanelPhase::Injected;
                return None;
            }
            let reason = if panel.view.entity_id == located.entity_id {
                "mount point replaced"
            } else {
                "displayed entity changed"
            };
            self.teardown(reason);
        }

        self.create(located, host, prefs, now);
        None
    }

    /// A retry delay while budget remains; the caller charges it with
    /// [`consume_retry`](Self::consume_retry) when it arms a timer.
    fn on_lookup_miss(&mut self) -> Option<Duration> {
        let still_mounted = self.panel.as_ref().is_some_and(|panel| {
            self.document.is_connected(&panel.mount) && self.renderer.is_mounted(&panel.handle)
        });
        if still_mounted {
            self.phase = PanelPhase::Injected;
            return None;
        }
        self.teardown("mount point disappeared");
        (self.retries_left > 0).then_some(self.config.retry_interval)
    }

    fn create<B>(
        &mut self,
        located: Located<D::Node>,
        host: &HostState,
        prefs: &mut PreferencesCache<B>,
        now: EpochSeconds,
    ) where
        B: SchedulerBackend + Clone + 'static,
    {
        self.retries_left = 0;
        let entity_id = located.entity_id;
        let preferences = prefs.read(&entity_id);
        let Some(mut view) = PanelView::seed(
            &entity_id,
            host.entity(&entity_id),
            host.catalog(),
            &preferences,
            &host.snapshot().presets,
        ) else {
            debug!(entity_id = %entity_id, "no invokable operations, panel not created");
            self.phase = PanelPhase::Idle;
            return;
        };

        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(&host.snapshot().active_tasks, &[view.task_key()], now);
        view.mode = reconciler.display(now);

        let handle = self.renderer.mount(&located.mount, &view);
        self.next_id += 1;
        info!(
            entity_id = %entity_id,
            panel = self.next_id,
            strategy = ?located.strategy,
            "panel injected"
        );
        self.panel = Some(Panel {
            id: self.next_id,
            mount: located.mount,
            handle,
            view,
            reconciler,
            control: Control::new(),
            timer: None,
            pending: None,
        });
        self.phase = PanelPhase::Injected;
        self.sync_timer(now);
    }

    /// Re-resolve the panel's operations; removes the panel when none remain.
    fn sync_operations(&mut self, host: &HostState) -> bool {
        let Some(panel) = self.panel.as_mut() else {
            return true;
        };
        let operations = resolve_operations(host.catalog(), &panel.view.entity_id);
        if operations.is_empty() {
            self.teardown("entity no longer supported");
            return false;
        }
        panel.view.operations = operations;
        true
    }

    fn refresh(&mut self, host: &HostState, now: EpochSeconds) {
        if let Some(panel) = self.panel.as_mut() {
            let key = panel.view.task_key();
            panel
                .reconciler
                .reconcile(&host.snapshot().active_tasks, &[key], now);
        }
        self.render(now);
        self.sync_timer(now);
    }

    fn render(&mut self, now: EpochSeconds) {
        if let Some(panel) = self.panel.as_mut() {
            panel.view.mode = panel.reconciler.display(now);
            panel.view.feedback = panel.control.feedback(now);
            self.renderer.update(&panel.handle, &panel.view);
        }
    }

    /// Run the tick timer exactly while there is something to animate.
    fn sync_timer(&mut self, now: EpochSeconds) {
        let Some(panel) = self.panel.as_mut() else {
            return;
        };
        let wants_ticks = panel.view.mode.is_counting() || panel.control.has_failure(now);
        match (wants_ticks, panel.timer.take()) {
            (true, None) => {
                panel.timer = Some(
                    self.timer
                        .start(SurfaceId::Panel(panel.id), self.config.tick_interval),
                );
            }
            (true, Some(handle)) => panel.timer = Some(handle),
            (false, Some(handle)) => self.timer.stop(handle),
            (false, None) => {}
        }
    }

    fn teardown(&mut self, reason: &str) {
        if let Some(mut panel) = self.panel.take() {
            self.phase = PanelPhase::Removing;
            if let Some(handle) = panel.timer.take() {
                self.timer.stop(handle);
            }
            self.renderer.unmount(panel.handle);
            info!(entity_id = %panel.view.entity_id, panel = panel.id, reason, "panel removed");
        }
        self.phase = PanelPhase::Idle;
    }

    /// Entity shown by the current panel.
    #[must_use]
    pub fn entity_id(&self) -> Option<&EntityId> {
        self.panel.as_ref().map(|panel| &panel.view.entity_id)
    }
}
