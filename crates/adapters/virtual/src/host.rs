//! Simulated scheduling backend.
//!
//! Tasks really run: start actions apply immediately, a tokio timer fires
//! the finish actions, and every change is published as a fresh
//! [`HostSnapshot`] the way a monitor sensor would report it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use quicktimer_app::ports::{Clock, SchedulerBackend};
use quicktimer_app::runtime::{Signal, SignalSender};
use quicktimer_app::timer::TokioClock;
use quicktimer_domain::entity::Entity;
use quicktimer_domain::error::QuickTimerError;
use quicktimer_domain::id::{EntityId, TaskKey};
use quicktimer_domain::preferences::{HistoryEntry, PreferencesPatch, PreferencesRecord};
use quicktimer_domain::schedule::{CancelRequest, ScheduleRequest, TimeMode};
use quicktimer_domain::snapshot::{HostSnapshot, TimePresets};
use quicktimer_domain::task::{TaskAction, TaskRecord, TaskRegistry};
use quicktimer_domain::time::{EpochSeconds, from_epoch, to_epoch};

use crate::devices::actuate;
use crate::error::VirtualHostError;

const UPDATE_CAPACITY: usize = 64;

/// A change the simulated host publishes.
#[derive(Debug, Clone)]
pub enum HostUpdate {
    /// New monitor attributes: tasks, preferences and presets.
    Snapshot(HostSnapshot),
    /// An entity changed state because an action ran.
    Entity(Entity),
}

/// Cheaply cloneable handle to the simulated host.
#[derive(Clone)]
pub struct VirtualHost {
    inner: Arc<Inner>,
}

struct Inner {
    clock: TokioClock,
    history_limit: usize,
    updates: broadcast::Sender<HostUpdate>,
    state: Mutex<HostData>,
}

#[derive(Default)]
struct HostData {
    entities: BTreeMap<EntityId, Entity>,
    tasks: HashMap<TaskKey, RunningTask>,
    preferences: HashMap<EntityId, PreferencesRecord>,
    presets: TimePresets,
    next_run: u64,
}

struct RunningTask {
    run: u64,
    record: TaskRecord,
    timer: JoinHandle<()>,
}

impl VirtualHost {
    #[must_use]
    pub fn new(entities: Vec<Entity>, clock: TokioClock, history_limit: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let data = HostData {
            entities: entities
                .into_iter()
                .map(|entity| (entity.entity_id.clone(), entity))
                .collect(),
            ..HostData::default()
        };
        Self {
            inner: Arc::new(Inner {
                clock,
                history_limit,
                updates,
                state: Mutex::new(data),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostData> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every future [`HostUpdate`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HostUpdate> {
        self.inner.updates.subscribe()
    }

    /// Send the catalog, entity states and the current snapshot to a runtime.
    ///
    /// Returns `false` when the runtime is gone.
    pub fn announce(&self, sender: &SignalSender) -> bool {
        [
            Signal::Catalog(crate::catalog::demo_catalog()),
            Signal::Entities(self.entities()),
            Signal::Snapshot(self.snapshot()),
        ]
        .into_iter()
        .all(|signal| sender.send(signal).is_ok())
    }

    /// Forward every future update to a runtime until either side goes away.
    pub fn forward_to(&self, sender: SignalSender) -> JoinHandle<()> {
        let mut updates = self.subscribe();
        tokio::spawn(async move {
            loop {
                let signal = match updates.recv().await {
                    Ok(HostUpdate::Snapshot(snapshot)) => Signal::Snapshot(snapshot),
                    Ok(HostUpdate::Entity(entity)) => Signal::EntityChanged(entity),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "runtime fell behind host updates");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if sender.send(signal).is_err() {
                    break;
                }
            }
            debug!("host update forwarding stopped");
        })
    }

    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.lock().entities.values().cloned().collect()
    }

    #[must_use]
    pub fn entity(&self, entity_id: &EntityId) -> Option<Entity> {
        self.lock().entities.get(entity_id).cloned()
    }

    pub fn set_presets(&self, presets: TimePresets) {
        self.lock().presets = presets;
        self.publish_snapshot();
    }

    /// Current monitor attributes, with remaining time projected to now.
    #[must_use]
    pub fn snapshot(&self) -> HostSnapshot {
        let now = self.inner.clock.now();
        let data = self.lock();
        let registry: TaskRegistry = data
            .tasks
            .iter()
            .map(|(key, task)| {
                let mut record = task.record.clone();
                record.remaining_seconds = record.end_timestamp.map(|end| whole_seconds(end - now));
                (key.clone(), record)
            })
            .collect();
        let mut snapshot = HostSnapshot::new(registry);
        snapshot.preferences = data
            .preferences
            .iter()
            .map(|(id, record)| (id.to_string(), record.clone()))
            .collect();
        snapshot.presets = data.presets.clone();
        snapshot
    }

    fn start(&self, request: ScheduleRequest) -> Result<(), VirtualHostError> {
        request.validate().map_err(QuickTimerError::from)?;
        let now = self.inner.clock.now();
        let end = match request.time_mode {
            TimeMode::Relative => now + Duration::from_secs(request.delay_seconds()).as_secs_f64(),
            TimeMode::Absolute => {
                let wall = from_epoch(now).unwrap_or_else(Utc::now).with_timezone(&Local);
                let end = request
                    .resolve_end(&wall)
                    .map_err(QuickTimerError::from)?;
                to_epoch(end.with_timezone(&Utc))
            }
        };

        let changed = {
            let mut data = self.lock();
            for action in request.start_actions.iter().chain(&request.finish_actions) {
                for entity_id in &action.target.entity_id {
                    if !data.entities.contains_key(entity_id) {
                        return Err(VirtualHostError::UnknownEntity(entity_id.clone()));
                    }
                }
            }

            if let Some(previous) = data.tasks.remove(&request.task_key) {
                previous.timer.abort();
                debug!(task_key = %request.task_key, "replacing running task");
            }

            let changed = run_actions(&mut data.entities, &request.start_actions);

            if let Some(primary) = request.primary_entity() {
                let limit = self.inner.history_limit;
                data.preferences
                    .entry(primary.clone())
                    .or_default()
                    .push_history(HistoryEntry::from(&request), limit);
            }

            data.next_run += 1;
            let run = data.next_run;
            let record = task_record(&request, now, end);
            let timer = self.spawn_finish(request.task_key.clone(), run, end - now);
            data.tasks.insert(
                request.task_key.clone(),
                RunningTask { run, record, timer },
            );
            changed
        };

        info!(task_key = %request.task_key, end, "virtual task started");
        self.publish_entities(changed);
        self.publish_snapshot();
        Ok(())
    }

    fn spawn_finish(&self, key: TaskKey, run: u64, wait: EpochSeconds) -> JoinHandle<()> {
        let host = self.clone();
        let wait = Duration::try_from_secs_f64(wait.max(0.0)).unwrap_or_default();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            host.finish(&key, run);
        })
    }

    fn finish(&self, key: &TaskKey, run: u64) {
        let changed = {
            let mut data = self.lock();
            if data.tasks.get(key).is_none_or(|task| task.run != run) {
                debug!(task_key = %key, "stale finish timer");
                return;
            }
            let Some(task) = data.tasks.remove(key) else {
                return;
            };
            run_actions(&mut data.entities, &task.record.finish_actions)
        };
        info!(task_key = %key, "virtual task finished");
        self.publish_entities(changed);
        self.publish_snapshot();
    }

    fn stop(&self, key: &TaskKey) -> Result<(), VirtualHostError> {
        let task = self
            .lock()
            .tasks
            .remove(key)
            .ok_or_else(|| VirtualHostError::UnknownTask(key.clone()))?;
        task.timer.abort();
        info!(task_key = %key, "virtual task cancelled");
        self.publish_snapshot();
        Ok(())
    }

    fn store_preferences(&self, entity_id: &EntityId, patch: &PreferencesPatch) {
        self.lock()
            .preferences
            .entry(entity_id.clone())
            .or_default()
            .apply(patch);
        debug!(entity_id = %entity_id, "preferences stored");
        self.publish_snapshot();
    }

    fn publish_entities(&self, entities: Vec<Entity>) {
        for entity in entities {
            let _ = self.inner.updates.send(HostUpdate::Entity(entity));
        }
    }

    fn publish_snapshot(&self) {
        let _ = self.inner.updates.send(HostUpdate::Snapshot(self.snapshot()));
    }
}

impl SchedulerBackend for VirtualHost {
    fn schedule(
        &self,
        request: ScheduleRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let host = self.clone();
        async move { host.start(request).map_err(VirtualHostError::into_domain) }
    }

    fn cancel(
        &self,
        request: CancelRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let host = self.clone();
        async move {
            host.stop(&request.task_key)
                .map_err(VirtualHostError::into_domain)
        }
    }

    fn persist_preferences(
        &self,
        entity_id: EntityId,
        patch: PreferencesPatch,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        let host = self.clone();
        async move {
            host.store_preferences(&entity_id, &patch);
            Ok(())
        }
    }
}

/// Apply `actions` and return every entity they changed, in action order.
fn run_actions(entities: &mut BTreeMap<EntityId, Entity>, actions: &[TaskAction]) -> Vec<Entity> {
    let mut changed = Vec::new();
    for action in actions {
        for entity_id in &action.target.entity_id {
            let Some(entity) = entities.get_mut(entity_id) else {
                warn!(
                    entity_id = %entity_id,
                    service = %action.service,
                    "action target disappeared"
                );
                continue;
            };
            match actuate(entity, action) {
                Ok(()) => changed.push(entity.clone()),
                Err(err) => {
                    warn!(
                        entity_id = %entity_id,
                        service = %action.service,
                        error = %err,
                        "action failed"
                    );
                }
            }
        }
    }
    changed
}

fn task_record(request: &ScheduleRequest, start: EpochSeconds, end: EpochSeconds) -> TaskRecord {
    let rfc3339 = |secs: EpochSeconds| from_epoch(secs).map(|ts| ts.to_rfc3339());
    TaskRecord {
        start_timestamp: Some(start),
        end_timestamp: Some(end),
        remaining_seconds: Some(whole_seconds(end - start)),
        scheduled_time: rfc3339(start),
        end_time: rfc3339(end),
        delay_seconds: match request.time_mode {
            TimeMode::Relative => Some(request.delay_seconds()),
            TimeMode::Absolute => None,
        },
        start_actions: request.start_actions.clone(),
        finish_actions: request.finish_actions.clone(),
        task_label: request.label.clone(),
        time_mode: Some(request.time_mode),
        at_time: request.at_time.clone(),
        notify_ha: request.notify_ha,
        notify_mobile: request.notify_mobile,
        notify_devices: request.notify_devices.clone(),
    }
}

fn whole_seconds(secs: EpochSeconds) -> u64 {
    Duration::try_from_secs_f64(secs.max(0.0).ceil()).map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::demo_entities;
    use quicktimer_domain::entity::EntityState;
    use quicktimer_domain::error::NotFoundError;
    use quicktimer_domain::schedule::{DelayUnit, Target};

    const NOW: f64 = 1_791_964_800.0;

    fn host() -> VirtualHost {
        VirtualHost::new(demo_entities().unwrap(), TokioClock::anchored(NOW), 3)
    }

    fn light() -> EntityId {
        EntityId::new("light.living_room").unwrap()
    }

    fn light_for(minutes: u32) -> ScheduleRequest {
        ScheduleRequest::builder()
            .target(&Target::immediate(light(), "light.turn_on"))
            .relative(minutes, DelayUnit::Minutes)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_start_actions_immediately() {
        let host = host();
        host.schedule(light_for(1)).await.unwrap();

        assert_eq!(host.entity(&light()).unwrap().state, EntityState::On);
        let snapshot = host.snapshot();
        let record = snapshot.active_tasks.get("light.living_room").unwrap();
        assert_eq!(record.start_timestamp, Some(NOW));
        assert_eq!(record.end_timestamp, Some(NOW + 60.0));
        assert_eq!(record.remaining_seconds, Some(60));
        assert_eq!(snapshot.task_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_finish_actions_when_timer_expires() {
        let host = host();
        host.schedule(light_for(1)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(host.entity(&light()).unwrap().state, EntityState::Off);
        assert!(host.snapshot().active_tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_project_remaining_seconds_on_later_snapshots() {
        let host = host();
        host.schedule(light_for(2)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = host.snapshot();
        let record = snapshot.active_tasks.get("light.living_room").unwrap();
        assert_eq!(record.remaining_seconds, Some(90));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_replacement_when_first_timer_would_have_fired() {
        let host = host();
        host.schedule(light_for(1)).await.unwrap();
        host.schedule(light_for(5)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(90)).await;

        assert_eq!(host.snapshot().active_tasks.len(), 1);
        assert_eq!(host.entity(&light()).unwrap().state, EntityState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_timer_when_cancelled() {
        let host = host();
        host.schedule(light_for(1)).await.unwrap();
        host.cancel(CancelRequest {
            task_key: TaskKey::new("light.living_room").unwrap(),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(host.snapshot().active_tasks.is_empty());
        assert_eq!(host.entity(&light()).unwrap().state, EntityState::On);
    }

    #[tokio::test]
    async fn should_report_not_found_when_cancelling_unknown_task() {
        let host = host();
        let result = host
            .cancel(CancelRequest {
                task_key: TaskKey::new("qt_00000000").unwrap(),
            })
            .await;
        assert!(matches!(
            result,
            Err(QuickTimerError::NotFound(NotFoundError { entity: "Task", .. }))
        ));
    }

    #[tokio::test]
    async fn should_reject_actions_on_unknown_entities() {
        let host = host();
        let request = ScheduleRequest::builder()
            .target(&Target::deferred(
                EntityId::new("light.attic").unwrap(),
                "light.turn_off",
            ))
            .relative(1, DelayUnit::Minutes)
            .build()
            .unwrap();

        let result = host.schedule(request).await;

        assert!(matches!(result, Err(QuickTimerError::NotFound(_))));
        assert!(host.snapshot().active_tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_record_history_under_primary_entity() {
        let host = host();
        for minutes in [1, 2, 3, 1] {
            host.schedule(light_for(minutes)).await.unwrap();
        }

        let snapshot = host.snapshot();
        let history = &snapshot.preferences_for(&light()).unwrap().history;
        let delays: Vec<Option<u32>> = history.iter().map(|entry| entry.delay).collect();
        assert_eq!(delays, vec![Some(1), Some(3), Some(2)]);
    }

    #[tokio::test]
    async fn should_merge_persisted_preferences() {
        let host = host();
        host.persist_preferences(
            light(),
            PreferencesPatch {
                last_service: Some("light.turn_on".to_string()),
                ..PreferencesPatch::default()
            },
        )
        .await
        .unwrap();
        host.persist_preferences(
            light(),
            PreferencesPatch {
                delay: Some(20),
                ..PreferencesPatch::default()
            },
        )
        .await
        .unwrap();

        let snapshot = host.snapshot();
        let record = snapshot.preferences_for(&light()).unwrap();
        assert_eq!(record.last_service.as_deref(), Some("light.turn_on"));
        assert_eq!(record.delay, Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn should_publish_entity_then_snapshot_on_schedule() {
        let host = host();
        let mut updates = host.subscribe();

        host.schedule(light_for(1)).await.unwrap();

        let update = updates.recv().await.unwrap();
        assert!(matches!(update, HostUpdate::Entity(e) if e.entity_id == light()));
        assert!(matches!(
            updates.recv().await.unwrap(),
            HostUpdate::Snapshot(s) if s.task_count == 1
        ));
    }

    #[tokio::test]
    async fn should_announce_catalog_entities_and_snapshot() {
        let host = host();
        let (sender, mut receiver) = quicktimer_app::runtime::signal_channel();

        assert!(host.announce(&sender));

        assert!(matches!(receiver.recv().await, Some(Signal::Catalog(c)) if !c.is_empty()));
        assert!(matches!(receiver.recv().await, Some(Signal::Entities(e)) if e.len() == 4));
        assert!(matches!(receiver.recv().await, Some(Signal::Snapshot(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn should_forward_updates_as_signals() {
        let host = host();
        let (sender, mut receiver) = quicktimer_app::runtime::signal_channel();
        let forwarder = host.forward_to(sender);

        host.schedule(light_for(1)).await.unwrap();

        let signal = receiver.recv().await;
        assert!(matches!(signal, Some(Signal::EntityChanged(e)) if e.entity_id == light()));
        assert!(matches!(receiver.recv().await, Some(Signal::Snapshot(s)) if s.task_count == 1));
        drop(receiver);
        host.set_presets(TimePresets::default());
        forwarder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_schedule_absolute_time_in_the_future() {
        let host = host();
        let request = ScheduleRequest::builder()
            .target(&Target::deferred(light(), "light.turn_off"))
            .absolute("03:00")
            .build()
            .unwrap();

        host.schedule(request).await.unwrap();

        let snapshot = host.snapshot();
        let record = snapshot.active_tasks.get("light.living_room").unwrap();
        let end = record.end_timestamp.unwrap();
        assert!(end > NOW);
        assert!(end <= NOW + 86_400.0);
        assert_eq!(record.delay_seconds, None);
    }
}
