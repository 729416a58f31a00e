use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use notify_rust::Notification;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    audio::{AudioEngineHandle, SoundKind},
    models::{ActivityMode, GardenPlant, PlantKind, TimeLogEntry},
    store::SlotStore,
};

use super::state::{
    PendingReward, TimerState, TimerStatus, LONG_BREAK_SECS, REWARD_SELECT_SECS, SHORT_BREAK_SECS,
};

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub tick_interval: Duration,
    pub reward_timeout: Duration,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
    /// When set, this sound auto-starts with a focus session and fades out
    /// whenever the session stops running.
    pub auto_sound: Option<SoundKind>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            reward_timeout: Duration::from_secs(REWARD_SELECT_SECS),
            short_break_secs: SHORT_BREAK_SECS,
            long_break_secs: LONG_BREAK_SECS,
            auto_sound: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub mode: ActivityMode,
    pub remaining_secs: u64,
    pub rotation_index: u8,
    pub break_remaining_secs: Option<u64>,
    pub break_is_long: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    SessionLogged(TimeLogEntry),
    RewardPending { default_kind: PlantKind },
    PlantCreated(GardenPlant),
    BreakStarted { is_long: bool },
    BreakFinished,
}

enum TickOutcome {
    Continue,
    Stop,
    SessionDone(TimeLogEntry, PendingReward),
    BreakDone,
}

#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    store: SlotStore,
    audio: AudioEngineHandle,
    events: broadcast::Sender<TimerEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    reward_cancel: Arc<Mutex<Option<CancellationToken>>>,
    auto_sound: Arc<Mutex<Option<SoundKind>>>,
    config: TimerConfig,
}

impl TimerController {
    pub fn new(store: SlotStore, audio: AudioEngineHandle, config: TimerConfig) -> Self {
        let durations_secs: HashMap<ActivityMode, u64> = store
            .custom_durations()
            .into_iter()
            .map(|(mode, minutes)| (mode, minutes * 60))
            .collect();
        let mut state = TimerState::new(ActivityMode::Working, durations_secs)
            .with_break_lengths(config.short_break_secs, config.long_break_secs);
        let active_project = store.active_project_id();
        state.project_id = (!active_project.is_empty()).then_some(active_project);
        Self::with_state(state, store, audio, config)
    }

    fn with_state(
        state: TimerState,
        store: SlotStore,
        audio: AudioEngineHandle,
        config: TimerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            audio,
            events,
            ticker: Arc::new(Mutex::new(None)),
            reward_cancel: Arc::new(Mutex::new(None)),
            auto_sound: Arc::new(Mutex::new(config.auto_sound)),
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        guard.sync();
        snapshot_of(&guard)
    }

    /// Starts (or resumes) the focus countdown. Invalid from every status
    /// except Idle and Paused; refused starts leave everything unchanged.
    pub async fn start(&self) -> TimerSnapshot {
        let started = {
            let mut state = self.state.lock().await;
            state.start(Utc::now(), Instant::now())
        };
        if started {
            self.spawn_ticker().await;
            if let Some(kind) = *self.auto_sound.lock().await {
                let _ = self.audio.auto_play(true, kind);
            }
            info!("focus session started");
        }
        self.emit_state_changed().await
    }

    pub async fn pause(&self) -> TimerSnapshot {
        self.cancel_ticker().await;
        let entry = {
            let mut state = self.state.lock().await;
            state.sync();
            state.pause(Utc::now())
        };
        self.auto_sound_stop().await;
        if let Some(entry) = entry {
            self.record_log(entry).await;
        }
        self.emit_state_changed().await
    }

    pub async fn skip(&self) -> TimerSnapshot {
        self.cancel_ticker().await;
        let entry = {
            let mut state = self.state.lock().await;
            state.sync();
            state.skip(Utc::now())
        };
        self.auto_sound_stop().await;
        if let Some(entry) = entry {
            self.record_log(entry).await;
        }
        self.emit_state_changed().await
    }

    pub async fn reset(&self) -> TimerSnapshot {
        self.cancel_ticker().await;
        let entry = {
            let mut state = self.state.lock().await;
            state.sync();
            state.reset(Utc::now())
        };
        self.auto_sound_stop().await;
        if let Some(entry) = entry {
            self.record_log(entry).await;
        }
        self.emit_state_changed().await
    }

    pub async fn switch_mode(&self, mode: ActivityMode) -> TimerSnapshot {
        let entry = {
            let mut state = self.state.lock().await;
            if state.is_running() {
                warn!("ignoring mode switch while the countdown is running");
                return snapshot_of(&state);
            }
            state.switch_mode(mode, Utc::now())
        };
        if let Some(entry) = entry {
            self.record_log(entry).await;
        }
        self.emit_state_changed().await
    }

    /// Resolves the pending reward with an explicit pick, beating the
    /// auto-select timeout.
    pub async fn choose_plant(&self, kind: PlantKind) {
        if let Some(token) = self.reward_cancel.lock().await.take() {
            token.cancel();
        }
        self.resolve_reward(Some(kind)).await;
    }

    pub async fn pause_break(&self) -> TimerSnapshot {
        self.cancel_ticker().await;
        {
            let mut state = self.state.lock().await;
            state.sync();
            state.pause_break();
        }
        self.emit_state_changed().await
    }

    pub async fn resume_break(&self) -> TimerSnapshot {
        let resumed = {
            let mut state = self.state.lock().await;
            state.resume_break(Instant::now())
        };
        if resumed {
            self.spawn_ticker().await;
        }
        self.emit_state_changed().await
    }

    /// Ends the break early, discarding the remaining time. Breaks never
    /// produce log entries.
    pub async fn skip_break(&self) -> TimerSnapshot {
        self.cancel_ticker().await;
        {
            let mut state = self.state.lock().await;
            state.end_break();
        }
        self.emit_state_changed().await
    }

    pub async fn set_project(&self, project_id: Option<String>) {
        let mut state = self.state.lock().await;
        if state.is_running() {
            warn!("ignoring project change while the countdown is running");
            return;
        }
        state.project_id = project_id;
    }

    pub async fn set_task(&self, task_id: Option<String>, task_name: Option<String>) {
        let mut state = self.state.lock().await;
        if state.is_running() {
            warn!("ignoring task change while the countdown is running");
            return;
        }
        state.task_id = task_id;
        state.task_name = task_name;
    }

    pub async fn set_custom_duration(&self, mode: ActivityMode, minutes: u64) -> Result<()> {
        self.store.set_custom_duration(mode, minutes)?;
        let mut state = self.state.lock().await;
        state.set_configured_duration(mode, minutes.max(1) * 60);
        Ok(())
    }

    pub async fn set_auto_sound(&self, kind: Option<SoundKind>) {
        *self.auto_sound.lock().await = kind;
    }

    async fn on_tick(&self) -> bool {
        let outcome = {
            let mut state = self.state.lock().await;
            state.sync();
            match state.status {
                TimerStatus::Running => {
                    if state.remaining_secs() == 0 {
                        match state.complete(Utc::now()) {
                            Some((entry, reward)) => TickOutcome::SessionDone(entry, reward),
                            None => TickOutcome::Stop,
                        }
                    } else {
                        TickOutcome::Continue
                    }
                }
                TimerStatus::BreakRunning => {
                    if state.break_remaining_secs() == Some(0) {
                        state.end_break();
                        TickOutcome::BreakDone
                    } else {
                        TickOutcome::Continue
                    }
                }
                _ => TickOutcome::Stop,
            }
        };

        match outcome {
            TickOutcome::Continue => {
                self.emit_state_changed().await;
                true
            }
            TickOutcome::Stop => false,
            TickOutcome::SessionDone(entry, reward) => {
                // Detached: the log/reward pipeline must survive even if the
                // ticker task itself gets aborted right after this tick.
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.finish_session(entry, reward).await;
                });
                false
            }
            TickOutcome::BreakDone => {
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.finish_break().await;
                });
                false
            }
        }
    }

    async fn finish_session(&self, entry: TimeLogEntry, reward: PendingReward) {
        info!(
            "session complete: {} for {}s",
            entry.mode.as_str(),
            entry.duration_secs
        );
        // The log must be on disk before the reward prompt surfaces, so a
        // close mid-selection cannot lose the finished session.
        self.record_log(entry).await;
        self.auto_sound_stop().await;
        let _ = self.events.send(TimerEvent::RewardPending {
            default_kind: reward.default_kind,
        });
        self.spawn_reward_autoselect().await;
        self.emit_state_changed().await;
    }

    async fn spawn_reward_autoselect(&self) {
        let token = CancellationToken::new();
        {
            let mut guard = self.reward_cancel.lock().await;
            if let Some(old) = guard.take() {
                old.cancel();
            }
            *guard = Some(token.clone());
        }
        let controller = self.clone();
        let timeout = self.config.reward_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(timeout) => {
                    controller.resolve_reward(None).await;
                }
                _ = token.cancelled() => {}
            }
        });
    }

    async fn resolve_reward(&self, pick: Option<PlantKind>) {
        let (plant, is_long) = {
            let mut state = self.state.lock().await;
            // take() guarantees a single winner between the timeout and an
            // explicit pick.
            let Some(pending) = state.take_pending_reward() else {
                return;
            };
            let plant = GardenPlant {
                id: Uuid::new_v4().to_string(),
                kind: pick.unwrap_or(pending.default_kind),
                planted_at: Utc::now(),
                project_id: pending.project_id.clone(),
            };
            (plant, pending.is_long_break)
        };

        // The plant must exist before the break timer starts.
        if let Err(err) = self.store.append_plant(&plant) {
            error!("failed to persist garden plant: {err:#}");
        }
        let _ = self.events.send(TimerEvent::PlantCreated(plant));

        {
            let mut state = self.state.lock().await;
            state.begin_break(is_long, Instant::now());
        }
        let _ = self.events.send(TimerEvent::BreakStarted { is_long });
        self.spawn_ticker().await;
        self.emit_state_changed().await;
    }

    async fn finish_break(&self) {
        let _ = self.events.send(TimerEvent::BreakFinished);
        notify_break_over();
        self.emit_state_changed().await;
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.config.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !controller.on_tick().await {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn record_log(&self, entry: TimeLogEntry) {
        if let Err(err) = self.store.append_time_log(&entry) {
            error!("failed to persist time log: {err:#}");
        }
        let _ = self.events.send(TimerEvent::SessionLogged(entry));
    }

    async fn auto_sound_stop(&self) {
        if let Some(kind) = *self.auto_sound.lock().await {
            let _ = self.audio.auto_play(false, kind);
        }
    }

    async fn emit_state_changed(&self) -> TimerSnapshot {
        let snapshot = self.get_snapshot().await;
        let _ = self.events.send(TimerEvent::StateChanged(snapshot.clone()));
        snapshot
    }
}

fn snapshot_of(state: &TimerState) -> TimerSnapshot {
    TimerSnapshot {
        status: state.status,
        mode: state.mode,
        remaining_secs: state.remaining_secs(),
        rotation_index: state.rotation_index,
        break_remaining_secs: state.break_remaining_secs(),
        break_is_long: state.break_state.as_ref().map(|b| b.is_long),
    }
}

fn notify_break_over() {
    let result = Notification::new()
        .summary("Break over")
        .body("Ready for the next focus session?")
        .show();
    if let Err(err) = result {
        warn!("break-over notification failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, time::SystemTime};

    use super::*;

    fn temp_store(prefix: &str) -> SlotStore {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        SlotStore::open(PathBuf::from(format!("/tmp/{prefix}_{now}"))).unwrap()
    }

    fn fast_controller(store: &SlotStore, session_secs: u64, reward_timeout: Duration) -> TimerController {
        let config = TimerConfig {
            tick_interval: Duration::from_millis(20),
            reward_timeout,
            short_break_secs: 1,
            long_break_secs: 3,
            auto_sound: None,
        };
        let state = TimerState::new(
            ActivityMode::Working,
            HashMap::from([(ActivityMode::Working, session_secs)]),
        )
        .with_break_lengths(config.short_break_secs, config.long_break_secs);
        TimerController::with_state(state, store.clone(), AudioEngineHandle::new(), config)
    }

    #[tokio::test]
    async fn completion_mints_one_plant_and_starts_short_break() {
        let store = temp_store("focusghost_ctrl_complete");
        let controller = fast_controller(&store, 1, Duration::from_millis(80));

        let snapshot = controller.start().await;
        assert_eq!(snapshot.status, TimerStatus::Running);

        // Session (1 s) completes, the auto-select (80 ms) resolves the
        // reward, and the short break begins.
        time::sleep(Duration::from_millis(1600)).await;
        let snapshot = controller.get_snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::BreakRunning);
        assert_eq!(snapshot.break_is_long, Some(false));
        assert_eq!(snapshot.rotation_index, 1);

        let logs = store.time_logs();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].completed);

        let plants = store.garden_plants();
        assert_eq!(plants.len(), 1);
        assert_eq!(plants[0].kind, PlantKind::Work);

        // The 1 s break runs out and the machine returns to Idle.
        time::sleep(Duration::from_millis(1600)).await;
        let snapshot = controller.get_snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Idle);

        fs::remove_dir_all(store.dir()).ok();
    }

    #[tokio::test]
    async fn explicit_pick_beats_the_auto_select_timeout() {
        let store = temp_store("focusghost_ctrl_pick");
        let controller = fast_controller(&store, 1, Duration::from_secs(30));

        controller.start().await;
        time::sleep(Duration::from_millis(1300)).await;
        assert_eq!(
            controller.get_snapshot().await.status,
            TimerStatus::RewardPending
        );

        controller.choose_plant(PlantKind::Code).await;
        let plants = store.garden_plants();
        assert_eq!(plants.len(), 1);
        assert_eq!(plants[0].kind, PlantKind::Code);
        assert_eq!(
            controller.get_snapshot().await.status,
            TimerStatus::BreakRunning
        );

        // Give the (cancelled) timeout arm a moment; no second plant may
        // appear.
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.garden_plants().len(), 1);

        fs::remove_dir_all(store.dir()).ok();
    }

    #[tokio::test]
    async fn pause_without_a_session_changes_nothing() {
        let store = temp_store("focusghost_ctrl_noop");
        let controller = fast_controller(&store, 60, Duration::from_secs(15));

        let snapshot = controller.pause().await;
        assert_eq!(snapshot.status, TimerStatus::Idle);
        assert!(store.time_logs().is_empty());

        fs::remove_dir_all(store.dir()).ok();
    }

    #[tokio::test]
    async fn short_session_skip_leaves_no_log() {
        let store = temp_store("focusghost_ctrl_shortskip");
        let controller = fast_controller(&store, 60, Duration::from_secs(15));

        controller.start().await;
        time::sleep(Duration::from_millis(100)).await;
        let snapshot = controller.skip().await;
        assert_eq!(snapshot.status, TimerStatus::Idle);
        assert_eq!(snapshot.remaining_secs, 0);
        assert!(store.time_logs().is_empty(), "sub-5s sessions are noise");

        fs::remove_dir_all(store.dir()).ok();
    }
}
