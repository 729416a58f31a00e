use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use crate::models::{ActivityMode, PlantKind, TimeLogEntry};

/// Sessions shorter than this are treated as accidental taps and never
/// logged. Natural completions are exempt.
pub const MIN_LOGGABLE_SECS: i64 = 5;
pub const SESSIONS_PER_ROTATION: u8 = 4;
pub const SHORT_BREAK_SECS: u64 = 5 * 60;
pub const LONG_BREAK_SECS: u64 = 15 * 60;
pub const REWARD_SELECT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    RewardPending,
    BreakRunning,
    BreakPaused,
}

/// A resumable countdown. The visible remaining time is derived from a
/// monotonic anchor rather than counted ticks, so a missed-tick window
/// (tab suspension, long GC pause) re-syncs on the next observation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub target_secs: u64,
    pub elapsed_secs: u64,
    /// Time accumulated from earlier running windows; combines with
    /// `anchor` to compute the true elapsed duration.
    #[serde(skip)]
    baseline_secs: u64,
    #[serde(skip)]
    anchor: Option<Instant>,
}

impl Countdown {
    pub fn new(target_secs: u64) -> Self {
        Self {
            target_secs,
            elapsed_secs: 0,
            baseline_secs: 0,
            anchor: None,
        }
    }

    fn exhausted(target_secs: u64) -> Self {
        Self {
            target_secs,
            elapsed_secs: target_secs,
            baseline_secs: target_secs,
            anchor: None,
        }
    }

    pub fn resume(&mut self, now: Instant) {
        self.baseline_secs = self.elapsed_secs;
        self.anchor = Some(now);
    }

    pub fn halt(&mut self) {
        self.sync();
        self.anchor = None;
        self.baseline_secs = self.elapsed_secs;
    }

    pub fn sync(&mut self) {
        if let Some(anchor) = self.anchor {
            self.elapsed_secs = self
                .baseline_secs
                .saturating_add(anchor.elapsed().as_secs());
        }
    }

    pub fn current_elapsed_secs(&self) -> u64 {
        match self.anchor {
            Some(anchor) => self
                .baseline_secs
                .saturating_add(anchor.elapsed().as_secs()),
            None => self.elapsed_secs,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.target_secs.saturating_sub(self.current_elapsed_secs())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakState {
    pub is_long: bool,
    pub countdown: Countdown,
}

/// Reward parked by a natural completion, consumed exactly once. The break
/// length is decided here, at completion time, as a pure function of the
/// rotation index.
#[derive(Debug, Clone)]
pub struct PendingReward {
    pub default_kind: PlantKind,
    pub is_long_break: bool,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub mode: ActivityMode,
    pub countdown: Countdown,
    /// Wall-clock stamp of the current loggable window. Cleared whenever a
    /// log is taken, so a second exit cannot double-log.
    pub session_started_at: Option<DateTime<Utc>>,
    pub planned_secs: u64,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub rotation_index: u8,
    pub break_state: Option<BreakState>,
    #[serde(skip)]
    pub pending_reward: Option<PendingReward>,
    #[serde(skip)]
    durations_secs: HashMap<ActivityMode, u64>,
    #[serde(skip)]
    short_break_secs: u64,
    #[serde(skip)]
    long_break_secs: u64,
}

impl TimerState {
    pub fn new(mode: ActivityMode, durations_secs: HashMap<ActivityMode, u64>) -> Self {
        let mut state = Self {
            status: TimerStatus::Idle,
            mode,
            countdown: Countdown::new(0),
            session_started_at: None,
            planned_secs: 0,
            project_id: None,
            task_id: None,
            task_name: None,
            rotation_index: 0,
            break_state: None,
            pending_reward: None,
            durations_secs,
            short_break_secs: SHORT_BREAK_SECS,
            long_break_secs: LONG_BREAK_SECS,
        };
        state.countdown = Countdown::new(state.configured_duration(mode));
        state
    }

    pub fn with_break_lengths(mut self, short_secs: u64, long_secs: u64) -> Self {
        self.short_break_secs = short_secs;
        self.long_break_secs = long_secs;
        self
    }

    pub fn configured_duration(&self, mode: ActivityMode) -> u64 {
        self.durations_secs
            .get(&mode)
            .copied()
            .unwrap_or_else(|| mode.default_duration_secs())
    }

    pub fn set_configured_duration(&mut self, mode: ActivityMode, secs: u64) {
        self.durations_secs.insert(mode, secs.max(1));
        // An idle countdown for that mode picks the new length up directly.
        if self.mode == mode
            && self.status == TimerStatus::Idle
            && self.session_started_at.is_none()
            && self.countdown.current_elapsed_secs() == 0
        {
            self.countdown = Countdown::new(secs.max(1));
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining_secs()
    }

    pub fn break_remaining_secs(&self) -> Option<u64> {
        self.break_state
            .as_ref()
            .map(|break_state| break_state.countdown.remaining_secs())
    }

    pub fn sync(&mut self) {
        match self.status {
            TimerStatus::Running => self.countdown.sync(),
            TimerStatus::BreakRunning => {
                if let Some(break_state) = &mut self.break_state {
                    break_state.countdown.sync();
                }
            }
            _ => {}
        }
    }

    /// Starts (or resumes) the focus countdown. Returns false when the
    /// current status does not allow starting.
    pub fn start(&mut self, now: DateTime<Utc>, instant: Instant) -> bool {
        if !matches!(self.status, TimerStatus::Idle | TimerStatus::Paused) {
            return false;
        }
        // A skipped session leaves remaining at zero; starting a zero-length
        // countdown would complete on the first tick and mint a reward for
        // no work, so restore the mode's length first.
        if self.countdown.remaining_secs() == 0 {
            self.countdown = Countdown::new(self.configured_duration(self.mode));
        }
        if self.session_started_at.is_none() {
            self.session_started_at = Some(now);
            self.planned_secs = self.countdown.remaining_secs();
        }
        self.countdown.resume(instant);
        self.status = TimerStatus::Running;
        true
    }

    /// Pauses the running countdown, logging the window if it is long
    /// enough. No-op from every other status.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<TimeLogEntry> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.countdown.halt();
        self.status = TimerStatus::Paused;
        self.take_exit_log(now, false)
    }

    /// Abandons the current countdown entirely: same log rule as pause, but
    /// remaining is forced to zero and the status returns to Idle.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Option<TimeLogEntry> {
        if !matches!(self.status, TimerStatus::Running | TimerStatus::Paused) {
            return None;
        }
        self.countdown.halt();
        let entry = self.take_exit_log(now, false);
        self.countdown = Countdown::exhausted(self.countdown.target_secs);
        self.status = TimerStatus::Idle;
        entry
    }

    /// Restores the mode's configured duration. Logs the abandoned window
    /// when one exists; safe to call with no session at all.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<TimeLogEntry> {
        if !matches!(
            self.status,
            TimerStatus::Idle | TimerStatus::Running | TimerStatus::Paused
        ) {
            return None;
        }
        if self.status == TimerStatus::Running {
            self.countdown.halt();
        }
        let entry = self.take_exit_log(now, false);
        self.countdown = Countdown::new(self.configured_duration(self.mode));
        self.status = TimerStatus::Idle;
        entry
    }

    /// Switches activity mode. Rejected while the countdown is running.
    pub fn switch_mode(&mut self, mode: ActivityMode, now: DateTime<Utc>) -> Option<TimeLogEntry> {
        if self.status == TimerStatus::Running {
            return None;
        }
        let entry = self.take_exit_log(now, false);
        self.mode = mode;
        self.countdown = Countdown::new(self.configured_duration(mode));
        if self.status == TimerStatus::Paused {
            self.status = TimerStatus::Idle;
        }
        entry
    }

    /// Natural completion: always logs, advances the rotation, parks the
    /// reward, and readies the countdown for the next round. The caller
    /// invokes this when a tick observes remaining == 0 while Running.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Option<(TimeLogEntry, PendingReward)> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.countdown.halt();
        let entry = self.take_exit_log(now, true)?;
        self.rotation_index = (self.rotation_index + 1) % SESSIONS_PER_ROTATION;
        let reward = PendingReward {
            default_kind: self.mode.into(),
            is_long_break: self.rotation_index == 0,
            project_id: self.project_id.clone(),
        };
        self.countdown = Countdown::new(self.configured_duration(self.mode));
        self.status = TimerStatus::RewardPending;
        self.pending_reward = Some(reward.clone());
        Some((entry, reward))
    }

    /// Consumes the parked reward. At most one caller ever gets `Some` per
    /// completion, which is what makes plant creation exactly-once.
    pub fn take_pending_reward(&mut self) -> Option<PendingReward> {
        self.pending_reward.take()
    }

    pub fn begin_break(&mut self, is_long: bool, instant: Instant) {
        let target = if is_long {
            self.long_break_secs
        } else {
            self.short_break_secs
        };
        let mut countdown = Countdown::new(target);
        countdown.resume(instant);
        self.break_state = Some(BreakState { is_long, countdown });
        self.status = TimerStatus::BreakRunning;
    }

    pub fn pause_break(&mut self) -> bool {
        if self.status != TimerStatus::BreakRunning {
            return false;
        }
        if let Some(break_state) = &mut self.break_state {
            break_state.countdown.halt();
        }
        self.status = TimerStatus::BreakPaused;
        true
    }

    pub fn resume_break(&mut self, instant: Instant) -> bool {
        if self.status != TimerStatus::BreakPaused {
            return false;
        }
        if let Some(break_state) = &mut self.break_state {
            break_state.countdown.resume(instant);
        }
        self.status = TimerStatus::BreakRunning;
        true
    }

    /// Ends the break (skipped or ran out). Breaks are never logged.
    pub fn end_break(&mut self) -> bool {
        if !matches!(
            self.status,
            TimerStatus::BreakRunning | TimerStatus::BreakPaused
        ) {
            return false;
        }
        self.break_state = None;
        self.status = TimerStatus::Idle;
        true
    }

    fn take_exit_log(&mut self, now: DateTime<Utc>, completed: bool) -> Option<TimeLogEntry> {
        let started_at = self.session_started_at.take()?;
        let elapsed = (now - started_at).num_seconds().max(0);
        if !completed && elapsed < MIN_LOGGABLE_SECS {
            return None;
        }
        Some(TimeLogEntry {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at: now,
            duration_secs: elapsed as u64,
            planned_secs: self.planned_secs,
            mode: self.mode,
            project_id: self.project_id.clone(),
            task_id: self.task_id.clone(),
            task_name: self.task_name.clone(),
            completed,
        })
    }
}
