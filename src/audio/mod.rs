pub mod synthesis;
pub mod voice;

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use log::warn;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use serde::{Deserialize, Serialize};

use synthesis::{synthesize, AMBIENT_LOOP_SECS};
use voice::{
    AmbientVoice, VoiceControl, ADJUST_TC_SECS, AUTO_STOP_TC_SECS, AUTO_TEARDOWN_SECS,
    FADE_IN_TC_SECS, FADE_OUT_TC_SECS, TEARDOWN_SECS,
};

pub const SAMPLE_RATE: u32 = 44100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SoundKind {
    Rain,
    CoffeeShop,
    Fireplace,
    Ocean,
}

impl SoundKind {
    pub const ALL: [SoundKind; 4] = [
        SoundKind::Rain,
        SoundKind::CoffeeShop,
        SoundKind::Fireplace,
        SoundKind::Ocean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::Rain => "rain",
            SoundKind::CoffeeShop => "coffeeShop",
            SoundKind::Fireplace => "fireplace",
            SoundKind::Ocean => "ocean",
        }
    }

    /// Resting gain of the texture before the master volume is applied.
    pub fn base_volume(&self) -> f32 {
        match self {
            SoundKind::Rain => 0.45,
            SoundKind::CoffeeShop => 0.42,
            SoundKind::Fireplace => 0.50,
            SoundKind::Ocean => 0.38,
        }
    }

    /// Slow amplitude modulation (frequency in Hz, depth), where the
    /// texture calls for movement: crowd ebb, fire flicker, wave swell.
    pub fn lfo(&self) -> Option<(f32, f32)> {
        match self {
            SoundKind::Rain => None,
            SoundKind::CoffeeShop => Some((0.04, 0.30)),
            SoundKind::Fireplace => Some((0.08, 0.25)),
            SoundKind::Ocean => Some((0.12, 0.45)),
        }
    }
}

enum AudioCommand {
    Play(SoundKind),
    AdjustVolume(f32),
    AutoPlay { should_play: bool, kind: SoundKind },
    StopAll,
}

/// What a play request means, given the currently active voice.
#[derive(Debug, PartialEq, Eq)]
enum PlayAction {
    Start,
    ToggleOff,
    Replace,
}

fn play_action(active: Option<SoundKind>, requested: SoundKind) -> PlayAction {
    match active {
        None => PlayAction::Start,
        Some(kind) if kind == requested => PlayAction::ToggleOff,
        Some(_) => PlayAction::Replace,
    }
}

struct ActiveVoice {
    kind: SoundKind,
    control: Arc<VoiceControl>,
    sink: Sink,
}

struct Engine {
    _stream: Option<OutputStream>,
    output: Option<OutputStreamHandle>,
    device_failed: bool,
    active: Option<ActiveVoice>,
    draining: Vec<Sink>,
    master_volume: f32,
}

impl Engine {
    fn new() -> Self {
        Self {
            _stream: None,
            output: None,
            device_failed: false,
            active: None,
            draining: Vec::new(),
            master_volume: 1.0,
        }
    }

    fn ensure_output(&mut self) -> bool {
        if self.output.is_some() {
            return true;
        }
        if self.device_failed {
            return false;
        }
        match OutputStream::try_default() {
            Ok((stream, handle)) => {
                self._stream = Some(stream);
                self.output = Some(handle);
                true
            }
            Err(err) => {
                // Sound is a non-essential enhancement; remember the failure
                // and no-op from here on.
                self.device_failed = true;
                warn!("audio output unavailable, ambient sound disabled: {err}");
                false
            }
        }
    }

    fn prune_drained(&mut self) {
        self.draining.retain(|sink| !sink.empty());
    }

    fn start_voice(&mut self, kind: SoundKind) {
        if !self.ensure_output() {
            return;
        }
        let Some(output) = self.output.as_ref() else {
            return;
        };
        let sink = match Sink::try_new(output) {
            Ok(sink) => sink,
            Err(err) => {
                warn!("could not open an audio sink: {err}");
                return;
            }
        };
        let control = Arc::new(VoiceControl::new(
            kind.base_volume() * self.master_volume,
            FADE_IN_TC_SECS,
        ));
        let buffer = synthesize(kind, AMBIENT_LOOP_SECS, SAMPLE_RATE);
        sink.append(AmbientVoice::new(kind, buffer, control.clone()));
        self.active = Some(ActiveVoice {
            kind,
            control,
            sink,
        });
    }

    fn fade_out_active(&mut self, fade_tc_secs: f32, teardown_secs: f32) {
        if let Some(active) = self.active.take() {
            active.control.stop(fade_tc_secs, teardown_secs);
            self.draining.push(active.sink);
        }
    }

    fn dispatch(&mut self, command: AudioCommand) {
        self.prune_drained();
        match command {
            AudioCommand::Play(kind) => {
                // Fade old, start new, reassign: one command, so a
                // half-finished swap can never interleave with another call.
                match play_action(self.active.as_ref().map(|voice| voice.kind), kind) {
                    PlayAction::ToggleOff => {
                        self.fade_out_active(FADE_OUT_TC_SECS, TEARDOWN_SECS);
                    }
                    PlayAction::Replace => {
                        self.fade_out_active(FADE_OUT_TC_SECS, TEARDOWN_SECS);
                        self.start_voice(kind);
                    }
                    PlayAction::Start => self.start_voice(kind),
                }
            }
            AudioCommand::AdjustVolume(volume) => {
                self.master_volume = volume.clamp(0.0, 1.0);
                if let Some(active) = &self.active {
                    active.control.set_target(
                        active.kind.base_volume() * self.master_volume,
                        ADJUST_TC_SECS,
                    );
                }
            }
            AudioCommand::AutoPlay { should_play, kind } => {
                if should_play {
                    if self.active.is_none() {
                        self.start_voice(kind);
                    }
                } else {
                    self.fade_out_active(AUTO_STOP_TC_SECS, AUTO_TEARDOWN_SECS);
                }
            }
            AudioCommand::StopAll => {
                self.fade_out_active(FADE_OUT_TC_SECS, TEARDOWN_SECS);
            }
        }
    }
}

/// Handle to the ambient sound engine. The rodio objects are not `Send`,
/// so a dedicated thread owns them and commands arrive over a channel.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("ambient-audio".to_string())
            .spawn(move || {
                let mut engine = Engine::new();
                while let Ok(command) = rx.recv() {
                    engine.dispatch(command);
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    /// Toggles `kind`: starts it, replaces a different active sound with a
    /// crossfade, or fades it out if it is already playing.
    pub fn play(&self, kind: SoundKind) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play(kind)).map_err(|e| e.to_string())
    }

    /// Rescales the active voice to `base_volume(kind) × volume`.
    pub fn adjust_volume(&self, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::AdjustVolume(volume))
            .map_err(|e| e.to_string())
    }

    /// Edge-triggered coupling to the focus timer: starts `kind` when a
    /// session begins (unless something already plays), fades out whatever
    /// is active when it stops.
    pub fn auto_play(&self, should_play: bool, kind: SoundKind) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::AutoPlay { should_play, kind })
            .map_err(|e| e.to_string())
    }

    pub fn stop_all(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|guard| guard.clone()) {
            let _ = tx.send(AudioCommand::StopAll);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_action_keeps_at_most_one_voice() {
        assert_eq!(play_action(None, SoundKind::Rain), PlayAction::Start);
        assert_eq!(
            play_action(Some(SoundKind::Rain), SoundKind::Rain),
            PlayAction::ToggleOff
        );
        assert_eq!(
            play_action(Some(SoundKind::Rain), SoundKind::Ocean),
            PlayAction::Replace
        );
    }

    #[test]
    fn sound_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&SoundKind::CoffeeShop).unwrap(),
            "\"coffeeShop\""
        );
        for kind in SoundKind::ALL {
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }

    #[test]
    fn base_volumes_are_audible_but_headroomed() {
        for kind in SoundKind::ALL {
            let volume = kind.base_volume();
            assert!((0.1..=1.0).contains(&volume));
        }
        assert_eq!(SoundKind::Ocean.base_volume(), 0.38);
    }
}
