// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Voice management for sample playback.
//!
//! Every sounding sample is a voice. The manager keeps a registry of them so
//! they can all be stopped at once. When the output drops a finished voice its
//! ID is sent back to the manager, which removes it from the registry the next
//! time the registry is used. The audio thread never takes the registry lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::audio::{Gain, Output, OutputError};
use crate::playsync::CancelHandle;

use super::loader::LoadedSample;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

pub type VoiceId = u64;

/// Represents an active voice playing a sample.
pub struct Voice {
    /// Unique ID for this voice.
    id: VoiceId,
    /// Key of the sample being played.
    sample_key: String,
    /// When this voice started playing.
    start_time: Instant,
    /// Cancel handle for stopping this voice without touching the output.
    cancel_handle: CancelHandle,
}

impl Voice {
    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn sample_key(&self) -> &str {
        &self.sample_key
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }
}

/// Reports the voice as finished when dropped.
struct Registration {
    id: VoiceId,
    finished: Sender<VoiceId>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        // The manager may already be gone.
        let _ = self.finished.send(self.id);
    }
}

/// The playable side of a voice, handed to an output.
///
/// Dropping it ends the voice.
pub struct VoiceSource {
    id: VoiceId,
    sample_key: String,
    data: Arc<Vec<f32>>,
    channel_count: usize,
    /// Index of the next sample to play in `data`.
    position: usize,
    gain: f32,
    master: Gain,
    cancel_handle: CancelHandle,
    _registration: Registration,
}

impl VoiceSource {
    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn sample_key(&self) -> &str {
        &self.sample_key
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count as u16
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_handle.is_cancelled()
    }

    /// Adds the next frame into `frame`, scaled by the voice and master gains.
    /// Mono voices are spread across every output channel; otherwise source
    /// channels map onto output channels in order.
    /// Returns false once the voice has ended and nothing was written.
    pub fn mix_next_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.position >= self.data.len() || self.cancel_handle.is_cancelled() {
            return false;
        }

        let end = (self.position + self.channel_count).min(self.data.len());
        let samples = &self.data[self.position..end];
        let gain = self.gain * self.master.get();

        if self.channel_count == 1 {
            let sample = samples[0] * gain;
            for out in frame.iter_mut() {
                *out += sample;
            }
        } else {
            for (out, sample) in frame.iter_mut().zip(samples) {
                *out += sample * gain;
            }
        }

        self.position = end;
        true
    }
}

impl std::fmt::Debug for VoiceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSource")
            .field("id", &self.id)
            .field("sample_key", &self.sample_key)
            .field("position", &self.position)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Manages active voices for sample playback.
pub struct VoiceManager {
    output: Arc<dyn Output>,
    master: Gain,
    voices: Mutex<HashMap<VoiceId, Voice>>,
    finished_tx: Sender<VoiceId>,
    finished_rx: Receiver<VoiceId>,
}

impl VoiceManager {
    pub fn new(output: Arc<dyn Output>, master: Gain) -> Self {
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
        Self {
            output,
            master,
            voices: Mutex::new(HashMap::new()),
            finished_tx,
            finished_rx,
        }
    }

    /// Locks the registry after dropping every voice the output has finished with.
    fn registry(&self) -> MutexGuard<'_, HashMap<VoiceId, Voice>> {
        let mut voices = self.voices.lock();
        for id in self.finished_rx.try_iter() {
            if voices.remove(&id).is_some() {
                debug!(voice = id, "Voice finished");
            }
        }
        voices
    }

    /// Starts a new voice for the sample. There is no voice limit.
    pub fn play(
        &self,
        sample_key: &str,
        sample: &LoadedSample,
        gain: f32,
    ) -> Result<VoiceId, OutputError> {
        let id = NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst);
        let cancel_handle = CancelHandle::new();

        self.registry().insert(
            id,
            Voice {
                id,
                sample_key: sample_key.to_string(),
                start_time: Instant::now(),
                cancel_handle: cancel_handle.clone(),
            },
        );

        let source = VoiceSource {
            id,
            sample_key: sample_key.to_string(),
            data: sample.data().clone(),
            channel_count: sample.channel_count() as usize,
            position: 0,
            gain,
            master: self.master.clone(),
            cancel_handle,
            _registration: Registration {
                id,
                finished: self.finished_tx.clone(),
            },
        };

        debug!(voice = id, sample = sample_key, gain, "Starting voice");
        // On failure the source is dropped, which reports the voice as finished.
        self.output.start(source)?;
        Ok(id)
    }

    /// Stops every registered voice and returns how many there were.
    pub fn stop_all(&self) -> usize {
        let stopped: Vec<Voice> = self.registry().drain().map(|(_, v)| v).collect();
        for voice in &stopped {
            voice.cancel_handle.cancel();
        }
        if !stopped.is_empty() {
            info!(voices = stopped.len(), "Stopped all voices");
        }
        stopped.len()
    }

    pub fn active_count(&self) -> usize {
        self.registry().len()
    }

    pub fn is_active(&self, id: VoiceId) -> bool {
        self.registry().contains_key(&id)
    }

    pub fn master_gain(&self) -> &Gain {
        &self.master
    }

    pub fn output(&self) -> &Arc<dyn Output> {
        &self.output
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("output", &self.output.to_string())
            .field("active_voices", &self.active_count())
            .field("master_gain", &self.master.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockOutput;
    use crate::audio::silent::SilentOutput;

    fn manager() -> (VoiceManager, Arc<MockOutput>) {
        let output = Arc::new(MockOutput::new("mock-test", 2, 44100));
        (VoiceManager::new(output.clone(), Gain::default()), output)
    }

    #[test]
    fn test_play_registers_voice() {
        let (voices, output) = manager();
        let sample = LoadedSample::new(vec![0.5; 8], 1, 44100);

        let id = voices.play("violin/a.mp3", &sample, 1.0).unwrap();
        assert!(voices.is_active(id));
        assert_eq!(voices.active_count(), 1);
        assert_eq!(output.started_keys(), vec!["violin/a.mp3".to_string()]);
    }

    #[test]
    fn test_voice_deregisters_on_completion() {
        let (voices, output) = manager();
        let sample = LoadedSample::new(vec![0.5; 4], 1, 44100);

        let id = voices.play("tuba/b.mp3", &sample, 1.0).unwrap();
        output.render(10);
        assert!(!voices.is_active(id));
        assert_eq!(voices.active_count(), 0);
    }

    #[test]
    fn test_voice_finished_on_another_thread() {
        let (voices, output) = manager();
        let sample = LoadedSample::new(vec![0.5; 1000], 1, 44100);
        let first = voices.play("a", &sample, 1.0).unwrap();
        let second = voices.play("b", &sample, 1.0).unwrap();

        // Drop the sources the way an audio thread would, without the manager.
        let sources = output.take_sources();
        std::thread::spawn(move || drop(sources)).join().unwrap();

        assert!(!voices.is_active(first));
        assert!(!voices.is_active(second));
        assert_eq!(voices.active_count(), 0);
        assert_eq!(voices.stop_all(), 0);
    }

    #[test]
    fn test_voice_outliving_manager() {
        let output = Arc::new(MockOutput::new("mock-test", 2, 44100));
        let voices = VoiceManager::new(output.clone(), Gain::default());
        voices
            .play("a", &LoadedSample::new(vec![0.5; 4], 1, 44100), 1.0)
            .unwrap();
        drop(voices);

        // Finishing a voice after its manager is gone is harmless.
        output.render(10);
        assert_eq!(output.sounding(), 0);
    }

    #[test]
    fn test_stop_all_twice() {
        let (voices, output) = manager();
        let sample = LoadedSample::new(vec![0.5; 1000], 1, 44100);
        voices.play("a", &sample, 1.0).unwrap();
        voices.play("b", &sample, 1.0).unwrap();

        assert_eq!(voices.stop_all(), 2);
        assert_eq!(voices.active_count(), 0);
        assert_eq!(voices.stop_all(), 0);

        // Stopped voices produce no more audio.
        assert!(output.render(4).iter().all(|s| *s == 0.0));
        assert_eq!(output.sounding(), 0);
    }

    #[test]
    fn test_stop_all_on_empty_manager() {
        let (voices, _) = manager();
        assert_eq!(voices.stop_all(), 0);
    }

    #[test]
    fn test_silent_output_never_holds_voices() {
        let voices = VoiceManager::new(Arc::new(SilentOutput::new(44100)), Gain::default());
        let sample = LoadedSample::new(vec![0.5; 1000], 1, 44100);

        let id = voices.play("a", &sample, 1.0).unwrap();
        assert!(!voices.is_active(id));
    }

    #[test]
    fn test_mix_next_frame_applies_gains() {
        let (voices, output) = manager();
        voices.master_gain().set(0.5);
        let sample = LoadedSample::new(vec![0.8, -0.4], 2, 44100);
        voices.play("stereo", &sample, 0.5).unwrap();

        let frames = output.render(2);
        assert_eq!(frames.len(), 4);
        assert!((frames[0] - 0.2).abs() < 1e-6);
        assert!((frames[1] + 0.1).abs() < 1e-6);
        assert_eq!(frames[2], 0.0);
        assert_eq!(frames[3], 0.0);
    }
}
