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
use std::{fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{error, info, span, Level};

use crate::audio::mixer::Mixer;
use crate::audio::OutputError;
use crate::samples::VoiceSource;

/// An output backed by a cpal stream.
///
/// cpal streams can't move between threads, so the stream lives on its own
/// thread. Voices reach the audio callback over a channel and the callback
/// owns the mixer.
pub struct CpalOutput {
    /// The name of the device.
    name: String,
    /// The host the device belongs to.
    host_id: cpal::HostId,
    /// Number of output channels the stream was opened with.
    channels: u16,
    sample_rate: u32,
    /// Sends new voices to the audio callback.
    source_tx: Sender<VoiceSource>,
    /// Tells the stream thread to close the stream.
    shutdown_tx: Sender<()>,
    /// Handle to the stream thread.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Opens the named device, or the host default for `default`.
    pub fn get(name: &str, sample_rate: u32) -> Result<CpalOutput, OutputError> {
        let span = span!(Level::INFO, "open output (cpal)");
        let _enter = span.enter();

        let (device, host_id) = find_device(name)?;
        let device_name = device
            .name()
            .map_err(|e| OutputError::Device(e.to_string()))?;
        let default_config = device
            .default_output_config()
            .map_err(|e| OutputError::Device(e.to_string()))?;
        let channels = default_config.channels();
        let sample_format = default_config.sample_format();

        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let output_thread = thread::spawn(move || {
            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, source_rx),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, source_rx),
                cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, source_rx),
                other => Err(OutputError::Stream(format!(
                    "unsupported sample format {:?}",
                    other
                ))),
            };
            let stream = match stream.and_then(|stream| {
                stream
                    .play()
                    .map_err(|e| OutputError::Stream(e.to_string()))?;
                Ok(stream)
            }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            info!("cpal output stream started");
            let _ = ready_tx.send(Ok(()));
            // Keep the stream alive until shutdown or until the output is gone.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("cpal output stream closed");
        });

        ready_rx
            .recv()
            .map_err(|_| OutputError::Stream("output thread exited".to_string()))??;

        info!(
            device = device_name,
            host = host_id.name(),
            channels,
            sample_rate,
            "Opened output device"
        );

        Ok(CpalOutput {
            name: device_name,
            host_id,
            channels,
            sample_rate,
            source_tx,
            shutdown_tx,
            output_thread: Some(output_thread),
        })
    }
}

/// Builds an output stream whose callback mixes voices and converts them to `T`.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source_rx: Receiver<VoiceSource>,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut mixer = Mixer::new(config.channels);
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                loop {
                    match source_rx.try_recv() {
                        Ok(voice) => mixer.add(voice),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            drop(mixer.take_voices());
                            break;
                        }
                    }
                }

                scratch.resize(data.len(), 0.0);
                mixer.process_into(&mut scratch);
                for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = T::from_sample(*src);
                }
            },
            |err| error!(err = %err, "cpal output stream error"),
            None,
        )
        .map_err(|e| OutputError::Stream(e.to_string()))
}

/// Finds a device by name across every host.
fn find_device(name: &str) -> Result<(cpal::Device, cpal::HostId), OutputError> {
    if name == "default" {
        let host = cpal::default_host();
        return host
            .default_output_device()
            .map(|device| (device, host.id()))
            .ok_or_else(|| OutputError::DeviceNotFound(name.to_string()));
    }

    output_devices()?
        .into_iter()
        .find(|(device, _)| {
            device
                .name()
                .map(|device_name| device_name.trim() == name)
                .unwrap_or(false)
        })
        .ok_or_else(|| OutputError::DeviceNotFound(name.to_string()))
}

/// Every device, on every host, that can open an output stream.
fn output_devices() -> Result<Vec<(cpal::Device, cpal::HostId)>, OutputError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout().map_err(|e| OutputError::Device(e.to_string()))?;
    let _shh_stderr = shh::stderr().map_err(|e| OutputError::Device(e.to_string()))?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                continue;
            }
        };
        let host_devices = match host.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let has_outputs = device
                .supported_output_configs()
                .map(|mut configs| configs.next().is_some())
                .unwrap_or(false);
            if has_outputs {
                devices.push((device, host_id));
            }
        }
    }

    Ok(devices)
}

/// Lists output device names as `name (host)`.
pub fn list_device_names() -> Result<Vec<String>, OutputError> {
    let mut names: Vec<String> = output_devices()?
        .into_iter()
        .filter_map(|(device, host_id)| {
            device
                .name()
                .ok()
                .map(|name| format!("{} ({})", name.trim(), host_id.name()))
        })
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

impl crate::audio::Output for CpalOutput {
    fn start(&self, source: VoiceSource) -> Result<(), OutputError> {
        self.source_tx.send(source).map_err(|_| OutputError::Closed)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Display for CpalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}
