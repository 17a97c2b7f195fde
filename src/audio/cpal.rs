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
use crossbeam_channel::{bounded, Sender};
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{AudioError, Device as AudioDevice, Flow, RenderCallback, Stream};

/// Name that selects the default output device of the default host.
pub const DEFAULT_DEVICE: &str = "default";

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// The thread that owns a cpal stream. cpal streams cannot move between threads on
/// every platform, so the stream is built, played and dropped on this thread.
struct CpalStream {
    /// Dropping the sender tells the stream thread to shut down.
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Stream for CpalStream {
    fn close(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Stream thread panicked");
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Wraps the render callback for cpal: raises the callback thread's priority on the
/// first call and outputs silence once the callback asks to stop.
fn create_f32_callback(
    mut callback: RenderCallback,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut stopped = false;
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if let Some(priority) = priority.take() {
            configure_audio_thread_priority(priority, rt_audio);
        }
        if stopped {
            data.fill(0.0);
            return;
        }
        stopped = callback(data) == Flow::Stop;
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can output audio.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
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
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the default output device of the default host.
    fn default_device() -> Result<Device, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDevice(DEFAULT_DEVICE.to_string()))?;
        let max_channels = device
            .supported_output_configs()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);
        Ok(Device {
            name: device.name()?,
            max_channels,
            host_id: host.id(),
            device,
        })
    }

    /// Gets the given cpal device.
    pub fn get(name: &str) -> Result<Device, AudioError> {
        if name == DEFAULT_DEVICE {
            return Device::default_device();
        }
        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| AudioError::NoDevice(name.to_string()))
    }
}

impl AudioDevice for Device {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        callback: RenderCallback,
    ) -> Result<Box<dyn Stream>, AudioError> {
        let span = span!(Level::INFO, "open stream (cpal)");
        let _enter = span.enter();

        let device = self.device.clone();
        let name = self.name.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        // Create the stream inside the thread that keeps it alive.
        let thread = thread::spawn(move || {
            let config = cpal::StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream = match device.build_output_stream(
                &config,
                create_f32_callback(callback),
                |err| error!("CPAL output stream error: {}", err),
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Block until the stream is closed. recv fails once the sender is dropped.
            let _ = stop_rx.recv();
            if let Err(e) = stream.pause() {
                error!(err = e.to_string(), "Unable to pause stream");
            }
            drop(stream);
            info!(device = name, "CPAL output stream closed");
        });

        let mut stream = CpalStream {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    device = self.name,
                    sample_rate, channels, "CPAL output stream started"
                );
                Ok(Box::new(stream))
            }
            Ok(Err(e)) => {
                stream.close();
                Err(e)
            }
            Err(_) => {
                stream.close();
                Err(AudioError::StreamThread)
            }
        }
    }
}
