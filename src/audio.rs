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
use std::{fmt, sync::Arc};

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod scheduler;
mod thread_priority;

/// Number of output channels the mixer renders.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Returned by a render callback to tell the device whether to keep calling it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A render callback. It receives an interleaved f32 buffer holding exactly the
/// requested number of frames and must fill all of it.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) -> Flow + Send + 'static>;

/// Errors raised by audio devices.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no device found with name {0}")]
    NoDevice(String),

    #[error("unable to list devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("unable to read device name: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),

    #[error("audio host unavailable: {0}")]
    Host(#[from] ::cpal::HostUnavailable),

    #[error("unable to read supported configs: {0}")]
    SupportedConfigs(#[from] ::cpal::SupportedStreamConfigsError),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("stream thread exited before the stream started")]
    StreamThread,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An open output stream. Closing it must not return while the callback is running.
pub trait Stream: Send {
    /// Stops the stream and waits for the callback to finish. Closing twice is a no-op.
    fn close(&mut self);
}

/// An audio output that periodically asks a callback for samples.
pub trait Device: fmt::Display + Send + Sync {
    /// Opens an output stream and starts calling the callback.
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        callback: RenderCallback,
    ) -> Result<Box<dyn Stream>, AudioError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" give a mock device,
/// "default" gives the host's default output.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, AudioError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}
