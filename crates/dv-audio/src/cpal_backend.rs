//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use dv_engine::Frame;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

use crate::error::AudioError;

/// Frames buffered between the renderer and the device, as a fraction of a second.
const BUFFER_DIVISOR: usize = 20;

/// CPAL-based audio output.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    /// Plays for as long as it is held
    _stream: Option<Stream>,
    producer: HeapProd<Frame>,
}

impl CpalOutput {
    /// Create a new CPAL output with default device.
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // The stream callback assumes 2-channel interleaving
        config.channels = 2;

        let buffer_size = config.sample_rate.0 as usize / BUFFER_DIVISOR;
        let rb = HeapRb::<Frame>::new(buffer_size.max(64));
        let (producer, consumer) = rb.split();

        info!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            buffer_frames = buffer_size,
            "audio output opened"
        );

        let output = Self { device, config, _stream: None, producer };

        Ok((output, consumer))
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(channels) {
                        if let Some(frame) = consumer.try_pop() {
                            let left = frame.left as f32 / 32768.0;
                            let right = frame.right as f32 / 32768.0;
                            for (i, sample) in chunk.iter_mut().enumerate() {
                                *sample = match i {
                                    0 => left,
                                    1 => right,
                                    _ => 0.0,
                                };
                            }
                        } else {
                            chunk.fill(0.0);
                        }
                    }
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self._stream = Some(stream);

        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Write a single frame, spinning until the ring buffer has room.
    /// Gives up and returns `false` once `abort` is set.
    pub fn write_spin(&mut self, frame: Frame, abort: &AtomicBool) -> bool {
        while self.producer.try_push(frame).is_err() {
            if abort.load(Ordering::Relaxed) {
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }
}
