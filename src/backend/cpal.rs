//! cpal backend - real output and input devices
//!
//! cpal streams are not `Send`, so every stream is built and kept alive on
//! its own thread. Starting waits for the thread to report back (2 s).

use super::{
    ActiveRoute, AudioBackend, InputHandle, InputSink, PortDescriptor, PortType, Renderer,
    RouteChangeReason, SessionNotification, SessionRequest, StreamFormat,
};
use crate::error::BackendError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const START_TIMEOUT: Duration = Duration::from_secs(2);
const WATCH_INTERVAL: Duration = Duration::from_millis(1000);

type Subscribers = Arc<Mutex<Vec<Sender<SessionNotification>>>>;

/// A stream kept alive on a dedicated thread until `stop_tx` is dropped
struct StreamThread {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamThread {
    fn spawn<F>(name: &str, build: F) -> Result<Self, BackendError>
    where
        F: FnOnce() -> Result<cpal::Stream, String> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<Result<(), String>>(1);
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = started_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = started_tx.send(Ok(()));
                // blocks until the owner drops the sender
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        let mut handle = Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };
        match started_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                handle.stop();
                Err(BackendError::Stream(e))
            }
            Err(_) => {
                // detach; the thread exits on its own once build returns
                handle.stop_tx.take();
                handle.thread.take();
                Err(BackendError::Timeout)
            }
        }
    }

    fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn post_all(subscribers: &Subscribers, notification: SessionNotification) {
    for tx in subscribers.lock().iter() {
        let _ = tx.send(notification);
    }
}

fn stream_error_handler(label: &'static str, subscribers: Subscribers) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            log::warn!("[CpalBackend] {} device disappeared", label);
            post_all(
                &subscribers,
                SessionNotification::RouteChanged(RouteChangeReason::OldDeviceUnavailable),
            );
        }
        other => log::error!("[CpalBackend] {} stream error: {}", label, other),
    }
}

fn list_inputs() -> Vec<PortDescriptor> {
    let host = cpal::default_host();
    let Ok(devices) = host.input_devices() else {
        return Vec::new();
    };
    devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            let channels = device.default_input_config().ok()?.channels();
            Some(PortDescriptor {
                uid: name.clone(),
                port_type: PortType::guess_from_name(&name),
                name,
                channels,
            })
        })
        .collect()
}

fn find_input(uid: Option<&str>) -> Option<cpal::Device> {
    let host = cpal::default_host();
    if let Some(uid) = uid {
        let found = host
            .input_devices()
            .ok()
            .and_then(|mut devices| devices.find(|d| d.name().ok().as_deref() == Some(uid)));
        if found.is_some() {
            return found;
        }
    }
    host.default_input_device()
}

struct CpalState {
    selected: Option<PortDescriptor>,
    io_buffer_duration: f64,
    output: Option<StreamThread>,
    inputs: HashMap<InputHandle, StreamThread>,
    next_handle: u64,
}

pub struct CpalBackend {
    state: Mutex<CpalState>,
    subscribers: Subscribers,
    output_format: StreamFormat,
    watcher_stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        let output_format = cpal::default_host()
            .default_output_device()
            .and_then(|d| d.default_output_config().ok())
            .map(|c| StreamFormat {
                sample_rate: c.sample_rate().0 as f64,
                channels: c.channels(),
            })
            .unwrap_or(StreamFormat {
                sample_rate: crate::audio::SAMPLE_RATE,
                channels: 2,
            });

        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let watcher_stop = Arc::new(AtomicBool::new(false));
        let watcher = Self::spawn_watcher(subscribers.clone(), watcher_stop.clone());

        log::info!(
            "[CpalBackend] Output {} Hz, {} channels",
            output_format.sample_rate,
            output_format.channels
        );

        Self {
            state: Mutex::new(CpalState {
                selected: None,
                io_buffer_duration: 0.0,
                output: None,
                inputs: HashMap::new(),
                next_handle: 1,
            }),
            subscribers,
            output_format,
            watcher_stop,
            watcher,
        }
    }

    /// Polls the input device set and reports new devices
    fn spawn_watcher(subscribers: Subscribers, stop: Arc<AtomicBool>) -> Option<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("mixer.deviceWatcher".to_string())
            .spawn(move || {
                let mut known = list_inputs().len();
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(WATCH_INTERVAL);
                    let count = list_inputs().len();
                    if count > known {
                        log::info!("[CpalBackend] New input device detected");
                        post_all(
                            &subscribers,
                            SessionNotification::RouteChanged(RouteChangeReason::NewDeviceAvailable),
                        );
                    }
                    known = count;
                }
            })
            .map_err(|e| log::warn!("[CpalBackend] Device watcher not started: {}", e))
            .ok()
    }

    fn stream_config(&self, channels: u16, sample_rate: f64, io_buffer_duration: f64) -> cpal::StreamConfig {
        let buffer_size = if io_buffer_duration > 0.0 {
            cpal::BufferSize::Fixed((io_buffer_duration * sample_rate).round().max(16.0) as u32)
        } else {
            cpal::BufferSize::Default
        };
        cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate as u32),
            buffer_size,
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.watcher_stop.store(true, Ordering::Relaxed);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn subscribe(&self, tx: Sender<SessionNotification>) {
        self.subscribers.lock().push(tx);
    }

    fn available_inputs(&self) -> Vec<PortDescriptor> {
        list_inputs()
    }

    fn activate(&self, request: &SessionRequest) -> Result<ActiveRoute, BackendError> {
        let inputs = list_inputs();
        let selected = match &request.preferred_input {
            Some(port) if inputs.iter().any(|p| p.uid == port.uid) => Some(port.clone()),
            _ => {
                let default_name = cpal::default_host()
                    .default_input_device()
                    .and_then(|d| d.name().ok());
                inputs
                    .iter()
                    .find(|p| Some(&p.uid) == default_name.as_ref())
                    .or(inputs.first())
                    .cloned()
            }
        };
        if cpal::default_host().default_output_device().is_none() {
            return Err(BackendError::Activation("no output device".to_string()));
        }

        let mut state = self.state.lock();
        state.selected = selected;
        if let Some(duration) = request.io_buffer_duration.filter(|d| *d > 0.0) {
            state.io_buffer_duration = duration;
        }
        Ok(ActiveRoute {
            input: state.selected.clone(),
            io_buffer_duration: state.io_buffer_duration,
        })
    }

    fn deactivate(&self) {
        let mut state = self.state.lock();
        state.selected = None;
        state.io_buffer_duration = 0.0;
    }

    fn input_format(&self) -> Option<StreamFormat> {
        let uid = self.state.lock().selected.as_ref().map(|p| p.uid.clone());
        let config = find_input(uid.as_deref())?.default_input_config().ok()?;
        Some(StreamFormat {
            sample_rate: config.sample_rate().0 as f64,
            channels: config.channels(),
        })
    }

    fn output_format(&self) -> StreamFormat {
        self.output_format
    }

    fn start(&self, renderer: Arc<dyn Renderer>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.output.is_some() {
            return Ok(());
        }
        let format = self.output_format;
        let config = self.stream_config(format.channels, format.sample_rate, state.io_buffer_duration);
        let subscribers = self.subscribers.clone();
        let channels = format.channels as usize;

        let thread = StreamThread::spawn("mixer.output", move || {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| "no output device".to_string())?;
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        renderer.render(data, channels);
                    },
                    stream_error_handler("output", subscribers),
                    None,
                )
                .map_err(|e| e.to_string())
        })?;
        state.output = Some(thread);
        log::info!("[CpalBackend] Output started");
        Ok(())
    }

    fn stop(&self) {
        let output = self.state.lock().output.take();
        if let Some(mut output) = output {
            output.stop();
            log::info!("[CpalBackend] Output stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state.lock().output.is_some()
    }

    fn open_input(&self, sink: Arc<dyn InputSink>) -> Result<InputHandle, BackendError> {
        let (uid, io_buffer_duration) = {
            let state = self.state.lock();
            (state.selected.as_ref().map(|p| p.uid.clone()), state.io_buffer_duration)
        };
        let device = find_input(uid.as_deref())
            .ok_or_else(|| BackendError::DeviceUnavailable("no input device".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| BackendError::DeviceUnavailable(e.to_string()))?;
        let channels = supported.channels();
        let config = self.stream_config(channels, supported.sample_rate().0 as f64, io_buffer_duration);
        let subscribers = self.subscribers.clone();
        drop(device);

        let thread = StreamThread::spawn("mixer.input", move || {
            let device = find_input(uid.as_deref()).ok_or_else(|| "input device vanished".to_string())?;
            let width = channels as usize;
            device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        sink.on_input(data, width);
                    },
                    stream_error_handler("input", subscribers),
                    None,
                )
                .map_err(|e| e.to_string())
        })?;

        let mut state = self.state.lock();
        let handle = InputHandle(state.next_handle);
        state.next_handle += 1;
        state.inputs.insert(handle, thread);
        Ok(handle)
    }

    fn close_input(&self, handle: InputHandle) {
        let thread = self.state.lock().inputs.remove(&handle);
        if let Some(mut thread) = thread {
            thread.stop();
        }
    }
}
