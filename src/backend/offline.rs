//! Offline backend - software clock with injectable input and notifications
//!
//! Nothing runs on its own: the host (or a test) calls [`OfflineBackend::render`]
//! to pull output and [`OfflineBackend::push_input`] to feed capture.

use super::{
    ActiveRoute, AudioBackend, InputHandle, InputSink, PortDescriptor, PortType, Renderer,
    SessionNotification, SessionRequest, StreamFormat,
};
use crate::error::BackendError;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

struct OfflineState {
    inputs: Vec<PortDescriptor>,
    output: StreamFormat,
    active: bool,
    selected: Option<PortDescriptor>,
    io_buffer_duration: f64,
    renderer: Option<Arc<dyn Renderer>>,
    sinks: Vec<(InputHandle, Arc<dyn InputSink>)>,
    next_handle: u64,
    subscribers: Vec<Sender<SessionNotification>>,
    fail_next_activate: bool,
    fail_next_start: bool,
}

pub struct OfflineBackend {
    state: Mutex<OfflineState>,
    /// Serializes input delivery against `close_input`
    capture: Mutex<()>,
}

impl OfflineBackend {
    /// Stereo 48 kHz output with one stereo built-in mic
    pub fn new() -> Self {
        Self::with_format(
            StreamFormat {
                sample_rate: 48000.0,
                channels: 2,
            },
            vec![PortDescriptor {
                uid: "offline-mic".to_string(),
                name: "Offline Microphone".to_string(),
                port_type: PortType::BuiltInMic,
                channels: 2,
            }],
        )
    }

    pub fn with_format(output: StreamFormat, inputs: Vec<PortDescriptor>) -> Self {
        Self {
            state: Mutex::new(OfflineState {
                inputs,
                output,
                active: false,
                selected: None,
                io_buffer_duration: 0.005,
                renderer: None,
                sinks: Vec::new(),
                next_handle: 1,
                subscribers: Vec::new(),
                fail_next_activate: false,
                fail_next_start: false,
            }),
            capture: Mutex::new(()),
        }
    }

    /// Pull `frames` frames from the renderer (silence when stopped)
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let (renderer, channels) = {
            let state = self.state.lock();
            (state.renderer.clone(), state.output.channels as usize)
        };
        let mut out = vec![0.0; frames * channels.max(1)];
        if let Some(renderer) = renderer {
            renderer.render(&mut out, channels);
        }
        out
    }

    /// Deliver interleaved input to every open sink
    pub fn push_input(&self, interleaved: &[f32]) {
        let _capture = self.capture.lock();
        let (sinks, channels) = {
            let state = self.state.lock();
            let channels = state
                .selected
                .as_ref()
                .or(state.inputs.first())
                .map(|p| p.channels as usize)
                .unwrap_or(1);
            (state.sinks.clone(), channels)
        };
        for (_, sink) in sinks {
            sink.on_input(interleaved, channels);
        }
    }

    /// Inject a session notification
    pub fn post(&self, notification: SessionNotification) {
        let subscribers = self.state.lock().subscribers.clone();
        for tx in subscribers {
            let _ = tx.send(notification);
        }
    }

    /// Replace the input device list (simulates plug/unplug)
    pub fn set_available_inputs(&self, inputs: Vec<PortDescriptor>) {
        let mut state = self.state.lock();
        if let Some(selected) = &state.selected {
            if !inputs.iter().any(|p| p.uid == selected.uid) {
                state.selected = inputs.first().cloned();
            }
        }
        state.inputs = inputs;
    }

    pub fn fail_next_activate(&self) {
        self.state.lock().fail_next_activate = true;
    }

    pub fn fail_next_start(&self) {
        self.state.lock().fail_next_start = true;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn open_input_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    pub fn selected_input(&self) -> Option<PortDescriptor> {
        self.state.lock().selected.clone()
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn subscribe(&self, tx: Sender<SessionNotification>) {
        self.state.lock().subscribers.push(tx);
    }

    fn available_inputs(&self) -> Vec<PortDescriptor> {
        self.state.lock().inputs.clone()
    }

    fn activate(&self, request: &SessionRequest) -> Result<ActiveRoute, BackendError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_activate) {
            return Err(BackendError::Activation("offline activation refused".to_string()));
        }
        state.selected = match &request.preferred_input {
            Some(port) if state.inputs.iter().any(|p| p.uid == port.uid) => Some(port.clone()),
            _ => state.inputs.first().cloned(),
        };
        if let Some(duration) = request.io_buffer_duration.filter(|d| *d > 0.0) {
            state.io_buffer_duration = duration;
        }
        state.active = true;
        Ok(ActiveRoute {
            input: state.selected.clone(),
            io_buffer_duration: state.io_buffer_duration,
        })
    }

    fn deactivate(&self) {
        self.state.lock().active = false;
    }

    fn input_format(&self) -> Option<StreamFormat> {
        let state = self.state.lock();
        let port = state.selected.as_ref().or(state.inputs.first())?;
        Some(StreamFormat {
            sample_rate: state.output.sample_rate,
            channels: port.channels,
        })
    }

    fn output_format(&self) -> StreamFormat {
        self.state.lock().output
    }

    fn start(&self, renderer: Arc<dyn Renderer>) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_start) {
            return Err(BackendError::Stream("offline start refused".to_string()));
        }
        state.renderer = Some(renderer);
        Ok(())
    }

    fn stop(&self) {
        self.state.lock().renderer = None;
    }

    fn is_running(&self) -> bool {
        self.state.lock().renderer.is_some()
    }

    fn open_input(&self, sink: Arc<dyn InputSink>) -> Result<InputHandle, BackendError> {
        let mut state = self.state.lock();
        if state.inputs.is_empty() {
            return Err(BackendError::DeviceUnavailable("no input device".to_string()));
        }
        let handle = InputHandle(state.next_handle);
        state.next_handle += 1;
        state.sinks.push((handle, sink));
        Ok(handle)
    }

    fn close_input(&self, handle: InputHandle) {
        let _capture = self.capture.lock();
        self.state.lock().sinks.retain(|(h, _)| *h != handle);
    }
}
