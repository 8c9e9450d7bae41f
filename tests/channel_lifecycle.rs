mod common;

use common::{request, write_wav, Harness};
use crossbeam_channel::{unbounded, Sender};
use mixer_lib::source::WavFrameSourceProvider;
use mixer_lib::{EventBridge, Mixer, MixerConfig, MixerEvent, OfflineBackend};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Holds the first meter event inside `notify` so later blocks stay queued
struct SlowMeterBridge {
    entered: Sender<()>,
    destroyed: AtomicBool,
    delivered: AtomicUsize,
    late: AtomicUsize,
}

impl EventBridge for SlowMeterBridge {
    fn notify(&self, event_name: &str, _event: &MixerEvent) {
        if event_name != "meter-a" {
            return;
        }
        if self.destroyed.load(Ordering::SeqCst) {
            self.late.fetch_add(1, Ordering::SeqCst);
        }
        if self.delivered.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = self.entered.send(());
            std::thread::sleep(Duration::from_millis(200));
        }
    }
}

#[test]
fn test_file_channel_emits_meter_and_time() {
    let h = Harness::active();
    let path = h.wav("a.wav", 48000);
    let response = h.mixer.init_audio_file(request(json!({
        "audioId": "a",
        "filePath": path,
        "channelListenerName": "meter-a",
        "elapsedTimeEventName": "time-a",
    })));
    assert!(response.is_success(), "{}", response.message);

    h.mixer.play(request(json!({"audioId": "a"})));
    h.backend.render(4096);

    match h.next_event("meter-a").event {
        MixerEvent::Meter { meter_level } => assert!(meter_level < 0.0 && meter_level > -80.0),
        other => panic!("expected a meter event, got {:?}", other),
    }
    match h.next_event("time-a").event {
        MixerEvent::Time(time) => assert_eq!(time.hours, 0),
        other => panic!("expected a time event, got {:?}", other),
    }
}

#[test]
fn test_set_elapsed_time_event() {
    let h = Harness::active();
    let path = h.wav("a.wav", 48000);
    h.mixer.init_audio_file(request(json!({"audioId": "a", "filePath": path})));

    let response = h.mixer.set_elapsed_time_event(request(json!({"audioId": "a"})));
    assert_eq!(response.message, "from setElapsedTimeEvent - eventName not found");
    let response = h.mixer.set_elapsed_time_event(request(json!({"audioId": "a", "eventName": "late"})));
    assert!(response.is_success(), "{}", response.message);

    h.mixer.play(request(json!({"audioId": "a"})));
    h.backend.render(2048);
    assert!(matches!(h.next_event("late").event, MixerEvent::Time(_)));
}

#[test]
fn test_destroy_while_playing() {
    let h = Harness::active();
    let path = h.wav("a.wav", 48000);
    h.mixer.init_audio_file(request(json!({
        "audioId": "a",
        "filePath": path,
        "channelListenerName": "meter-a",
    })));
    h.mixer.play(request(json!({"audioId": "a"})));
    h.backend.render(1024);

    let response = h.mixer.destroy_audio_file(request(json!({"audioId": "a"})));
    assert!(response.is_success(), "{}", response.message);
    let summary = serde_json::to_value(response.data.unwrap()).unwrap();
    assert_eq!(summary, json!({"listenerName": "meter-a", "elapsedTimeEventName": ""}));
    assert_eq!(h.mixer.channel_count(), 0);

    // the graph keeps rendering without the channel
    let out = h.backend.render(1024);
    assert!(out.iter().all(|s| *s == 0.0));

    let response = h.mixer.is_playing(request(json!({"audioId": "a"})));
    assert_eq!(response.message, "from isPlaying - File not yet added to queue");
    let response = h.mixer.destroy_audio_file(request(json!({"audioId": "a"})));
    assert!(!response.is_success());
}

#[test]
fn test_queued_meter_blocks_dropped_on_destroy() {
    let (entered_tx, entered_rx) = unbounded();
    let bridge = Arc::new(SlowMeterBridge {
        entered: entered_tx,
        destroyed: AtomicBool::new(false),
        delivered: AtomicUsize::new(0),
        late: AtomicUsize::new(0),
    });
    let backend = Arc::new(OfflineBackend::new());
    let mixer = Mixer::with_parts(
        backend.clone(),
        bridge.clone(),
        Arc::new(WavFrameSourceProvider),
        MixerConfig::default(),
    );
    assert!(mixer.init_audio_session(request(json!({}))).is_success());

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir.path().join("a.wav"), 48000);
    let response = mixer.init_audio_file(request(json!({
        "audioId": "a",
        "filePath": path,
        "channelListenerName": "meter-a",
    })));
    assert!(response.is_success(), "{}", response.message);
    mixer.play(request(json!({"audioId": "a"})));

    // four blocks queued, the worker sits inside the first one
    backend.render(4096);
    entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    assert!(mixer.destroy_audio_file(request(json!({"audioId": "a"}))).is_success());
    bridge.destroyed.store(true, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(bridge.late.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.delivered.load(Ordering::SeqCst), 1);
}

#[test]
fn test_id_reusable_after_destroy() {
    let h = Harness::active();
    let path = h.wav("a.wav", 4800);
    assert!(h
        .mixer
        .init_audio_file(request(json!({"audioId": "a", "filePath": path})))
        .is_success());
    assert!(h.mixer.destroy_audio_file(request(json!({"audioId": "a"}))).is_success());
    assert!(h
        .mixer
        .init_mic_input(request(json!({"audioId": "a", "channelNumber": 0})))
        .is_success());
    assert_eq!(h.mixer.channel_count(), 1);
}

#[test]
fn test_mix_sums_playing_channels() {
    let h = Harness::active();
    for id in ["a", "b"] {
        let path = h.wav(&format!("{}.wav", id), 48000);
        h.mixer.init_audio_file(request(json!({"audioId": id, "filePath": path})));
    }
    h.mixer.play(request(json!({"audioId": "a"})));
    let one = h.backend.render(256);

    h.mixer.play(request(json!({"audioId": "b"})));
    let both = h.backend.render(256);

    let last = one.len() - 1;
    assert!(one[last] > 0.0);
    assert!(both[last] > one[last]);
}
