mod common;

use common::{request, Harness};
use mixer_lib::ResponseStatus;
use serde_json::json;

#[test]
fn test_calls_before_session_are_rejected() {
    let h = Harness::new();
    let response = h.mixer.play(request(json!({"audioId": "a"})));
    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.message, "Must call initAudioSession prior to any other usage");

    let path = h.wav("a.wav", 4800);
    let response = h.mixer.init_audio_file(request(json!({"audioId": "a", "filePath": path})));
    assert_eq!(response.message, "Must call initAudioSession prior to any other usage");
    assert_eq!(h.mixer.channel_count(), 0);
}

#[test]
fn test_session_init_twice_and_deinit() {
    let h = Harness::active();
    let response = h.mixer.init_audio_session(request(json!({})));
    assert!(!response.is_success());
    assert!(response.message.contains("deinitAudioSession"));

    assert!(h.mixer.deinit_audio_session().is_success());
    let response = h.mixer.init_audio_session(request(json!({
        "inputPortType": "builtInMic",
        "ioBufferDuration": 0.01,
    })));
    assert!(response.is_success());
    let data = response.data.unwrap();
    assert_eq!(data.preferred_input_port_type.as_deref(), Some("builtInMic"));
    assert_eq!(h.backend.selected_input().map(|p| p.uid), Some("offline-mic".to_string()));
}

#[test]
fn test_file_lifecycle_over_the_envelope() {
    let h = Harness::active();
    let path = h.wav("a.wav", 48000);
    let response = h.mixer.init_audio_file(request(json!({
        "audioId": "a",
        "filePath": path,
        "volume": 0.5,
        "eqSettings": {"bassGain": 2.0},
    })));
    assert!(response.is_success(), "{}", response.message);
    assert_eq!(response.data.unwrap().value, "a");

    let state = h.mixer.play(request(json!({"audioId": "a"})));
    assert_eq!(state.data.unwrap().state, "play");
    assert!(h.mixer.is_playing(request(json!({"audioId": "a"}))).data.unwrap().value);

    h.backend.render(24000);
    let elapsed = h.mixer.get_elapsed_time(request(json!({"audioId": "a"}))).data.unwrap();
    assert_eq!((elapsed.milli_seconds, elapsed.seconds), (500, 0));
    let total = h.mixer.get_total_time(request(json!({"audioId": "a"}))).data.unwrap();
    assert_eq!((total.milli_seconds, total.seconds), (0, 1));

    let state = h.mixer.play(request(json!({"audioId": "a"})));
    assert_eq!(state.data.unwrap().state, "pause");
    let state = h.mixer.stop(request(json!({"audioId": "a"})));
    assert_eq!(state.data.unwrap().state, "stop");
    let elapsed = h.mixer.get_elapsed_time(request(json!({"audioId": "a"}))).data.unwrap();
    assert_eq!(elapsed.seconds + elapsed.milli_seconds, 0);

    let volume = h.mixer.get_current_volume(request(json!({"audioId": "a", "inputType": "file"})));
    assert_eq!(volume.data.unwrap().volume, 0.5);
    let eq = h.mixer.get_current_eq(request(json!({"audioId": "a", "inputType": "file"})));
    assert_eq!(eq.data.unwrap().bass_gain, 2.0);
}

#[test]
fn test_volume_and_eq_validation() {
    let h = Harness::active();
    let path = h.wav("a.wav", 4800);
    assert!(h
        .mixer
        .init_audio_file(request(json!({"audioId": "a", "filePath": path})))
        .is_success());

    let response = h.mixer.adjust_volume(request(json!({"audioId": "a", "volume": -0.1, "inputType": "file"})));
    assert_eq!(response.message, "in adjustVolume - volume cannot be less than zero percent");

    let response = h.mixer.adjust_volume(request(json!({"audioId": "a", "volume": 0.8, "inputType": "mic"})));
    assert_eq!(response.message, "Could not find object at [audioId]");

    let response = h.mixer.adjust_eq(request(json!({"audioId": "a", "inputType": "file", "gain": 1.0})));
    assert_eq!(response.message, "from adjustEq - filter type not specified");

    let response = h.mixer.adjust_eq(request(json!({
        "audioId": "a", "inputType": "file", "eqType": "mid", "gain": -101.0,
    })));
    assert_eq!(response.message, "from adjustEq - gain too low");

    let response = h.mixer.adjust_eq(request(json!({
        "audioId": "a", "inputType": "file", "eqType": "treble", "gain": 3.0, "frequency": 9000.0,
    })));
    assert!(response.is_success(), "{}", response.message);
    let eq = h
        .mixer
        .get_current_eq(request(json!({"audioId": "a", "inputType": "file"})))
        .data
        .unwrap();
    assert_eq!((eq.treble_gain, eq.treble_frequency), (3.0, 9000.0));

    // rejected calls leave settings untouched
    let volume = h.mixer.get_current_volume(request(json!({"audioId": "a", "inputType": "file"})));
    assert_eq!(volume.data.unwrap().volume, 1.0);
}

#[test]
fn test_init_file_validation_and_duplicates() {
    let h = Harness::active();
    let response = h.mixer.init_audio_file(request(json!({"audioId": "a"})));
    assert_eq!(response.message, "filePath not found");
    let path = h.wav("a.wav", 4800);
    let response = h.mixer.init_audio_file(request(json!({"filePath": path})));
    assert_eq!(response.message, "audioId not found");

    let missing = h.dir.path().join("missing.wav");
    let response = h.mixer.init_audio_file(request(json!({"audioId": "a", "filePath": missing})));
    assert!(!response.is_success());
    assert_eq!(h.mixer.channel_count(), 0);

    assert!(h
        .mixer
        .init_audio_file(request(json!({"audioId": "a", "filePath": path})))
        .is_success());
    let response = h.mixer.init_mic_input(request(json!({"audioId": "a", "channelNumber": 0})));
    assert_eq!(response.message, "audioId already in use");
    assert_eq!(h.mixer.channel_count(), 1);
}

#[test]
fn test_unknown_channel_messages() {
    let h = Harness::active();
    let response = h.mixer.play(request(json!({"audioId": "nope"})));
    assert_eq!(response.message, "from play - File not yet added to queue");
    let response = h.mixer.is_playing(request(json!({})));
    assert_eq!(response.message, "from isPlaying - audioId not found");

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["data"], json!({}));
}

#[test]
fn test_mic_envelope() {
    let h = Harness::active();
    let response = h.mixer.init_mic_input(request(json!({"audioId": "mic"})));
    assert_eq!(response.message, "no channel number");
    let response = h.mixer.init_mic_input(request(json!({"audioId": "mic", "channelNumber": 5})));
    assert!(!response.is_success());

    assert!(h
        .mixer
        .init_mic_input(request(json!({"audioId": "mic", "channelNumber": 1})))
        .is_success());
    assert!(h.mixer.is_playing(request(json!({"audioId": "mic"}))).data.unwrap().value);
    let state = h.mixer.play(request(json!({"audioId": "mic"})));
    assert_eq!(state.data.unwrap().state, "Not implemented.");

    let count = h.mixer.get_input_channel_count().data.unwrap();
    assert_eq!(count.channel_count, 2);
    assert_eq!(count.device_name, "Offline Microphone");

    let response = h.mixer.destroy_audio_file(request(json!({"audioId": "mic"})));
    assert_eq!(response.message, "Could not find object at [audioId]");
    assert!(h.mixer.destroy_mic_input(request(json!({"audioId": "mic"}))).is_success());
    assert_eq!(h.backend.open_input_count(), 0);
}
