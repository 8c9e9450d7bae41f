#[cfg(feature = "tauri")]
const COMMANDS: &[&str] = &[
    "init_audio_session",
    "deinit_audio_session",
    "reset_plugin",
    "get_audio_session_preferred_input_port_type",
    "get_input_channel_count",
    "init_audio_file",
    "init_mic_input",
    "destroy_audio_file",
    "destroy_mic_input",
    "play",
    "stop",
    "is_playing",
    "adjust_volume",
    "get_current_volume",
    "adjust_eq",
    "get_current_eq",
    "set_elapsed_time_event",
    "get_elapsed_time",
    "get_total_time",
];

fn main() {
    // Plugin permissions are only generated for the Tauri surface
    #[cfg(feature = "tauri")]
    tauri_plugin::Builder::new(COMMANDS).build();
}
