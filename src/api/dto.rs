//! Data Transfer Objects for API
//!
//! Requests deserialize from the host's camelCase JSON; every response is a
//! [`Response`] envelope `{status, message, data}`.

use crate::audio::eq::EqSettings;
use crate::error::MixerError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Envelope
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "T: Serialize"))]
pub struct Response<T> {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(serialize_with = "data_or_empty")]
    pub data: Option<T>,
}

fn data_or_empty<T: Serialize, S: Serializer>(data: &Option<T>, serializer: S) -> Result<S::Ok, S::Error> {
    match data {
        Some(data) => data.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl<T> Response<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(err: MixerError) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: err.to_string(),
            data: None,
        }
    }

    pub fn from_result(result: Result<T, MixerError>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::success(message, data),
            Err(err) => Self::error(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Payload for responses that carry nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyDto {}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitSessionRequest {
    pub input_port_type: Option<String>,
    pub io_buffer_duration: Option<f64>,
    pub audio_session_listener_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioIdRequest {
    pub audio_id: String,
}

/// EQ as sent by the host; missing fields take configured defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EqSettingsDto {
    pub bass_gain: Option<f32>,
    pub bass_frequency: Option<f32>,
    pub mid_gain: Option<f32>,
    pub mid_frequency: Option<f32>,
    pub treble_gain: Option<f32>,
    pub treble_frequency: Option<f32>,
}

impl EqSettingsDto {
    pub fn resolve(&self, defaults: EqSettings) -> EqSettings {
        EqSettings {
            bass_gain: self.bass_gain.unwrap_or(defaults.bass_gain),
            bass_frequency: self.bass_frequency.unwrap_or(defaults.bass_frequency),
            mid_gain: self.mid_gain.unwrap_or(defaults.mid_gain),
            mid_frequency: self.mid_frequency.unwrap_or(defaults.mid_frequency),
            treble_gain: self.treble_gain.unwrap_or(defaults.treble_gain),
            treble_frequency: self.treble_frequency.unwrap_or(defaults.treble_frequency),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitAudioFileRequest {
    pub audio_id: String,
    pub file_path: String,
    pub eq_settings: Option<EqSettingsDto>,
    pub volume: Option<f32>,
    pub channel_listener_name: Option<String>,
    pub elapsed_time_event_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitMicInputRequest {
    pub audio_id: String,
    pub channel_number: Option<i64>,
    pub eq_settings: Option<EqSettingsDto>,
    pub volume: Option<f32>,
    pub channel_listener_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputTypeRequest {
    pub audio_id: String,
    pub input_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdjustVolumeRequest {
    pub audio_id: String,
    pub volume: Option<f32>,
    pub input_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdjustEqRequest {
    pub audio_id: String,
    pub eq_type: String,
    pub gain: Option<f32>,
    pub frequency: Option<f32>,
    pub input_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetElapsedTimeEventRequest {
    pub audio_id: String,
    pub event_name: String,
}

// =============================================================================
// Response payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoDto {
    pub preferred_input_port_type: Option<String>,
    pub preferred_input_port_name: Option<String>,
    #[serde(rename = "preferredIOBufferDuration")]
    pub preferred_io_buffer_duration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDto<T> {
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDto {
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeDto {
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputChannelCountDto {
    pub channel_count: u16,
    pub device_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_has_empty_data() {
        let response: Response<VolumeDto> =
            Response::error(MixerError::Validation("audioId not found".to_string()));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "error", "message": "audioId not found", "data": {}})
        );
    }

    #[test]
    fn test_success_envelope() {
        let response = Response::success("here is the current volume", VolumeDto { volume: 0.5 });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "success", "message": "here is the current volume", "data": {"volume": 0.5}})
        );
    }

    #[test]
    fn test_requests_accept_missing_fields() {
        let req: InitAudioFileRequest =
            serde_json::from_value(json!({"audioId": "a", "filePath": "/tmp/a.wav"})).unwrap();
        assert_eq!(req.audio_id, "a");
        assert!(req.eq_settings.is_none());

        let req: AdjustEqRequest = serde_json::from_value(json!({"audioId": "a", "eqType": "bass"})).unwrap();
        assert_eq!(req.gain, None);
        assert_eq!(req.input_type, "");
    }

    #[test]
    fn test_partial_eq_resolves_against_defaults() {
        let dto: EqSettingsDto = serde_json::from_value(json!({"midGain": 3.0})).unwrap();
        let eq = dto.resolve(EqSettings::default());
        assert_eq!(eq.mid_gain, 3.0);
        assert_eq!(eq.mid_frequency, 500.0);
        assert_eq!(eq.bass_frequency, 115.0);
    }

    #[test]
    fn test_session_info_field_names() {
        let info = SessionInfoDto {
            preferred_input_port_type: Some("usbAudio".to_string()),
            preferred_input_port_name: None,
            preferred_io_buffer_duration: 0.005,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert!(value.get("preferredIOBufferDuration").is_some());
        assert_eq!(value["preferredInputPortType"], "usbAudio");
    }
}
