use serde::{Deserialize, Serialize};

/// Audio format tag for 16 kHz, 16-bit, mono little-endian PCM
pub const AUDIO_FORMAT: &str = "audio/L16;rate=16000";
pub const AUDIO_ENCODING: &str = "raw";

/// `data.status` on a response that ends the session
pub const STATUS_FINAL: i64 = 2;

/// Position of a frame in the audio stream, sent as `data.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FrameStatus {
    First = 0,
    Continue = 1,
    Last = 2,
}

impl From<FrameStatus> for u8 {
    fn from(status: FrameStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for FrameStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::First),
            1 => Ok(Self::Continue),
            2 => Ok(Self::Last),
            other => Err(format!("invalid frame status {other}")),
        }
    }
}

/// Outbound audio frame
///
/// Only the opening frame carries `common` and `business`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common: Option<Common>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<Business>,
    pub data: AudioData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Common {
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub language: String,
    pub domain: String,
    pub accent: String,
    pub vad_eos: u32,
    pub dwa: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioData {
    pub status: FrameStatus,
    pub format: String,
    pub encoding: String,
    pub audio: String, // Base64-encoded PCM bytes
}

impl AudioData {
    pub fn new(status: FrameStatus, audio: String) -> Self {
        Self {
            status,
            format: AUDIO_FORMAT.to_string(),
            encoding: AUDIO_ENCODING.to_string(),
            audio,
        }
    }
}

impl FrameMessage {
    /// Opening frame with session parameters. `status` is normally
    /// [`FrameStatus::First`], or [`FrameStatus::Last`] when the whole clip
    /// fits in one frame.
    pub fn opening(common: Common, business: Business, status: FrameStatus, audio: String) -> Self {
        Self {
            common: Some(common),
            business: Some(business),
            data: AudioData::new(status, audio),
        }
    }

    pub fn continuation(status: FrameStatus, audio: String) -> Self {
        Self {
            common: None,
            business: None,
            data: AudioData::new(status, audio),
        }
    }
}

/// Inbound message from the recognition service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// 0 on success, anything else aborts the session
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub result: Option<RecognitionResult>,
}

/// One partial recognition result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Sentence number
    #[serde(default)]
    pub sn: Option<u32>,
    /// Last sentence
    #[serde(default)]
    pub ls: bool,
    /// `"rpl"` when this result replaces earlier tokens, `"apd"` or absent to append
    #[serde(default)]
    pub pgs: Option<String>,
    /// Replaced token range `[start, end)`, present with `pgs = "rpl"`
    #[serde(default)]
    pub rg: Option<Vec<i64>>,
    #[serde(default)]
    pub ws: Option<Vec<WordGroup>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordGroup {
    /// Begin offset in 10ms units
    #[serde(default)]
    pub bg: Option<i64>,
    #[serde(default)]
    pub cw: Vec<Word>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub w: String,
}

impl ResponseMessage {
    pub fn is_error(&self) -> bool {
        self.code != 0
    }

    pub fn is_final(&self) -> bool {
        self.data
            .as_ref()
            .map(|d| d.status == STATUS_FINAL)
            .unwrap_or(false)
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        self.data.as_ref().and_then(|d| d.result.as_ref())
    }
}

impl RecognitionResult {
    /// All candidate words of all word groups, in order. `None` when the
    /// result carries no `ws` array at all.
    pub fn words(&self) -> Option<Vec<String>> {
        self.ws.as_ref().map(|groups| {
            groups
                .iter()
                .flat_map(|g| g.cw.iter().map(|cw| cw.w.clone()))
                .collect()
        })
    }

    pub fn is_replace(&self) -> bool {
        self.pgs.as_deref() == Some("rpl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn business() -> Business {
        Business {
            language: "zh_cn".to_string(),
            domain: "iat".to_string(),
            accent: "mandarin".to_string(),
            vad_eos: 5000,
            dwa: "wpgs".to_string(),
        }
    }

    #[test]
    fn test_opening_frame_shape() {
        let msg = FrameMessage::opening(
            Common {
                app_id: "app".to_string(),
            },
            business(),
            FrameStatus::First,
            "AAAA".to_string(),
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "common": {"app_id": "app"},
                "business": {
                    "language": "zh_cn",
                    "domain": "iat",
                    "accent": "mandarin",
                    "vad_eos": 5000,
                    "dwa": "wpgs"
                },
                "data": {
                    "status": 0,
                    "format": "audio/L16;rate=16000",
                    "encoding": "raw",
                    "audio": "AAAA"
                }
            })
        );
    }

    #[test]
    fn test_continuation_frame_has_only_data() {
        let msg = FrameMessage::continuation(FrameStatus::Last, "BBBB".to_string());
        let value: Value = serde_json::to_value(&msg).unwrap();

        assert!(value.get("common").is_none());
        assert!(value.get("business").is_none());
        assert_eq!(value["data"]["status"], 2);
        assert_eq!(value["data"]["audio"], "BBBB");
    }

    #[test]
    fn test_frame_status_rejects_unknown_value() {
        let err = serde_json::from_value::<AudioData>(json!({
            "status": 7,
            "format": AUDIO_FORMAT,
            "encoding": "raw",
            "audio": ""
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{
            "code": 0,
            "message": "success",
            "sid": "iat000e1234",
            "data": {
                "status": 1,
                "result": {
                    "sn": 2,
                    "ls": false,
                    "pgs": "rpl",
                    "rg": [1, 2],
                    "ws": [
                        {"bg": 0, "cw": [{"w": "今天", "sc": 0}]},
                        {"bg": 40, "cw": [{"w": "天气"}]}
                    ]
                }
            }
        }"#;

        let msg: ResponseMessage = serde_json::from_str(raw).unwrap();
        assert!(!msg.is_error());
        assert!(!msg.is_final());
        assert_eq!(msg.sid.as_deref(), Some("iat000e1234"));

        let result = msg.result().unwrap();
        assert!(result.is_replace());
        assert_eq!(result.rg, Some(vec![1, 2]));
        assert_eq!(result.words(), Some(vec!["今天".to_string(), "天气".to_string()]));
    }

    #[test]
    fn test_error_response_without_data() {
        let msg: ResponseMessage =
            serde_json::from_str(r#"{"code": 10165, "message": "invalid handle", "sid": "x"}"#)
                .unwrap();
        assert!(msg.is_error());
        assert!(!msg.is_final());
        assert!(msg.result().is_none());
    }

    #[test]
    fn test_final_status() {
        let msg: ResponseMessage =
            serde_json::from_str(r#"{"code": 0, "data": {"status": 2}}"#).unwrap();
        assert!(msg.is_final());
        assert!(msg.result().is_none());
    }

    #[test]
    fn test_result_without_ws_has_no_words() {
        let result: RecognitionResult = serde_json::from_str(r#"{"pgs": "apd"}"#).unwrap();
        assert!(result.words().is_none());
        assert!(!result.is_replace());
    }
}
