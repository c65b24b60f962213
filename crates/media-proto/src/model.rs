//! Records and response envelopes exchanged with the media server.
//!
//! The server renders most scalar fields as JSON strings (`"size": "1024"`,
//! `"width": "0"`), so numeric fields go through the [`lenient`] decoders:
//! numbers or numeric strings are accepted, anything else decodes as zero.
//! Zero-valued optional attributes are treated as "unknown".

use serde::{Deserialize, Serialize};

/// One media file as catalogued by the server.  Never patched in place; a
/// rescan replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub filename: String,
    /// Container / codec tag, e.g. "mp4".  Absent when the server left it blank.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub format: Option<String>,
    /// Bytes.
    #[serde(default, deserialize_with = "lenient::u64")]
    pub size: u64,
    /// Seconds.
    #[serde(default, deserialize_with = "lenient::f64")]
    pub duration: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_time: String,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub height: Option<u32>,
    /// Bits per second.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub bitrate: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub frame_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub video_codec: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub audio_codec: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub audio_sample_rate: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub audio_channels: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub channel_layout: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub path: Option<String>,
}

impl MediaRecord {
    /// "W × H" when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{} × {}", w, h)),
            _ => None,
        }
    }

    /// Case-insensitive substring match over filename or format.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.filename.to_lowercase().contains(needle)
            || self
                .format
                .as_deref()
                .map(|f| f.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

/// `GET /api/media/list`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MediaList {
    #[serde(default)]
    pub media_files: Vec<MediaRecord>,
}

/// `GET /api/media/scan`
#[derive(Debug, Clone, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub uptime: u64,
    #[serde(default)]
    pub version: Option<String>,
}

/// `GET /api/session/create`: the legacy direct-session path.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTicket {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SessionTicket {
    /// The URL to open for this ticket; falls back to `{base}/stream/{session_id}`.
    pub fn playback_url(&self, base_url: &str) -> Option<String> {
        if let Some(url) = self.stream_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        self.session_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}/stream/{}", base_url.trim_end_matches('/'), s))
    }
}

/// `GET /api/hls/create`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStreamAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Preparation state reported by `GET /api/hls/status/{stream_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparationStatus {
    Preparing,
    Ready,
    Error,
    /// Anything else the server says ("stopped", "creating", ...).
    Other(String),
}

impl From<&str> for PreparationStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "preparing" => Self::Preparing,
            "ready" => Self::Ready,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamStatus {
    #[serde(default)]
    status: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub progress: f64,
}

impl StreamStatus {
    pub fn new(status: &str, error_message: Option<&str>) -> Self {
        Self {
            status: status.to_string(),
            error_message: error_message.map(str::to_string),
            progress: 0.0,
        }
    }

    pub fn status(&self) -> PreparationStatus {
        PreparationStatus::from(self.status.as_str())
    }
}

/// `GET /api/hls/list`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamList {
    #[serde(default)]
    pub streams: Vec<String>,
}

/// `GET /api/hls/stop/{stream_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct StopStreamAck {
    #[serde(default)]
    pub success: bool,
}

/// Decoders that accept either JSON numbers or numeric strings.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn as_f64(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite())
    }

    fn as_u64(v: &Value) -> Option<u64> {
        match v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.max(0.0) as u64))
            }
            _ => None,
        }
    }

    pub fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(as_u64(&Value::deserialize(d)?).unwrap_or(0))
    }

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(as_f64(&Value::deserialize(d)?).unwrap_or(0.0).max(0.0))
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(as_u64(&Value::deserialize(d)?).filter(|n| *n > 0))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(as_u64(&Value::deserialize(d)?)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok()))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(as_f64(&Value::deserialize(d)?).filter(|f| *f > 0.0))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Some(string(d)?).filter(|s| !s.is_empty()))
    }
}
