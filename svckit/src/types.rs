use serde::{Deserialize, Deserializer, Serialize};

/// Class table of the detection model, indexed by the numeric `class` column.
pub const CLASS_NAMES: [&str; 10] = [
    "person",
    "helmet",
    "vest",
    "no_helmet",
    "face_mask",
    "boot",
    "gloves",
    "vehicle",
    "sign",
    "other_equipment",
];

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The backend stores `class` as text but may hand back either a class
/// index or a free-form label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Index(i64),
    Name(String),
}

impl ClassLabel {
    fn index(&self) -> Option<usize> {
        match self {
            ClassLabel::Index(idx) => usize::try_from(*idx).ok(),
            ClassLabel::Name(name) => name.trim().parse::<usize>().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            ClassLabel::Index(idx) => idx.to_string(),
            ClassLabel::Name(name) => name.clone(),
        }
    }
}

/// One object-classification event. A batch of these replaces the previous
/// batch wholesale; records are never edited after they arrive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub class: Option<ClassLabel>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub conf: Option<f64>,
    #[serde(default)]
    pub x1: Option<f64>,
    #[serde(default)]
    pub y1: Option<f64>,
    #[serde(default)]
    pub x2: Option<f64>,
    #[serde(default)]
    pub y2: Option<f64>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub violation_type: Option<String>,
}

impl DetectionRecord {
    /// A record is a violation when it carries a non-empty violation type.
    pub fn is_violation(&self) -> bool {
        self.violation_type.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Human-readable class: explicit `class_name`, then the class table,
    /// then whatever the backend sent.
    pub fn label(&self) -> String {
        if let Some(name) = self.class_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match &self.class {
            Some(class) => class
                .index()
                .and_then(|idx| CLASS_NAMES.get(idx))
                .map(|name| name.to_string())
                .unwrap_or_else(|| class.raw()),
            None => "unknown".to_string(),
        }
    }

    pub fn camera_id(&self) -> &str {
        self.camera.as_deref().unwrap_or("cam1")
    }

    pub fn timestamp(&self) -> &str {
        self.ts.as_deref().unwrap_or("-")
    }

    /// Confidence as a 0-100 percentage, clamped.
    pub fn confidence_percent(&self) -> Option<f64> {
        self.conf.map(|c| (c * 100.0).clamp(0.0, 100.0))
    }

    /// Evidence image reference, preferring the backend-normalized URL.
    pub fn evidence(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.image_path.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Detection count for one hour bucket (`hour` is the backend's bucket key,
/// e.g. `2025-03-01 08`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyStat {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hour: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cnt: u64,
}

impl HourlyStat {
    /// Short axis label: the part after the date, or the whole key.
    pub fn short_label(&self) -> &str {
        self.hour
            .rsplit(|c| c == ' ' || c == 'T')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.hour)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationStat {
    #[serde(default)]
    pub violation_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cnt: u64,
}

impl ViolationStat {
    pub fn label(&self) -> &str {
        self.violation_type
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown")
    }
}

/// `GET /api/detections` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub detections: Vec<DetectionRecord>,
}

/// `GET /api/stats/*` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct StatsResponse<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub data: Vec<T>,
}
