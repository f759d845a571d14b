//! Wind job description: physical parameters and the ordered layer list.
//!
//! A wind definition is read from a `.wind` JSON file:
//!
//! ```json
//! {
//!   "layers": [
//!     { "windType": "hoop", "terminal": false },
//!     { "windType": "helical", "windAngle": 45, "patternNumber": 2, "skipIndex": 1,
//!       "lockDegrees": 720, "leadInMM": 10, "leadOutDegrees": 20 },
//!     { "windType": "skip", "mandrelRotation": 90 }
//!   ],
//!   "mandrelParameters": { "diameter": 70, "windLength": 300 },
//!   "towParameters": { "width": 7, "thickness": 0.5 },
//!   "defaultFeedRate": 8000
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandrelParameters {
    pub diameter: f64,
    pub wind_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TowParameters {
    pub width: f64,
    pub thickness: f64,
}

/// Circumferential layer: the tow is laid almost perpendicular to the mandrel axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoopLayer {
    /// The wind ends at the far end of the mandrel; nothing may follow.
    pub terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelicalLayer {
    pub wind_angle: f64,
    pub pattern_number: u32,
    pub skip_index: u32,
    pub lock_degrees: f64,
    #[serde(rename = "leadInMM")]
    pub lead_in_mm: f64,
    pub lead_out_degrees: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_initial_near_lock: Option<bool>,
}

/// Rotate the mandrel without depositing tow.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipLayer {
    pub mandrel_rotation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "windType", rename_all = "lowercase")]
pub enum Layer {
    Hoop(HoopLayer),
    Helical(HelicalLayer),
    Skip(SkipLayer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Hoop,
    Helical,
    Skip,
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Hoop(_) => LayerKind::Hoop,
            Layer::Helical(_) => LayerKind::Helical,
            Layer::Skip(_) => LayerKind::Skip,
        }
    }

    /// True for a hoop layer that must end the wind.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Layer::Hoop(HoopLayer { terminal: true }))
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Hoop => "hoop",
            LayerKind::Helical => "helical",
            LayerKind::Skip => "skip",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindDefinition {
    pub layers: Vec<Layer>,
    pub mandrel_parameters: MandrelParameters,
    pub tow_parameters: TowParameters,
    pub default_feed_rate: f64,
}

impl WindDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, WindFileError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn load_wind_file<P: AsRef<Path>>(path: P) -> Result<WindDefinition, WindFileError> {
    let contents = std::fs::read_to_string(path)?;
    WindDefinition::from_json_str(&contents)
}
