use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::Choice;

/// Where one (question, choice) bubble was drawn on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubblePosition {
    pub choice: Choice,
    pub center: (i32, i32),
    /// `(x1, y1, x2, y2)`, a square with side equal to the bubble diameter.
    pub bbox: (i32, i32, i32, i32),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_pos: Option<(i32, i32)>,
}

impl BubblePosition {
    /// Builds the position of a bubble whose bounding box has its top-left
    /// corner at `(left, top)`.
    pub fn at(choice: Choice, left: i32, top: i32, diameter: u32) -> Self {
        let diameter = diameter as i32;
        let bbox = (left, top, left + diameter, top + diameter);
        Self {
            choice,
            center: ((bbox.0 + bbox.2) / 2, (bbox.1 + bbox.3) / 2),
            bbox,
            header_pos: None,
        }
    }

    pub fn with_header_pos(mut self, header_pos: (i32, i32)) -> Self {
        self.header_pos = Some(header_pos);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionLayout {
    pub question: u32,
    pub bubbles: Vec<BubblePosition>,
    /// Top-left corner of the question number label.
    pub question_pos: (f32, f32),
}

impl QuestionLayout {
    pub fn bubble(&self, choice: &Choice) -> Option<&BubblePosition> {
        self.bubbles.iter().find(|bubble| &bubble.choice == choice)
    }
}

/// The geometry table shared between template generation and grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionManifest {
    pub bubble_positions: Vec<QuestionLayout>,
    pub page_size: (u32, u32),
    pub margin: u32,
    pub bubble_diameter: u32,
    pub choices: Vec<Choice>,
}

impl PositionManifest {
    pub fn question_count(&self) -> usize {
        self.bubble_positions.len()
    }
}

#[derive(Debug)]
pub enum ManifestError {
    ReadError(PathBuf, String),
    ParseError(PathBuf, String),
    WriteError(PathBuf, String),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestError::ReadError(path, e) => {
                write!(f, "could not read manifest {}: {}", path.display(), e)
            }
            ManifestError::ParseError(path, e) => {
                write!(f, "could not parse manifest {}: {}", path.display(), e)
            }
            ManifestError::WriteError(path, e) => {
                write!(f, "could not write manifest {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ManifestError {}

/// Returns the manifest path that accompanies a template image, e.g.
/// `sheet.png` -> `sheet_positions.json`.
pub fn default_manifest_path(template_path: &Path) -> PathBuf {
    let mut result = PathBuf::from(template_path);
    result.set_file_name(format!(
        "{}_positions.json",
        template_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
    ));
    result
}

pub fn load_manifest(path: &Path) -> Result<PositionManifest, ManifestError> {
    let file = File::open(path)
        .map_err(|e| ManifestError::ReadError(path.to_path_buf(), e.to_string()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ManifestError::ParseError(path.to_path_buf(), e.to_string()))
}

pub fn save_manifest(manifest: &PositionManifest, path: &Path) -> Result<(), ManifestError> {
    let file = File::create(path)
        .map_err(|e| ManifestError::WriteError(path.to_path_buf(), e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)
        .map_err(|e| ManifestError::WriteError(path.to_path_buf(), e.to_string()))?;
    writer
        .flush()
        .map_err(|e| ManifestError::WriteError(path.to_path_buf(), e.to_string()))
}
