use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    grade::DEFAULT_THRESHOLD,
    layout::TemplateOptions,
    manifest::default_manifest_path,
    types::{default_choices, Choice, Size},
};

/// Settings shared by the `generate`, `mark` and `grade` commands. Every
/// field has a default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetConfig {
    pub template_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub threshold: f32,
    pub choices: Vec<Choice>,
    pub question_count: u32,
    pub margin: u32,
    pub spacing_y: u32,
    pub bubble_diameter: u32,
    pub page_size: (u32, u32),
    pub title: String,
    pub subtitle: String,
    pub footer: String,
    pub font_path: Option<PathBuf>,
    pub reference_marks: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        let template = TemplateOptions::default();
        Self {
            template_path: PathBuf::from("answer_sheet.png"),
            manifest_path: None,
            threshold: DEFAULT_THRESHOLD,
            choices: default_choices(),
            question_count: template.question_count,
            margin: template.margin,
            spacing_y: template.spacing_y,
            bubble_diameter: template.bubble_diameter,
            page_size: (template.page_size.width, template.page_size.height),
            title: template.title,
            subtitle: template.subtitle,
            footer: template.footer,
            font_path: None,
            reference_marks: template.reference_marks,
        }
    }
}

impl SheetConfig {
    /// The manifest path, defaulting to one next to the template image.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| default_manifest_path(&self.template_path))
    }

    pub fn template_options(&self) -> TemplateOptions {
        TemplateOptions {
            question_count: self.question_count,
            choices: self.choices.clone(),
            page_size: Size {
                width: self.page_size.0,
                height: self.page_size.1,
            },
            margin: self.margin,
            spacing_y: self.spacing_y,
            bubble_diameter: self.bubble_diameter,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            footer: self.footer.clone(),
            reference_marks: self.reference_marks,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, String),
    ParseError(PathBuf, String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "could not read config {}: {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "could not parse config {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_config(path: &Path) -> Result<SheetConfig, ConfigError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: SheetConfig = serde_json::from_str(
            r#"{ "templatePath": "out/exam.png", "threshold": 0.3, "choices": ["A", "B", "C", "D"] }"#,
        )
        .unwrap();

        assert_eq!(config.template_path, PathBuf::from("out/exam.png"));
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.choices.len(), 4);
        assert_eq!(config.question_count, 50);
        assert_eq!(config.bubble_diameter, 20);
        assert_eq!(config.manifest_path(), PathBuf::from("out/exam_positions.json"));
    }

    #[test]
    fn explicit_manifest_path_wins() {
        let config = SheetConfig {
            manifest_path: Some(PathBuf::from("positions.json")),
            ..SheetConfig::default()
        };
        assert_eq!(config.manifest_path(), PathBuf::from("positions.json"));
    }

    #[test]
    fn template_options_follow_config() {
        let config = SheetConfig {
            question_count: 12,
            page_size: (800, 600),
            reference_marks: false,
            ..SheetConfig::default()
        };
        let options = config.template_options();
        assert_eq!(options.question_count, 12);
        assert_eq!(options.page_size, Size { width: 800, height: 600 });
        assert!(!options.reference_marks);
    }

    #[test]
    fn loads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "questionCount": 20, "spacingY": 12 }"#).unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.question_count, 20);
        assert_eq!(config.spacing_y, 12);
    }

    #[test]
    fn malformed_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ questionCount: ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_, _))));
    }
}
