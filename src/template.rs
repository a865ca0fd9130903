use std::fmt::Display;
use std::path::{Path, PathBuf};

use log::info;
use logging_timer::time;

use crate::{
    layout::{compute_layout, LayoutError, TemplateOptions},
    manifest::{save_manifest, ManifestError, PositionManifest},
    render::render_sheet,
    typeface::find_typeface,
};

#[derive(Debug)]
pub enum GenerateTemplateError {
    InvalidLayout(LayoutError),
    ManifestWriteError(ManifestError),
    ImageWriteError(PathBuf, String),
}

impl Display for GenerateTemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateTemplateError::InvalidLayout(e) => write!(f, "invalid layout: {}", e),
            GenerateTemplateError::ManifestWriteError(e) => write!(f, "{}", e),
            GenerateTemplateError::ImageWriteError(path, e) => {
                write!(f, "could not write template {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for GenerateTemplateError {}

impl From<LayoutError> for GenerateTemplateError {
    fn from(e: LayoutError) -> Self {
        GenerateTemplateError::InvalidLayout(e)
    }
}

impl From<ManifestError> for GenerateTemplateError {
    fn from(e: ManifestError) -> Self {
        GenerateTemplateError::ManifestWriteError(e)
    }
}

/// Lays out, renders and writes a blank answer sheet together with its
/// position manifest. The manifest is written first so that it exists even
/// if the image cannot be saved.
#[time]
pub fn generate_template(
    options: &TemplateOptions,
    template_path: &Path,
    manifest_path: &Path,
    font_path: Option<&Path>,
) -> Result<PositionManifest, GenerateTemplateError> {
    let typeface = find_typeface(font_path);
    let layout = compute_layout(options, &typeface)?;
    let manifest = layout.manifest(options);

    save_manifest(&manifest, manifest_path)?;
    info!(
        "wrote positions for {} questions to {}",
        manifest.question_count(),
        manifest_path.display()
    );

    let sheet = render_sheet(&layout, options, &typeface);
    sheet.save(template_path).map_err(|e| {
        GenerateTemplateError::ImageWriteError(template_path.to_path_buf(), e.to_string())
    })?;
    info!(
        "wrote {}x{} template to {}",
        sheet.width(),
        sheet.height(),
        template_path.display()
    );

    Ok(manifest)
}
