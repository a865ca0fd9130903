use std::fmt::Display;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use log::{debug, info};

use crate::{
    answers::AnswerKey,
    image_utils::BLACK_RGB,
    manifest::{BubblePosition, PositionManifest},
    types::Choice,
};

#[derive(Debug)]
pub enum MarkSheetError {
    TemplateLoadError(PathBuf, String),
    TooManyAnswers { questions: usize, answers: usize },
    UnknownChoice { question: u32, choice: Choice },
    ImageWriteError(PathBuf, String),
}

impl Display for MarkSheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkSheetError::TemplateLoadError(path, e) => {
                write!(f, "could not load template {}: {}", path.display(), e)
            }
            MarkSheetError::TooManyAnswers { questions, answers } => write!(
                f,
                "{} answers given but the sheet only has {} questions",
                answers, questions
            ),
            MarkSheetError::UnknownChoice { question, choice } => write!(
                f,
                "answer {} for question {} is not a choice on the sheet",
                choice, question
            ),
            MarkSheetError::ImageWriteError(path, e) => {
                write!(f, "could not write {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for MarkSheetError {}

/// Fills a bubble with a solid disk slightly smaller than its outline, the
/// way a pen mark would.
pub fn fill_bubble_mut(canvas: &mut RgbImage, bubble: &BubblePosition, diameter: u32, color: Rgb<u8>) {
    let radius = (diameter as i32 * 2 / 5).max(1);
    draw_filled_circle_mut(canvas, bubble.center, radius, color);
}

/// Marks one answer per question on a blank sheet. Questions past the end of
/// `answers`, and blank answers, are left untouched. Returns how many
/// bubbles were filled.
pub fn mark_sheet_mut(
    canvas: &mut RgbImage,
    manifest: &PositionManifest,
    answers: &AnswerKey,
) -> Result<u32, MarkSheetError> {
    if answers.len() > manifest.question_count() {
        return Err(MarkSheetError::TooManyAnswers {
            questions: manifest.question_count(),
            answers: answers.len(),
        });
    }

    let mut marked = 0;
    for (layout, answer) in manifest.bubble_positions.iter().zip(answers.iter()) {
        let Some(answer) = answer else {
            continue;
        };
        let bubble = layout
            .bubble(answer)
            .ok_or_else(|| MarkSheetError::UnknownChoice {
                question: layout.question,
                choice: answer.clone(),
            })?;
        debug!("marking Q{:02} {}", layout.question, answer);
        fill_bubble_mut(canvas, bubble, manifest.bubble_diameter, BLACK_RGB);
        marked += 1;
    }

    Ok(marked)
}

/// Loads a blank template, marks the given answers and saves the result.
pub fn mark_sheet(
    template_path: &Path,
    manifest: &PositionManifest,
    answers: &AnswerKey,
    output_path: &Path,
) -> Result<u32, MarkSheetError> {
    let mut canvas = image::open(template_path)
        .map_err(|e| MarkSheetError::TemplateLoadError(template_path.to_path_buf(), e.to_string()))?
        .into_rgb8();

    let marked = mark_sheet_mut(&mut canvas, manifest, answers)?;

    canvas
        .save(output_path)
        .map_err(|e| MarkSheetError::ImageWriteError(output_path.to_path_buf(), e.to_string()))?;
    info!(
        "marked {} of {} questions into {}",
        marked,
        manifest.question_count(),
        output_path.display()
    );
    Ok(marked)
}
