use std::fmt::Display;
use std::path::{Path, PathBuf};

use image::GrayImage;
use log::{debug, info};
use logging_timer::time;
use rayon::prelude::*;

use crate::{
    answers::AnswerKey,
    debug::{debug_image_path, render_grading_debug_image, log_debug_legend},
    geometry::{clip_bbox, BoundingBox},
    image_utils::{binarize, ratio_in_rect, WHITE},
    manifest::{PositionManifest, QuestionLayout},
    report::{GradeReport, QuestionResult, StudentAnswer},
    types::Choice,
    typeface::find_typeface,
};

/// Fill ratio above which a bubble counts as marked.
pub const DEFAULT_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeOptions {
    pub threshold: f32,
    pub debug: bool,
    /// Font for the debug visualization.
    pub font_path: Option<PathBuf>,
}

impl Default for GradeOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            debug: false,
            font_path: None,
        }
    }
}

#[derive(Debug)]
pub enum GradeSheetError {
    ImageLoadError(PathBuf, String),
    ManifestMissing,
    InputShapeMismatch { expected: usize, actual: usize },
    UnknownExpectedChoice { question: u32, choice: Choice },
    InvalidThreshold(f32),
    DebugImageWriteError(PathBuf, String),
}

impl Display for GradeSheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradeSheetError::ImageLoadError(path, e) => {
                write!(f, "could not load image {}: {}", path.display(), e)
            }
            GradeSheetError::ManifestMissing => {
                write!(f, "no position manifest was supplied; generate a template first")
            }
            GradeSheetError::InputShapeMismatch { expected, actual } => write!(
                f,
                "answer key has {} entries but the sheet has {} questions",
                actual, expected
            ),
            GradeSheetError::UnknownExpectedChoice { question, choice } => write!(
                f,
                "expected answer {} for question {} is not a choice on the sheet",
                choice, question
            ),
            GradeSheetError::InvalidThreshold(threshold) => {
                write!(f, "threshold must be between 0 and 1, got {}", threshold)
            }
            GradeSheetError::DebugImageWriteError(path, e) => {
                write!(f, "could not write debug image {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for GradeSheetError {}

/// Checks that the grading inputs agree with each other before any image
/// work is done.
pub fn validate_grading_inputs<'a>(
    manifest: Option<&'a PositionManifest>,
    key: &AnswerKey,
    threshold: f32,
) -> Result<&'a PositionManifest, GradeSheetError> {
    let manifest = manifest.ok_or(GradeSheetError::ManifestMissing)?;

    if !(0.0..1.0).contains(&threshold) {
        return Err(GradeSheetError::InvalidThreshold(threshold));
    }

    if key.len() != manifest.question_count() {
        return Err(GradeSheetError::InputShapeMismatch {
            expected: manifest.question_count(),
            actual: key.len(),
        });
    }

    for layout in &manifest.bubble_positions {
        if let Some(expected) = key.get(layout.question) {
            if layout.bubble(expected).is_none() {
                return Err(GradeSheetError::UnknownExpectedChoice {
                    question: layout.question,
                    choice: expected.clone(),
                });
            }
        }
    }

    Ok(manifest)
}

#[time]
pub fn load_sheet_image(image_path: &Path) -> Result<GrayImage, GradeSheetError> {
    image::open(image_path)
        .map(|img| img.into_luma8())
        .map_err(|e| GradeSheetError::ImageLoadError(image_path.to_path_buf(), e.to_string()))
}

/// Fraction of ink pixels inside a bubble's bounding box. Parts of the box
/// outside the image are ignored; a box with no part inside reads as 0.
pub fn fill_ratio(binary: &GrayImage, bbox: &BoundingBox) -> f32 {
    match clip_bbox(bbox, binary.dimensions()) {
        Some(rect) => ratio_in_rect(binary, &rect, &WHITE),
        None => 0.0,
    }
}

pub fn measure_fill_ratios(binary: &GrayImage, layout: &QuestionLayout) -> Vec<(Choice, f32)> {
    layout
        .bubbles
        .iter()
        .map(|bubble| (bubble.choice.clone(), fill_ratio(binary, &bubble.bbox)))
        .collect()
}

/// Decides what a question's answer is from its fill ratios. A bubble is
/// marked only when its ratio is strictly above `threshold`; two or more
/// marked bubbles make the answer ambiguous no matter how their ratios
/// compare.
pub fn classify(fill_ratios: &[(Choice, f32)], threshold: f32) -> (StudentAnswer, Vec<Choice>) {
    let marked = fill_ratios
        .iter()
        .filter(|(_, ratio)| *ratio > threshold)
        .map(|(choice, _)| choice.clone())
        .collect::<Vec<_>>();

    let answer = match marked.as_slice() {
        [] => StudentAnswer::NoAnswer,
        [choice] => StudentAnswer::Choice(choice.clone()),
        _ => StudentAnswer::Multiple,
    };

    (answer, marked)
}

pub fn grade_question(
    binary: &GrayImage,
    layout: &QuestionLayout,
    expected: Option<&Choice>,
    threshold: f32,
) -> QuestionResult {
    let fill_ratios = measure_fill_ratios(binary, layout);
    let (student_answer, marked) = classify(&fill_ratios, threshold);
    let is_correct = expected.is_some() && student_answer.choice() == expected;

    QuestionResult {
        question: layout.question,
        student_answer,
        expected_answer: expected.cloned(),
        is_correct,
        fill_ratios,
        marked,
    }
}

/// Grades an already binarized sheet. Questions are independent of each
/// other, so they are measured in parallel; results keep manifest order.
#[time]
pub fn grade_binary_image(
    binary: &GrayImage,
    manifest: Option<&PositionManifest>,
    key: &AnswerKey,
    threshold: f32,
) -> Result<GradeReport, GradeSheetError> {
    let manifest = validate_grading_inputs(manifest, key, threshold)?;

    let question_results = manifest
        .bubble_positions
        .par_iter()
        .map(|layout| grade_question(binary, layout, key.get(layout.question), threshold))
        .collect::<Vec<_>>();

    for result in &question_results {
        debug!(
            "Q{:02}: {} (expected {:?}, ratios {:?})",
            result.question, result.student_answer, result.expected_answer, result.fill_ratios
        );
    }

    Ok(GradeReport::from_results(question_results))
}

/// Grades a photographed or scanned sheet against the manifest it was
/// generated with. In debug mode the binarized image and an annotated copy
/// are written next to the input.
#[time]
pub fn grade_sheet(
    image_path: &Path,
    manifest: Option<&PositionManifest>,
    key: &AnswerKey,
    options: &GradeOptions,
) -> Result<GradeReport, GradeSheetError> {
    let manifest = validate_grading_inputs(manifest, key, options.threshold)?;
    let img = load_sheet_image(image_path)?;
    let binary = binarize(&img);
    let report = grade_binary_image(&binary, Some(manifest), key, options.threshold)?;

    info!(
        "graded {}: {}/{} ({:.1}%)",
        image_path.display(),
        report.total_score,
        report.max_score,
        report.percentage
    );

    if options.debug {
        write_debug_images(image_path, &binary, manifest, &report, options)?;
    }

    Ok(report)
}

fn write_debug_images(
    image_path: &Path,
    binary: &GrayImage,
    manifest: &PositionManifest,
    report: &GradeReport,
    options: &GradeOptions,
) -> Result<(), GradeSheetError> {
    let binary_path = debug_image_path(image_path, "binary");
    binary
        .save(&binary_path)
        .map_err(|e| GradeSheetError::DebugImageWriteError(binary_path.clone(), e.to_string()))?;

    let typeface = find_typeface(options.font_path.as_deref());
    let annotated = render_grading_debug_image(binary, manifest, report, &typeface);
    let annotated_path = debug_image_path(image_path, "grading");
    annotated
        .save(&annotated_path)
        .map_err(|e| GradeSheetError::DebugImageWriteError(annotated_path.clone(), e.to_string()))?;

    info!(
        "wrote debug images {} and {}",
        binary_path.display(),
        annotated_path.display()
    );
    log_debug_legend();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::BLACK;
    use crate::manifest::BubblePosition;
    use crate::types::default_choices;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    /// One row of five 20px bubbles per question, 40px apart.
    fn grid_manifest(questions: u32) -> PositionManifest {
        let choices = default_choices();
        PositionManifest {
            bubble_positions: (1..=questions)
                .map(|q| QuestionLayout {
                    question: q,
                    bubbles: choices
                        .iter()
                        .enumerate()
                        .map(|(i, choice)| {
                            BubblePosition::at(
                                choice.clone(),
                                20 + 40 * i as i32,
                                20 + 40 * (q as i32 - 1),
                                20,
                            )
                        })
                        .collect(),
                    question_pos: (0.0, 20.0 + 40.0 * (q as f32 - 1.0)),
                })
                .collect(),
            page_size: (240, 40 * questions + 20),
            margin: 0,
            bubble_diameter: 20,
            choices,
        }
    }

    /// A binary image with the given (question, choice index) bubbles inked.
    fn binary_with_marks(manifest: &PositionManifest, marks: &[(u32, usize)]) -> GrayImage {
        let (width, height) = manifest.page_size;
        let mut binary = GrayImage::from_pixel(width, height, BLACK);
        for (question, choice) in marks {
            let (x1, y1, _, _) = manifest.bubble_positions[*question as usize - 1].bubbles[*choice].bbox;
            draw_filled_rect_mut(&mut binary, Rect::at(x1, y1).of_size(20, 20), WHITE);
        }
        binary
    }

    fn key(raw: &str) -> AnswerKey {
        AnswerKey::parse(raw, &default_choices()).unwrap()
    }

    fn ratios(values: &[f32]) -> Vec<(Choice, f32)> {
        default_choices().into_iter().zip(values.iter().copied()).collect()
    }

    #[test]
    fn classify_single_mark() {
        let (answer, marked) = classify(&ratios(&[0.05, 0.7, 0.0, 0.1, 0.02]), 0.2);
        assert_eq!(answer, StudentAnswer::Choice(Choice::from("B")));
        assert_eq!(marked, vec![Choice::from("B")]);
    }

    #[test]
    fn classify_no_mark() {
        let (answer, marked) = classify(&ratios(&[0.05, 0.1, 0.0, 0.1, 0.02]), 0.2);
        assert_eq!(answer, StudentAnswer::NoAnswer);
        assert!(marked.is_empty());
    }

    #[test]
    fn classify_multiple_marks_ignores_relative_strength() {
        let (answer, marked) = classify(&ratios(&[0.95, 0.21, 0.0, 0.0, 0.0]), 0.2);
        assert_eq!(answer, StudentAnswer::Multiple);
        assert_eq!(marked, vec![Choice::from("A"), Choice::from("B")]);
    }

    #[test]
    fn ratio_equal_to_threshold_is_unmarked() {
        let (answer, _) = classify(&ratios(&[0.25, 0.0, 0.0, 0.0, 0.0]), 0.25);
        assert_eq!(answer, StudentAnswer::NoAnswer);
    }

    #[test]
    fn ratios_just_around_threshold() {
        let (below, _) = classify(&ratios(&[0.19, 0.0, 0.0, 0.0, 0.0]), 0.2);
        let (above, _) = classify(&ratios(&[0.21, 0.0, 0.0, 0.0, 0.0]), 0.2);
        assert_eq!(below, StudentAnswer::NoAnswer);
        assert_eq!(above, StudentAnswer::Choice(Choice::from("A")));
    }

    #[test]
    fn fill_ratio_outside_image_is_zero() {
        let binary = GrayImage::from_pixel(50, 50, WHITE);
        assert_eq!(fill_ratio(&binary, &(60, 60, 80, 80)), 0.0);
        assert_eq!(fill_ratio(&binary, &(-30, 10, -10, 30)), 0.0);
        assert_eq!(fill_ratio(&binary, &(10, 10, 10, 10)), 0.0);
    }

    #[test]
    fn fill_ratio_is_measured_on_the_visible_part() {
        let mut binary = GrayImage::from_pixel(50, 50, BLACK);
        draw_filled_rect_mut(&mut binary, Rect::at(40, 0).of_size(10, 10), WHITE);
        assert_eq!(fill_ratio(&binary, &(40, 0, 60, 20)), 0.5);
    }

    #[test]
    fn single_mark_scenario() {
        let manifest = grid_manifest(5);
        let binary = binary_with_marks(&manifest, &[(1, 0)]);

        let report =
            grade_binary_image(&binary, Some(&manifest), &key("A,B,C,D,E"), 0.2).unwrap();

        assert_eq!(report.total_score, 1);
        assert_eq!(report.max_score, 5);
        assert_eq!(report.unanswered, 4);
        assert_eq!(report.multiple_answers, 0);
        assert_eq!(report.percentage, 20.0);
        assert_eq!(
            report.question_results[0].student_answer,
            StudentAnswer::Choice(Choice::from("A"))
        );
        assert_eq!(report.question_results[0].fill_ratios[0].1, 1.0);
    }

    #[test]
    fn double_mark_scores_nothing() {
        let manifest = grid_manifest(2);
        let binary = binary_with_marks(&manifest, &[(1, 0), (1, 2), (2, 1)]);

        let report = grade_binary_image(&binary, Some(&manifest), &key("A,B"), 0.2).unwrap();

        assert_eq!(report.question_results[0].student_answer, StudentAnswer::Multiple);
        assert!(!report.question_results[0].is_correct);
        assert_eq!(report.total_score, 1);
        assert_eq!(report.multiple_answers, 1);
    }

    #[test]
    fn wrong_and_blank_expected_answers_are_incorrect() {
        let manifest = grid_manifest(2);
        let binary = binary_with_marks(&manifest, &[(1, 3), (2, 1)]);

        let report = grade_binary_image(&binary, Some(&manifest), &key("A,"), 0.2).unwrap();

        assert!(!report.question_results[0].is_correct);
        assert_eq!(report.question_results[1].expected_answer, None);
        assert!(!report.question_results[1].is_correct);
        assert_eq!(report.total_score, 0);
    }

    #[test]
    fn expected_answers_follow_question_numbers() {
        let mut manifest = grid_manifest(2);
        let binary = binary_with_marks(&manifest, &[(1, 0), (2, 1)]);
        manifest.bubble_positions.reverse();

        let report = grade_binary_image(&binary, Some(&manifest), &key("A,B"), 0.2).unwrap();

        assert_eq!(report.question_results[0].question, 2);
        assert_eq!(
            report.question_results[0].expected_answer,
            Some(Choice::from("B"))
        );
        assert_eq!(report.question_results[1].question, 1);
        assert_eq!(
            report.question_results[1].expected_answer,
            Some(Choice::from("A"))
        );
        assert_eq!(report.total_score, 2);
    }

    #[test]
    fn key_length_mismatch_is_rejected() {
        let manifest = grid_manifest(5);
        let binary = binary_with_marks(&manifest, &[]);

        let result = grade_binary_image(&binary, Some(&manifest), &key("A,B,C"), 0.2);

        assert!(matches!(
            result,
            Err(GradeSheetError::InputShapeMismatch {
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn missing_manifest_is_rejected() {
        let binary = GrayImage::new(10, 10);
        let result = grade_binary_image(&binary, None, &key("A"), 0.2);
        assert!(matches!(result, Err(GradeSheetError::ManifestMissing)));
    }

    #[test]
    fn expected_answer_must_exist_on_sheet() {
        let manifest = grid_manifest(1);
        let key = AnswerKey::new(vec![Some(Choice::from("Z"))]);
        let result = validate_grading_inputs(Some(&manifest), &key, 0.2);
        assert!(matches!(
            result,
            Err(GradeSheetError::UnknownExpectedChoice { question: 1, .. })
        ));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let manifest = grid_manifest(1);
        for threshold in [-0.1, 1.0, f32::NAN] {
            assert!(matches!(
                validate_grading_inputs(Some(&manifest), &key("A"), threshold),
                Err(GradeSheetError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn grading_is_idempotent() {
        let manifest = grid_manifest(4);
        let binary = binary_with_marks(&manifest, &[(1, 0), (2, 3), (2, 4), (4, 1)]);
        let key = key("A,D,C,B");

        let first = grade_binary_image(&binary, Some(&manifest), &key, 0.2).unwrap();
        let second = grade_binary_image(&binary, Some(&manifest), &key, 0.2).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn unreadable_image_is_load_error() {
        let manifest = grid_manifest(1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.png");
        std::fs::write(&path, b"\x89PNG\r\n").unwrap();

        let result = grade_sheet(&path, Some(&manifest), &key("A"), &GradeOptions::default());

        assert!(matches!(result, Err(GradeSheetError::ImageLoadError(_, _))));
    }
}
