use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, drawing::draw_hollow_circle_mut, rect::Rect};
use log::info;

use crate::{
    image_utils::{BLUE, GRAY, GREEN, ORANGE, RED, WHITE_RGB},
    manifest::PositionManifest,
    report::{GradeReport, QuestionResult, StudentAnswer},
    types::Choice,
    typeface::Typeface,
};

const LABEL_FONT_PX: f32 = 12.0;
const SUMMARY_FONT_PX: f32 = 14.0;

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_string_lossy(),
        label
    ));
    result
}

/// What a single bubble means for its question's grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleStatus {
    /// Marked, and the expected answer.
    Correct,
    /// Not marked, but the expected answer.
    ShouldBe,
    /// The single marked bubble, not the expected answer.
    Wrong,
    /// One of several marked bubbles.
    Multiple,
    Empty,
}

impl BubbleStatus {
    pub fn color(self) -> Rgb<u8> {
        match self {
            BubbleStatus::Correct => GREEN,
            BubbleStatus::ShouldBe => BLUE,
            BubbleStatus::Wrong => RED,
            BubbleStatus::Multiple => ORANGE,
            BubbleStatus::Empty => GRAY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BubbleStatus::Correct => "CORRECT",
            BubbleStatus::ShouldBe => "SHOULD BE",
            BubbleStatus::Wrong => "WRONG",
            BubbleStatus::Multiple => "MULTI",
            BubbleStatus::Empty => "EMPTY",
        }
    }
}

pub fn bubble_status(result: &QuestionResult, choice: &Choice) -> BubbleStatus {
    let is_expected = result.expected_answer.as_ref() == Some(choice);
    match &result.student_answer {
        StudentAnswer::Choice(answer) if answer == choice && is_expected => BubbleStatus::Correct,
        StudentAnswer::Choice(_) if is_expected => BubbleStatus::ShouldBe,
        StudentAnswer::Choice(answer) if answer == choice => BubbleStatus::Wrong,
        _ if result.marked.contains(choice) => BubbleStatus::Multiple,
        _ => BubbleStatus::Empty,
    }
}

pub fn log_debug_legend() {
    info!("grading visualization:");
    info!("- GREEN: correctly marked answer");
    info!("- BLUE: correct answer (should have been marked)");
    info!("- RED: wrong answer marked");
    info!("- ORANGE: multiple answers marked");
    info!("- GRAY: unmarked bubble");
}

/// Draws the grading outcome over the binarized sheet. Reads only the
/// finished report, so it cannot affect any score.
pub fn render_grading_debug_image(
    binary: &GrayImage,
    manifest: &PositionManifest,
    report: &GradeReport,
    typeface: &Typeface,
) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(binary.clone()).into_rgb8();
    draw_grading_debug_image_mut(&mut canvas, manifest, report, typeface);
    canvas
}

pub fn draw_grading_debug_image_mut(
    canvas: &mut RgbImage,
    manifest: &PositionManifest,
    report: &GradeReport,
    typeface: &Typeface,
) {
    let radius = manifest.bubble_diameter as i32;

    for (layout, result) in manifest
        .bubble_positions
        .iter()
        .zip(report.question_results.iter())
    {
        for bubble in &layout.bubbles {
            let status = bubble_status(result, &bubble.choice);
            let color = status.color();
            let (cx, cy) = bubble.center;

            for inset in 0..3.min(radius) {
                draw_hollow_circle_mut(canvas, (cx, cy), radius - inset, color);
            }

            let ratio = result.fill_ratio(&bubble.choice).unwrap_or_default();
            typeface.draw_text_mut(
                canvas,
                color,
                cx - radius - 5,
                cy - radius - 5 - LABEL_FONT_PX as i32,
                LABEL_FONT_PX,
                &format!("{:.2}", ratio),
            );
            typeface.draw_text_mut(
                canvas,
                color,
                cx - radius - 5,
                cy + radius + 5,
                LABEL_FONT_PX,
                status.label(),
            );
        }

        let summary_color = if result.is_correct { GREEN } else { RED };
        let summary = format!(
            "Q{}: Student={}, Correct={} ({})",
            result.question,
            result.student_answer,
            result
                .expected_answer
                .as_ref()
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
            if result.is_correct { "OK" } else { "X" }
        );
        draw_text_with_background_mut(
            canvas,
            typeface,
            &summary,
            layout.question_pos.0 as i32,
            layout.question_pos.1 as i32 - 10 - SUMMARY_FONT_PX as i32,
            SUMMARY_FONT_PX,
            summary_color,
            WHITE_RGB,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text_with_background_mut(
    canvas: &mut RgbImage,
    typeface: &Typeface,
    text: &str,
    x: i32,
    y: i32,
    px: f32,
    text_color: Rgb<u8>,
    background_color: Rgb<u8>,
) {
    let (text_width, text_height) = typeface.text_size(px, text);
    if text_width > 0 && text_height > 0 {
        draw_filled_rect_mut(
            canvas,
            Rect::at(x, y).of_size(text_width as u32, text_height as u32),
            background_color,
        );
    }
    typeface.draw_text_mut(canvas, text_color, x, y, px, text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::BLACK;
    use crate::manifest::{BubblePosition, QuestionLayout};

    fn result(student: StudentAnswer, expected: Option<&str>, marked: &[&str]) -> QuestionResult {
        QuestionResult {
            question: 1,
            is_correct: matches!(
                (&student, expected),
                (StudentAnswer::Choice(c), Some(e)) if c.as_str() == e
            ),
            student_answer: student,
            expected_answer: expected.map(|e| Choice::from(e)),
            fill_ratios: vec![],
            marked: marked.iter().map(|&c| Choice::from(c)).collect(),
        }
    }

    #[test]
    fn debug_image_path_uses_label() {
        assert_eq!(
            debug_image_path(Path::new("scans/sheet1.jpg"), "grading"),
            PathBuf::from("scans/sheet1_debug_grading.png")
        );
    }

    #[test]
    fn statuses_for_correct_answer() {
        let r = result(StudentAnswer::Choice(Choice::from("A")), Some("A"), &["A"]);
        assert_eq!(bubble_status(&r, &Choice::from("A")), BubbleStatus::Correct);
        assert_eq!(bubble_status(&r, &Choice::from("B")), BubbleStatus::Empty);
    }

    #[test]
    fn statuses_for_wrong_answer() {
        let r = result(StudentAnswer::Choice(Choice::from("C")), Some("A"), &["C"]);
        assert_eq!(bubble_status(&r, &Choice::from("A")), BubbleStatus::ShouldBe);
        assert_eq!(bubble_status(&r, &Choice::from("C")), BubbleStatus::Wrong);
        assert_eq!(bubble_status(&r, &Choice::from("D")), BubbleStatus::Empty);
    }

    #[test]
    fn statuses_for_multiple_answers() {
        let r = result(StudentAnswer::Multiple, Some("A"), &["A", "B"]);
        assert_eq!(bubble_status(&r, &Choice::from("A")), BubbleStatus::Multiple);
        assert_eq!(bubble_status(&r, &Choice::from("B")), BubbleStatus::Multiple);
        assert_eq!(bubble_status(&r, &Choice::from("C")), BubbleStatus::Empty);
    }

    #[test]
    fn visualization_leaves_report_untouched() {
        let choices = vec![Choice::from("A"), Choice::from("B")];
        let manifest = PositionManifest {
            bubble_positions: vec![QuestionLayout {
                question: 1,
                bubbles: vec![
                    BubblePosition::at(choices[0].clone(), 60, 60, 20),
                    BubblePosition::at(choices[1].clone(), 100, 60, 20),
                ],
                question_pos: (10.0, 65.0),
            }],
            page_size: (200, 150),
            margin: 0,
            bubble_diameter: 20,
            choices,
        };
        let report = GradeReport::from_results(vec![result(
            StudentAnswer::Choice(Choice::from("B")),
            Some("A"),
            &["B"],
        )]);
        let before = report.clone();
        let binary = GrayImage::from_pixel(200, 150, BLACK);

        let canvas = render_grading_debug_image(&binary, &manifest, &report, &Typeface::Bitmap);

        assert_eq!(report, before);
        assert_eq!(canvas.dimensions(), (200, 150));
        // left edge of the "should be" ring around A, and the "wrong" ring around B
        assert_eq!(*canvas.get_pixel(50, 70), BLUE);
        assert_eq!(*canvas.get_pixel(90, 70), RED);
    }
}
