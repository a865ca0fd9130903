use std::collections::HashSet;
use std::fmt::Display;

use log::debug;

use crate::{
    manifest::{BubblePosition, PositionManifest, QuestionLayout},
    types::{default_choices, Choice, Size},
    typeface::Typeface,
};

/// Questions per column before another column is added.
pub const QUESTIONS_PER_COLUMN: u32 = 10;
/// Height reserved for the choice letters above each column.
pub const HEADER_HEIGHT: u32 = 40;
/// Gap between the top margin and the choice letters.
pub const HEADER_OFFSET: u32 = 15;
/// Inset of the question number from the column's left edge.
pub const QUESTION_LABEL_INSET: f32 = 20.0;
/// Gap between the question number and its first bubble.
pub const LABEL_GAP: f32 = 30.0;
/// Horizontal gap between neighbouring bubbles.
pub const BUBBLE_GAP: u32 = 20;

pub const TITLE_FONT_PX: f32 = 60.0;
pub const SUBTITLE_FONT_PX: f32 = 24.0;
pub const QUESTION_FONT_PX: f32 = 28.0;
pub const HEADER_FONT_PX: f32 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    pub question_count: u32,
    pub choices: Vec<Choice>,
    pub page_size: Size<u32>,
    pub margin: u32,
    pub spacing_y: u32,
    pub bubble_diameter: u32,
    pub title: String,
    pub subtitle: String,
    pub footer: String,
    pub reference_marks: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            question_count: 50,
            choices: default_choices(),
            page_size: Size {
                width: 1240,
                height: 877,
            },
            margin: 50,
            spacing_y: 20,
            bubble_diameter: 20,
            title: "ANSWER SHEET".to_string(),
            subtitle: "Name: ____________________   Number: ____   Class: ______".to_string(),
            footer: "Mark only one option per question. Use a black or blue pen.".to_string(),
            reference_marks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    InvalidQuestionCount(u32),
    EmptyChoiceSet,
    DuplicateChoice(Choice),
    InvalidBubbleDiameter(u32),
    PageTooSmall(Size<u32>),
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::InvalidQuestionCount(n) => {
                write!(f, "question count must be positive, got {}", n)
            }
            LayoutError::EmptyChoiceSet => write!(f, "choice set must not be empty"),
            LayoutError::DuplicateChoice(choice) => {
                write!(f, "choice {} appears more than once", choice)
            }
            LayoutError::InvalidBubbleDiameter(d) => {
                write!(f, "bubble diameter must be positive, got {}", d)
            }
            LayoutError::PageTooSmall(size) => write!(
                f,
                "page {}x{} leaves no room inside the margins",
                size.width, size.height
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// The choice letters printed above one column of bubbles.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub choice: Choice,
    /// Left edge of the bubble column this letter labels.
    pub bubble_left: i32,
    pub y: i32,
}

/// Everything needed to draw a sheet. The manifest is derived from the same
/// values, so what is drawn and what is recorded cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub columns: u32,
    pub rows_per_column: u32,
    pub column_width: f32,
    pub row_height: f32,
    /// y of the first row of questions.
    pub top: f32,
    pub header_y: i32,
    pub column_headers: Vec<Vec<ColumnHeader>>,
    pub questions: Vec<QuestionLayout>,
}

pub fn validate_template_options(options: &TemplateOptions) -> Result<(), LayoutError> {
    if options.question_count == 0 {
        return Err(LayoutError::InvalidQuestionCount(options.question_count));
    }
    if options.choices.is_empty() {
        return Err(LayoutError::EmptyChoiceSet);
    }
    let mut seen = HashSet::new();
    for choice in &options.choices {
        if !seen.insert(choice) {
            return Err(LayoutError::DuplicateChoice(choice.clone()));
        }
    }
    if options.bubble_diameter == 0 {
        return Err(LayoutError::InvalidBubbleDiameter(options.bubble_diameter));
    }
    let Size { width, height } = options.page_size;
    let horizontal = options.margin.checked_mul(2);
    let vertical = horizontal
        .and_then(|m| m.checked_add(HEADER_OFFSET))
        .and_then(|m| m.checked_add(HEADER_HEIGHT));
    match (horizontal, vertical) {
        (Some(horizontal), Some(vertical)) if width > horizontal && height > vertical => Ok(()),
        _ => Err(LayoutError::PageTooSmall(options.page_size)),
    }
}

/// Number of columns for `question_count` questions: one column per ten
/// questions once there are more than ten.
pub fn column_count(question_count: u32) -> u32 {
    if question_count > QUESTIONS_PER_COLUMN {
        (question_count + QUESTIONS_PER_COLUMN - 1) / QUESTIONS_PER_COLUMN
    } else {
        1
    }
}

/// Formats a question number the way it is printed beside its bubbles.
pub fn question_label(question: u32) -> String {
    format!("{:02}.", question)
}

/// Computes the geometry of every bubble on the sheet. Questions fill the
/// columns top to bottom, left to right.
pub fn compute_layout(
    options: &TemplateOptions,
    typeface: &Typeface,
) -> Result<SheetLayout, LayoutError> {
    validate_template_options(options)?;

    let n = options.question_count;
    let diameter = options.bubble_diameter;
    let columns = column_count(n);
    let rows_per_column = (n + columns - 1) / columns;

    let Size { width, height } = options.page_size;
    let margin = options.margin as f32;
    let header_y = (options.margin + HEADER_OFFSET) as i32;
    let top = margin + (HEADER_OFFSET + HEADER_HEIGHT) as f32;
    let bottom = height as f32 - margin;
    let usable_height = bottom - top;
    let column_width = (width as f32 - 2.0 * margin) / columns as f32;
    let row_height =
        ((options.spacing_y + diameter) as f32).min(usable_height / rows_per_column as f32);

    debug!(
        "layout: {} questions in {} columns of {} rows, column width {:.1}, row height {:.1}",
        n, columns, rows_per_column, column_width, row_height
    );

    let mut questions = Vec::with_capacity(n as usize);
    let mut column_headers = Vec::with_capacity(columns as usize);
    let mut q = 1;
    for column in 0..columns {
        if q > n {
            break;
        }

        let x0 = margin + column as f32 * column_width;
        let x_question = x0 + QUESTION_LABEL_INSET;
        let (label_width, _) = typeface.text_size(QUESTION_FONT_PX, &question_label(q));
        let x_choices_start = x_question + label_width as f32 + LABEL_GAP;
        let bubble_left = |i: usize| -> i32 {
            (x_choices_start + (i as u32 * (diameter + BUBBLE_GAP)) as f32) as i32
        };

        column_headers.push(
            options
                .choices
                .iter()
                .enumerate()
                .map(|(i, choice)| ColumnHeader {
                    choice: choice.clone(),
                    bubble_left: bubble_left(i),
                    y: header_y,
                })
                .collect(),
        );

        for row in 0..rows_per_column {
            if q > n {
                break;
            }

            let y = (top + row as f32 * row_height) as i32;
            let bubble_top =
                (y as f32 + diameter as f32 / 4.0 - diameter as f32 / 2.0) as i32;
            let bubbles = options
                .choices
                .iter()
                .enumerate()
                .map(|(i, choice)| {
                    let left = bubble_left(i);
                    BubblePosition::at(choice.clone(), left, bubble_top, diameter)
                        .with_header_pos((left + diameter as i32 / 2, header_y))
                })
                .collect();

            questions.push(QuestionLayout {
                question: q,
                bubbles,
                question_pos: (x_question, y as f32),
            });
            q += 1;
        }
    }

    Ok(SheetLayout {
        columns,
        rows_per_column,
        column_width,
        row_height,
        top,
        header_y,
        column_headers,
        questions,
    })
}

impl SheetLayout {
    pub fn manifest(&self, options: &TemplateOptions) -> PositionManifest {
        PositionManifest {
            bubble_positions: self.questions.clone(),
            page_size: (options.page_size.width, options.page_size.height),
            margin: options.margin,
            bubble_diameter: options.bubble_diameter,
            choices: options.choices.clone(),
        }
    }
}
