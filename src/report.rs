use std::fmt::Display;

use serde::{Serialize, Serializer};

use crate::types::Choice;

/// How a question was answered on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentAnswer {
    Choice(Choice),
    NoAnswer,
    Multiple,
}

impl StudentAnswer {
    pub fn choice(&self) -> Option<&Choice> {
        match self {
            StudentAnswer::Choice(choice) => Some(choice),
            _ => None,
        }
    }
}

impl Display for StudentAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudentAnswer::Choice(choice) => write!(f, "{}", choice),
            StudentAnswer::NoAnswer => write!(f, "NONE"),
            StudentAnswer::Multiple => write!(f, "MULTI"),
        }
    }
}

impl Serialize for StudentAnswer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question: u32,
    pub student_answer: StudentAnswer,
    pub expected_answer: Option<Choice>,
    pub is_correct: bool,
    /// Fill ratio of every bubble, in choice order.
    pub fill_ratios: Vec<(Choice, f32)>,
    /// Choices whose fill ratio exceeded the threshold.
    pub marked: Vec<Choice>,
}

impl QuestionResult {
    pub fn fill_ratio(&self, choice: &Choice) -> Option<f32> {
        self.fill_ratios
            .iter()
            .find(|(c, _)| c == choice)
            .map(|(_, ratio)| *ratio)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: f32,
    pub multiple_answers: u32,
    pub unanswered: u32,
    pub question_results: Vec<QuestionResult>,
}

impl GradeReport {
    pub fn from_results(question_results: Vec<QuestionResult>) -> Self {
        let max_score = question_results.len() as u32;
        let total_score = question_results.iter().filter(|r| r.is_correct).count() as u32;
        let count = |answer: &StudentAnswer| {
            question_results
                .iter()
                .filter(|r| &r.student_answer == answer)
                .count() as u32
        };
        let multiple_answers = count(&StudentAnswer::Multiple);
        let unanswered = count(&StudentAnswer::NoAnswer);
        let percentage = if max_score == 0 {
            0.0
        } else {
            total_score as f32 * 100.0 / max_score as f32
        };

        Self {
            total_score,
            max_score,
            percentage,
            multiple_answers,
            unanswered,
            question_results,
        }
    }

    /// Percentage correct among questions with exactly one mark, if any.
    pub fn answered_accuracy(&self) -> Option<f32> {
        let answered = self.max_score - self.unanswered - self.multiple_answers;
        if answered == 0 {
            None
        } else {
            Some(self.total_score as f32 * 100.0 / answered as f32)
        }
    }
}

fn expected_label(expected: &Option<Choice>) -> String {
    expected
        .as_ref()
        .map_or_else(|| "-".to_string(), |c| c.to_string())
}

impl Display for GradeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== GRADE REPORT ===")?;
        writeln!(f, "Score: {}/{}", self.total_score, self.max_score)?;
        writeln!(f, "Percentage: {:.1}%", self.percentage)?;
        writeln!(f, "Multiple answers: {}", self.multiple_answers)?;
        writeln!(f, "Unanswered: {}", self.unanswered)?;
        if let Some(accuracy) = self.answered_accuracy() {
            writeln!(f, "Accuracy (answered questions): {:.1}%", accuracy)?;
        }

        writeln!(f)?;
        writeln!(f, "=== DETAILED RESULTS ===")?;
        for result in &self.question_results {
            let status = match (&result.student_answer, result.is_correct) {
                (StudentAnswer::Choice(_), true) => "o",
                (StudentAnswer::Choice(_), false) => "X",
                _ => "!",
            };
            write!(
                f,
                "Q{:02}: {} Student={:5} Correct={}",
                result.question,
                status,
                result.student_answer.to_string(),
                expected_label(&result.expected_answer)
            )?;

            if let (StudentAnswer::Choice(answer), false) =
                (&result.student_answer, result.is_correct)
            {
                let marked_ratio = result.fill_ratio(answer).unwrap_or_default();
                match result
                    .expected_answer
                    .as_ref()
                    .and_then(|expected| result.fill_ratio(expected))
                {
                    Some(correct_ratio) => write!(
                        f,
                        " (marked: {:.2}, correct: {:.2})",
                        marked_ratio, correct_ratio
                    )?,
                    None => write!(f, " (marked: {:.2})", marked_ratio)?,
                }
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "=== INCORRECT ANSWERS ===")?;
        let incorrect = self
            .question_results
            .iter()
            .filter(|r| !r.is_correct)
            .collect::<Vec<_>>();
        if incorrect.is_empty() {
            writeln!(f, "No incorrect answers!")?;
        }
        for result in incorrect {
            let expected = expected_label(&result.expected_answer);
            match &result.student_answer {
                StudentAnswer::Multiple => {
                    let marked = result
                        .marked
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(
                        f,
                        "Q{:02}: MULTIPLE answers [{}], Correct={}",
                        result.question, marked, expected
                    )?
                }
                StudentAnswer::NoAnswer => writeln!(
                    f,
                    "Q{:02}: UNANSWERED, Correct={}",
                    result.question, expected
                )?,
                StudentAnswer::Choice(answer) => writeln!(
                    f,
                    "Q{:02}: Student={}, Correct={}",
                    result.question, answer, expected
                )?,
            }
        }

        Ok(())
    }
}
