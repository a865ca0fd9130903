use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::types::Choice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerParseError {
    InvalidChoice {
        position: usize,
        raw: String,
        choices: Vec<Choice>,
    },
}

impl Display for AnswerParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerParseError::InvalidChoice {
                position,
                raw,
                choices,
            } => {
                let labels = choices
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "invalid answer {:?} at position {}: expected one of {} or blank",
                    raw, position, labels
                )
            }
        }
    }
}

impl std::error::Error for AnswerParseError {}

/// Validates a single raw answer against the choice set. Matching ignores
/// case and surrounding whitespace; a blank answer means "no answer".
pub fn parse_choice(raw: &str, choices: &[Choice]) -> Result<Option<Choice>, AnswerParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    choices
        .iter()
        .find(|choice| choice.as_str().eq_ignore_ascii_case(trimmed))
        .cloned()
        .map(Some)
        .ok_or_else(|| AnswerParseError::InvalidChoice {
            position: 1,
            raw: raw.to_string(),
            choices: choices.to_vec(),
        })
}

/// One expected answer (or blank) per question, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(Vec<Option<Choice>>);

impl AnswerKey {
    pub fn new(answers: Vec<Option<Choice>>) -> Self {
        Self(answers)
    }

    /// Parses a comma-separated list such as `A,B,,D`. Empty entries are
    /// unanswered questions.
    pub fn parse(raw: &str, choices: &[Choice]) -> Result<Self, AnswerParseError> {
        raw.split(',')
            .enumerate()
            .map(|(i, entry)| {
                parse_choice(entry, choices).map_err(|e| match e {
                    AnswerParseError::InvalidChoice { raw, choices, .. } => {
                        AnswerParseError::InvalidChoice {
                            position: i + 1,
                            raw,
                            choices,
                        }
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The expected answer for a 1-indexed question number.
    pub fn get(&self, question: u32) -> Option<&Choice> {
        question
            .checked_sub(1)
            .and_then(|i| self.0.get(i as usize))
            .and_then(|answer| answer.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Choice>> {
        self.0.iter().map(|answer| answer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_choices;

    #[test]
    fn parse_choice_accepts_any_case() {
        let choices = default_choices();
        assert_eq!(parse_choice("b", &choices), Ok(Some(Choice::from("B"))));
        assert_eq!(parse_choice(" E ", &choices), Ok(Some(Choice::from("E"))));
    }

    #[test]
    fn parse_choice_blank_is_no_answer() {
        assert_eq!(parse_choice("", &default_choices()), Ok(None));
        assert_eq!(parse_choice("   ", &default_choices()), Ok(None));
    }

    #[test]
    fn parse_choice_rejects_unknown_label() {
        let result = parse_choice("F", &default_choices());
        assert!(matches!(
            result,
            Err(AnswerParseError::InvalidChoice { ref raw, .. }) if raw == "F"
        ));
    }

    #[test]
    fn parse_key_keeps_blank_entries() {
        let key = AnswerKey::parse("A,b,,D", &default_choices()).unwrap();
        assert_eq!(key.len(), 4);
        assert_eq!(key.get(1), Some(&Choice::from("A")));
        assert_eq!(key.get(2), Some(&Choice::from("B")));
        assert_eq!(key.get(3), None);
        assert_eq!(key.get(4), Some(&Choice::from("D")));
        assert_eq!(key.get(0), None);
        assert_eq!(key.get(5), None);
    }

    #[test]
    fn parse_key_reports_position_of_bad_entry() {
        let result = AnswerKey::parse("A,B,X", &default_choices());
        assert!(matches!(
            result,
            Err(AnswerParseError::InvalidChoice { position: 3, .. })
        ));
    }
}
