// ********* Questionnaire definition ***********

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

/// The kind of widget used to collect an answer.
#[derive(PartialEq, Debug, Clone)]
pub enum InputKind {
    /// Exactly one of the options (radio buttons, select box).
    SingleChoice(Vec<String>),
    /// Any subset of the options. The order of the selection is kept, which
    /// allows ranking questions.
    MultiChoice(Vec<String>),
    /// A number within the inclusive bounds.
    NumericRange { min: f64, max: f64 },
    /// Free text.
    FreeText,
}

/// The answer a conditional question depends on.
///
/// The condition holds when the parent answer is equal to `required_value`, or when
/// the parent is a multiple choice and `required_value` is part of the selection.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Condition {
    pub parent_key: String,
    pub required_value: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct QuestionSpec {
    /// Unique across the whole questionnaire. It is also the column name in the dataset.
    pub key: String,
    pub prompt: String,
    pub help: Option<String>,
    pub kind: InputKind,
    pub condition: Option<Condition>,
}

impl QuestionSpec {
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

/// One page of grouped questions.
#[derive(PartialEq, Debug, Clone)]
pub struct SectionDefinition {
    pub title: String,
    pub introduction: Option<String>,
    pub questions: Vec<QuestionSpec>,
}

/// The ordered list of sections. Built once with the [crate::builder::Builder] and
/// never modified afterwards.
#[derive(PartialEq, Debug, Clone)]
pub struct Questionnaire {
    pub(crate) title: String,
    pub(crate) sections: Vec<SectionDefinition>,
}

impl Questionnaire {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sections(&self) -> &[SectionDefinition] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&SectionDefinition> {
        self.sections.get(index)
    }

    /// All the questions, in order of appearance.
    pub fn questions(&self) -> impl Iterator<Item = &QuestionSpec> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn question(&self, key: &str) -> Option<&QuestionSpec> {
        self.questions().find(|q| q.key == key)
    }
}

// ********* Answers ***********

/// The value recorded for one question.
///
/// The serialized form is untagged, so that a JSON file can hold `"Europe"`, `12` or
/// `["Visibility", "Wind speed"]`.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn text(s: &str) -> AnswerValue {
        AnswerValue::Text(s.to_string())
    }

    pub fn choices(values: &[&str]) -> AnswerValue {
        AnswerValue::Choices(values.iter().map(|s| s.to_string()).collect())
    }

    /// True if this answer selects the given value.
    pub fn holds(&self, value: &str) -> bool {
        match self {
            AnswerValue::Text(s) => s == value,
            AnswerValue::Choices(cs) => cs.iter().any(|c| c == value),
            AnswerValue::Number(n) => value.parse::<f64>().map(|x| x == *n).unwrap_or(false),
        }
    }

    /// The content of the answer in a dataset cell.
    pub fn to_cell(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.clone(),
            // f64 displays integers without a trailing ".0"
            AnswerValue::Number(n) => format!("{}", n),
            AnswerValue::Choices(cs) => cs.join(", "),
        }
    }
}

// ********* Errors ***********

/// Errors raised while building or filling in a questionnaire.
#[derive(PartialEq, Debug, Clone)]
pub enum FormErrors {
    EmptyQuestionnaire,
    EmptySection(String),
    DuplicateQuestion(String),
    /// The condition refers to a question that is not declared before it.
    UnknownParent { key: String, parent_key: String },
    UnknownQuestion(String),
    InvalidAnswer { key: String, reason: String },
    SectionOutOfRange { index: usize, section_count: usize },
    AlreadySubmitted,
}

impl Error for FormErrors {}

impl Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormErrors::EmptyQuestionnaire => write!(f, "the questionnaire has no sections"),
            FormErrors::EmptySection(title) => write!(f, "section {:?} has no questions", title),
            FormErrors::DuplicateQuestion(key) => write!(f, "question key {:?} is used twice", key),
            FormErrors::UnknownParent { key, parent_key } => write!(
                f,
                "question {:?} depends on {:?}, which is not declared before it",
                key, parent_key
            ),
            FormErrors::UnknownQuestion(key) => write!(f, "unknown question {:?}", key),
            FormErrors::InvalidAnswer { key, reason } => {
                write!(f, "invalid answer for {:?}: {}", key, reason)
            }
            FormErrors::SectionOutOfRange {
                index,
                section_count,
            } => write!(
                f,
                "section {} does not exist (the form has {} sections)",
                index, section_count
            ),
            FormErrors::AlreadySubmitted => write!(f, "the form has already been submitted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_from_json() {
        let js = r#"{"a": "Europe", "b": 12, "c": ["Visibility", "Wind speed"]}"#;
        let m: std::collections::BTreeMap<String, AnswerValue> = serde_json::from_str(js).unwrap();
        assert_eq!(m["a"], AnswerValue::text("Europe"));
        assert_eq!(m["b"], AnswerValue::Number(12.0));
        assert_eq!(m["c"], AnswerValue::choices(&["Visibility", "Wind speed"]));
    }

    #[test]
    fn cells() {
        assert_eq!(AnswerValue::Number(5.0).to_cell(), "5");
        assert_eq!(AnswerValue::Number(2.5).to_cell(), "2.5");
        assert_eq!(
            AnswerValue::choices(&["Visibility", "Wind speed"]).to_cell(),
            "Visibility, Wind speed"
        );
    }

    #[test]
    fn holds_value() {
        assert!(AnswerValue::text("Other").holds("Other"));
        assert!(!AnswerValue::text("Others").holds("Other"));
        assert!(AnswerValue::choices(&["A", "Other"]).holds("Other"));
        assert!(AnswerValue::Number(3.0).holds("3"));
    }
}
