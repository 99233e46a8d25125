pub use crate::config::*;
use crate::record::RESPONSE_ID_COLUMN;

use log::warn;
use std::collections::HashSet;

/// A builder for questionnaires.
///
/// Questions are added to the last section that was opened. `help` and `only_if`
/// apply to the last question that was added.
///
/// ```
/// use survey_form::builder::Builder;
/// # use survey_form::FormErrors;
///
/// let questionnaire = Builder::new("Commute survey")
///     .section("About you")
///     .single_choice("mode", "How do you commute?", &["Car", "Bike", "Other"])
///     .free_text("mode_other", "Please specify")
///     .only_if("mode", "Other")
///     .build()?;
///
/// assert_eq!(questionnaire.section_count(), 1);
/// # Ok::<(), FormErrors>(())
/// ```
pub struct Builder {
    _title: String,
    _sections: Vec<SectionDefinition>,
}

impl Builder {
    pub fn new(title: &str) -> Builder {
        Builder {
            _title: title.to_string(),
            _sections: Vec::new(),
        }
    }

    /// Opens a new section.
    pub fn section(mut self, title: &str) -> Builder {
        self._sections.push(SectionDefinition {
            title: title.to_string(),
            introduction: None,
            questions: Vec::new(),
        });
        self
    }

    /// Sets the text displayed at the top of the current section.
    pub fn introduction(mut self, text: &str) -> Builder {
        match self._sections.last_mut() {
            Some(s) => s.introduction = Some(text.to_string()),
            None => warn!("introduction: no section opened, ignoring {:?}", text),
        }
        self
    }

    pub fn single_choice(self, key: &str, prompt: &str, options: &[&str]) -> Builder {
        self.question(key, prompt, InputKind::SingleChoice(to_strings(options)))
    }

    pub fn multi_choice(self, key: &str, prompt: &str, options: &[&str]) -> Builder {
        self.question(key, prompt, InputKind::MultiChoice(to_strings(options)))
    }

    pub fn numeric(self, key: &str, prompt: &str, min: f64, max: f64) -> Builder {
        self.question(key, prompt, InputKind::NumericRange { min, max })
    }

    pub fn free_text(self, key: &str, prompt: &str) -> Builder {
        self.question(key, prompt, InputKind::FreeText)
    }

    pub fn question(mut self, key: &str, prompt: &str, kind: InputKind) -> Builder {
        if self._sections.is_empty() {
            // Questions without an explicit section go to a section named after the questionnaire.
            let title = self._title.clone();
            self = self.section(&title);
        }
        if let Some(s) = self._sections.last_mut() {
            s.questions.push(QuestionSpec {
                key: key.to_string(),
                prompt: prompt.to_string(),
                help: None,
                kind,
                condition: None,
            });
        }
        self
    }

    /// Attaches a tooltip to the last question.
    pub fn help(mut self, text: &str) -> Builder {
        match self.last_question() {
            Some(q) => q.help = Some(text.to_string()),
            None => warn!("help: no question declared yet, ignoring {:?}", text),
        }
        self
    }

    /// Makes the last question conditional on a previous answer.
    pub fn only_if(mut self, parent_key: &str, required_value: &str) -> Builder {
        match self.last_question() {
            Some(q) => {
                q.condition = Some(Condition {
                    parent_key: parent_key.to_string(),
                    required_value: required_value.to_string(),
                })
            }
            None => warn!("only_if: no question declared yet, ignoring {:?}", parent_key),
        }
        self
    }

    /// Checks the structure of the questionnaire:
    /// - there is at least one section, and no section is empty
    /// - the keys are unique (and do not clash with the reserved `response_id` column)
    /// - a condition refers to a question declared before the conditional one
    pub fn build(self) -> Result<Questionnaire, FormErrors> {
        if self._sections.is_empty() {
            return Err(FormErrors::EmptyQuestionnaire);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(RESPONSE_ID_COLUMN);
        for section in self._sections.iter() {
            if section.questions.is_empty() {
                return Err(FormErrors::EmptySection(section.title.clone()));
            }
            for q in section.questions.iter() {
                if let Some(c) = &q.condition {
                    if !seen.contains(c.parent_key.as_str()) || c.parent_key == RESPONSE_ID_COLUMN
                    {
                        return Err(FormErrors::UnknownParent {
                            key: q.key.clone(),
                            parent_key: c.parent_key.clone(),
                        });
                    }
                }
                if !seen.insert(q.key.as_str()) {
                    return Err(FormErrors::DuplicateQuestion(q.key.clone()));
                }
            }
        }
        Ok(Questionnaire {
            title: self._title,
            sections: self._sections,
        })
    }

    fn last_question(&mut self) -> Option<&mut QuestionSpec> {
        self._sections
            .last_mut()
            .and_then(|s| s.questions.last_mut())
    }
}

fn to_strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_questionnaire() {
        assert_eq!(
            Builder::new("x").build(),
            Err(FormErrors::EmptyQuestionnaire)
        );
        assert_eq!(
            Builder::new("x").section("A").build(),
            Err(FormErrors::EmptySection("A".to_string()))
        );
    }

    #[test]
    fn duplicate_keys() {
        let res = Builder::new("x")
            .section("A")
            .free_text("a", "first")
            .section("B")
            .free_text("a", "second")
            .build();
        assert_eq!(res, Err(FormErrors::DuplicateQuestion("a".to_string())));

        let res = Builder::new("x")
            .free_text(RESPONSE_ID_COLUMN, "reserved")
            .build();
        assert_eq!(
            res,
            Err(FormErrors::DuplicateQuestion(RESPONSE_ID_COLUMN.to_string()))
        );
    }

    #[test]
    fn parent_must_come_first() {
        let res = Builder::new("x")
            .section("A")
            .free_text("child", "child")
            .only_if("parent", "yes")
            .single_choice("parent", "parent", &["yes", "no"])
            .build();
        assert_eq!(
            res,
            Err(FormErrors::UnknownParent {
                key: "child".to_string(),
                parent_key: "parent".to_string()
            })
        );
    }

    #[test]
    fn implicit_section_and_modifiers() {
        let q = Builder::new("Quick")
            .single_choice("a", "A?", &["yes", "no"])
            .help("some help")
            .numeric("b", "B?", 0.0, 10.0)
            .only_if("a", "yes")
            .build()
            .unwrap();
        assert_eq!(q.section_count(), 1);
        assert_eq!(q.section(0).unwrap().title, "Quick");
        assert_eq!(q.question("a").unwrap().help.as_deref(), Some("some help"));
        assert!(q.question("b").unwrap().is_conditional());
        assert!(!q.question("a").unwrap().is_conditional());
    }
}
