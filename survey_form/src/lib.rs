mod config;
pub mod appender;
pub mod builder;
pub mod manual;
pub mod record;
pub mod store;
pub mod wrvsl;

use log::{debug, info};

use std::collections::HashMap;

pub use crate::appender::{
    AppendError, AppendOutcome, AppendReport, DurableAppender, Preview, RetryPolicy,
};
pub use crate::config::*;
pub use crate::record::{Dataset, DatasetErrors, ResponseRecord, RESPONSE_ID_COLUMN};
pub use crate::store::{DatasetStore, Fetched, MemoryStore, StoreFailure, VersionToken};

/// The state of one respondent going through a questionnaire.
///
/// It tracks the section currently displayed and the answers given so far. Answers
/// may stay partial: moving to another section does not require the current one to
/// be complete, and unanswered questions are simply left out of the final record.
#[derive(Debug, Clone)]
pub struct FormState<'a> {
    questionnaire: &'a Questionnaire,
    // Invariant: current_section < questionnaire.section_count()
    current_section: usize,
    answers: HashMap<String, AnswerValue>,
    submitted: bool,
}

impl<'a> FormState<'a> {
    pub fn new(questionnaire: &'a Questionnaire) -> FormState<'a> {
        FormState {
            questionnaire,
            current_section: 0,
            answers: HashMap::new(),
            submitted: false,
        }
    }

    pub fn questionnaire(&self) -> &'a Questionnaire {
        self.questionnaire
    }

    // ******** Navigation *********

    pub fn current_section(&self) -> usize {
        self.current_section
    }

    pub fn current_section_definition(&self) -> &'a SectionDefinition {
        &self.questionnaire.sections()[self.current_section]
    }

    pub fn section_count(&self) -> usize {
        self.questionnaire.section_count()
    }

    pub fn is_last_section(&self) -> bool {
        self.current_section + 1 == self.section_count()
    }

    /// How far the respondent is, between 0 and 1.
    pub fn progress(&self) -> f64 {
        if self.section_count() <= 1 {
            1.0
        } else {
            self.current_section as f64 / (self.section_count() - 1) as f64
        }
    }

    /// Moves to the next section. Does nothing on the last section.
    /// Returns true if the section changed.
    pub fn go_next(&mut self) -> bool {
        if self.submitted || self.is_last_section() {
            return false;
        }
        self.current_section += 1;
        true
    }

    /// Moves to the previous section. Does nothing on the first section.
    /// Returns true if the section changed.
    pub fn go_previous(&mut self) -> bool {
        if self.submitted || self.current_section == 0 {
            return false;
        }
        self.current_section -= 1;
        true
    }

    /// Moves directly to a section, as done from a section menu.
    pub fn jump_to(&mut self, index: usize) -> Result<(), FormErrors> {
        if self.submitted {
            return Err(FormErrors::AlreadySubmitted);
        }
        if index >= self.section_count() {
            return Err(FormErrors::SectionOutOfRange {
                index,
                section_count: self.section_count(),
            });
        }
        self.current_section = index;
        Ok(())
    }

    // ******** Answers *********

    pub fn answer(&self, key: &str) -> Option<&AnswerValue> {
        self.answers.get(key)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Records an answer, replacing the previous one.
    ///
    /// The value must fit the widget of the question (one of the options, a number in
    /// range, etc.). An empty text or an empty selection clears the answer. A question
    /// that is currently hidden by its condition does not keep any answer.
    ///
    /// Changing an answer withdraws the answers of the conditional questions that no
    /// longer apply.
    pub fn set(&mut self, key: &str, value: AnswerValue) -> Result<(), FormErrors> {
        if self.submitted {
            return Err(FormErrors::AlreadySubmitted);
        }
        let question = self
            .questionnaire
            .question(key)
            .ok_or_else(|| FormErrors::UnknownQuestion(key.to_string()))?;
        let normalized = normalize_answer(question, value)?;
        if !self.is_visible(question) {
            debug!("set: question {:?} is not visible, withdrawing the answer", key);
            self.answers.remove(key);
            return Ok(());
        }
        match normalized {
            Some(v) => {
                debug!("set: {:?} -> {:?}", key, v);
                self.answers.insert(key.to_string(), v);
            }
            None => {
                self.answers.remove(key);
            }
        }
        self.withdraw_hidden_answers();
        Ok(())
    }

    pub fn clear(&mut self, key: &str) -> Result<(), FormErrors> {
        if self.submitted {
            return Err(FormErrors::AlreadySubmitted);
        }
        if self.questionnaire.question(key).is_none() {
            return Err(FormErrors::UnknownQuestion(key.to_string()));
        }
        self.answers.remove(key);
        self.withdraw_hidden_answers();
        Ok(())
    }

    /// True if the question should be displayed and recorded, given the current answers.
    pub fn is_visible(&self, question: &QuestionSpec) -> bool {
        match &question.condition {
            None => true,
            Some(c) => {
                let parent_holds = self
                    .answers
                    .get(&c.parent_key)
                    .map(|a| a.holds(&c.required_value))
                    .unwrap_or(false);
                // The builder guarantees that parents are declared first, so this terminates.
                parent_holds
                    && self
                        .questionnaire
                        .question(&c.parent_key)
                        .map(|p| self.is_visible(p))
                        .unwrap_or(false)
            }
        }
    }

    /// The questions of a section that currently apply.
    pub fn visible_questions(&self, section: usize) -> Vec<&'a QuestionSpec> {
        match self.questionnaire.section(section) {
            Some(s) => s.questions.iter().filter(|q| self.is_visible(q)).collect(),
            None => Vec::new(),
        }
    }

    // Parents come before their children, so one pass in declaration order is enough
    // to clear whole branches.
    fn withdraw_hidden_answers(&mut self) {
        let questionnaire = self.questionnaire;
        for q in questionnaire.questions() {
            if q.is_conditional() && self.answers.contains_key(&q.key) && !self.is_visible(q) {
                debug!(
                    "withdraw_hidden_answers: the condition of {:?} no longer holds",
                    q.key
                );
                self.answers.remove(&q.key);
            }
        }
    }

    // ******** Submission *********

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Flattens the answers into one row, in questionnaire order.
    ///
    /// Unanswered questions and questions hidden by their condition are left out.
    pub fn to_record(&self, response_id: &str) -> ResponseRecord {
        let mut record = ResponseRecord::new(response_id);
        for q in self.questionnaire.questions() {
            if let Some(v) = self.answers.get(&q.key) {
                if self.is_visible(q) {
                    record.insert(&q.key, &v.to_cell());
                }
            }
        }
        record
    }

    /// To call once the record has been committed: the answers are discarded, the
    /// form goes back to the first section and no longer accepts changes.
    pub fn complete_submission(&mut self) {
        info!(
            "complete_submission: discarding {} answers",
            self.answers.len()
        );
        self.answers.clear();
        self.current_section = 0;
        self.submitted = true;
    }
}

// None means that the answer is empty and should be cleared.
fn normalize_answer(
    question: &QuestionSpec,
    value: AnswerValue,
) -> Result<Option<AnswerValue>, FormErrors> {
    let invalid = |reason: String| FormErrors::InvalidAnswer {
        key: question.key.clone(),
        reason,
    };
    match (&question.kind, value) {
        (_, AnswerValue::Text(s)) if s.trim().is_empty() => Ok(None),
        (InputKind::SingleChoice(options), AnswerValue::Text(s)) => {
            if options.contains(&s) {
                Ok(Some(AnswerValue::Text(s)))
            } else {
                Err(invalid(format!("{:?} is not one of the options", s)))
            }
        }
        (InputKind::MultiChoice(options), AnswerValue::Text(s)) => {
            normalize_choices(options, vec![s]).map_err(invalid)
        }
        (InputKind::MultiChoice(options), AnswerValue::Choices(cs)) => {
            normalize_choices(options, cs).map_err(invalid)
        }
        (InputKind::NumericRange { min, max }, AnswerValue::Number(n)) => {
            check_range(n, *min, *max).map_err(invalid)
        }
        (InputKind::NumericRange { min, max }, AnswerValue::Text(s)) => {
            let n = s
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(format!("{:?} is not a number", s)))?;
            check_range(n, *min, *max).map_err(invalid)
        }
        (InputKind::FreeText, AnswerValue::Text(s)) => Ok(Some(AnswerValue::Text(s))),
        (InputKind::FreeText, AnswerValue::Number(n)) => {
            Ok(Some(AnswerValue::Text(AnswerValue::Number(n).to_cell())))
        }
        (kind, v) => Err(invalid(format!("{:?} does not fit {:?}", v, kind))),
    }
}

fn normalize_choices(
    options: &[String],
    choices: Vec<String>,
) -> Result<Option<AnswerValue>, String> {
    let mut res: Vec<String> = Vec::new();
    for c in choices {
        if !options.contains(&c) {
            return Err(format!("{:?} is not one of the options", c));
        }
        if !res.contains(&c) {
            res.push(c);
        }
    }
    if res.is_empty() {
        Ok(None)
    } else {
        Ok(Some(AnswerValue::Choices(res)))
    }
}

fn check_range(n: f64, min: f64, max: f64) -> Result<Option<AnswerValue>, String> {
    if n.is_finite() && n >= min && n <= max {
        Ok(Some(AnswerValue::Number(n)))
    } else {
        Err(format!("{} is not between {} and {}", n, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::builder::Builder;
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Questionnaire {
        Builder::new("sample")
            .section("Context")
            .single_choice("region", "Region", &["Europe", "Asia", "Other"])
            .free_text("region_other", "Which region?")
            .only_if("region", "Other")
            .single_choice("detail", "More detail?", &["yes", "no"])
            .only_if("region", "Other")
            .free_text("detail_text", "Details")
            .only_if("detail", "yes")
            .section("Design")
            .multi_choice("params", "Parameters", &["Rain", "Snow", "Fog", "Other"])
            .free_text("params_other", "Other parameter")
            .only_if("params", "Other")
            .numeric("sites", "Number of sites", 0.0, 500.0)
            .section("End")
            .free_text("comments", "Comments")
            .build()
            .unwrap()
    }

    #[test]
    fn navigation_bounds() {
        let q = sample();
        let mut state = FormState::new(&q);
        assert!(!state.go_previous());
        assert_eq!(state.current_section(), 0);
        assert!(state.go_next());
        assert!(state.go_next());
        assert!(state.is_last_section());
        assert!(!state.go_next());
        assert_eq!(state.current_section(), 2);
        assert!(state.go_previous());
        assert_eq!(state.current_section(), 1);
    }

    #[test]
    fn jump() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.jump_to(2).unwrap();
        assert_eq!(state.current_section(), 2);
        assert_eq!(
            state.jump_to(3),
            Err(FormErrors::SectionOutOfRange {
                index: 3,
                section_count: 3
            })
        );
        assert_eq!(state.current_section(), 2);
    }

    #[test]
    fn progress() {
        let q = sample();
        let mut state = FormState::new(&q);
        assert_eq!(state.progress(), 0.0);
        state.go_next();
        assert_eq!(state.progress(), 0.5);
        state.go_next();
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn answers_survive_navigation() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Asia")).unwrap();
        state.go_next();
        state.set("sites", AnswerValue::Number(12.0)).unwrap();
        state.go_previous();
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Asia")));
        assert_eq!(state.answer("sites"), Some(&AnswerValue::Number(12.0)));
    }

    #[test]
    fn hidden_question_keeps_no_answer() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Europe")).unwrap();
        state
            .set("region_other", AnswerValue::text("Antarctica"))
            .unwrap();
        assert_eq!(state.answer("region_other"), None);
        let record = state.to_record("r1");
        assert_eq!(record.get("region_other"), None);
        assert_eq!(record.get("region"), Some("Europe"));
    }

    #[test]
    fn switching_branch_withdraws_answers() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Other")).unwrap();
        state
            .set("region_other", AnswerValue::text("Antarctica"))
            .unwrap();
        state.set("detail", AnswerValue::text("yes")).unwrap();
        state
            .set("detail_text", AnswerValue::text("research station"))
            .unwrap();
        assert_eq!(state.to_record("r1").answer_count(), 4);

        // Moving away from "Other" withdraws the whole branch, grandchildren included.
        state.set("region", AnswerValue::text("Asia")).unwrap();
        assert_eq!(state.answer("region_other"), None);
        assert_eq!(state.answer("detail"), None);
        assert_eq!(state.answer("detail_text"), None);

        // Going back to "Other" does not bring the old answers back.
        state.set("region", AnswerValue::text("Other")).unwrap();
        let record = state.to_record("r1");
        assert_eq!(record.get("region_other"), None);
        assert_eq!(record.answer_count(), 1);
    }

    #[test]
    fn multi_choice_conditions() {
        let q = sample();
        let mut state = FormState::new(&q);
        state
            .set("params", AnswerValue::choices(&["Rain", "Other", "Rain"]))
            .unwrap();
        assert_eq!(
            state.answer("params"),
            Some(&AnswerValue::choices(&["Rain", "Other"]))
        );
        state
            .set("params_other", AnswerValue::text("Dust"))
            .unwrap();
        state.set("params", AnswerValue::choices(&["Snow"])).unwrap();
        assert_eq!(state.answer("params_other"), None);
        // An empty selection clears the answer.
        state.set("params", AnswerValue::Choices(vec![])).unwrap();
        assert_eq!(state.answer("params"), None);
    }

    #[test]
    fn clear_withdraws_children() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Other")).unwrap();
        state
            .set("region_other", AnswerValue::text("Antarctica"))
            .unwrap();
        state.clear("region").unwrap();
        assert_eq!(state.answered_count(), 0);
        assert_eq!(
            state.clear("nope"),
            Err(FormErrors::UnknownQuestion("nope".to_string()))
        );
    }

    #[test]
    fn answers_must_fit_the_widget() {
        let q = sample();
        let mut state = FormState::new(&q);
        assert!(matches!(
            state.set("region", AnswerValue::text("Mars")),
            Err(FormErrors::InvalidAnswer { .. })
        ));
        assert!(matches!(
            state.set("sites", AnswerValue::Number(501.0)),
            Err(FormErrors::InvalidAnswer { .. })
        ));
        assert!(matches!(
            state.set("sites", AnswerValue::Number(f64::NAN)),
            Err(FormErrors::InvalidAnswer { .. })
        ));
        assert!(matches!(
            state.set("params", AnswerValue::choices(&["Hail"])),
            Err(FormErrors::InvalidAnswer { .. })
        ));
        assert!(matches!(
            state.set("region", AnswerValue::choices(&["Europe"])),
            Err(FormErrors::InvalidAnswer { .. })
        ));
        assert_eq!(
            state.set("unknown", AnswerValue::text("x")),
            Err(FormErrors::UnknownQuestion("unknown".to_string()))
        );
        state.set("sites", AnswerValue::text(" 42 ")).unwrap();
        assert_eq!(state.answer("sites"), Some(&AnswerValue::Number(42.0)));
        state.set("params", AnswerValue::text("Fog")).unwrap();
        assert_eq!(state.answer("params"), Some(&AnswerValue::choices(&["Fog"])));
        state.set("comments", AnswerValue::Number(3.0)).unwrap();
        assert_eq!(state.answer("comments"), Some(&AnswerValue::text("3")));
    }

    #[test]
    fn record_follows_questionnaire_order() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("comments", AnswerValue::text("none")).unwrap();
        state
            .set("params", AnswerValue::choices(&["Snow", "Rain"]))
            .unwrap();
        state.set("region", AnswerValue::text("Asia")).unwrap();
        let record = state.to_record("r1");
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["response_id", "region", "params", "comments"]);
        assert_eq!(record.get("params"), Some("Snow, Rain"));
    }

    #[test]
    fn empty_submission() {
        let q = sample();
        let state = FormState::new(&q);
        let record = state.to_record("r1");
        assert_eq!(record.answer_count(), 0);
        assert_eq!(record.to_csv().unwrap(), "response_id\nr1\n");
    }

    #[test]
    fn submission_is_terminal() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Asia")).unwrap();
        state.go_next();
        state.complete_submission();
        assert!(state.is_submitted());
        assert_eq!(state.current_section(), 0);
        assert_eq!(state.answered_count(), 0);
        assert_eq!(
            state.set("region", AnswerValue::text("Asia")),
            Err(FormErrors::AlreadySubmitted)
        );
        assert!(!state.go_next());
        assert_eq!(state.jump_to(1), Err(FormErrors::AlreadySubmitted));
    }

    #[derive(Debug, Clone)]
    enum Nav {
        Next,
        Previous,
        Jump(usize),
    }

    fn nav_strategy() -> impl Strategy<Value = Nav> {
        prop_oneof![
            Just(Nav::Next),
            Just(Nav::Previous),
            (0usize..6).prop_map(Nav::Jump),
        ]
    }

    proptest! {
        #[test]
        fn index_stays_in_range(ops in prop::collection::vec(nav_strategy(), 0..64)) {
            let q = sample();
            let mut state = FormState::new(&q);
            for op in ops {
                let before = state.current_section();
                match op {
                    Nav::Next => { state.go_next(); }
                    Nav::Previous => { state.go_previous(); }
                    Nav::Jump(i) => {
                        let res = state.jump_to(i);
                        prop_assert_eq!(res.is_ok(), i < q.section_count());
                        if res.is_err() {
                            prop_assert_eq!(state.current_section(), before);
                        }
                    }
                }
                prop_assert!(state.current_section() < q.section_count());
            }
        }
    }
}
