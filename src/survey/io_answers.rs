// Answers given in a JSON file instead of the terminal.
//
// The file is an object from question keys to answers:
// {"region": "Europe", "vsl_types": ["Weather-responsive"], "cav_readiness": 4}

use log::{debug, warn};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs;

use crate::survey::*;

pub type AnswerMap = BTreeMap<String, AnswerValue>;

pub fn read_answers(path: &str) -> BSurveyResult<AnswerMap> {
    let contents = fs::read_to_string(path).context(OpeningAnswersSnafu { path })?;
    let answers: AnswerMap =
        serde_json::from_str(&contents).context(ParsingAnswersSnafu { path })?;
    debug!("read_answers: {} answers in {}", answers.len(), path);
    Ok(answers)
}

/// Fills in the form section by section, as a respondent would.
///
/// Returns the keys that match no question. Answers to questions whose condition does
/// not hold are dropped with a warning.
pub fn apply_answers(state: &mut FormState, answers: &AnswerMap) -> BSurveyResult<Vec<String>> {
    let questionnaire = state.questionnaire();
    state.jump_to(0).context(FormSnafu {})?;
    loop {
        let section = state.current_section_definition();
        for q in section.questions.iter() {
            if let Some(value) = answers.get(&q.key) {
                state.set(&q.key, value.clone()).context(FormSnafu {})?;
                if state.answer(&q.key).is_none() && !state.is_visible(q) {
                    warn!(
                        "The answer to {:?} was dropped: the question does not apply",
                        q.key
                    );
                }
            }
        }
        if !state.go_next() {
            break;
        }
    }
    let ignored: Vec<String> = answers
        .keys()
        .filter(|k| questionnaire.question(k).is_none())
        .cloned()
        .collect();
    Ok(ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(js: &str) -> AnswerMap {
        serde_json::from_str(js).unwrap()
    }

    #[test]
    fn fills_the_wrvsl_form() {
        let q = wrvsl::questionnaire().unwrap();
        let mut state = FormState::new(&q);
        let answers = parse(
            r#"{
                "region": "Europe",
                "vsl_types": ["Weather-responsive", "Congestion-responsive"],
                "control_logic": "Rule-based thresholds (fixed)",
                "threshold_method": "Historical crash data",
                "cav_readiness": 4,
                "favourite_colour": "blue"
            }"#,
        );
        let ignored = apply_answers(&mut state, &answers).unwrap();
        assert_eq!(ignored, vec!["favourite_colour".to_string()]);
        assert!(state.is_last_section());
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Europe")));
        assert_eq!(state.answer("cav_readiness"), Some(&AnswerValue::Number(4.0)));
        assert_eq!(
            state.answer("threshold_method"),
            Some(&AnswerValue::text("Historical crash data"))
        );
    }

    #[test]
    fn hidden_answers_are_dropped() {
        let q = wrvsl::questionnaire().unwrap();
        let mut state = FormState::new(&q);
        let answers = parse(r#"{"evaluated": "No", "crash_reduction": 12}"#);
        apply_answers(&mut state, &answers).unwrap();
        assert_eq!(state.answer("evaluated"), Some(&AnswerValue::text("No")));
        assert_eq!(state.answer("crash_reduction"), None);
    }

    #[test]
    fn invalid_answer() {
        let q = wrvsl::questionnaire().unwrap();
        let mut state = FormState::new(&q);
        let answers = parse(r#"{"region": "Atlantis"}"#);
        let err = apply_answers(&mut state, &answers).unwrap_err();
        assert!(matches!(
            *err,
            SurveyError::Form {
                source: FormErrors::InvalidAnswer { .. }
            }
        ));
    }

    #[test]
    fn reading() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"region": "Asia", "cav_readiness": 2}}"#).unwrap();
        let answers = read_answers(f.path().to_str().unwrap()).unwrap();
        assert_eq!(answers.len(), 2);
        assert!(matches!(
            *read_answers("/nonexistent/answers.json").unwrap_err(),
            SurveyError::OpeningAnswers { .. }
        ));
    }
}
