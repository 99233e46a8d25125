// A line-oriented rendition of the form, for filling it in from a terminal.

use log::debug;
use std::io::{self, BufRead, Write};

use survey_form::*;

/// How the respondent left the form.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FormAction {
    Submit,
    Quit,
}

// What the respondent typed for one question.
#[derive(Debug, PartialEq)]
enum Entry {
    Keep,
    Clear,
    Value(AnswerValue),
}

const NAVIGATION_HELP: &str =
    "[n] next section, [p] previous section, [g N] go to section N, [s] submit, [q] quit";

/// Walks the respondent through the sections until they submit or quit.
///
/// The end of the input counts as quitting.
pub fn run_form<R: BufRead, W: Write>(
    state: &mut FormState,
    input: &mut R,
    output: &mut W,
) -> io::Result<FormAction> {
    writeln!(output, "{}", state.questionnaire().title())?;
    loop {
        render_header(state, output)?;
        let section = state.current_section_definition();
        for q in section.questions.iter() {
            // Visibility depends on the answers given just before.
            if !state.is_visible(q) {
                continue;
            }
            if !ask(state, q, input, output)? {
                return Ok(FormAction::Quit);
            }
        }
        match navigate(state, input, output)? {
            Some(action) => return Ok(action),
            None => continue,
        }
    }
}

fn render_header<W: Write>(state: &FormState, output: &mut W) -> io::Result<()> {
    let section = state.current_section_definition();
    writeln!(output)?;
    writeln!(
        output,
        "== Section {}/{}: {} ==",
        state.current_section() + 1,
        state.section_count(),
        section.title
    )?;
    writeln!(
        output,
        "Progress: {:.0}% complete",
        state.progress() * 100.0
    )?;
    if let Some(intro) = &section.introduction {
        writeln!(output, "{}", intro)?;
    }
    Ok(())
}

// Returns false at the end of the input.
fn ask<R: BufRead, W: Write>(
    state: &mut FormState,
    question: &QuestionSpec,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    loop {
        writeln!(output)?;
        writeln!(output, "{}", question.prompt)?;
        if let Some(help) = &question.help {
            writeln!(output, "  ({})", help)?;
        }
        match &question.kind {
            InputKind::SingleChoice(options) => {
                write_options(options, output)?;
            }
            InputKind::MultiChoice(options) => {
                write_options(options, output)?;
                writeln!(output, "  Several answers: separate them with commas.")?;
            }
            InputKind::NumericRange { min, max } => {
                writeln!(output, "  A number between {} and {}.", min, max)?;
            }
            InputKind::FreeText => {}
        }
        if let Some(current) = state.answer(&question.key) {
            writeln!(
                output,
                "  Current answer: {} (Enter keeps it, '-' clears it)",
                current.to_cell()
            )?;
        }
        write!(output, "> ")?;
        output.flush()?;

        let line = match read_line(input)? {
            Some(l) => l,
            None => return Ok(false),
        };
        let res = match parse_entry(&question.kind, &line) {
            Ok(Entry::Keep) => Ok(()),
            Ok(Entry::Clear) => state.clear(&question.key),
            Ok(Entry::Value(v)) => state.set(&question.key, v),
            Err(msg) => {
                writeln!(output, "Invalid answer: {}", msg)?;
                continue;
            }
        };
        match res {
            Ok(()) => return Ok(true),
            Err(e) => {
                debug!("ask: {:?} rejected: {:?}", question.key, e);
                writeln!(output, "Invalid answer: {}", e)?;
            }
        }
    }
}

fn write_options<W: Write>(options: &[String], output: &mut W) -> io::Result<()> {
    for (i, o) in options.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, o)?;
    }
    Ok(())
}

// None means that the form should keep going.
fn navigate<R: BufRead, W: Write>(
    state: &mut FormState,
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<FormAction>> {
    loop {
        writeln!(output)?;
        writeln!(output, "{}", NAVIGATION_HELP)?;
        write!(output, "> ")?;
        output.flush()?;
        let line = match read_line(input)? {
            Some(l) => l,
            None => return Ok(Some(FormAction::Quit)),
        };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("n"), None) => {
                if state.go_next() {
                    return Ok(None);
                }
                writeln!(output, "This is the last section. Use [s] to submit.")?;
            }
            (Some("p"), None) => {
                if state.go_previous() {
                    return Ok(None);
                }
                writeln!(output, "This is the first section.")?;
            }
            (Some("g"), Some(n)) => match n.parse::<usize>() {
                Ok(idx) if idx >= 1 && state.jump_to(idx - 1).is_ok() => return Ok(None),
                _ => writeln!(
                    output,
                    "There is no section {} (1 to {}).",
                    n,
                    state.section_count()
                )?,
            },
            (Some("s"), None) => {
                if state.is_last_section() {
                    return Ok(Some(FormAction::Submit));
                }
                writeln!(output, "The responses can be submitted from the last section.")?;
            }
            (Some("q"), None) => return Ok(Some(FormAction::Quit)),
            _ => writeln!(output, "Unknown command {:?}", line.trim())?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn parse_entry(kind: &InputKind, line: &str) -> Result<Entry, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Entry::Keep);
    }
    if line == "-" {
        return Ok(Entry::Clear);
    }
    let value = match kind {
        InputKind::SingleChoice(options) => pick_option(options, line).map(AnswerValue::Text),
        InputKind::MultiChoice(options) => line
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| pick_option(options, part))
            .collect::<Result<Vec<String>, String>>()
            .map(AnswerValue::Choices),
        InputKind::NumericRange { .. } => line
            .parse::<f64>()
            .map(AnswerValue::Number)
            .map_err(|_| format!("{:?} is not a number", line)),
        InputKind::FreeText => Ok(AnswerValue::Text(line.to_string())),
    }?;
    Ok(Entry::Value(value))
}

// The number of an option, or its text.
fn pick_option(options: &[String], part: &str) -> Result<String, String> {
    if let Ok(idx) = part.parse::<usize>() {
        return match idx.checked_sub(1).and_then(|i| options.get(i)) {
            Some(o) => Ok(o.clone()),
            None => Err(format!("choose a number between 1 and {}", options.len())),
        };
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(part))
        .cloned()
        .ok_or_else(|| format!("{:?} is not one of the options", part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use survey_form::builder::Builder;

    fn sample() -> Questionnaire {
        Builder::new("sample")
            .section("A")
            .introduction("About you")
            .single_choice("region", "Region", &["Europe", "Asia", "Other"])
            .free_text("region_other", "Which region?")
            .only_if("region", "Other")
            .section("B")
            .multi_choice("tools", "Tools", &["x", "y", "z"])
            .numeric("score", "Score", 1.0, 5.0)
            .build()
            .unwrap()
    }

    fn run(state: &mut FormState, input: &str) -> (FormAction, String) {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut output: Vec<u8> = Vec::new();
        let action = run_form(state, &mut input, &mut output).unwrap();
        (action, String::from_utf8(output).unwrap())
    }

    #[test]
    fn full_walk() {
        let q = sample();
        let mut state = FormState::new(&q);
        let (action, out) = run(&mut state, "3\nMars\nn\n1,z\n7\n4\nbogus\ns\n");
        assert_eq!(action, FormAction::Submit);
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Other")));
        assert_eq!(state.answer("region_other"), Some(&AnswerValue::text("Mars")));
        assert_eq!(state.answer("tools"), Some(&AnswerValue::choices(&["x", "z"])));
        assert_eq!(state.answer("score"), Some(&AnswerValue::Number(4.0)));
        assert!(out.contains("Progress: 0% complete"));
        assert!(out.contains("Progress: 100% complete"));
        assert!(out.contains("About you"));
        assert!(out.contains("Invalid answer: "));
        assert!(out.contains("Unknown command \"bogus\""));
    }

    #[test]
    fn hidden_question_is_skipped() {
        let q = sample();
        let mut state = FormState::new(&q);
        let (action, out) = run(&mut state, "europe\ng 2\n\n\ns\n");
        assert_eq!(action, FormAction::Submit);
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Europe")));
        assert!(!out.contains("Which region?"));
        assert_eq!(state.answered_count(), 1);
    }

    #[test]
    fn submit_only_from_the_last_section() {
        let q = sample();
        let mut state = FormState::new(&q);
        let (action, out) = run(&mut state, "1\ns\nq\n");
        assert_eq!(action, FormAction::Quit);
        assert!(out.contains("can be submitted from the last section"));
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Europe")));
    }

    #[test]
    fn end_of_input_quits() {
        let q = sample();
        let mut state = FormState::new(&q);
        let (action, _) = run(&mut state, "");
        assert_eq!(action, FormAction::Quit);
        assert_eq!(state.answered_count(), 0);
    }

    #[test]
    fn clearing_and_keeping() {
        let q = sample();
        let mut state = FormState::new(&q);
        state.set("region", AnswerValue::text("Asia")).unwrap();
        let (_, out) = run(&mut state, "\nq\n");
        assert!(out.contains("Current answer: Asia"));
        assert_eq!(state.answer("region"), Some(&AnswerValue::text("Asia")));
        run(&mut state, "-\nq\n");
        assert_eq!(state.answer("region"), None);
    }

    #[test]
    fn entries() {
        let options: Vec<String> = vec!["Yes".to_string(), "No".to_string()];
        let single = InputKind::SingleChoice(options.clone());
        assert_eq!(
            parse_entry(&single, " 2 "),
            Ok(Entry::Value(AnswerValue::text("No")))
        );
        assert_eq!(
            parse_entry(&single, "yes"),
            Ok(Entry::Value(AnswerValue::text("Yes")))
        );
        assert!(parse_entry(&single, "3").is_err());
        assert!(parse_entry(&single, "0").is_err());
        assert_eq!(parse_entry(&single, ""), Ok(Entry::Keep));
        assert_eq!(parse_entry(&single, "-"), Ok(Entry::Clear));
        let multi = InputKind::MultiChoice(options);
        assert_eq!(
            parse_entry(&multi, "2, 1"),
            Ok(Entry::Value(AnswerValue::choices(&["No", "Yes"])))
        );
        let numeric = InputKind::NumericRange { min: 0.0, max: 100.0 };
        assert_eq!(
            parse_entry(&numeric, "12.5"),
            Ok(Entry::Value(AnswerValue::Number(12.5)))
        );
        assert!(parse_entry(&numeric, "lots").is_err());
    }
}
