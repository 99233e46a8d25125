use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_form::*;

use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use text_diff::print_diff;

use crate::args::Args;
use crate::survey::config_reader::*;
use crate::survey::io_answers::{apply_answers, read_answers};
use crate::survey::io_common::{new_response_id, same_file, write_export};
use crate::survey::terminal::{run_form, FormAction};

pub mod config_reader;
mod io_answers;
mod io_common;
mod io_file;
mod io_github;
mod terminal;

/// The metadata column holding the submission time.
pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening configuration file {path}"))]
    OpeningConfig { source: io::Error, path: String },
    #[snafu(display("Error parsing configuration file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening answers file {path}"))]
    OpeningAnswers { source: io::Error, path: String },
    #[snafu(display("Error parsing answers file {path}"))]
    ParsingAnswers {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Unknown storage provider {provider:?} (expected github, file or none)"))]
    UnknownProvider { provider: String },
    #[snafu(display("The storage setting {setting:?} is required for the {provider} provider"))]
    MissingStorageSetting { provider: String, setting: String },
    #[snafu(display("The access token is missing: set the environment variable {env_var}"))]
    MissingToken { env_var: String },
    #[snafu(display("Cannot set up the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Questionnaire error"))]
    Form { source: FormErrors },
    #[snafu(display("Error writing the local copy of the response to {path}"))]
    Export { source: io::Error, path: String },
    #[snafu(display("Error encoding the response"))]
    ExportEncoding { source: DatasetErrors },
    #[snafu(display("The local copy {path} would overwrite the shared dataset"))]
    ExportOverwritesDataset { path: String },
    #[snafu(display(
        "The response could not be saved in the shared dataset. A copy was written to {export_path}"
    ))]
    Commit {
        source: AppendError,
        export_path: String,
    },
    #[snafu(display(
        "The response was not saved: the shared dataset refused it, and the local copy failed ({export_error})"
    ))]
    Unsaved {
        source: AppendError,
        export_error: String,
    },
    #[snafu(display("Cannot preview the changes to the shared dataset"))]
    Preview { source: AppendError },
    #[snafu(display("Error reading or writing the terminal"))]
    Terminal { source: io::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;
pub type BSurveyResult<T> = Result<T, Box<SurveyError>>;

/// What happened to a submitted response.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubmitOutcome {
    Committed(AppendReport),
    /// No shared dataset is configured, the response is only in the local copy.
    ExportOnly,
    /// Nothing was written to the shared dataset.
    DryRun,
}

/// The record of the current answers, with its id and submission time.
pub fn stamp_record(state: &FormState, now: DateTime<Utc>) -> ResponseRecord {
    let mut record = state.to_record(&new_response_id(&now));
    record.insert(
        SUBMITTED_AT_COLUMN,
        &now.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    record
}

/// Saves a response.
///
/// A local copy is written first, then the record is committed to the shared dataset.
/// The local copy is a fallback: when it cannot be written, the commit still goes ahead
/// and the call only fails if the commit fails too. The form is only reset once the
/// response is saved; on failure the answers stay in the form.
///
/// A dry run only prints the changes to the shared dataset, and writes nothing.
pub fn submit(
    state: &mut FormState,
    record: &ResponseRecord,
    store: Option<&dyn DatasetStore>,
    policy: RetryPolicy,
    export_path: &str,
    dry_run: bool,
) -> BSurveyResult<SubmitOutcome> {
    if dry_run {
        if let Some(s) = store {
            let preview = DurableAppender::new(s, policy)
                .preview(record)
                .context(PreviewSnafu {})?;
            let before = preview.before.unwrap_or_default();
            print_diff(before.as_str(), preview.after.as_str(), "\n");
        }
        return Ok(SubmitOutcome::DryRun);
    }

    let dataset_path = store.and_then(|s| s.local_path());
    let exported = write_export(export_path, record, dataset_path.as_deref());
    match &exported {
        Ok(()) => info!(
            "submit: response {} with {} answers, local copy in {}",
            record.response_id(),
            record.answer_count(),
            export_path
        ),
        Err(e) => warn!(
            "The local copy of the response could not be written: {}",
            error_chain(&**e)
        ),
    }

    let store = match store {
        Some(s) => s,
        None => {
            info!("submit: no shared dataset configured");
            exported?;
            state.complete_submission();
            return Ok(SubmitOutcome::ExportOnly);
        }
    };

    match DurableAppender::new(store, policy).append(record) {
        Ok(report) => {
            debug!("submit: {:?}", report);
            state.complete_submission();
            Ok(SubmitOutcome::Committed(report))
        }
        Err(source) => match exported {
            Ok(()) => Err(Box::new(SurveyError::Commit {
                source,
                export_path: export_path.to_string(),
            })),
            Err(e) => Err(Box::new(SurveyError::Unsaved {
                source,
                export_error: error_chain(&*e),
            })),
        },
    }
}

/// The error and its causes on one line.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut res = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        res.push_str(": ");
        res.push_str(&s.to_string());
        source = s.source();
    }
    res
}

pub fn run_survey(args: &Args) -> BSurveyResult<()> {
    let config: SurveyConfig = match &args.config {
        Some(p) => read_config(p)?,
        None => SurveyConfig::default(),
    };
    debug!("config: {:?}", config);

    let provider = match &args.dataset {
        Some(p) => StorageProvider::File(p.into()),
        None => config.storage.provider()?,
    };
    // Open the store before the questionnaire starts: a missing token must not be
    // discovered after the respondent spent time on the answers.
    let store = open_store(&provider)?;
    let policy = config.retry.policy();
    let export_path = args
        .out
        .clone()
        .or_else(|| config.output_settings.export_path.clone())
        .unwrap_or_else(|| DEFAULT_EXPORT_PATH.to_string());

    check_export_path(&provider, &export_path)?;

    let questionnaire = wrvsl::questionnaire().context(FormSnafu {})?;
    let mut state = FormState::new(&questionnaire);

    match &args.answers {
        Some(path) => {
            let answers = read_answers(path)?;
            let ignored = apply_answers(&mut state, &answers)?;
            if !ignored.is_empty() {
                warn!("Ignored answers for unknown questions: {:?}", ignored);
            }
        }
        None => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            match run_form(&mut state, &mut input, &mut output).context(TerminalSnafu {})? {
                FormAction::Submit => {}
                FormAction::Quit => {
                    info!("The respondent left without submitting");
                    return Ok(());
                }
            }
        }
    }

    let record = stamp_record(&state, Utc::now());
    let outcome = submit(
        &mut state,
        &record,
        store.as_deref(),
        policy,
        &export_path,
        args.dry_run,
    )?;
    match outcome {
        SubmitOutcome::Committed(report) => {
            println!("Responses saved successfully!");
            debug!("outcome: {:?}", report);
        }
        SubmitOutcome::ExportOnly => {
            println!("Responses saved to {}", export_path);
        }
        SubmitOutcome::DryRun => {
            println!("Dry run: the shared dataset was not modified");
        }
    }
    Ok(())
}

// The local copy is written before committing: it must not replace the shared dataset.
fn check_export_path(provider: &StorageProvider, export_path: &str) -> SurveyResult<()> {
    if let StorageProvider::File(p) = provider {
        if same_file(p, std::path::Path::new(export_path)) {
            whatever!(
                "The local copy {} would overwrite the shared dataset, use --out to change it",
                export_path
            );
        }
    }
    Ok(())
}

fn open_store(provider: &StorageProvider) -> BSurveyResult<Option<Box<dyn DatasetStore>>> {
    let store: Option<Box<dyn DatasetStore>> = match provider {
        StorageProvider::GitHub(settings) => Some(Box::new(io_github::GitHubStore::new(
            settings.clone(),
        )?)),
        StorageProvider::File(path) => Some(Box::new(io_file::FileStore::new(path.clone()))),
        StorageProvider::NoStorage => None,
    };
    if let Some(s) = &store {
        info!("Responses will be committed to {}", s.describe());
    }
    Ok(store)
}
