use clap::Parser;

/// Global survey on weather-responsive variable speed limit (VSL) systems.
///
/// The answers are collected in the terminal (or read from a file) and appended to a
/// shared CSV dataset.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file: local copy of the response, storage of
    /// the shared dataset and retry settings. See the documentation of survey_form::manual for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) A JSON file with the answers, keyed by question. If provided, the
    /// questionnaire is not displayed and the answers are submitted directly.
    #[clap(short, long, value_parser)]
    pub answers: Option<String>,

    /// (file path, optional) A local CSV file to use as the shared dataset. Setting this option
    /// overrides the storage that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub dataset: Option<String>,

    /// (file path, default vsl_responses.csv) Where the local copy of the response is written.
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// If passed as an argument, shows the changes to the shared dataset without writing them.
    /// The local copy of the response is not written either.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
