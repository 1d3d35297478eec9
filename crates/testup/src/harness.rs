//! Command-line harness
//!
//! Collects named scripts into one tree, each under a suite labelled with the
//! script name, and runs them with the reporter picked from `testup.toml`,
//! the `TESTUP_*` environment and the command line.

use crate::logging::init_logging;
use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use testup_config::{ConfigLoader, ReporterKind, TestupConfig};
use testup_core::{Builder, Reporter, Runner};
use testup_reporter::{ConsoleReporter, TapReporter};
use tokio::task::LocalSet;

/// Exit code for a run where every case passed
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failed, skipped or aborted cases
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a harness error (bad arguments, bad config, internal fault)
pub const EXIT_ERROR: i32 = 2;

/// Run testup scripts and report the results.
///
/// Settings come from the nearest testup.toml, then TESTUP_* environment
/// variables, then these flags.
///
/// ENVIRONMENT VARIABLES:
///     TESTUP_REPORTER       Reporter to use (tap, console)
///     TESTUP_REPORT_ERRORS  Report suite errors instead of aborting (true/false)
///     TESTUP_LINE_LENGTH    Wrap width of TAP output
///     RUST_LOG              Log filter, overrides --verbose
#[derive(Parser, Debug)]
#[command(name = "testup")]
#[command(version)]
struct Args {
    /// Reporter to use (tap, console)
    #[arg(long, short = 'r', value_parser = parse_reporter)]
    reporter: Option<ReporterKind>,
    /// Configuration file (default: testup.toml found from the current directory up)
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,
    /// Report suite errors through the reporter instead of aborting
    #[arg(long, conflicts_with = "fail_fast")]
    report_errors: bool,
    /// Abort the run on the first suite error
    #[arg(long)]
    fail_fast: bool,
    /// Disable colored output
    #[arg(long)]
    no_color: bool,
    /// Wrap TAP output at this many characters
    #[arg(long, value_name = "N")]
    line_length: Option<usize>,
    /// Log debug events from the executor
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn parse_reporter(value: &str) -> Result<ReporterKind, String> {
    value.parse().map_err(|error| format!("{error}"))
}

type Script = Box<dyn FnOnce(&mut Builder<'_>) -> anyhow::Result<()>>;

/// Entry point for test binaries.
///
/// ```no_run
/// use testup::Harness;
///
/// fn main() {
///     Harness::new()
///         .script("math", |t| {
///             t.it("adds", |test, _| async move {
///                 assert_eq!(2 + 2, 4);
///                 test.end()?;
///                 Ok(())
///             });
///             Ok(())
///         })
///         .main()
/// }
/// ```
#[derive(Default)]
pub struct Harness {
    scripts: Vec<(String, Script)>,
    directory: Option<PathBuf>,
    output: Option<Box<dyn Write>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script. Its units are declared inside a suite named `name`.
    pub fn script<S>(mut self, name: impl Into<String>, script: S) -> Self
    where
        S: FnOnce(&mut Builder<'_>) -> anyhow::Result<()> + 'static,
    {
        self.scripts.push((name.into(), Box::new(script)));
        self
    }

    /// Search for testup.toml from `directory` instead of the current directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Send reporter output to `output` instead of stdout and stderr.
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Run with the process arguments and exit with the resulting code.
    pub fn main(self) -> ! {
        std::process::exit(self.run_with_args(std::env::args_os()))
    }

    /// Run with `args` (program name first) and return the exit code.
    pub fn run_with_args<I, T>(self, args: I) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = match Args::try_parse_from(args) {
            Ok(args) => args,
            Err(error) => {
                let _ = error.print();
                return error.exit_code();
            }
        };

        init_logging(args.verbose);
        if args.no_color {
            colored::control::set_override(false);
        }

        let code = match self.execute(&args) {
            Ok(true) => EXIT_SUCCESS,
            Ok(false) => EXIT_FAILURE,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "run failed");
                eprintln!("{} {error:#}", "error:".red().bold());
                EXIT_ERROR
            }
        };

        if args.no_color {
            colored::control::unset_override();
        }
        code
    }

    /// Returns whether the root suite completed with every case passing.
    fn execute(self, args: &Args) -> Result<bool> {
        let Harness {
            scripts,
            directory,
            output,
        } = self;

        let settings = load_settings(args, directory)?;
        tracing::debug!(
            reporter = %settings.reporter,
            report_errors = settings.report_errors,
            scripts = scripts.len(),
            "starting run"
        );
        let reporter = build_reporter(&settings, output);
        let runner = Runner::new().with_report_errors(settings.report_errors);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to start the async runtime")?;
        let local = LocalSet::new();

        let tree = local.block_on(
            &runtime,
            runner.run(
                move |t: &mut Builder<'_>| {
                    for (name, script) in scripts {
                        t.describe(name, script)?;
                    }
                    Ok(())
                },
                reporter,
            ),
        )?;

        Ok(tree.root().is_ok())
    }
}

/// Resolve settings: file, then environment, then flags.
fn load_settings(args: &Args, directory: Option<PathBuf>) -> Result<TestupConfig> {
    let loader = ConfigLoader::new();
    let config = match &args.config {
        Some(path) => loader.load_from_file(path)?,
        None => {
            let directory = match directory {
                Some(directory) => directory,
                None => std::env::current_dir().context("Failed to read the current directory")?,
            };
            loader.load_from_directory(&directory)?
        }
    };
    if let Some(root) = &config.project_root {
        tracing::debug!(root = %root.display(), "using project configuration");
    }

    let mut settings = config.settings;
    if let Some(reporter) = args.reporter {
        settings.reporter = reporter;
    }
    if args.report_errors {
        settings.report_errors = true;
    }
    if args.fail_fast {
        settings.report_errors = false;
    }
    if let Some(line_length) = args.line_length {
        settings.output.line_length = line_length;
    }
    if args.no_color {
        settings.output.color = false;
    }
    settings.validate()?;

    Ok(settings)
}

fn build_reporter(settings: &TestupConfig, output: Option<Box<dyn Write>>) -> Rc<dyn Reporter> {
    let color = settings.output.color;
    match settings.reporter {
        ReporterKind::Tap => {
            let reporter = match output {
                Some(output) => TapReporter::new(output),
                None => TapReporter::stdout(),
            };
            Rc::new(
                reporter
                    .with_line_length(settings.output.line_length)
                    .with_color(color),
            )
        }
        ReporterKind::Console => {
            let console = &settings.console;
            let reporter = match output {
                Some(output) => ConsoleReporter::new(output),
                None => ConsoleReporter::stdout(),
            };
            Rc::new(
                reporter
                    .with_indent(console.indent.as_str())
                    .with_marks(console.success_mark.as_str(), console.failure_mark.as_str())
                    .with_color(color),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("testup").chain(args.iter().copied()))
            .unwrap_or_else(|error| panic!("{error}"))
    }

    #[test]
    fn test_flags_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["-r", "console", "--line-length", "40", "--fail-fast", "--no-color"]);
        let settings = load_settings(&args, Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(settings.reporter, ReporterKind::Console);
        assert_eq!(settings.output.line_length, 40);
        assert!(!settings.report_errors);
        assert!(!settings.output.color);
    }

    #[test]
    fn test_flags_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["--line-length", "5"]);
        assert!(load_settings(&args, Some(dir.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_report_errors_conflicts_with_fail_fast() {
        let result =
            Args::try_parse_from(["testup", "--report-errors", "--fail-fast"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_reporter_is_rejected() {
        assert!(Args::try_parse_from(["testup", "-r", "junit"]).is_err());
    }
}
