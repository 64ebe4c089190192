//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use deepdive_core::research::{fallback_report, sources_section};
use deepdive_core::{
    clarifying_questions, combine_query, retrieve, Config, FileStorage, LlmGenerator, Provider,
    ReportComposer, ResearchRun, ResearchRunner, Storage, StructuredGenerator, TextBudgeter, LLM,
};
use tracing::{info, warn};

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// deepdive: recursive web research with LLM synthesis.
#[derive(Parser)]
#[command(
    name = "deepdive",
    version,
    about = "Research a topic recursively and write a markdown report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// What to write once research completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputMode {
    /// Detailed markdown report.
    Report,
    /// Short, exact answer.
    Answer,
}

impl OutputMode {
    fn default_path(self) -> &'static str {
        match self {
            OutputMode::Report => "report.md",
            OutputMode::Answer => "answer.md",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a topic and write a report.
    Research {
        /// What to research
        #[arg(required = true)]
        query: Vec<String>,

        /// Queries planned at the top level (defaults to config).
        #[arg(short, long)]
        breadth: Option<usize>,

        /// Recursion levels (defaults to config).
        #[arg(short, long)]
        depth: Option<usize>,

        /// Output a full report or a short answer.
        #[arg(short, long, value_enum, default_value = "report")]
        mode: OutputMode,

        /// Skip the clarifying questions.
        #[arg(long)]
        no_feedback: bool,

        /// Where to write the result (defaults to report.md / answer.md).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored research runs.
    Runs,

    /// Print a stored run's report.
    Show {
        /// Run ID
        id: String,
    },

    /// Print the default configuration as TOML.
    Config,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "deepdive_core=warn,deepdive=warn",
        1 => "deepdive_core=info,deepdive=info",
        2 => "deepdive_core=debug,deepdive=debug",
        _ => "deepdive_core=trace,deepdive=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Research {
            query,
            breadth,
            depth,
            mode,
            no_feedback,
            output,
        } => {
            let options = ResearchOptions {
                query: query.join(" "),
                breadth,
                depth,
                mode,
                feedback: !no_feedback,
                output,
            };
            cmd_research(options).await
        }
        Command::Runs => cmd_runs(),
        Command::Show { id } => cmd_show(&id),
        Command::Config => cmd_config(),
    }
}

struct ResearchOptions {
    query: String,
    breadth: Option<usize>,
    depth: Option<usize>,
    mode: OutputMode,
    feedback: bool,
    output: Option<PathBuf>,
}

async fn cmd_research(options: ResearchOptions) -> Result<()> {
    let config = Config::load().wrap_err("failed to load configuration")?;

    let llm = Provider::from_config(&config.llm)
        .and_then(Provider::build)
        .wrap_err("failed to set up the language model")?;
    info!(model = llm.model(), "using model");
    let generator: Arc<dyn StructuredGenerator> = Arc::new(LlmGenerator::new(llm));
    let retriever = retrieve::from_config(&config.retrieval)?;
    let budgeter = TextBudgeter::new();

    let breadth = options.breadth.unwrap_or(config.research.breadth);
    let depth = options.depth.unwrap_or(config.research.depth);

    let topic = if options.feedback && std::io::stdin().is_terminal() {
        ask_clarifying_questions(
            generator.as_ref(),
            &options.query,
            config.research.feedback_questions,
        )
        .await?
    } else {
        options.query.clone()
    };

    info!(breadth, depth, "researching");
    let progress = Arc::new(CliProgress::new());
    let runner = ResearchRunner::new(generator.clone(), retriever, budgeter.clone(), &config.research)
        .with_progress(progress.clone());
    let result = runner.research(&topic, breadth, depth).await;
    progress.finish();
    let result = result.wrap_err("research failed")?;

    println!(
        "Collected {} learnings from {} sources.",
        result.learnings.len(),
        result.visited_urls.len()
    );

    let composer = ReportComposer::new(generator, budgeter)
        .with_context_token_limit(config.research.context_token_limit);
    let rendered = match options.mode {
        OutputMode::Report => composer.compose_report(&topic, &result).await,
        OutputMode::Answer => composer.compose_answer(&topic, &result).await,
    };

    let path = options
        .output
        .unwrap_or_else(|| PathBuf::from(options.mode.default_path()));
    std::fs::write(&path, &rendered)
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;

    let run = ResearchRun::new(topic, breadth, depth, result).with_report(rendered);
    let storage = FileStorage::with_config(config.storage.clone());
    if let Err(e) = storage.save_run(&run) {
        warn!(error = %e, "failed to store run");
    }

    println!("Wrote {}", path.display());
    println!("Run ID: {}", run.id);
    Ok(())
}

/// Asks the model's clarifying questions on the terminal and folds the
/// answers into the topic. Falls back to the bare query if the model fails.
async fn ask_clarifying_questions(
    generator: &dyn StructuredGenerator,
    query: &str,
    max_questions: usize,
) -> Result<String> {
    let questions = match clarifying_questions(generator, query, max_questions).await {
        Ok(questions) => questions,
        Err(e) => {
            warn!(error = %e, "could not generate clarifying questions");
            return Ok(query.to_string());
        }
    };
    if questions.is_empty() {
        return Ok(query.to_string());
    }

    println!("To better understand your research needs, please answer these follow-up questions:");
    let stdin = std::io::stdin();
    let mut answers = Vec::with_capacity(questions.len());
    for question in questions {
        print!("\n{question}\nYour answer: ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        answers.push((question, answer.trim().to_string()));
    }
    println!();

    Ok(combine_query(query, &answers))
}

fn cmd_runs() -> Result<()> {
    let config = Config::load()?;
    let storage = FileStorage::with_config(config.storage);
    let runs = storage.list_runs()?;

    if runs.is_empty() {
        println!("No runs found. Use 'deepdive research <query>' to start one.");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {}  {:>3} learnings  {:>3} sources  {}",
            run.id,
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.learnings,
            run.sources,
            run.title
        );
    }
    Ok(())
}

fn cmd_show(id: &str) -> Result<()> {
    let config = Config::load()?;
    let storage = FileStorage::with_config(config.storage);
    let run = storage
        .load_run(id)
        .map_err(|e| eyre!("cannot show run '{id}': {e}"))?;

    match run.report {
        Some(report) => println!("{report}"),
        None => println!(
            "{}\n{}",
            fallback_report(&run.query, &run.learnings),
            sources_section(&run.visited_urls)
        ),
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    print!("{}", Config::default_config_string());
    Ok(())
}
