//! Fail-fast developer task runner.
//!
//! Reads `devrun.toml` (or the built-in combadge workflow when absent),
//! resolves prerequisites and runs one external action per task, stopping at
//! the first failure. The process exits with the failing tool's exit code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use devrun::core::types::{FailureKind, TaskStatus};
use devrun::exit_codes;
use devrun::io::config::{DEFAULT_TASK_FILE, LoadedTaskFile, resolve_task_file};
use devrun::io::executor::ProcessExecutor;
use devrun::io::init::{InitOptions, init_task_file};
use devrun::io::report::{RunReport, write_report};
use devrun::list::render_task_list;
use devrun::logging;
use devrun::pipeline::{PipelineEvent, run_pipeline};
use devrun::plan::{build_plan, render_plan};
use devrun::validate::ensure_valid;

#[derive(Parser)]
#[command(name = "devrun", version, about = "Fail-fast developer task runner")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Task file to use (default: ./devrun.toml, else the built-in workflow).
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Do not echo actions before running them.
    #[arg(short, long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run targets and their prerequisites, stopping at the first failure.
    Run {
        /// Tasks to run (default: settings.default_target).
        targets: Vec<String>,
        /// Write a JSON run report (overrides settings.report_path).
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the execution order without running anything.
    Plan {
        targets: Vec<String>,
    },
    /// List tasks with descriptions and prerequisites.
    List,
    /// Check the task file for unknown prerequisites, cycles and other mistakes.
    Validate,
    /// Write the built-in workflow to `devrun.toml`.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("devrun: {:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&cli.global, &cwd, force),
        Command::Run { targets, report } => {
            let loaded = resolve_task_file(cli.global.file.as_deref(), &cwd)?;
            cmd_run(&cli.global, &loaded, &targets, report.as_deref(), &cwd)
        }
        Command::Plan { targets } => {
            let loaded = resolve_task_file(cli.global.file.as_deref(), &cwd)?;
            let plan = build_plan(&loaded.root, &loaded.file, &targets)?;
            print!("{}", render_plan(&plan));
            Ok(exit_codes::OK)
        }
        Command::List => {
            let loaded = resolve_task_file(cli.global.file.as_deref(), &cwd)?;
            print!("{}", render_task_list(&loaded.file));
            Ok(exit_codes::OK)
        }
        Command::Validate => {
            let loaded = resolve_task_file(cli.global.file.as_deref(), &cwd)?;
            ensure_valid(&loaded.file)?;
            let source = match &loaded.path {
                Some(path) => path.display().to_string(),
                None => "built-in workflow".to_string(),
            };
            println!("{source}: ok ({} tasks)", loaded.file.tasks.len());
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(global: &GlobalArgs, cwd: &Path, force: bool) -> Result<i32> {
    let path = match &global.file {
        Some(path) => cwd.join(path),
        None => cwd.join(DEFAULT_TASK_FILE),
    };
    init_task_file(&path, &InitOptions { force })?;
    if !global.silent {
        eprintln!("devrun: wrote {}", path.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_run(
    global: &GlobalArgs,
    loaded: &LoadedTaskFile,
    targets: &[String],
    report_override: Option<&Path>,
    cwd: &Path,
) -> Result<i32> {
    let silent = global.silent;
    let outcome = run_pipeline(
        &loaded.root,
        &loaded.file,
        targets,
        &ProcessExecutor,
        |event| match event {
            PipelineEvent::Started {
                action: Some(action),
                ..
            } if !silent => eprintln!("$ {action}"),
            // Tools that ran speak for themselves; only failures with no
            // tool output of their own get a line from the runner.
            PipelineEvent::Finished { report } if report.status == TaskStatus::Failed => {
                if let Some(
                    kind @ (FailureKind::Spawn { .. }
                    | FailureKind::TimedOut { .. }
                    | FailureKind::Io { .. }),
                ) = &report.failure
                {
                    eprintln!("devrun: {}: {kind}", report.name);
                }
            }
            _ => {}
        },
    )?;

    let report_path = match report_override {
        Some(path) => Some(cwd.join(path)),
        None => loaded
            .file
            .settings
            .report_path
            .as_ref()
            .map(|path| loaded.root.join(path)),
    };
    if let Some(path) = report_path {
        write_report(&path, &RunReport::from_outcome(&outcome))?;
    }

    Ok(outcome.exit_code())
}
