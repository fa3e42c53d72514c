//! Workbench CLI binary.
//!
//! Opens a workbook with its private and global parameters and prints the
//! request tree with the parameters each entry runs with.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use workbench_application::WorkspaceSession;
use workbench_application::use_cases::OpenWorkbook;
use workbench_domain::{Entity, ParameterKind, RequestEntry, ResolvedParameter, Workspace};
use workbench_infrastructure::{FileWorkbookRepository, SettingsRepository};

/// Workbench CLI
#[derive(Parser)]
#[command(name = "workbench")]
#[command(about = "Inspect a Workbench workbook", long_about = None)]
#[command(version)]
struct Cli {
    /// Workbook file
    workbook: PathBuf,

    /// Global parameters file
    #[arg(long, env = "WORKBENCH_GLOBALS")]
    globals: Option<PathBuf>,

    /// Ignore global parameters
    #[arg(long, conflicts_with = "globals")]
    no_globals: bool,

    /// Settings file
    #[arg(long, env = "WORKBENCH_SETTINGS")]
    settings: Option<PathBuf>,
}

fn describe(workspace: &Workspace, kind: ParameterKind, parameter: &ResolvedParameter) -> String {
    match parameter {
        ResolvedParameter::NoneConfigured => "-".to_string(),
        ResolvedParameter::Off => "off".to_string(),
        ResolvedParameter::Selected { id, name } => workspace
            .parameter_name(kind, id)
            .map_or_else(|_| name.clone(), str::to_string),
    }
}

fn print_outline(workspace: &Workspace) -> Result<(), Box<dyn std::error::Error>> {
    for entry in workspace.requests.outline() {
        let indent = "  ".repeat(entry.depth);
        let kind = match entry.entity {
            RequestEntry::Group(group) => format!("group, {:?}", group.execution),
            RequestEntry::Request(request) => format!("{} {}", request.method, request.url),
        };
        println!("{indent}{} ({kind}, runs: {})", entry.entity.title(), entry.entity.runs());

        let effective = workspace.effective_parameters(entry.entity.id())?;
        let parameters: Vec<String> = ParameterKind::ALL
            .into_iter()
            .map(|kind| format!("{kind}: {}", describe(workspace, kind, effective.get(kind))))
            .collect();
        println!("{indent}  {}", parameters.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("WORKBENCH_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings_repository = cli
        .settings
        .map_or_else(SettingsRepository::new, SettingsRepository::with_path);
    let settings = settings_repository.load().await?;
    tracing::debug!(?settings, "Loaded settings");

    let globals = if cli.no_globals {
        None
    } else {
        cli.globals.or_else(FileWorkbookRepository::default_global_path)
    };
    let repository = match globals {
        Some(path) => FileWorkbookRepository::new().with_global_path(path),
        None => FileWorkbookRepository::new(),
    };

    let opened = OpenWorkbook::new(repository).execute(&cli.workbook).await?;
    for warning in &opened.warnings {
        eprintln!("warning: {warning}");
    }

    let session = WorkspaceSession::new(opened.workspace, settings);
    print_outline(session.workspace())?;
    Ok(())
}
