use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use openai_assistants_provider::data_sources::AssistantDataSource;
use openai_assistants_provider::host::{Host, Manifest, PlannedChange, StateFile};
use openai_assistants_provider::plan::Action;
use openai_assistants_provider::provider::Provider;

#[derive(Parser)]
#[command(
    name = "openai-assistants",
    version,
    about = "Manage OpenAI assistants and their files from a manifest"
)]
struct Cli {
    /// Manifest declaring the desired assistants and files
    #[arg(long, global = true, default_value = "assistants.yaml")]
    manifest: PathBuf,
    /// Where managed entities are recorded between runs
    #[arg(long, global = true, default_value = "assistants.state.json")]
    state: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what apply would change
    Plan,
    /// Create, update, replace or delete entities to match the manifest
    Apply,
    /// Delete every managed entity
    Destroy,
    /// Re-read managed entities and update state
    Refresh,
    /// Adopt an existing entity, e.g. `import openai_assistant.main asst_abc`
    Import { address: String, id: String },
    /// Print an existing assistant
    Lookup { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("openai_assistants_provider=info,openai_assistants=info")
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(false),
        )
        .init();

    let cli = Cli::parse();
    let needs_manifest = matches!(cli.command, Command::Plan | Command::Apply);
    let manifest = load_manifest(&cli.manifest, needs_manifest)?;

    let provider = Provider::new(env!("CARGO_PKG_VERSION"));
    let ctx = provider
        .configure(&manifest.provider)
        .context("failed to configure provider")?;

    if let Command::Lookup { id } = &cli.command {
        let view = AssistantDataSource::new(&ctx).lookup(id).await?;
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let host = Host::new(provider.registry(&ctx)?);
    let mut state = StateFile::load(&cli.state)?;

    let outcome = match &cli.command {
        Command::Plan => {
            let changes = host.plan(&manifest, &state).await?;
            print_changes(&changes);
            return Ok(());
        }
        Command::Apply => host.apply(&manifest, &mut state).await.map(|c| print_changes(&c)),
        Command::Destroy => host.destroy(&mut state).await.map(|c| print_changes(&c)),
        Command::Refresh => host.refresh(&mut state).await,
        Command::Import { address, id } => match address.split_once('.') {
            Some((type_name, name)) => host.import(&mut state, type_name, name, id).await,
            None => Err(anyhow::anyhow!(
                "address must look like <type>.<name>, got {address}"
            )),
        },
        Command::Lookup { .. } => Ok(()),
    };

    // Whatever was done before a failure is still recorded.
    state.save(&cli.state)?;
    outcome
}

fn load_manifest(path: &Path, required: bool) -> Result<Manifest> {
    if !required && !path.exists() {
        return Ok(Manifest::default());
    }
    Manifest::load(path)
}

fn print_changes(changes: &[PlannedChange]) {
    let pending: Vec<_> = changes
        .iter()
        .filter(|c| c.change.action != Action::NoOp)
        .collect();
    if pending.is_empty() {
        println!("No changes.");
        return;
    }
    for planned in pending {
        let change = &planned.change;
        println!("{}: {}", planned.address, change.action);
        for attr in &change.changed {
            let marker = if change.replace_triggers.contains(attr) {
                " (forces replacement)"
            } else {
                ""
            };
            println!("    ~ {attr}{marker}");
        }
    }
}
