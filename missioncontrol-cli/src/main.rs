mod config;
mod display;
mod engine;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use missioncontrol_core::differ::create_plan;
use missioncontrol_core::resource::{Resource, ResourceId};
use missioncontrol_core::schema::ResourceSchema;
use missioncontrol_provider::{MissionControlProvider, schemas};
use missioncontrol_state::{LocalBackend, StateBackend, StateFile};

use config::{ConfigFile, validate_resources};
use display::{print_diagnostics, print_plan};
use engine::{Outcome, apply_plan, destroy_plan, import_resource, refresh_states};

#[derive(Parser)]
#[command(name = "missioncontrol")]
#[command(about = "Manage JFrog Mission Control resources", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to configuration file
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to configuration file
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to configuration file
        file: PathBuf,
    },
    /// Update the state file from the remote objects
    Refresh {
        /// Path to configuration file
        file: PathBuf,
    },
    /// Bring an existing remote object under management
    Import {
        /// Path to configuration file
        file: PathBuf,
        /// Resource type (e.g., jpd)
        resource_type: String,
        /// Resource name as declared in the configuration
        name: String,
        /// Remote identifier (JPD id, bucket name, or JPD ids joined with ':')
        identifier: String,
    },
    /// Destroy all resources defined in the configuration file
    Destroy {
        /// Path to configuration file
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let state_path = cli.state;

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, &state_path).await,
        Commands::Apply { file } => run_apply(&file, &state_path).await,
        Commands::Refresh { file } => run_refresh(&file, &state_path).await,
        Commands::Import {
            file,
            resource_type,
            name,
            identifier,
        } => {
            let id = ResourceId::new(resource_type, name);
            run_import(&file, &state_path, &id, &identifier).await
        }
        Commands::Destroy { file, auto_approve } => {
            run_destroy(&file, &state_path, auto_approve).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Everything a remote command needs: configured provider, desired resources and state
struct Workspace {
    provider: MissionControlProvider,
    resources: Vec<Resource>,
    schemas: HashMap<String, ResourceSchema>,
    backend: LocalBackend,
    state_file: StateFile,
}

impl Workspace {
    async fn open(file: &Path, state_path: &Path) -> Result<Self, String> {
        let config = ConfigFile::load(file)?;
        let resources = config.desired_resources();
        let schemas = schemas();
        validate_resources(&resources, &schemas)?;

        let (provider, diagnostics) = MissionControlProvider::configure(&config.provider)
            .await
            .map_err(|e| e.to_diagnostic().to_string())?;
        print_diagnostics(&diagnostics);

        let backend = LocalBackend::with_path(state_path.to_path_buf());
        let state_file = backend
            .read_state()
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_default();

        Ok(Self {
            provider,
            resources,
            schemas,
            backend,
            state_file,
        })
    }

    async fn refresh(&mut self) {
        let diagnostics = refresh_states(&self.provider, &mut self.state_file).await;
        print_diagnostics(&diagnostics);
    }

    async fn save(&mut self) -> Result<(), String> {
        self.state_file.increment_serial();
        self.backend
            .write_state(&self.state_file)
            .await
            .map_err(|e| e.to_string())
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    let config = ConfigFile::load(file)?;
    config.provider.validate().map_err(|e| e.to_string())?;
    let resources = config.desired_resources();

    println!("{}", "Validating...".cyan());

    validate_resources(&resources, &schemas())?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );

    for resource in &resources {
        println!("  • {}", resource.id);
    }

    Ok(())
}

async fn run_plan(file: &Path, state_path: &Path) -> Result<(), String> {
    let mut workspace = Workspace::open(file, state_path).await?;
    workspace.refresh().await;

    let plan = create_plan(
        &workspace.resources,
        &workspace.state_file.current_states(),
        &workspace.schemas,
    );
    print_plan(&plan, &workspace.schemas);
    Ok(())
}

async fn run_apply(file: &Path, state_path: &Path) -> Result<(), String> {
    let mut workspace = Workspace::open(file, state_path).await?;
    workspace.refresh().await;

    let plan = create_plan(
        &workspace.resources,
        &workspace.state_file.current_states(),
        &workspace.schemas,
    );

    if plan.is_empty() {
        workspace.save().await?;
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan, &workspace.schemas);
    println!();

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let (outcome, diagnostics) =
        apply_plan(&workspace.provider, &plan, &mut workspace.state_file).await;
    workspace.save().await?;

    println!();
    print_diagnostics(&diagnostics);
    report_outcome("Apply", "changes applied", &outcome)
}

async fn run_refresh(file: &Path, state_path: &Path) -> Result<(), String> {
    let mut workspace = Workspace::open(file, state_path).await?;
    workspace.refresh().await;
    workspace.save().await?;

    println!(
        "{}",
        format!(
            "✓ Refreshed {} resources.",
            workspace.state_file.resources.len()
        )
        .green()
        .bold()
    );
    Ok(())
}

async fn run_import(
    file: &Path,
    state_path: &Path,
    id: &ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let mut workspace = Workspace::open(file, state_path).await?;

    if !workspace.resources.iter().any(|r| &r.id == id) {
        return Err(format!(
            "Resource {} is not declared in {}",
            id,
            file.display()
        ));
    }

    import_resource(&workspace.provider, id, identifier, &mut workspace.state_file).await?;
    workspace.save().await?;

    println!(
        "{}",
        format!("✓ Imported {} ({}).", id, identifier).green().bold()
    );
    Ok(())
}

async fn run_destroy(file: &Path, state_path: &Path, auto_approve: bool) -> Result<(), String> {
    let mut workspace = Workspace::open(file, state_path).await?;

    if workspace.resources.is_empty() {
        println!("{}", "No resources defined in configuration.".yellow());
        return Ok(());
    }

    // Reverse declaration order
    let plan = destroy_plan(
        workspace
            .resources
            .iter()
            .rev()
            .filter_map(|r| {
                workspace
                    .state_file
                    .find_resource(&r.id.resource_type, &r.id.name)
            }),
    );

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    // Display destroy plan
    println!("{}", "Destroy Plan:".red().bold());
    println!();

    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }

    println!();
    println!(
        "Plan: {} to destroy.",
        plan.effects().len().to_string().red()
    );
    println!();

    // Confirmation prompt
    if !auto_approve && !confirm()? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let (outcome, diagnostics) =
        apply_plan(&workspace.provider, &plan, &mut workspace.state_file).await;
    workspace.save().await?;

    println!();
    print_diagnostics(&diagnostics);
    report_outcome("Destroy", "resources destroyed", &outcome)
}

fn confirm() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?"
            .yellow()
            .bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();

    Ok(input.trim() == "yes")
}

fn report_outcome(action: &str, done: &str, outcome: &Outcome) -> Result<(), String> {
    if outcome.failed == 0 {
        println!(
            "{}",
            format!("{} complete! {} {}.", action, outcome.succeeded, done)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "{} failed. {} succeeded, {} failed.",
            action, outcome.succeeded, outcome.failed
        ))
    }
}
