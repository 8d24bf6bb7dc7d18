use std::path::{Path, PathBuf};

mod edit;
mod programs;
mod render;
mod scan;
mod show;
mod terminal;

use clap::ArgAction;
use discussion::{CourseDirectory, DiscussionBlock};
use edit::Edit;
use programs::Programs;
use render::Render;
use scan::Scan;
use serde_json::{Map, Value};
use show::Show;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The path to the root of the course export
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Create a default configuration file for the course export
    Init,

    /// Import a discussion element and show its fields
    Show(Show),

    /// Render the student or author view of a discussion
    Render(Render),

    /// Print the structured student view data of a discussion
    Data(Data),

    /// Print a discussion in the inline OLX format
    Export(Export),

    /// Change an author-editable field of a discussion
    Edit(Edit),

    /// Import every discussion in the course export
    Scan(Scan),

    /// Show or change the programs configuration
    Programs(Programs),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Init => Init::run(&root)?,
            Self::Show(command) => command.run(root)?,
            Self::Render(command) => command.run(root)?,
            Self::Data(command) => command.run(root)?,
            Self::Export(command) => command.run(root)?,
            Self::Edit(command) => command.run(root)?,
            Self::Scan(command) => command.run(root)?,
            Self::Programs(command) => command.run(&root)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Init {}

impl Init {
    #[instrument]
    fn run(root: &Path) -> anyhow::Result<()> {
        let config_path = discussion::Config::path(root);
        if config_path.exists() {
            anyhow::bail!(
                "Configuration already exists at {}",
                config_path.display()
            );
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", parent.display()))?;
        }

        discussion::Config::default()
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create config.toml: {e}"))?;

        println!("Initialized discussion configuration in {}", root.display());
        println!("  Created: .discussion/config.toml");

        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Data {
    /// The file holding the discussion element, relative to the root
    file: PathBuf,
}

impl Data {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let block = load_block(root, &self.file)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&block.student_view_data())?
        );
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Export {
    /// The file holding the discussion element, relative to the root
    file: PathBuf,
}

impl Export {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let block = load_block(root, &self.file)?;
        println!("{}", block.to_olx().to_xml()?);
        Ok(())
    }
}

/// Open the course at `root` and import the discussion in `file`.
fn load_block(root: PathBuf, file: &Path) -> anyhow::Result<DiscussionBlock> {
    let course = CourseDirectory::open(root)?;
    Ok(course.import_file(file)?)
}

/// The effective value of every declared field, keyed by name.
fn field_values(block: &DiscussionBlock) -> Map<String, Value> {
    DiscussionBlock::fields()
        .iter()
        .filter_map(|field| {
            block
                .get_field(field.name)
                .map(|value| (field.name.to_string(), value))
        })
        .collect()
}

/// A block as printed in JSON output.
fn block_json(block: &DiscussionBlock) -> Value {
    serde_json::json!({
        "usage_id": block.usage_id().to_string(),
        "fields": field_values(block),
    })
}
