use std::path::{Path, PathBuf};

use discussion::{ConfigHistory, ProgramsConfig};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Programs {
    #[command(subcommand)]
    command: ProgramsCommand,
}

#[derive(Debug, clap::Parser)]
enum ProgramsCommand {
    /// Show the configuration currently in effect
    Show {
        /// Also print the marketing URL resolved against this base URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// List every recorded version, oldest first
    History,

    /// Record a new version of the configuration
    Set {
        /// Path used to construct URLs to programs marketing pages (e.g. "/foo")
        #[arg(long, default_value = "")]
        marketing_path: String,

        /// Record the new version as disabled
        #[arg(long)]
        disable: bool,

        /// Who is making the change
        #[arg(long)]
        by: Option<String>,
    },
}

impl Programs {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let path = history_path(root);
        let mut history = ConfigHistory::load(&path)?;

        match self.command {
            ProgramsCommand::Show { base_url } => {
                let current = history.current();
                print_version(&current);
                if let Some(base) = base_url {
                    match current.marketing_url(&base)? {
                        Some(url) => println!("  URL:            {url}"),
                        None => println!("  URL:            {}", "(none)".dim()),
                    }
                }
            }
            ProgramsCommand::History => {
                if history.versions().is_empty() {
                    println!("{}", "No versions recorded.".dim());
                }
                for (i, version) in history.versions().iter().enumerate() {
                    println!("{}", format!("Version {}", i + 1).info());
                    print_version(version);
                }
            }
            ProgramsCommand::Set {
                marketing_path,
                disable,
                by,
            } => {
                history.record(!disable, marketing_path, by);
                history.save(&path)?;
                println!("{}", "✅ Recorded new programs configuration.".success());
                print_version(&history.current());
            }
        }

        Ok(())
    }
}

fn history_path(root: &Path) -> PathBuf {
    root.join(".discussion").join("programs.toml")
}

fn print_version(config: &ProgramsConfig) {
    println!("  Enabled:        {}", config.enabled);
    println!("  Marketing path: {}", config.marketing_path);
    println!("  Changed:        {}", config.change_date);
    if let Some(by) = &config.changed_by {
        println!("  Changed by:     {by}");
    }
}
