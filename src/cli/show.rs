use std::path::PathBuf;

use clap::Parser;
use discussion::DiscussionBlock;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Import a discussion element and display its fields")]
pub struct Show {
    /// The file holding the discussion element, relative to the root
    file: PathBuf,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let block = super::load_block(root, &self.file)?;

        match self.output {
            OutputFormat::Pretty => output_pretty(&block),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&super::block_json(&block))?
                );
            }
        }

        Ok(())
    }
}

pub fn output_pretty(block: &DiscussionBlock) {
    println!("# {}", block.display_name());
    println!("{}\n", block.usage_id().to_string().dim());

    println!("{}", "Fields".dim());
    println!("  Discussion ID: {}", block.discussion_id());
    println!("  Category:      {}", block.discussion_category());
    println!("  Subcategory:   {}", block.discussion_target());
    if let Some(sort_key) = block.sort_key() {
        println!("  Sort key:      {sort_key}");
    }

    let explicit: Vec<_> = block.explicit_fields().map(|(name, _)| name).collect();
    if !explicit.is_empty() {
        println!("\n{}", "Set explicitly".dim());
        for name in explicit {
            println!("  • {name}");
        }
    }

    if !block.xml_attributes().is_empty() {
        println!("\n{}", "Preserved attributes".dim());
        for (name, value) in block.xml_attributes() {
            println!("  • {name} = {value}");
        }
    }
}
