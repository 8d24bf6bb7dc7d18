use std::path::PathBuf;

use clap::Parser;
use discussion::CourseDirectory;
use serde_json::json;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Scan {
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

impl Scan {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let course = CourseDirectory::open(root)?;
        let entries = course.scan();

        match self.output {
            OutputFormat::Json => {
                let files: Vec<_> = entries
                    .iter()
                    .map(|entry| {
                        let path = entry
                            .path
                            .strip_prefix(course.root())
                            .unwrap_or(&entry.path)
                            .display()
                            .to_string();
                        match &entry.blocks {
                            Ok(blocks) => json!({
                                "path": path,
                                "blocks": blocks.iter().map(super::block_json).collect::<Vec<_>>(),
                            }),
                            Err(e) => json!({ "path": path, "error": e.to_string() }),
                        }
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&files)?);
            }
            OutputFormat::Pretty => {
                let mut total = 0;
                let mut failures = 0;
                for entry in &entries {
                    let path = entry
                        .path
                        .strip_prefix(course.root())
                        .unwrap_or(&entry.path);
                    match &entry.blocks {
                        Ok(blocks) if blocks.is_empty() => {}
                        Ok(blocks) => {
                            println!("{}", path.display().to_string().info());
                            for block in blocks {
                                println!(
                                    "  • {} {} / {} ({})",
                                    block.discussion_id(),
                                    block.discussion_category(),
                                    block.discussion_target(),
                                    block.usage_id().block_id().dim()
                                );
                            }
                            total += blocks.len();
                        }
                        Err(e) => {
                            println!("{}", format!("⚠️  {}: {e}", path.display()).warning());
                            failures += 1;
                        }
                    }
                }

                println!();
                println!(
                    "{}",
                    format!("Imported {total} discussions from {}", course.course().display_name)
                        .success()
                );
                if failures > 0 {
                    println!("{}", format!("{failures} files could not be read").warning());
                }
            }
        }

        Ok(())
    }
}
