use std::path::PathBuf;

use clap::Parser;
use discussion::{CourseDirectory, DiscussionBlock};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Edit {
    /// The file holding the discussion element, relative to the root
    file: PathBuf,

    /// The field to change
    ///
    /// One of display_name, discussion_category, discussion_target.
    field: Option<String>,

    /// The new value
    value: Option<String>,

    /// Write the result back to the file in the inline format instead of
    /// printing it
    #[arg(long)]
    write: bool,
}

impl Edit {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (Some(field), Some(value)) = (self.field, self.value) else {
            list_editable_fields();
            return Ok(());
        };

        let course = CourseDirectory::open(root)?;
        let mut block = course.import_file(&self.file)?;
        block.edit_field(&field, &value)?;
        tracing::info!("Set {field} on {}", block.usage_id());

        let overrides = course.legacy_overrides(&block, &field);
        if !overrides.is_empty() {
            let sources = overrides
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if self.write {
                anyhow::bail!(
                    "{field} of {} is set by {sources}; edit or remove it there, otherwise the \
                     next import replaces the inline value",
                    block.usage_id()
                );
            }
            tracing::warn!("{field} is also set by {sources}, which wins on import");
        }

        let xml = block.to_olx().to_xml()?;
        if self.write {
            let path = course.root().join(&self.file);
            std::fs::write(&path, format!("{xml}\n"))?;
            println!(
                "{}",
                format!("✅ Updated {field} in {}", path.display()).success()
            );
        } else {
            println!("{xml}");
        }

        Ok(())
    }
}

fn list_editable_fields() {
    println!("{}", "Editable fields".dim());
    for field in DiscussionBlock::editable_fields() {
        println!(
            "  {:<22}{}",
            field.name,
            field.display_name.unwrap_or_default()
        );
        if let Some(help) = field.help {
            println!("  {:<22}{}", "", help.dim());
        }
    }
}
