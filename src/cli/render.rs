use std::path::PathBuf;

use clap::Parser;
use discussion::{
    CourseDirectory, Services, Templates,
    domain::services::{Grants, Permission, StaticUser, User, UserService},
};
use tracing::instrument;

#[derive(Debug, Parser)]
pub struct Render {
    /// The file holding the discussion element, relative to the root
    file: PathBuf,

    /// Which view to render
    #[arg(long, default_value = "student")]
    view: View,

    /// Render as this user (anonymous when omitted)
    #[arg(long)]
    user: Option<String>,

    /// Forum permissions held by the user
    #[arg(long, value_delimiter = ',')]
    grant: Vec<Permission>,

    /// Render without a user service, as hosts without one do
    #[arg(long, conflicts_with = "user")]
    no_user_service: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "html")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum View {
    #[default]
    Student,
    Author,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl Render {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let course = CourseDirectory::open(root)?;
        let block = course.import_file(&self.file)?;

        let template_dir = course
            .config()
            .template_dir
            .as_ref()
            .map(|dir| course.root().join(dir));
        let templates = Templates::new(template_dir);
        let users = StaticUser(self.user.map(User::new));
        let grants = Grants::new(self.grant);

        let user_service: Option<&dyn UserService> = if self.no_user_service {
            None
        } else {
            Some(&users)
        };

        let services = Services {
            users: user_service,
            permissions: &grants,
            templates: &templates,
            courses: &course,
        };

        let fragment = match self.view {
            View::Student => block.student_view(services)?,
            View::Author => block.author_view(services)?,
        };

        match self.output {
            OutputFormat::Html => println!("{}", fragment.content()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fragment)?),
        }

        Ok(())
    }
}
