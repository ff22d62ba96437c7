use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use coursedeck_backend::courses::CourseStore;
use coursedeck_backend::db;
use coursedeck_backend::uploads::pipeline::guess_mime;
use coursedeck_backend::uploads::{IncomingFile, UploadPipeline, UploadStorage};
use coursedeck_backend::users::UserStore;
use coursedeck_backend::{Config, DbPool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coursedeck", version, about = "Coursedeck backend operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Promote an account to admin with upload permission
    MakeAdmin {
        email: String,
    },

    /// Mark every account created before email verification as verified
    VerifyUsers,

    /// Run a local file through the upload pipeline
    Ingest {
        path: PathBuf,

        /// Upload field name used as the stored file name prefix
        #[arg(long, default_value = "file")]
        field: String,

        /// MIME type of the file, guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
    },

    /// Print course and content statistics
    Stats,

    /// Print every public course with its content count
    Courses,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursedeck_backend=debug,coursedeck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Migrate => {
            db::run_migrations(&connect(&config).await?).await?;
            tracing::info!("Migrations applied");
        }
        Command::MakeAdmin { email } => {
            let users = UserStore::new(connect(&config).await?, storage(&config)?);
            if users.make_admin_by_email(&email).await? {
                tracing::info!(%email, "Promoted to admin");
            } else {
                tracing::warn!(%email, "No account with that email");
            }
            for user in users.list_all().await? {
                println!(
                    "  - {}: role={}, canUpload={}",
                    user.email,
                    user.role.as_str(),
                    user.can_upload
                );
            }
        }
        Command::VerifyUsers => {
            let users = UserStore::new(connect(&config).await?, storage(&config)?);
            let updated = users.verify_legacy_users().await?;
            tracing::info!(updated, "Marked existing accounts as verified");
        }
        Command::Ingest { path, field, mime } => ingest(&config, path, field, mime).await?,
        Command::Stats => {
            let courses = CourseStore::new(connect(&config).await?, storage(&config)?);
            let stats = courses.stats_unchecked().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Courses => {
            let courses = CourseStore::new(connect(&config).await?, storage(&config)?);
            let listed = courses.list_public().await?;
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<DbPool> {
    db::create_pool(config.database_url()?, config.database_max_connections).await
}

fn storage(config: &Config) -> anyhow::Result<UploadStorage> {
    UploadStorage::new(&config.uploads_dir, &config.uploads_url_prefix)
}

/// Does not touch the database: stores the file under the uploads root and
/// prints the upload response.
async fn ingest(
    config: &Config,
    path: PathBuf,
    field: String,
    mime: Option<String>,
) -> anyhow::Result<()> {
    let original_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("ingest path has no file name")?
        .to_string();
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mimetype = mime.unwrap_or_else(|| guess_mime(&original_name).to_string());

    let pipeline = UploadPipeline::from_config(config)?;
    let file = IncomingFile::new(field, original_name, mimetype, bytes);

    let ingested = tokio::task::spawn_blocking(move || pipeline.ingest(&file)).await??;

    tracing::info!(
        conversion = %ingested.report.conversion,
        watermark = %ingested.report.watermark,
        cleanup = %ingested.report.cleanup,
        "Ingest finished"
    );
    println!("{}", serde_json::to_string_pretty(&ingested.response)?);
    Ok(())
}
