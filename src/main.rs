//! CLI entry point for kiln

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiln::Site;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "A static site generator for a personal blog", long_about = None)]
struct Cli {
    /// Set the project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site into the output directory
    #[command(alias = "b")]
    Build {
        /// Include pages marked as drafts
        #[arg(long)]
        drafts: bool,

        /// Rebuild when files change
        #[arg(short, long)]
        watch: bool,

        /// Output directory, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Deployment path prefix, overriding the config
        #[arg(long)]
        path_prefix: Option<String>,
    },

    /// Build and serve the site locally
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(long)]
        open: bool,

        /// Disable file watching and live reload
        #[arg(long)]
        r#static: bool,

        /// Include pages marked as drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Remove the output directory
    Clean,

    /// List site content
    List {
        /// Type of content to list (posts, tags, pages)
        #[arg(default_value = "posts")]
        r#type: String,
    },

    /// Create a new draft post
    New {
        /// Title of the new post
        title: String,

        /// Tag for the new post, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "kiln=debug,info" } else { "kiln=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot read current directory")?,
    };

    match cli.command {
        Commands::Build {
            drafts,
            watch,
            output,
            path_prefix,
        } => {
            let mut site = Site::new(&base_dir)?.with_drafts(drafts);
            if let Some(output) = output {
                site = site.with_output_dir(output);
            }
            if let Some(prefix) = path_prefix {
                site = site.with_path_prefix(&prefix);
            }

            let report = site.build()?;
            println!(
                "Wrote {} pages, copied {} files",
                report.pages_written, report.files_copied
            );

            if watch {
                tokio::task::spawn_blocking(move || kiln::commands::build::watch(&site)).await??;
            }
        }

        Commands::Serve {
            port,
            ip,
            open,
            r#static,
            drafts,
        } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            site.build()?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            kiln::server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            site.clean()?;
            println!("Cleaned {:?}", site.output_dir);
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            kiln::commands::list::run(&site, &r#type)?;
        }

        Commands::New { title, tags } => {
            let site = Site::new(&base_dir)?;
            let path = site.new_post(&title, &tags)?;
            println!("Created {}", path.display());
        }

        Commands::Version => {
            println!("kiln version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
