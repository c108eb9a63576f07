//! Vocabulary Publishing CLI
//!
//! Imports project documents, previews and publishes versions, and queries
//! published versions and change history of a file-backed store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vocab_publish::{
    import_document, MemoryStore, ProjectDocument, PublishConfig, PublishRequest, Publisher,
};

#[derive(Parser)]
#[command(name = "vocab-publish")]
#[command(about = "Preview, publish and inspect vocabulary versions")]
struct Cli {
    /// Store file (defaults to store.path from the configuration)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Extra configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a project document (JSON), auditing every change
    Import {
        document: PathBuf,
        /// Acting user recorded on change events
        #[arg(short, long)]
        actor: Option<String>,
    },

    /// Show what publishing now would produce
    Preview {
        project: Uuid,
        /// Print the full preview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish the current state of a project
    Publish {
        project: Uuid,
        /// Version label, e.g. "1.2" or "1.3-pre1"
        #[arg(short = 'V', long)]
        version: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        notes: Option<String>,
        /// The label is a pre-release (-preN)
        #[arg(long)]
        pre_release: bool,
        /// Publisher name (defaults to publishing.default_publisher)
        #[arg(short, long)]
        publisher: Option<String>,
    },

    /// List published versions, highest first
    Versions { project: Uuid },

    /// Print one published version with its snapshot
    Show { project: Uuid, version: String },

    /// Show the change history of a project
    History {
        project: Uuid,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PublishConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path());
    let store = MemoryStore::open(&store_path)
        .with_context(|| format!("opening store {}", store_path.display()))?;
    let publisher = Publisher::new(store, config);

    match cli.command {
        Commands::Import { document, actor } => {
            let doc = ProjectDocument::from_file(&document)?;
            let summary = import_document(publisher.store(), &doc, actor.as_deref())?;
            println!("📥 Imported project {} ({})", doc.project.name, doc.project.id);
            println!("  Created:   {}", summary.created);
            println!("  Updated:   {}", summary.updated);
            println!("  Deleted:   {}", summary.deleted);
            println!("  Unchanged: {}", summary.unchanged);
        }

        Commands::Preview { project, json } => {
            let preview = publisher.preview(project)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
                return Ok(());
            }

            let content = preview.content_summary;
            println!("🔍 Preview of project {}", project);
            println!(
                "  Content: {} schemes, {} concepts, {} properties, {} classes",
                content.schemes, content.concepts, content.properties, content.classes
            );
            println!(
                "  Latest: {} (pre-release: {})",
                preview.latest_version.as_deref().unwrap_or("none"),
                preview.latest_pre_release_version.as_deref().unwrap_or("none")
            );
            println!(
                "  Suggested: {} / {}",
                preview.suggested_version, preview.suggested_pre_release_version
            );
            println!();

            if preview.validation.valid {
                println!("✅ Snapshot is publishable");
            } else {
                println!("❌ {} validation error(s):", preview.validation.errors.len());
                for error in &preview.validation.errors {
                    println!("  [{}] {}", error.code, error.message);
                }
            }
            println!();

            let summary = preview.diff_summary;
            println!(
                "📊 Changes: +{} ~{} -{}",
                summary.added, summary.modified, summary.removed
            );
            for entity in &preview.diff.added {
                println!("  + {} {}", entity.kind.as_str(), entity.label);
            }
            for modified in &preview.diff.modified {
                println!("  ~ {} {}", modified.entity.kind.as_str(), modified.entity.label);
                for change in &modified.changes {
                    println!("      {}: {}", change.field, change.render_inline());
                }
            }
            for entity in &preview.diff.removed {
                println!("  - {} {}", entity.kind.as_str(), entity.label);
            }
        }

        Commands::Publish {
            project,
            version,
            title,
            notes,
            pre_release,
            publisher: publisher_name,
        } => {
            let mut request = PublishRequest::new(version, title).pre_release(pre_release);
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            let published = publisher.publish(project, &request, publisher_name.as_deref())?;
            println!("✅ Published {} \"{}\"", published.version, published.title);
            println!("  Publisher: {}", published.publisher);
            println!("  Checksum:  {}", published.checksum);
            if !published.latest {
                println!("  ⚠️  A higher version is already published");
            }
        }

        Commands::Versions { project } => {
            let versions = publisher.list_versions(project)?;
            if versions.is_empty() {
                println!("No versions published yet");
            }
            for v in versions {
                let marker = if v.latest { " (latest)" } else { "" };
                println!(
                    "  {}{}  {}  {}  {}",
                    v.version,
                    marker,
                    v.published_at.format("%Y-%m-%d %H:%M"),
                    v.publisher,
                    v.title
                );
            }
        }

        Commands::Show { project, version } => {
            let published = publisher.get_version(project, &version)?;
            println!("{}", serde_json::to_string_pretty(&published)?);
        }

        Commands::History {
            project,
            limit,
            offset,
        } => {
            let events = publisher.history(project, limit, offset)?;
            for event in events {
                let fields = if event.changed_fields.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", event.changed_fields.join(", "))
                };
                println!(
                    "  {}  {:<6}  {} {}  by {}{}",
                    event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                    event.action.as_str(),
                    event.entity_type,
                    event.entity_id,
                    event.actor.as_deref().unwrap_or("unknown"),
                    fields
                );
            }
        }
    }

    Ok(())
}
