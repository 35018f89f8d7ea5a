use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api;
use crate::app::App;
use crate::config::Config;
use crate::db::{BackupManager, DEFAULT_BACKUP_PREFIX};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "doctorados", version)]
#[command(about = "Doctoral program rating dashboard backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep programs in memory instead of MongoDB
        #[arg(long)]
        memory: bool,
    },

    /// Write a JSON backup of the program collection
    Backup {
        #[arg(long, default_value = DEFAULT_BACKUP_PREFIX)]
        prefix: String,
    },

    /// Load a backup file into the program collection
    Restore {
        file: PathBuf,

        /// Replace a non-empty collection
        #[arg(long)]
        overwrite: bool,
    },

    /// List available backups, newest first
    Backups {
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Import programs from a JSON array export
    Import {
        file: PathBuf,

        #[arg(long)]
        overwrite: bool,
    },

    /// Run the enrichment pipeline over every university
    Enrich {
        /// Skip the pre-enrichment backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Print collection statistics
    Stats,

    /// Store the default criteria configuration
    InitCriteria {
        /// Replace an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Give programs without criterios an all-zero score map
    InitCriterios,
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Serve {
        port: None,
        memory: false,
    });

    let backups = BackupManager::new(config.backup_path());

    match command {
        Command::Serve { port, memory } => {
            let app = App::from_config(&config, memory).await?;
            api::serve(app, port.unwrap_or(config.port)).await?;
        }

        Command::Backup { prefix } => {
            let app = App::from_config(&config, false).await?;
            match backups.backup(app.store().as_ref(), &prefix).await? {
                Some(path) => println!("Backup written to {}", path.display()),
                None => println!("Collection is empty; no backup created"),
            }
        }

        Command::Restore { file, overwrite } | Command::Import { file, overwrite } => {
            let app = App::from_config(&config, false).await?;
            let inserted = backups
                .restore(app.store().as_ref(), &file, overwrite)
                .await?;
            println!("{} documents loaded from {}", inserted, file.display());
        }

        Command::Backups { prefix } => {
            let list = backups.list(&prefix).await?;
            if list.is_empty() {
                println!("No backups found in {}", backups.dir().display());
            }
            for (i, backup) in list.iter().enumerate() {
                println!(
                    "{}. {} ({}, {})",
                    i + 1,
                    backup.filename,
                    backup.created.format("%Y-%m-%d %H:%M:%S"),
                    format_size(backup.size)
                );
            }
        }

        Command::Enrich { no_backup } => {
            let app = App::from_config(&config, false).await?;
            if !no_backup {
                if let Some(path) = backups.backup(app.store().as_ref(), "pre-enrich").await? {
                    println!("Backup written to {}", path.display());
                }
            }
            let report = app.enrich().await?;
            println!(
                "{}: {} summaries across {} universities",
                report.message, report.updated, report.universities
            );
        }

        Command::Stats => {
            let app = App::from_config(&config, false).await?;
            let stats = app.collection_stats().await?;
            println!("Collection: {}", app.store().collection_name());
            println!("Total documents: {}", stats.total);
            println!("Universities: {}", stats.universidades);
            println!("Cities: {}", stats.ciudades);
            println!("\nStatus distribution:");
            for (status, count) in &stats.por_status {
                println!("  {}: {}", status, count);
            }
            println!("\nRated: {} / unrated: {}", stats.calificados, stats.sin_calificar);
            let percent = if stats.total == 0 {
                0
            } else {
                stats.enriquecidos * 100 / stats.total
            };
            println!(
                "Enrichment: {}% ({}/{} documents)",
                percent, stats.enriquecidos, stats.total
            );
        }

        Command::InitCriteria { force } => {
            let app = App::from_config(&config, false).await?;
            if app.init_criteria(force).await? {
                println!("Criteria configuration initialised");
            } else {
                println!("Criteria configuration already exists (use --force to replace)");
            }
        }

        Command::InitCriterios => {
            let app = App::from_config(&config, false).await?;
            let updated = app.init_criterios().await?;
            println!("Initialised criterios on {} programs", updated);
        }
    }

    Ok(())
}
