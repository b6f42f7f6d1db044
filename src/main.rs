mod db;
mod error;
mod model;
mod osm;
mod parser;
mod service;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use error::{ErrorKind, PosError};
use model::{Category, PersistedPos, Pos, Region};

#[derive(Parser)]
#[command(name = "pos_import", about = "Import points of sale from OpenStreetMap")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "POS_DB_PATH", default_value = db::DB_PATH)]
    db: PathBuf,
    /// OSM API base URL (the `/node/<id>` path is appended)
    #[arg(long, global = true, env = "OSM_API_BASE_URL", default_value = osm::OSM_API_BASE_URL)]
    osm_base_url: String,
    /// Connect timeout for OSM requests, in seconds
    #[arg(long, global = true, env = "OSM_CONNECT_TIMEOUT_SECS",
          default_value_t = osm::DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout_secs: u64,
    /// Read timeout for OSM requests, in seconds
    #[arg(long, global = true, env = "OSM_READ_TIMEOUT_SECS",
          default_value_t = osm::DEFAULT_READ_TIMEOUT.as_secs())]
    read_timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an OSM node and store it as a new POS
    Import {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        node_id: u64,
        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a saved OSM node document without touching the database
    Convert {
        file: PathBuf,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        node_id: u64,
    },
    /// Show one POS
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// List all POS
    List,
    /// Create a POS, or overwrite one when --id is given
    Upsert {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// CAFE, BAKERY, CAFETERIA or VENDING_MACHINE
        #[arg(long, default_value = "CAFE")]
        category: Category,
        /// ALTSTADT, BERGHEIM or INF
        #[arg(long, default_value = "ALTSTADT")]
        region: Region,
        #[arg(long)]
        street: String,
        #[arg(long)]
        house_number: String,
        #[arg(long)]
        postal_code: Option<u32>,
        #[arg(long)]
        city: String,
    },
    /// Delete every POS
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Distinct exit statuses per error kind so scripts can tell them apart.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PosError>().map(PosError::kind) {
        Some(ErrorKind::NotFound) => 2,
        Some(ErrorKind::MissingFields) => 3,
        Some(ErrorKind::DuplicateName) => 4,
        Some(ErrorKind::InvalidInput) => 5,
        Some(ErrorKind::Storage) | None => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import { node_id, json } => {
            let config = osm::OsmConfig {
                base_url: cli.osm_base_url,
                connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
                read_timeout: Duration::from_secs(cli.read_timeout_secs),
            };
            let client = osm::OsmClient::new(&config).context("Failed to build HTTP client")?;
            let conn = db::connect(&cli.db)?;
            let saved = service::import_from_node(&conn, &client, node_id).await?;
            print_record(&saved, json)?;
        }
        Commands::Convert { file, node_id } => {
            let xml = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let node = parser::xml::parse_node(&xml, node_id)?;
            info!(
                website = node.website().unwrap_or("-"),
                phone = node.phone().unwrap_or("-"),
                opening_hours = node.opening_hours().unwrap_or("-"),
                "Parsed {} tags at ({}, {})",
                node.tags.len(),
                node.latitude,
                node.longitude
            );
            let pos = parser::convert::convert(&node)?;
            println!("{}", serde_json::to_string_pretty(&pos)?);
        }
        Commands::Show { id, json } => {
            let conn = db::connect(&cli.db)?;
            let saved = service::get_by_id(&conn, id)?;
            print_record(&saved, json)?;
        }
        Commands::List => {
            let conn = db::connect(&cli.db)?;
            let all = service::get_all(&conn)?;
            if all.is_empty() {
                println!("No POS stored. Run 'import <node_id>' first.");
                return Ok(());
            }
            print_table(&all);
        }
        Commands::Upsert {
            id,
            name,
            description,
            category,
            region,
            street,
            house_number,
            postal_code,
            city,
        } => {
            let pos = Pos::builder()
                .name(name)
                .description(description)
                .category(category)
                .region(region)
                .street(street)
                .house_number(house_number)
                .postal_code(postal_code)
                .city(city)
                .build()?;
            let conn = db::connect(&cli.db)?;
            let saved = service::upsert(&conn, id, &pos)?;
            print_record(&saved, false)?;
        }
        Commands::Clear => {
            let conn = db::connect(&cli.db)?;
            let removed = service::clear(&conn)?;
            println!("Removed {} POS.", removed);
        }
    }

    Ok(())
}

fn print_record(saved: &PersistedPos, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(saved)?);
        return Ok(());
    }

    let p = &saved.pos;
    let postal = p.postal_code().map(|c| c.to_string()).unwrap_or_default();
    println!("ID:          {}", saved.id);
    println!("Name:        {}", p.name());
    println!("Description: {}", p.description());
    println!("Category:    {}", p.category());
    println!("Region:      {}", p.region());
    println!("Address:     {} {}, {} {}", p.street(), p.house_number(), postal, p.city());
    println!("Created:     {}", saved.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated:     {}", saved.updated_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn print_table(all: &[PersistedPos]) {
    println!(
        "{:>4} | {:<28} | {:<15} | {:<8} | {:<30} | {:>5}",
        "ID", "Name", "Category", "Region", "Address", "PLZ"
    );
    println!("{}", "-".repeat(105));

    for saved in all {
        let p = &saved.pos;
        let address = format!("{} {}", p.street(), p.house_number());
        let postal = p.postal_code().map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>4} | {:<28} | {:<15} | {:<8} | {:<30} | {:>5}",
            saved.id,
            truncate(p.name(), 28),
            p.category(),
            p.region(),
            truncate(&address, 30),
            postal
        );
    }

    println!("\n{} POS", all.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}
