mod allocation_cmds;
mod catalog_cmds;
mod config;
mod propose_cmd;
mod serve_cmd;
mod ticket_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use hallpass_core::proposer::{CommandGenerator, TextGenerator};
use hallpass_db::pool;

use config::HallpassConfig;

#[derive(Parser)]
#[command(name = "hallpass", about = "Examination hall tickets and seat allocation")]
struct Cli {
    /// Database URL (overrides HALLPASS_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a hallpass config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/hallpass")]
        db_url: String,
        /// Command that turns a prompt on stdin into a seating proposal on stdout
        #[arg(long)]
        proposer: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the REST API
    Serve {
        /// Address to bind (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Student records
    Student {
        #[command(subcommand)]
        command: StudentCommands,
    },
    /// Subjects
    Subject {
        #[command(subcommand)]
        command: SubjectCommands,
    },
    /// Examination halls
    Hall {
        #[command(subcommand)]
        command: HallCommands,
    },
    /// Examinations
    Exam {
        #[command(subcommand)]
        command: ExamCommands,
    },
    /// Sittings: one subject of one examination on a date
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Register students for a schedule (all or none)
    Register {
        schedule_id: i32,
        /// Student IDs to register
        #[arg(required = true)]
        student_ids: Vec<String>,
    },
    /// List registered students without a seat
    Unallocated { schedule_id: i32 },
    /// List taken seats in one hall for one schedule
    Occupied { schedule_id: i32, hall_id: i32 },
    /// Ask the configured proposer for a seating plan (nothing is written)
    Propose {
        schedule_id: i32,
        /// Free-text instructions, e.g. "fill Hall 1 first, alternate rows"
        instructions: String,
        /// Write the proposed plan to this file for review and `execute`
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Dry-run a plan file against the current state
    Validate {
        schedule_id: i32,
        /// JSON file: an array of items or an object with a "plan" array
        plan_file: PathBuf,
    },
    /// Apply a plan file atomically
    Execute {
        schedule_id: i32,
        /// JSON file: an array of items or an object with a "plan" array
        plan_file: PathBuf,
    },
    /// Move one allocation to a hall and seat
    Reassign {
        allocation_id: i32,
        hall_id: i32,
        seat: String,
    },
    /// Remove a student from a schedule
    Remove { allocation_id: i32 },
    /// Show a student's hall ticket
    Ticket {
        student_id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve decoded QR text to a hall ticket
    Scan {
        decoded_text: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum StudentCommands {
    /// Add a student
    Add {
        student_id: String,
        #[arg(long)]
        roll_no: String,
        #[arg(long)]
        name: String,
        #[arg(long = "class")]
        student_class: String,
    },
    /// List all students
    List,
}

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Add a subject
    Add { code: String, name: String },
    /// List all subjects
    List,
}

#[derive(Subcommand)]
pub enum HallCommands {
    /// Add an examination hall
    Add {
        name: String,
        #[arg(long)]
        capacity: i32,
    },
    /// List all halls
    List,
}

#[derive(Subcommand)]
pub enum ExamCommands {
    /// Add an examination
    Add {
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// List all examinations
    List,
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Schedule a subject within an examination
    Add {
        #[arg(long)]
        exam: i32,
        #[arg(long)]
        subject: i32,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM or HH:MM:SS)
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,
    },
    /// List all schedules
    List,
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM or HH:MM:SS, got {raw:?}"))
}

/// Execute the `hallpass init` command: write config file.
fn cmd_init(db_url: &str, proposer: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut words = proposer.unwrap_or_default().split_whitespace().map(str::to_owned);
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
            max_connections: None,
        },
        proposer: config::ProposerSection {
            command: words.next(),
            args: words.collect(),
            timeout_secs: None,
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    match &cfg.proposer.command {
        Some(command) => println!("  proposer.command = {command}"),
        None => println!("  proposer.command is unset; `propose` needs it"),
    }
    println!();
    println!("Next: run `hallpass db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `hallpass db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = HallpassConfig::resolve(cli_db_url)?;

    println!("Initializing hallpass database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database {}.", resolved.db_config.database_name().unwrap_or("?"));
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("hallpass db-init complete.");
    Ok(())
}

fn build_generator(resolved: &HallpassConfig) -> Option<Arc<dyn TextGenerator>> {
    resolved.proposer.as_ref().map(|p| {
        Arc::new(CommandGenerator::new(p.program.clone(), p.args.clone())) as Arc<dyn TextGenerator>
    })
}

async fn cmd_serve(
    cli_db_url: Option<&str>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let resolved = HallpassConfig::resolve(cli_db_url)?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    if resolved.proposer.is_none() {
        tracing::warn!("no proposer command configured; plan generation is disabled");
    }
    let state = serve_cmd::AppState {
        pool: db_pool.clone(),
        generator: build_generator(&resolved),
        proposal_timeout: resolved.proposal_timeout,
    };

    let cancel = CancellationToken::new();
    serve_cmd::cancel_on_ctrl_c(cancel.clone());

    let bind = bind.unwrap_or(resolved.bind);
    let port = port.unwrap_or(resolved.port);
    let result = serve_cmd::run_serve(state, &bind, port, cancel).await;
    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cli_db_url = cli.database_url.as_deref();

    match cli.command {
        Commands::Init {
            db_url,
            proposer,
            force,
        } => cmd_init(&db_url, proposer.as_deref(), force),
        Commands::DbInit => cmd_db_init(cli_db_url).await,
        Commands::Serve { bind, port } => cmd_serve(cli_db_url, bind, port).await,
        Commands::Propose {
            schedule_id,
            instructions,
            output,
        } => {
            let resolved = HallpassConfig::resolve(cli_db_url)?;
            let Some(generator) = build_generator(&resolved) else {
                anyhow::bail!(
                    "no proposer command configured; set {} or [proposer] command in {}",
                    config::PROPOSER_COMMAND_ENV,
                    config::config_path().display()
                );
            };
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = propose_cmd::run_propose(
                &db_pool,
                generator.as_ref(),
                schedule_id,
                &instructions,
                resolved.proposal_timeout,
                output.as_deref(),
            )
            .await;
            db_pool.close().await;
            result
        }
        command => {
            let resolved = HallpassConfig::resolve(cli_db_url)?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = run_db_command(command, &db_pool).await;
            db_pool.close().await;
            result
        }
    }
}

/// Commands that only need a pool.
async fn run_db_command(command: Commands, pool: &sqlx::PgPool) -> anyhow::Result<()> {
    match command {
        Commands::Student { command } => catalog_cmds::run_student_command(command, pool).await,
        Commands::Subject { command } => catalog_cmds::run_subject_command(command, pool).await,
        Commands::Hall { command } => catalog_cmds::run_hall_command(command, pool).await,
        Commands::Exam { command } => catalog_cmds::run_exam_command(command, pool).await,
        Commands::Schedule { command } => catalog_cmds::run_schedule_command(command, pool).await,
        Commands::Register {
            schedule_id,
            student_ids,
        } => allocation_cmds::cmd_register(pool, schedule_id, &student_ids).await,
        Commands::Unallocated { schedule_id } => {
            allocation_cmds::cmd_unallocated(pool, schedule_id).await
        }
        Commands::Occupied {
            schedule_id,
            hall_id,
        } => allocation_cmds::cmd_occupied(pool, schedule_id, hall_id).await,
        Commands::Validate {
            schedule_id,
            plan_file,
        } => allocation_cmds::cmd_validate(pool, schedule_id, &plan_file).await,
        Commands::Execute {
            schedule_id,
            plan_file,
        } => allocation_cmds::cmd_execute(pool, schedule_id, &plan_file).await,
        Commands::Reassign {
            allocation_id,
            hall_id,
            seat,
        } => allocation_cmds::cmd_reassign(pool, allocation_id, hall_id, &seat).await,
        Commands::Remove { allocation_id } => {
            allocation_cmds::cmd_remove(pool, allocation_id).await
        }
        Commands::Ticket { student_id, json } => {
            ticket_cmd::cmd_ticket(pool, &student_id, json).await
        }
        Commands::Scan { decoded_text, json } => {
            ticket_cmd::cmd_scan(pool, &decoded_text, json).await
        }
        Commands::Init { .. } | Commands::DbInit | Commands::Serve { .. } | Commands::Propose { .. } => {
            anyhow::bail!("command manages its own connection")
        }
    }
}
