//! CLI module for statuswatch
//!
//! Provides the command-line interface for the monitoring daemon and
//! one-off probes.

pub mod probe;
pub mod serve;

use clap::{Parser, Subcommand};

/// statuswatch - Uptime monitoring and component status aggregation
#[derive(Parser, Debug)]
#[command(name = "statuswatch")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    STATUSWATCH_LOG_LEVEL               Log level / filter (default: info)
    STATUSWATCH_LOG_DIR                 Directory for JSON log files (optional)
    STATUSWATCH_DATABASE_URL            Database URL (default: ~/.statuswatch/statuswatch.db)
    STATUSWATCH_CHECKS_FILE             Monitor catalog (YAML)
    STATUSWATCH_TICK_SECS               Main cycle period (default: 60)
    STATUSWATCH_OVERDUE_SWEEP_SECS      Overdue sweep period (default: 300)
    STATUSWATCH_CONCURRENCY_LIMIT       Probes per chunk (default: 10)
    STATUSWATCH_OVERDUE_GRACE_MULTIPLE  Overdue grace in ticks (default: 5)
    STATUSWATCH_LOG_RETENTION_DAYS      Probe log retention, 0 keeps all (default: 30)
    STATUSWATCH_MAINTENANCE_POLICY      respect | major_outage_overrides (default: respect)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitoring daemon
    Serve(serve::ServeArgs),
    /// Probe one endpoint and print the result as JSON
    Probe(probe::ProbeArgs),
}
