//! DS Reports
//!
//! Batch job that turns document-upload audit events into signed per-user reports and
//! mails them to the report owners once a month.
//!
//! # Overview
//!
//! - **Extraction**: page through the log store's upload events for the previous day
//!   (`ds-reports prepare`)
//! - **Archiving**: sign each CSV report and zip it with its signature
//!   (`ds-reports sign-upload`)
//! - **Distribution**: fetch a month of archives and email them in size-bounded parts
//!   (`ds-reports send`)
//!
//! Every command runs under a lock on the shared working directory.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod lock;
pub mod logstore;
pub mod mail;
pub mod period;
pub mod report;
pub mod signer;
pub mod storage;

// Re-export commonly used types
pub use config::Settings;
pub use error::{ReportError, Result};
pub use lock::{DirectoryLock, LockGuard};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DS Reports - document upload audit reports
#[derive(Parser, Debug)]
#[command(name = "ds-reports")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, env = "DS_REPORTS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build yesterday's reports from the log store, then sign and upload them
    Prepare,

    /// Sign and upload the reports left in the working directory
    SignUpload,

    /// Mail a month of archived reports to their owners
    Send {
        /// First report day to send (YYYY-MM-DD); defaults to the start of the month
        #[arg(short = 'f', long)]
        send_from: Option<NaiveDate>,

        /// Last report day to send (YYYY-MM-DD); defaults to the end of the month
        #[arg(short = 't', long)]
        send_to: Option<NaiveDate>,
    },
}
