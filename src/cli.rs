use crate::notify::NotifyLevel;
use crate::utils::{parse_date, parse_datetime, parse_range};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::ops::RangeInclusive;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rustmtar")]
#[command(about = "Catalogued tar archives on non-rewinding tape drives")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tape device path (non-rewinding, e.g. /dev/nst0)
    #[arg(short = 'f', long = "file", global = true, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Catalog database file, created if not found
    #[arg(short, long, global = true, value_name = "DB")]
    pub db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Pushover notifications to send
    #[arg(long, global = true, value_enum)]
    pub notify: Option<NotifyLevel>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Specify configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the catalog
    Find {
        #[command(subcommand)]
        target: FindTarget,
    },

    /// List catalog records
    List {
        #[command(subcommand)]
        target: ListTarget,
    },

    /// Create catalog records by hand
    New {
        #[command(subcommand)]
        record: NewRecord,
    },

    /// Add files to a tar, queued up for writing
    Queue {
        /// Tape rowid, serial number, or barcode
        #[arg(long)]
        tape: String,

        /// Tar number on the cartridge
        #[arg(long)]
        tar: u32,

        /// Directory truncated off each path to form the path stored in the tar
        #[arg(long, value_name = "DIR")]
        basedir: PathBuf,

        /// Re-hash and update files that are already queued
        #[arg(long)]
        force_update: bool,

        /// Files or directories to add
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write queued tars to the tape drive
    Write {
        /// Tape rowid, serial number, or barcode
        #[arg(long)]
        tape: String,

        /// Tar number, or an ascending range such as 2-5
        #[arg(long, value_parser = parse_range)]
        tar: RangeInclusive<u32>,
    },

    /// Report the drive position
    Status,

    /// Rewind and unload the cartridge
    Eject,
}

#[derive(Subcommand, Debug)]
pub enum FindTarget {
    /// Find tapes by barcode (glob, case-insensitive)
    TapeBarcode { pattern: String },

    /// Find tapes by serial number (glob, case-insensitive)
    TapeSn { pattern: String },

    /// Find queued files by file name (glob, case-insensitive)
    TarfileName { pattern: String },
}

#[derive(Subcommand, Debug)]
pub enum ListTarget {
    /// List all tapes
    Tapes,

    /// List tars
    Tars {
        /// Tape rowid, serial number, or barcode to limit the listing by
        #[arg(long)]
        tape: Option<String>,
    },

    /// List queued files
    Files {
        /// Tape rowid, serial number, or barcode to limit the listing by
        #[arg(long)]
        tape: Option<String>,

        /// Tar rowid to limit the listing by
        #[arg(long)]
        tar: Option<i64>,

        /// Tar number to limit the listing by
        #[arg(long)]
        tarnum: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum NewRecord {
    /// Create a tape record
    Tape {
        #[arg(long)]
        manufacturer: String,

        /// Model number of the cartridge
        #[arg(long)]
        model: String,

        /// Generation, e.g. LTO8RW or LTO8WORM
        #[arg(long = "gen")]
        generation: String,

        /// Serial number printed on the cartridge
        #[arg(long)]
        sn: String,

        /// LTO barcode label
        #[arg(long)]
        barcode: Option<String>,

        /// Purchase date (YYYY-MM-DD or "now")
        #[arg(long, value_parser = parse_date)]
        ptime: Option<NaiveDate>,
    },

    /// Create a tar record
    Tar {
        /// Tape rowid, serial number, or barcode
        #[arg(long)]
        tape: String,

        /// File number on the cartridge
        #[arg(long)]
        num: u32,

        /// Start time of write (YYYY-MM-DD HH:MM:SS or "now")
        #[arg(long, value_parser = parse_datetime)]
        stime: Option<DateTime<Utc>>,

        /// End time of write (YYYY-MM-DD HH:MM:SS or "now")
        #[arg(long, value_parser = parse_datetime)]
        etime: Option<DateTime<Utc>>,

        #[arg(long, default_value_t = 0)]
        access_cnt: i64,

        /// Extra options passed to tar, e.g. '-z'
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,

        /// Value of `uname -a`; taken from this host when omitted
        #[arg(long)]
        uname: Option<String>,
    },

    /// Create a file record within a tar
    File {
        /// Tape rowid, serial number, or barcode
        #[arg(long)]
        tape: String,

        /// Tar number on the cartridge
        #[arg(long)]
        tar: u32,

        /// Absolute path of the file on this host
        #[arg(long)]
        fullpath: PathBuf,

        /// Path as stored in the tar
        #[arg(long)]
        relpath: PathBuf,

        /// File name without directories; derived from fullpath when omitted
        #[arg(long)]
        fname: Option<String>,

        /// Size in bytes
        #[arg(long)]
        sz: u64,

        #[arg(long)]
        sha256: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_write_range() {
        let cli = Cli::try_parse_from([
            "rustmtar", "-d", "catalog.db", "-f", "/dev/nst1", "write", "--tape", "ABC123L8",
            "--tar", "2-4",
        ])
        .unwrap();

        assert_eq!(cli.device.as_deref(), Some("/dev/nst1"));
        assert_eq!(cli.db, Some(PathBuf::from("catalog.db")));
        match cli.command {
            Commands::Write { tape, tar } => {
                assert_eq!(tape, "ABC123L8");
                assert_eq!(tar, 2..=4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_descending_range_rejected() {
        assert!(Cli::try_parse_from(["rustmtar", "write", "--tape", "1", "--tar", "4-2"]).is_err());
    }

    #[test]
    fn test_parse_queue_and_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rustmtar", "queue", "--tape", "SN1", "--tar", "0", "--basedir", "/data",
            "--force-update", "/data/a", "/data/b", "--notify", "limited", "-j",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.notify, Some(NotifyLevel::Limited));
        match cli.command {
            Commands::Queue {
                force_update,
                paths,
                ..
            } => {
                assert!(force_update);
                assert_eq!(paths.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_new_tar_with_hyphen_options() {
        let cli = Cli::try_parse_from([
            "rustmtar", "new", "tar", "--tape", "SN1", "--num", "3", "--stime", "now",
            "--options", "-z",
        ])
        .unwrap();

        match cli.command {
            Commands::New {
                record: NewRecord::Tar { num, stime, options, access_cnt, .. },
            } => {
                assert_eq!(num, 3);
                assert!(stime.is_some());
                assert_eq!(options.as_deref(), Some("-z"));
                assert_eq!(access_cnt, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_find_and_list() {
        let cli = Cli::try_parse_from(["rustmtar", "find", "tarfile-name", "*.JPG"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Find { target: FindTarget::TarfileName { ref pattern } } if pattern == "*.JPG"
        ));

        let cli = Cli::try_parse_from(["rustmtar", "list", "files", "--tarnum", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List { target: ListTarget::Files { tarnum: Some(7), tape: None, tar: None } }
        ));
    }
}
