//! strata: inspect and modify a virtual filesystem from the command line.
//!
//! # Usage
//!
//! ```bash
//! # List the merged root of two sources, patch first
//! strata --mount base.zip --mount patch/ ls /
//!
//! # Mount an archive below /data and read a file out of it
//! strata --mount assets.zip=/data cat /data/readme.txt
//!
//! # Copy stdin into the write directory
//! echo hi | strata --write-dir saves put slot1.txt
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, error};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use strata_fs::{FileType, OpenMode, Vfs, VfsConfig};

/// Inspect and modify a virtual filesystem built from directories and archives.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration applied before any --mount
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Source to append to the search path, optionally at a mount point
    #[arg(short, long, value_name = "SRC[=POINT]")]
    mount: Vec<String>,

    /// Directory receiving writes
    #[arg(short, long, value_name = "DIR")]
    write_dir: Option<PathBuf>,

    /// Follow symbolic links
    #[arg(long)]
    permit_symlinks: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        dir: String,
        /// Show type, size and modification time
        #[arg(short, long)]
        long: bool,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Show metadata and the providing source
    Stat { path: String },
    /// Write stdin to a file in the write directory
    Put {
        path: String,
        /// Append instead of truncating
        #[arg(short, long)]
        append: bool,
    },
    /// Create a directory in the write directory
    Mkdir { path: String },
    /// Delete a file or empty directory from the write directory
    Rm { path: String },
    /// Print the search path
    SearchPath,
    /// Print the supported archive types
    Types,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let vfs = Vfs::new();
    if let Err(e) = setup(&vfs, &args) {
        error!("{}", e);
        process::exit(1);
    }

    let result = run(&vfs, args.command);
    if let Err(e) = vfs.deinit() {
        debug!("deinit: {}", e);
    }
    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn setup(vfs: &Vfs, args: &Args) -> strata_fs::Result<()> {
    vfs.init(std::env::args().next().as_deref())?;

    if let Some(path) = &args.config {
        vfs.apply_config(&VfsConfig::load(path)?)?;
    }
    if args.permit_symlinks {
        vfs.permit_symbolic_links(true);
    }
    for entry in &args.mount {
        let (source, point) = entry.split_once('=').unwrap_or((entry.as_str(), "/"));
        vfs.mount(source, point, true)?;
    }
    if let Some(dir) = &args.write_dir {
        vfs.set_write_dir(Some(dir.as_path()))?;
    }
    Ok(())
}

fn run(vfs: &Vfs, command: Command) -> strata_fs::Result<()> {
    let mut stdout = io::stdout().lock();

    match command {
        Command::Ls { dir, long } => {
            for name in vfs.enumerate(&dir)? {
                if !long {
                    writeln!(stdout, "{name}")?;
                    continue;
                }
                let path = format!("{}/{}", dir.trim_end_matches('/'), name);
                let meta = vfs.metadata(&path)?;
                writeln!(
                    stdout,
                    "{} {:>10} {:>20} {}",
                    type_char(meta.file_type),
                    meta.size,
                    format_time(meta.modified),
                    name
                )?;
            }
        }
        Command::Cat { path } => {
            let mut file = vfs.open(&path, OpenMode::Read)?;
            io::copy(&mut file, &mut stdout)?;
            vfs.close(Some(file))?;
        }
        Command::Stat { path } => {
            let meta = vfs.metadata(&path)?;
            writeln!(stdout, "path:      {path}")?;
            writeln!(stdout, "type:      {:?}", meta.file_type)?;
            writeln!(stdout, "size:      {}", meta.size)?;
            writeln!(stdout, "modified:  {}", format_time(meta.modified))?;
            writeln!(stdout, "read-only: {}", meta.read_only)?;
            writeln!(stdout, "symlink:   {}", vfs.is_symbolic_link(&path))?;
            if let Ok(dir) = vfs.real_dir(&path) {
                writeln!(stdout, "source:    {dir}")?;
            }
        }
        Command::Put { path, append } => {
            let mode = if append { OpenMode::Append } else { OpenMode::Write };
            let mut file = vfs.open(&path, mode)?;
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            file.write_all(&data)?;
            vfs.close(Some(file))?;
        }
        Command::Mkdir { path } => vfs.mkdir(&path)?,
        Command::Rm { path } => vfs.delete(&path)?,
        Command::SearchPath => {
            for location in vfs.search_path()? {
                writeln!(stdout, "{} -> {}", location, vfs.mount_point(&location)?)?;
            }
            if let Some(dir) = vfs.write_dir()? {
                writeln!(stdout, "write dir: {}", dir.display())?;
            }
        }
        Command::Types => {
            for info in vfs.supported_archive_types()? {
                writeln!(
                    stdout,
                    "{:<6} {} (writable: {}, symlinks: {})",
                    info.extension, info.description, info.supports_writing, info.supports_symlinks
                )?;
            }
        }
    }
    Ok(())
}

fn type_char(file_type: FileType) -> char {
    match file_type {
        FileType::Directory => 'd',
        FileType::Symlink => 'l',
        FileType::Regular => '-',
        FileType::Other => '?',
    }
}

fn format_time(time: Option<std::time::SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}
