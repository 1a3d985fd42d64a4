use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvfs",
    about = "kvfs: a POSIX-like filesystem kept in a key-value log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the durable log (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Act as this uid instead of the effective uid
    #[arg(long, global = true)]
    pub uid: Option<u32>,

    /// Act as this gid instead of the effective gid
    #[arg(long, global = true)]
    pub gid: Option<u32>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the durable log and an empty root if missing
    Init,
    /// Show attributes of a file or directory
    Stat(PathArg),
    /// List a directory
    Ls(LsArgs),
    /// Print file content
    Cat(CatArgs),
    /// Write data to a file
    Write(WriteArgs),
    /// Create an empty file, or bump the times of an existing one
    Touch(ModeArgs),
    /// Create a directory
    Mkdir(ModeArgs),
    /// Remove a file
    Rm(PathArg),
    /// Remove an empty directory
    Rmdir(PathArg),
    /// Move or rename
    Mv(MvArgs),
    /// Change permission bits
    Chmod(ChmodArgs),
    /// Change owner and group
    Chown(ChownArgs),
    /// Resize a file
    Truncate(TruncateArgs),
    /// Set modification and access times
    Utime(UtimeArgs),
    /// Print the tree below a directory
    Tree(TreeArgs),
    /// Check the whole tree for structural problems
    Fsck,
    /// Show usage statistics
    Df,
    /// Rewrite the durable log without dead records
    Compact,
}

#[derive(Args)]
pub struct PathArg {
    pub path: String,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub path: String,
    /// Long listing with mode, owner, size and time
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    /// Bytes to read (default: to end of file)
    #[arg(long)]
    pub size: Option<usize>,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    /// Data to write; read from stdin when omitted
    pub data: Option<String>,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    /// Create the file first if it does not exist
    #[arg(short, long)]
    pub create: bool,
}

#[derive(Args)]
pub struct ModeArgs {
    pub path: String,
    /// Octal permission bits for a new node
    #[arg(short, long, value_parser = parse_octal)]
    pub mode: Option<u32>,
}

#[derive(Args)]
pub struct MvArgs {
    pub from: String,
    pub to: String,
}

#[derive(Args)]
pub struct ChmodArgs {
    /// Octal permission bits, e.g. 640
    #[arg(value_parser = parse_octal)]
    pub mode: u32,
    pub path: String,
}

#[derive(Args)]
pub struct ChownArgs {
    /// `uid`, `uid:gid` or `:gid`
    #[arg(value_parser = parse_owner)]
    pub owner: Owner,
    pub path: String,
}

#[derive(Args)]
pub struct TruncateArgs {
    pub path: String,
    pub size: u64,
}

#[derive(Args)]
pub struct UtimeArgs {
    pub path: String,
    /// Unix seconds or RFC 3339 time (default: now)
    #[arg(long, value_parser = parse_time)]
    pub mtime: Option<i64>,
    #[arg(long, value_parser = parse_time)]
    pub atime: Option<i64>,
}

#[derive(Args)]
pub struct TreeArgs {
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| format!("{s:?} is not an octal mode"))
}

fn parse_owner(s: &str) -> Result<Owner, String> {
    let parse = |part: &str| -> Result<Option<u32>, String> {
        if part.is_empty() {
            Ok(None)
        } else {
            part.parse()
                .map(Some)
                .map_err(|_| format!("{part:?} is not a numeric id"))
        }
    };
    let (uid, gid) = match s.split_once(':') {
        Some((u, g)) => (parse(u)?, parse(g)?),
        None => (parse(s)?, None),
    };
    if uid.is_none() && gid.is_none() {
        return Err("expected uid, uid:gid or :gid".to_string());
    }
    Ok(Owner { uid, gid })
}

fn parse_time(s: &str) -> Result<i64, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.timestamp())
        .map_err(|e| format!("{s:?}: {e}"))
}
