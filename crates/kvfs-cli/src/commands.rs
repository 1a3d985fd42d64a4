use std::io::{Read, Write};

use anyhow::Context;
use colored::Colorize;
use kvfs_core::{Caller, FileAttr, Filesystem, FsConfig, FsError, FsResult, Listing, TimeUpdate};
use kvfs_types::mode::symbolic;
use kvfs_types::FileKind;
use serde::Serialize;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let caller = caller(&cli);
    tracing::debug!(?caller, log = %config.log_path().display(), "opening filesystem");
    let fs = Filesystem::mount(config, caller).context("cannot open filesystem")?;

    let out = Output { format: cli.format };
    let result = dispatch(&fs, &caller, cli.command, &out);
    settle(result, fs.close())
}

/// The command's own error wins over a failure to close afterwards.
fn settle(result: anyhow::Result<()>, closed: FsResult<()>) -> anyhow::Result<()> {
    match (result, closed) {
        (Err(e), Err(close_err)) => {
            tracing::warn!(error = %close_err, "close failed after command error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => closed.context("cannot close filesystem"),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<FsConfig> {
    let mut config = match &cli.config {
        Some(path) => FsConfig::load(path)?,
        None => FsConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn caller(cli: &Cli) -> Caller {
    let current = Caller::current();
    Caller::new(cli.uid.unwrap_or(current.uid), cli.gid.unwrap_or(current.gid))
}

fn dispatch(
    fs: &Filesystem,
    caller: &Caller,
    command: Command,
    out: &Output,
) -> anyhow::Result<()> {
    match command {
        Command::Init => cmd_init(fs, out),
        Command::Stat(args) => cmd_stat(fs, caller, args, out),
        Command::Ls(args) => cmd_ls(fs, caller, args, out),
        Command::Cat(args) => cmd_cat(fs, caller, args, out),
        Command::Write(args) => cmd_write(fs, caller, args, out),
        Command::Touch(args) => cmd_touch(fs, caller, args, out),
        Command::Mkdir(args) => {
            let attr = fs.mkdir(caller, &args.path, args.mode.unwrap_or(0o755))?;
            out.done(&args.path, "created directory", Some(&attr))
        }
        Command::Rm(args) => {
            fs.unlink(caller, &args.path)?;
            out.done(&args.path, "removed", None)
        }
        Command::Rmdir(args) => {
            fs.rmdir(caller, &args.path)?;
            out.done(&args.path, "removed directory", None)
        }
        Command::Mv(args) => {
            fs.rename(caller, &args.from, &args.to)?;
            out.done(&args.to, &format!("moved from {}", args.from), None)
        }
        Command::Chmod(args) => {
            fs.chmod(caller, &args.path, args.mode)?;
            let attr = fs.getattr(caller, &args.path)?;
            out.done(&args.path, &format!("mode {}", symbolic(attr.mode)), Some(&attr))
        }
        Command::Chown(args) => {
            fs.chown(caller, &args.path, args.owner.uid, args.owner.gid)?;
            let attr = fs.getattr(caller, &args.path)?;
            out.done(&args.path, &format!("owner {}:{}", attr.uid, attr.gid), Some(&attr))
        }
        Command::Truncate(args) => {
            fs.truncate(caller, &args.path, args.size)?;
            out.done(&args.path, &format!("size {}", args.size), None)
        }
        Command::Utime(args) => {
            let times = TimeUpdate {
                mtime: args.mtime,
                atime: args.atime,
            };
            fs.utime(caller, &args.path, times)?;
            let attr = fs.getattr(caller, &args.path)?;
            out.done(&args.path, &format!("mtime {}", format_time(attr.mtime)), Some(&attr))
        }
        Command::Tree(args) => cmd_tree(fs, caller, args, out),
        Command::Fsck => cmd_fsck(fs, out),
        Command::Df => cmd_df(fs, out),
        Command::Compact => {
            let reclaimed = fs.compact()?;
            out.emit(&json!({ "reclaimed_bytes": reclaimed }), || {
                println!("{} Compacted log, reclaimed {} bytes", "✓".green().bold(), reclaimed);
            })
        }
    }
}

fn cmd_init(fs: &Filesystem, out: &Output) -> anyhow::Result<()> {
    let report = fs.recovery_report();
    let log = fs.config().log_path();
    out.emit(report, || {
        if report.initialized {
            println!(
                "{} Initialized empty filesystem in {}",
                "✓".green().bold(),
                log.display().to_string().bold()
            );
        } else {
            println!(
                "{} Filesystem in {} already initialized ({} directories, {} files)",
                "✓".green().bold(),
                log.display().to_string().bold(),
                report.directories,
                report.files
            );
        }
    })
}

fn cmd_stat(fs: &Filesystem, caller: &Caller, args: PathArg, out: &Output) -> anyhow::Result<()> {
    let attr = fs.getattr(caller, &args.path)?;
    out.emit(&attr, || {
        println!("  Path: {}", args.path.bold());
        println!("  Type: {}", attr.kind);
        println!("  Mode: {} ({:04o})", symbolic(attr.mode), attr.perm());
        println!(" Owner: {}:{}", attr.uid, attr.gid);
        println!("  Size: {}", attr.size);
        println!("Modify: {}", format_time(attr.mtime));
        println!("Change: {}", format_time(attr.ctime));
        println!("Access: {}", format_time(attr.atime));
    })
}

fn cmd_ls(fs: &Filesystem, caller: &Caller, args: LsArgs, out: &Output) -> anyhow::Result<()> {
    let mut items = fs.list(caller, &args.path)?;
    items.sort_by(|a, b| a.name.cmp(&b.name));
    out.emit(&items, || {
        for item in &items {
            if args.long {
                println!(
                    "{} {:>5} {:>5} {:>8} {} {}",
                    symbolic(item.attr.mode),
                    item.attr.uid,
                    item.attr.gid,
                    item.attr.size,
                    format_time(item.attr.mtime).dimmed(),
                    styled_name(item)
                );
            } else {
                println!("{}", styled_name(item));
            }
        }
    })
}

fn cmd_cat(fs: &Filesystem, caller: &Caller, args: CatArgs, out: &Output) -> anyhow::Result<()> {
    let size = match args.size {
        Some(size) => size,
        None => fs.getattr(caller, &args.path)?.size as usize,
    };
    let data = fs.read(caller, &args.path, size, args.offset)?;
    match out.format {
        OutputFormat::Json => {
            let value = json!({
                "path": args.path,
                "offset": args.offset,
                "len": data.len(),
                "data": String::from_utf8_lossy(&data),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_write(
    fs: &Filesystem,
    caller: &Caller,
    args: WriteArgs,
    out: &Output,
) -> anyhow::Result<()> {
    let data = match args.data {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading data from stdin")?;
            buf
        }
    };
    if args.create && !exists(fs, caller, &args.path)? {
        fs.create(caller, &args.path, 0o644)?;
    }
    let written = fs.write(caller, &args.path, &data, args.offset)?;
    out.emit(&json!({ "path": args.path, "written": written }), || {
        println!(
            "{} Wrote {} bytes to {} at offset {}",
            "✓".green().bold(),
            written,
            args.path.bold(),
            args.offset
        );
    })
}

fn cmd_touch(fs: &Filesystem, caller: &Caller, args: ModeArgs, out: &Output) -> anyhow::Result<()> {
    if exists(fs, caller, &args.path)? {
        fs.utime(caller, &args.path, TimeUpdate::now())?;
        let attr = fs.getattr(caller, &args.path)?;
        out.done(&args.path, "touched", Some(&attr))
    } else {
        let attr = fs.create(caller, &args.path, args.mode.unwrap_or(0o644))?;
        out.done(&args.path, "created", Some(&attr))
    }
}

#[derive(Serialize)]
struct TreeNode {
    name: String,
    #[serde(flatten)]
    attr: FileAttr,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

fn build_tree(
    fs: &Filesystem,
    caller: &Caller,
    path: &str,
    name: String,
    attr: FileAttr,
) -> anyhow::Result<TreeNode> {
    let mut children = Vec::new();
    if attr.kind == FileKind::Directory {
        let mut items = fs.list(caller, path)?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        for item in items {
            let child_path = kvfs_core::path::child(path, &item.name);
            children.push(build_tree(fs, caller, &child_path, item.name, item.attr)?);
        }
    }
    Ok(TreeNode { name, attr, children })
}

fn print_tree(node: &TreeNode, prefix: &str) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        let name = if child.attr.kind == FileKind::Directory {
            child.name.blue().bold().to_string()
        } else {
            format!("{} {}", child.name, format!("({} bytes)", child.attr.size).dimmed())
        };
        println!("{prefix}{branch}{name}");
        let next = format!("{prefix}{}", if last { "    " } else { "│   " });
        print_tree(child, &next);
    }
}

fn cmd_tree(fs: &Filesystem, caller: &Caller, args: TreeArgs, out: &Output) -> anyhow::Result<()> {
    let attr = fs.getattr(caller, &args.path)?;
    let root = build_tree(fs, caller, &args.path, args.path.clone(), attr)?;
    out.emit(&root, || {
        println!("{}", root.name.blue().bold());
        print_tree(&root, "");
    })
}

fn cmd_fsck(fs: &Filesystem, out: &Output) -> anyhow::Result<()> {
    let report = fs.verify()?;
    out.emit(&report, || {
        if report.is_clean() {
            println!(
                "{} No problems ({} directories, {} files)",
                "✓".green().bold(),
                report.directories,
                report.files
            );
        } else {
            for problem in &report.problems {
                println!(
                    "{} {}: {} ({})",
                    "✗".red().bold(),
                    problem.path.bold(),
                    problem.kind.to_string().red(),
                    problem.detail
                );
            }
        }
    })?;
    if !report.is_clean() {
        anyhow::bail!("{} problem(s) found", report.problems.len());
    }
    Ok(())
}

fn cmd_df(fs: &Filesystem, out: &Output) -> anyhow::Result<()> {
    let st = fs.statfs()?;
    out.emit(&st, || {
        println!("  Directories: {}", st.directories);
        println!("        Files: {}", st.files);
        println!("Content bytes: {}", st.content_bytes);
        println!("    Max name : {} bytes", st.max_name_len);
        println!("    Max file : {} bytes", st.max_file_size);
    })
}

fn exists(fs: &Filesystem, caller: &Caller, path: &str) -> anyhow::Result<bool> {
    match fs.getattr(caller, path) {
        Ok(_) => Ok(true),
        Err(FsError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn styled_name(item: &Listing) -> String {
    match item.attr.kind {
        FileKind::Directory => format!("{}/", item.name).blue().bold().to_string(),
        FileKind::Regular => item.name.clone(),
    }
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

struct Output {
    format: OutputFormat,
}

impl Output {
    /// Print `value` as JSON, or run `text` for human output.
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }

    /// Report a completed mutation.
    fn done(&self, path: &str, what: &str, attr: Option<&FileAttr>) -> anyhow::Result<()> {
        let value = json!({ "path": path, "result": what, "attr": attr });
        self.emit(&value, || {
            println!("{} {}: {}", "✓".green().bold(), path.bold(), what);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn command_error_outranks_close_error() {
        let err = settle(
            Err(FsError::NotFound("/a".into()).into()),
            Err(FsError::LockPoisoned),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<FsError>(), Some(FsError::NotFound(_))));

        let err = settle(Ok(()), Err(FsError::LockPoisoned)).unwrap_err();
        assert!(matches!(err.downcast_ref::<FsError>(), Some(FsError::LockPoisoned)));
        assert!(settle(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let config = FsConfig {
            data_dir: dir.path().to_path_buf(),
            ..FsConfig::default()
        };
        let fs = Filesystem::mount(config, Caller::ROOT).unwrap();
        fs.mkdir(&Caller::ROOT, "/a", 0o755).unwrap();
        fs.create(&Caller::ROOT, "/a/f", 0o644).unwrap();
        let attr = fs.getattr(&Caller::ROOT, "/").unwrap();
        let tree = build_tree(&fs, &Caller::ROOT, "/", "/".into(), attr).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].children[0].name, "f");
        fs.close().unwrap();
    }
}
