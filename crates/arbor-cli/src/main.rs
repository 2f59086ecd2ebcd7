//! Command-line interface to an arbor repository.

use std::path::Path;
use std::process;

use arbor_core::config::RepoConfig;
use arbor_core::merge::MergeOutcome;
use arbor_core::refs::Head;
use arbor_core::repo::{CheckoutResult, LogEntry};
use arbor_core::staging::AddOutcome;
use arbor_core::status::ChangeKind;
use arbor_core::{ArborError, ArborResult, Repository};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code for a merge that stopped on conflicts.
const EXIT_CONFLICT: i32 = 1;

#[derive(Parser)]
#[command(name = "arbor", about = "arbor: a minimal local version control system", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new arbor repository in the current directory.
    Init {
        /// Name of the first branch.
        #[arg(long)]
        branch: Option<String>,
    },

    /// Stage files for the next commit.
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Stage files for removal, deleting tracked working copies.
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Record the staged changes as a new commit.
    Commit {
        /// Commit message.
        #[arg(long, short)]
        message: String,
    },

    /// Show first-parent history from HEAD.
    Log {
        /// Output format: "human" (default), "json", or "brief".
        #[arg(long, default_value = "human")]
        format: String,

        /// Maximum number of commits to show.
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show every commit ever made.
    GlobalLog {
        /// Output format: "human" (default), "json", or "brief".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Print the ids of all commits with the given message.
    Find { message: String },

    /// Show branches, staged files and working-tree changes.
    Status {
        /// Output format: "human" (default), "json", or "brief".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Inspect one commit.
    Show {
        /// Commit id (supports short prefix), branch name, or HEAD.
        commit: String,

        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// List, create, or delete branches.
    Branch {
        /// Branch to create (or delete with -d). Lists branches when omitted.
        name: Option<String>,

        /// Delete the named branch.
        #[arg(long, short, requires = "name")]
        delete: bool,
    },

    /// Switch branches, detach at a commit, or restore a single file.
    Checkout {
        /// Branch name, or commit id with --detach.
        #[arg(required_unless_present = "file")]
        target: Option<String>,

        /// Check out a commit with HEAD detached.
        #[arg(long)]
        detach: bool,

        /// Restore one file instead of switching.
        #[arg(long, conflicts_with_all = ["target", "detach"])]
        file: Option<String>,

        /// Commit to restore the file from (defaults to HEAD).
        #[arg(long, requires = "file")]
        commit: Option<String>,
    },

    /// Check out a commit and move the current branch to it.
    Reset { commit: String },

    /// Merge a branch into the current HEAD.
    Merge {
        /// Branch to merge.
        #[arg(required_unless_present = "abort")]
        branch: Option<String>,

        /// Abandon a conflicted merge.
        #[arg(long, conflicts_with = "branch")]
        abort: bool,

        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("error: cannot determine current directory: {e}");
        process::exit(ArborError::Io(e).exit_code());
    });
    debug!(cwd = %cwd.display(), "starting");

    let result = match cli.command {
        Commands::Init { branch } => cmd_init(&cwd, branch),
        Commands::Add { paths } => cmd_add(&cwd, &paths),
        Commands::Rm { paths } => cmd_rm(&cwd, &paths),
        Commands::Commit { message } => cmd_commit(&cwd, &message),
        Commands::Log { format, limit } => cmd_log(&cwd, &format, limit),
        Commands::GlobalLog { format } => cmd_global_log(&cwd, &format),
        Commands::Find { message } => cmd_find(&cwd, &message),
        Commands::Status { format } => cmd_status(&cwd, &format),
        Commands::Show { commit, format } => cmd_show(&cwd, &commit, &format),
        Commands::Branch { name, delete } => cmd_branch(&cwd, name, delete),
        Commands::Checkout {
            target,
            detach,
            file,
            commit,
        } => cmd_checkout(&cwd, target, detach, file, commit),
        Commands::Reset { commit } => cmd_reset(&cwd, &commit),
        Commands::Merge {
            branch,
            abort,
            format,
        } => cmd_merge(&cwd, branch, abort, &format),
    };

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(e.exit_code());
        }
    }
}

/// Log to stderr, filtered by `ARBOR_LOG` (default: warn).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ARBOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

type CmdResult = ArborResult<i32>;

fn cmd_init(cwd: &Path, branch: Option<String>) -> CmdResult {
    let mut config = RepoConfig::default();
    if let Some(branch) = branch {
        config.default_branch = branch;
    }
    Repository::init_with_config(cwd, config)?;
    println!("initialized arbor repository in .arbor/");
    Ok(0)
}

fn cmd_add(cwd: &Path, paths: &[String]) -> CmdResult {
    let repo = Repository::open(cwd)?;
    for path in paths {
        match repo.add(path)? {
            AddOutcome::Staged(blob) => println!("staged {path} ({})", blob.short()),
            AddOutcome::Unchanged => println!("unchanged {path}"),
        }
    }
    Ok(0)
}

fn cmd_rm(cwd: &Path, paths: &[String]) -> CmdResult {
    let repo = Repository::open(cwd)?;
    for path in paths {
        let outcome = repo.remove(path)?;
        if outcome.delete_from_worktree {
            println!("removed {path}");
        } else {
            println!("unstaged {path}");
        }
    }
    Ok(0)
}

fn cmd_commit(cwd: &Path, message: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let entry = repo.commit(message)?;
    println!("[{}] {}", entry.id.short(), entry.commit.message);
    Ok(0)
}

fn cmd_log(cwd: &Path, format: &str, limit: Option<usize>) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let mut entries = repo.log()?;
    if let Some(n) = limit {
        entries.truncate(n);
    }
    print_entries(&entries, format)?;
    Ok(0)
}

fn cmd_global_log(cwd: &Path, format: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    print_entries(&repo.global_log()?, format)?;
    Ok(0)
}

fn cmd_find(cwd: &Path, message: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let ids = repo.find(message)?;
    if ids.is_empty() {
        return Err(ArborError::CommitNotFound(message.to_string()));
    }
    for id in ids {
        println!("{id}");
    }
    Ok(0)
}

fn cmd_status(cwd: &Path, format: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let status = repo.status()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        "brief" => println!("{}", status.brief()),
        _ => {
            let current = match &status.head {
                Head::Attached(name) => Some(name.as_str()),
                Head::Detached(id) => {
                    println!("HEAD detached at {}", id.short());
                    None
                }
            };
            if let Some(branch) = &status.merging {
                println!("merging {branch}: fix conflicts, then commit or run \"arbor merge --abort\"");
            }

            println!("=== Branches ===");
            for name in &status.branches {
                let marker = if Some(name.as_str()) == current { "*" } else { "" };
                println!("{marker}{name}");
            }
            println!();

            println!("=== Staged Files ===");
            for path in &status.staged {
                println!("{path}");
            }
            println!();

            println!("=== Removed Files ===");
            for path in &status.removed {
                println!("{path}");
            }
            println!();

            println!("=== Modifications Not Staged For Commit ===");
            for change in &status.unstaged {
                let kind = match change.kind {
                    ChangeKind::Modified => "modified",
                    ChangeKind::Deleted => "deleted",
                };
                println!("{} ({kind})", change.path);
            }
            println!();

            println!("=== Untracked Files ===");
            for path in &status.untracked {
                println!("{path}");
            }
            println!();
        }
    }

    Ok(0)
}

fn cmd_show(cwd: &Path, commit: &str, format: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let entry = repo.show(commit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entry)?),
        _ => {
            print_entry(&entry);
            let tree = repo.objects().get_tree(&entry.commit.tree)?;
            println!("files: {}", tree.len());
            for (path, blob) in &tree.entries {
                println!("  {}  {path}", blob.short());
            }
        }
    }

    Ok(0)
}

fn cmd_branch(cwd: &Path, name: Option<String>, delete: bool) -> CmdResult {
    let repo = Repository::open(cwd)?;

    match name {
        Some(name) if delete => {
            repo.delete_branch(&name)?;
            println!("deleted branch {name}");
        }
        Some(name) => {
            let at = repo.create_branch(&name)?;
            println!("created branch {name} at {}", at.short());
        }
        None => {
            let current = repo.refs().current_branch()?;
            for (name, tip) in repo.branches()? {
                let marker = if current.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {name} {}", tip.short());
            }
        }
    }

    Ok(0)
}

fn cmd_checkout(
    cwd: &Path,
    target: Option<String>,
    detach: bool,
    file: Option<String>,
    commit: Option<String>,
) -> CmdResult {
    let repo = Repository::open(cwd)?;

    if let Some(path) = file {
        repo.checkout_file(commit.as_deref(), &path)?;
        println!("restored {path}");
        return Ok(0);
    }

    // clap guarantees a target when --file is absent.
    let target = target.unwrap_or_default();
    let result = if detach {
        repo.checkout_commit(&target)?
    } else {
        repo.checkout_branch(&target)?
    };
    match repo.refs().head()? {
        Head::Attached(name) => println!("switched to branch {name}"),
        Head::Detached(id) => println!("HEAD is now detached at {}", id.short()),
    }
    print_checkout(&result);
    Ok(0)
}

fn cmd_reset(cwd: &Path, commit: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;
    let result = repo.reset(commit)?;
    if let Some(id) = &result.commit {
        println!("reset to {}", id.short());
    }
    print_checkout(&result);
    Ok(0)
}

fn cmd_merge(cwd: &Path, branch: Option<String>, abort: bool, format: &str) -> CmdResult {
    let repo = Repository::open(cwd)?;

    if abort {
        let result = repo.abort_merge()?;
        println!("merge aborted");
        print_checkout(&result);
        return Ok(0);
    }

    let branch = branch.unwrap_or_default();
    let outcome = repo.merge(&branch)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => match &outcome {
            MergeOutcome::FastForward { commit } => {
                println!("fast-forwarded to {}", commit.short());
            }
            MergeOutcome::Committed { commit } => {
                println!("merged {branch} as {}", commit.short());
            }
            MergeOutcome::Conflicted { conflicts } => {
                println!("encountered a merge conflict in {} file(s):", conflicts.len());
                for path in conflicts {
                    println!("  ! {path}");
                }
                println!("resolve them, add the results, and commit");
            }
        },
    }

    Ok(if outcome.is_conflicted() { EXIT_CONFLICT } else { 0 })
}

fn print_entries(entries: &[LogEntry], format: &str) -> ArborResult<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(entries)?),
        "brief" => {
            for entry in entries {
                println!("{} {}", entry.id.short(), entry.commit.message);
            }
        }
        _ => {
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    println!("commit {}", entry.id);
    if entry.commit.is_merge() {
        let parents: Vec<&str> = entry.commit.parents.iter().map(|p| p.short()).collect();
        println!("Merge: {}", parents.join(" "));
    }
    println!(
        "Date:  {}",
        entry.commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("    {}", entry.commit.message);
}

fn print_checkout(result: &CheckoutResult) {
    for path in &result.written {
        println!("  ~ {path}");
    }
    for path in &result.deleted {
        println!("  - {path}");
    }
}
