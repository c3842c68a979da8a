use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use is_terminal::IsTerminal;
use nbgit_core::{CancelFlag, ConfigPaths, Repository};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "NBGIT_LOG";

#[derive(Parser)]
#[command(
    name = "nbgit",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Staging, commit and configuration core of an IDE git integration",
    long_about = "Stages additions, deletions and renames into the git index, \
    writes trees and commits on the current branch, and edits the layered \
    repository / user / system configuration.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(
        name = "add",
        about = "Stage files",
        long_about = "This command stores the content of the given files as blobs and records them in the index. \
        Directories are added recursively."
    )]
    Add {
        #[arg(index = 1, required = true, help = "The files or directories to stage")]
        paths: Vec<String>,
    },
    #[command(
        name = "rm",
        about = "Stop tracking files",
        long_about = "This command removes the given paths (and everything below them) from the index. \
        The working tree is not touched."
    )]
    Rm {
        #[arg(index = 1, required = true, help = "The files or directories to unstage")]
        paths: Vec<String>,
    },
    #[command(
        name = "mv",
        about = "Rename a file and stage the rename",
        long_about = "This command renames a file in the working tree and stages the old path as deleted \
        and the new path as added."
    )]
    Mv {
        #[arg(index = 1)]
        from: String,
        #[arg(index = 2)]
        to: String,
    },
    #[command(
        name = "commit",
        about = "Create a new commit with the specified message",
        long_about = "This command stages the given paths, if any, and creates a new commit of the index \
        on the current branch. Ctrl-C aborts cleanly before the branch is updated."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(index = 1, help = "Files to stage before committing")]
        paths: Vec<String>,
    },
    #[command(
        name = "write-tree",
        about = "Write the tree of the current index",
        long_about = "This command stores the trees built from the index and prints the root tree id."
    )]
    WriteTree,
    #[command(
        name = "cat-file",
        about = "Print the content of an object",
        long_about = "This command prints the content of an object in the repository. \
        It requires the SHA of the object to be specified."
    )]
    CatFile {
        #[arg(short = 'p', long, help = "The object SHA to print")]
        sha: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash an object and optionally write it to the object database",
        long_about = "This command hashes an object file and can write it to the object database. \
        It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(
        name = "config",
        about = "Read and edit configuration properties",
        long_about = "This command reads the merged repository, user and system configuration \
        and edits the repository file, or the user file with --global."
    )]
    Config {
        #[arg(long, help = "Edit the user configuration instead of the repository's")]
        global: bool,
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    #[command(about = "Print the value of a property, e.g. user.name")]
    Get { name: String },
    #[command(about = "Set a property")]
    Set { name: String, value: String },
    #[command(about = "Remove a property")]
    Unset { name: String },
    #[command(about = "List every property of the merged configuration")]
    List,
    #[command(about = "Show the extension toggles, or replace them with key=value pairs")]
    Extensions { pairs: Vec<String> },
}

fn open_repository() -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Ok(Repository::open(&pwd, Box::new(std::io::stdout()))?)
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init { path } => {
            let path = match path {
                Some(path) => PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            let mut repository =
                Repository::new(&path, Box::new(std::io::stdout()), &ConfigPaths::default())?;

            repository.init().await?
        }
        Commands::Add { paths } => open_repository()?.add(paths).await?,
        Commands::Rm { paths } => open_repository()?.rm(paths).await?,
        Commands::Mv { from, to } => open_repository()?.mv(from, to).await?,
        Commands::Commit { message, paths } => {
            let cancel = CancelFlag::new();
            let handle = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });

            open_repository()?.commit(message, paths, &cancel).await?
        }
        Commands::WriteTree => open_repository()?.write_tree().await?,
        Commands::CatFile { sha } => open_repository()?.cat_file(sha)?,
        Commands::HashObject { write, file } => open_repository()?.hash_object(file, *write)?,
        Commands::Config { global, action } => {
            let mut repository = open_repository()?;
            match action {
                ConfigAction::Get { name } => repository.config_get(*global, name)?,
                ConfigAction::Set { name, value } => repository.config_set(*global, name, value)?,
                ConfigAction::Unset { name } => repository.config_unset(*global, name)?,
                ConfigAction::List => repository.config_list(*global)?,
                ConfigAction::Extensions { pairs } => repository.config_extensions(*global, pairs)?,
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()).await {
        let label = match std::io::stderr().is_terminal() {
            true => "error:".red().bold().to_string(),
            false => String::from("error:"),
        };
        eprintln!("{label} {error:#}");
        std::process::exit(1);
    }
}
