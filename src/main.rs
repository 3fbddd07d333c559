// src/main.rs

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rpmrepo::checksum::ChecksumType;
use rpmrepo::config::{DEFAULT_CHANGELOG_LIMIT, RepoConfig};
use rpmrepo::packages::Package;
use rpmrepo::packages::rpm::read_package;
use rpmrepo::repository::RepoBuilder;
use rpmrepo::repository::dump;
use rpmrepo::repository::parsers::{
    WarningCallback, WarningKind, parse_filelists, parse_other, parse_primary,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rpmrepo")]
#[command(author, version, about = "Generate and read rpm-md repository metadata", long_about = None)]
struct Cli {
    /// More output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct CreateArgs {
    /// Directory containing the packages
    directory: PathBuf,

    /// Where to put repodata/ (default: the package directory)
    #[arg(short, long)]
    outputdir: Option<PathBuf>,

    /// Base URL of package locations (xml:base)
    #[arg(short = 'u', long)]
    baseurl: Option<String>,

    /// File name masks of packages to skip
    #[arg(short = 'x', long = "excludes")]
    excludes: Vec<String>,

    /// Only include the packages listed in this file
    #[arg(short = 'i', long)]
    pkglist: Option<PathBuf>,

    /// Only include this package (repeatable)
    #[arg(short = 'n', long = "includepkg")]
    includepkg: Vec<String>,

    /// Number of changelog entries per package (0-100)
    #[arg(long, default_value_t = DEFAULT_CHANGELOG_LIMIT as i64, allow_negative_numbers = true)]
    changelog_limit: i64,

    /// Number of worker threads (1-100)
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    workers: i64,

    /// Checksum type: sha224, sha256, sha384 or sha512
    #[arg(short = 's', long, default_value = "sha256")]
    checksum: String,

    /// Metadata compression: gz, bz2, xz or zst
    #[arg(long, default_value = "gz")]
    compress_type: String,

    /// Do not prefix metadata file names with their checksum
    #[arg(long)]
    simple_md_filenames: bool,

    /// Reuse metadata of unchanged packages
    #[arg(long)]
    update: bool,

    /// Also reuse metadata from these repositories
    #[arg(long = "update-md-path")]
    update_md_paths: Vec<PathBuf>,

    /// Reuse without comparing file mtime and size
    #[arg(long)]
    skip_stat: bool,

    /// Ignore symlinked packages
    #[arg(long)]
    skip_symlinks: bool,

    /// Revision of repomd.xml (default: current time)
    #[arg(long)]
    revision: Option<String>,

    /// Distro tag, `cpeid,name` or `name` (repeatable)
    #[arg(long = "distro")]
    distro: Vec<String>,

    /// Content tag (repeatable)
    #[arg(long = "content")]
    content: Vec<String>,

    /// Repo tag (repeatable)
    #[arg(long = "repo")]
    repo: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create repodata for a directory of packages
    Create(CreateArgs),
    /// Print the primary, filelists and other XML of packages
    Dump {
        /// Package files
        #[arg(required = true)]
        packages: Vec<PathBuf>,
        /// Checksum type of the package ids
        #[arg(short = 's', long, default_value = "sha256")]
        checksum: String,
        /// Number of changelog entries (0-100)
        #[arg(long, default_value_t = DEFAULT_CHANGELOG_LIMIT)]
        changelog_limit: usize,
    },
    /// Print the extracted metadata of a package as JSON
    Info {
        /// Package file
        package: PathBuf,
    },
    /// Parse a (possibly compressed) metadata file
    Parse {
        /// primary, filelists or other XML
        file: PathBuf,
        /// Document type (default: guessed from the file name)
        #[arg(short, long, value_enum)]
        kind: Option<MetadataKind>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetadataKind {
    Primary,
    Filelists,
    Other,
}

impl MetadataKind {
    fn guess(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.contains("primary") {
            Some(Self::Primary)
        } else if name.contains("filelists") {
            Some(Self::Filelists)
        } else if name.contains("other") {
            Some(Self::Other)
        } else {
            None
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn location_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_create(args: CreateArgs) -> Result<()> {
    let mut builder = RepoConfig::builder()
        .excludes(args.excludes)
        .include_pkgs(args.includepkg)
        .changelog_limit(args.changelog_limit)
        .workers(args.workers)
        .checksum_type(args.checksum)
        .compression(args.compress_type)
        .simple_md_filenames(args.simple_md_filenames)
        .update(args.update)
        .update_md_paths(args.update_md_paths)
        .skip_stat(args.skip_stat)
        .skip_symlinks(args.skip_symlinks)
        .distro_tags(args.distro)
        .content_tags(args.content)
        .repo_tags(args.repo);
    if let Some(outputdir) = args.outputdir {
        builder = builder.outputdir(outputdir);
    }
    if let Some(baseurl) = args.baseurl {
        builder = builder.location_base(baseurl);
    }
    if let Some(pkglist) = args.pkglist {
        builder = builder.pkglist(pkglist);
    }
    if let Some(revision) = args.revision {
        builder = builder.revision(revision);
    }
    let config = builder.build().context("Invalid options")?;

    info!("Creating repository metadata for {}", args.directory.display());
    let summary = RepoBuilder::new(&config)
        .run(&args.directory)
        .with_context(|| format!("Failed to create metadata for {}", args.directory.display()))?;

    println!(
        "{} packages ({} reused, {} failed) in {}",
        summary.packages,
        summary.reused,
        summary.failed,
        summary.repodata.display()
    );
    Ok(())
}

fn cmd_dump(packages: &[PathBuf], checksum: &str, changelog_limit: usize) -> Result<()> {
    let checksum_type: ChecksumType = checksum.parse()?;
    for path in packages {
        let pkg = read_package(path, &location_of(path), None, checksum_type, changelog_limit)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        print!("{}", dump::dump_primary(&pkg)?);
        print!("{}", dump::dump_filelists(&pkg)?);
        print!("{}", dump::dump_other(&pkg)?);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let pkg = read_package(
        path,
        &location_of(path),
        None,
        ChecksumType::default(),
        DEFAULT_CHANGELOG_LIMIT,
    )
    .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&pkg)?);
    Ok(())
}

fn cmd_parse(path: &Path, kind: Option<MetadataKind>) -> Result<()> {
    let Some(kind) = kind.or_else(|| MetadataKind::guess(path)) else {
        bail!(
            "Cannot tell the metadata type of {}, use --kind",
            path.display()
        );
    };

    let mut count = 0usize;
    let print = |pkg: Package| {
        count += 1;
        println!(
            "{} {} files={} requires={} changelogs={}",
            pkg.pkg_id.as_deref().unwrap_or("-"),
            pkg.nevra(),
            pkg.files.len(),
            pkg.requires.len(),
            pkg.changelogs.len()
        );
        Ok(())
    };
    let warnings: WarningCallback<'_> = Box::new(|kind: WarningKind, msg: &str| {
        warn!("{}: {}", kind, msg);
        Ok(())
    });

    match kind {
        MetadataKind::Primary => parse_primary(path, print, Some(warnings)),
        MetadataKind::Filelists => parse_filelists(path, print, Some(warnings)),
        MetadataKind::Other => parse_other(path, print, Some(warnings)),
    }
    .with_context(|| format!("Failed to parse {}", path.display()))?;

    info!("Parsed {} packages", count);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Create(args) => cmd_create(args),
        Commands::Dump {
            packages,
            checksum,
            changelog_limit,
        } => cmd_dump(&packages, &checksum, changelog_limit),
        Commands::Info { package } => cmd_info(&package),
        Commands::Parse { file, kind } => cmd_parse(&file, kind),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "rpmrepo", &mut io::stdout());
            Ok(())
        }
    }
}
