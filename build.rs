// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("rpmrepo")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rpmrepo Contributors")
        .about("Generate and read rpm-md repository metadata")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More output (repeatable)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only warnings and errors"),
        )
        .subcommand(
            Command::new("create")
                .about("Create repodata for a directory of packages")
                .arg(Arg::new("directory").required(true).help("Directory containing the packages"))
                .arg(
                    Arg::new("outputdir")
                        .short('o')
                        .long("outputdir")
                        .help("Where to put repodata/ (default: the package directory)"),
                )
                .arg(
                    Arg::new("baseurl")
                        .short('u')
                        .long("baseurl")
                        .help("Base URL of package locations (xml:base)"),
                )
                .arg(
                    Arg::new("excludes")
                        .short('x')
                        .long("excludes")
                        .action(ArgAction::Append)
                        .help("File name masks of packages to skip"),
                )
                .arg(
                    Arg::new("pkglist")
                        .short('i')
                        .long("pkglist")
                        .help("Only include the packages listed in this file"),
                )
                .arg(
                    Arg::new("includepkg")
                        .short('n')
                        .long("includepkg")
                        .action(ArgAction::Append)
                        .help("Only include this package (repeatable)"),
                )
                .arg(
                    Arg::new("changelog_limit")
                        .long("changelog-limit")
                        .default_value("10")
                        .help("Number of changelog entries per package (0-100)"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .default_value("5")
                        .help("Number of worker threads (1-100)"),
                )
                .arg(
                    Arg::new("checksum")
                        .short('s')
                        .long("checksum")
                        .default_value("sha256")
                        .help("Checksum type: sha224, sha256, sha384 or sha512"),
                )
                .arg(
                    Arg::new("compress_type")
                        .long("compress-type")
                        .default_value("gz")
                        .help("Metadata compression: gz, bz2, xz or zst"),
                )
                .arg(
                    Arg::new("simple_md_filenames")
                        .long("simple-md-filenames")
                        .action(ArgAction::SetTrue)
                        .help("Do not prefix metadata file names with their checksum"),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .action(ArgAction::SetTrue)
                        .help("Reuse metadata of unchanged packages"),
                )
                .arg(
                    Arg::new("update_md_path")
                        .long("update-md-path")
                        .action(ArgAction::Append)
                        .help("Also reuse metadata from these repositories"),
                )
                .arg(
                    Arg::new("skip_stat")
                        .long("skip-stat")
                        .action(ArgAction::SetTrue)
                        .help("Reuse without comparing file mtime and size"),
                )
                .arg(
                    Arg::new("skip_symlinks")
                        .long("skip-symlinks")
                        .action(ArgAction::SetTrue)
                        .help("Ignore symlinked packages"),
                )
                .arg(
                    Arg::new("revision")
                        .long("revision")
                        .help("Revision of repomd.xml (default: current time)"),
                )
                .arg(
                    Arg::new("distro")
                        .long("distro")
                        .action(ArgAction::Append)
                        .help("Distro tag, cpeid,name or name (repeatable)"),
                )
                .arg(
                    Arg::new("content")
                        .long("content")
                        .action(ArgAction::Append)
                        .help("Content tag (repeatable)"),
                )
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .action(ArgAction::Append)
                        .help("Repo tag (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Print the primary, filelists and other XML of packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Package files"),
                )
                .arg(
                    Arg::new("checksum")
                        .short('s')
                        .long("checksum")
                        .default_value("sha256")
                        .help("Checksum type of the package ids"),
                )
                .arg(
                    Arg::new("changelog_limit")
                        .long("changelog-limit")
                        .default_value("10")
                        .help("Number of changelog entries (0-100)"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Print the extracted metadata of a package as JSON")
                .arg(Arg::new("package").required(true).help("Package file")),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse a (possibly compressed) metadata file")
                .arg(Arg::new("file").required(true).help("primary, filelists or other XML"))
                .arg(
                    Arg::new("kind")
                        .short('k')
                        .long("kind")
                        .value_parser(["primary", "filelists", "other"])
                        .help("Document type (default: guessed from the file name)"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let man_dir = PathBuf::from(manifest_dir).join("man");
    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Cannot create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Cannot render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rpmrepo.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Cannot write man page: {}", e);
    }
}
