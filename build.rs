// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn positional(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).help(help)
}

fn build_cli() -> Command {
    Command::new("eessi-ingest")
        .version(env!("CARGO_PKG_VERSION"))
        .author("EESSI Contributors")
        .about("Validate an EESSI tarball and ingest it into a CernVM-FS repository")
        .arg(positional("archive", "Path to the tarball"))
        .arg(positional("source_repo", "Repository the change request was made against"))
        .arg(positional("branch", "Branch of the change request"))
        .arg(positional("change_id", "Pull request number or commit id"))
        .arg(positional("submitter", "Who submitted the change request"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file [default: /etc/eessi-ingest/config.toml if present]"),
        )
        .arg(
            Arg::new("check_filename_type")
                .long("check-filename-type")
                .action(ArgAction::SetTrue)
                .help("Require the content type in the file name to match the tarball contents"),
        )
        .arg(
            Arg::new("sha256")
                .long("sha256")
                .value_name("HEX")
                .help("Expected SHA-256 digest of the tarball"),
        )
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Inspect and validate only; show what would be ingested"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("eessi-ingest.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
