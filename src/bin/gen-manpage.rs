//! Man page generator for mhscpu
//!
//! Writes `mhscpu.1` plus one `mhscpu-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

fn render(cmd: clap::Command, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    fs::write(path, buffer)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();

    let mut pages = vec![output_dir.join(format!("{}.1", name))];
    render(cmd.clone(), &pages[0])?;

    for sub in cmd.get_subcommands() {
        let path = output_dir.join(format!("{}-{}.1", name, sub.get_name()));
        render(sub.clone(), &path)?;
        pages.push(path);
    }

    for page in &pages {
        println!("Man page generated at: {}", page.display());
    }
    println!("\nTo view the main page:");
    println!("  man -l {}", pages[0].display());

    Ok(())
}
