// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// Use library instead of local modules
use event_checkin::{export_csv, Registry, SqliteStore};

enum Command {
    Desk,
    Export { out: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let (data_path, command) = parse_args(&args[1..])?;

    match command {
        Command::Desk => run_desk(data_path),
        Command::Export { out } => run_export(data_path, out),
    }
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Command)> {
    let mut data_path: Option<PathBuf> = None;
    let mut rest: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--data" {
            let value = iter.next().context("--data requires a file path")?;
            data_path = Some(PathBuf::from(value));
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        [] => Command::Desk,
        ["export"] => Command::Export {
            out: PathBuf::from("attendees.csv"),
        },
        ["export", out] => Command::Export {
            out: PathBuf::from(out),
        },
        other => bail!(
            "Unknown arguments {:?}\nUsage: event-checkin [--data FILE] [export [FILE]]",
            other
        ),
    };

    Ok((data_path.unwrap_or_else(default_data_path), command))
}

/// Platform data directory by default, current directory as fallback
fn default_data_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("", "", "event-checkin") {
        dirs.data_dir().join("attendees.db")
    } else {
        PathBuf::from("attendees.db")
    }
}

fn open_registry(path: &Path) -> Result<Registry> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
    }

    let store = SqliteStore::open(path)?;

    match Registry::open(Box::new(store)) {
        Ok(registry) => Ok(registry),
        Err(err) => {
            // A readable-but-broken snapshot never loads partially: refuse to
            // start rather than show the operator a roster missing people.
            eprintln!("❌ Stored roster is unusable: {}", err);
            eprintln!("   Fix or remove the snapshot at {}", path.display());
            std::process::exit(1);
        }
    }
}

fn run_export(data_path: PathBuf, out: PathBuf) -> Result<()> {
    println!("📇 Exporting roster...");

    let registry = open_registry(&data_path)?;
    let written = export_csv(registry.attendees(), &out)?;

    println!("✓ Wrote {} attendees to {}", written, out.display());

    Ok(())
}

#[cfg(feature = "tui")]
fn run_desk(data_path: PathBuf) -> Result<()> {
    println!("🖥️  Loading check-in desk...\n");

    let registry = open_registry(&data_path)?;

    println!(
        "✓ Loaded {} attendees from {}",
        registry.attendees().len(),
        data_path.display()
    );
    println!("Starting UI... (Press Esc to quit)\n");

    let mut app = ui::App::new(registry);
    ui::run_ui(&mut app)?;

    println!("\n✅ Desk closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_desk(_data_path: PathBuf) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or export the roster: event-checkin export");
    std::process::exit(1);
}
