// SPDX-License-Identifier: MPL-2.0

//! Background Logo Settings - inspect, edit and preview the logo settings

mod commands;
mod render;

use background_logo_config::Step;
use clap::{Parser, Subcommand, ValueEnum};
use commands::Stores;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "background-logo-settings")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one key, or every key.
    Get { key: Option<String> },

    /// Store a value. Numbers outside a key's range are clamped.
    Set { key: String, value: String },

    /// Restore one key, or every key, to its default.
    Reset { key: Option<String> },

    /// Nudge a numeric key.
    Step {
        key: String,
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Describe every key.
    List,

    /// Render the preview thumbnail into a PNG.
    Preview {
        #[arg(short, long, value_name = "FILE", default_value = "background-logo-preview.png")]
        output: PathBuf,

        /// Monitor size as WIDTHxHEIGHT.
        #[arg(long, value_parser = parse_size, default_value = "1920x1080")]
        screen: (u32, u32),

        /// Open the rendered preview.
        #[arg(long)]
        open: bool,
    },

    /// Re-render the preview whenever the settings change.
    Watch {
        #[arg(short, long, value_name = "FILE", default_value = "background-logo-preview.png")]
        output: PathBuf,

        #[arg(long, value_parser = parse_size, default_value = "1920x1080")]
        screen: (u32, u32),
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
    Up,
    Down,
    PageUp,
    PageDown,
}

impl From<Direction> for Step {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Step::Up,
            Direction::Down => Step::Down,
            Direction::PageUp => Step::PageUp,
            Direction::PageDown => Step::PageDown,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("invalid size {s:?}, expected WIDTHxHEIGHT");
    let (width, height) = s.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.parse().map_err(|_| invalid())?;
    let height: u32 = height.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logger();

    let args = Args::parse();
    let stores = Stores::open()?;
    let mut stdout = std::io::stdout().lock();

    match args.command {
        Command::Get { key } => commands::get(&stores, key.as_deref(), &mut stdout)?,

        Command::Set { key, value } => {
            let stored = commands::set(&stores, &key, &value)?;
            tracing::debug!(%key, %stored, "value stored");
        }

        Command::Reset { key } => commands::reset(&stores, key.as_deref())?,

        Command::Step { key, direction } => {
            let value = commands::step(&stores, &key, direction.into())?;
            println!("{value}");
        }

        Command::List => commands::list(&stores, &mut stdout)?,

        Command::Preview {
            output,
            screen,
            open,
        } => {
            render::render(&stores, screen, &output)?;
            if open {
                let _ = open::that_detached(&output);
            }
        }

        Command::Watch { output, screen } => render::watch(&stores, screen, output)?,
    }

    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::WARN);

    let log_format = tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false);

    let log_filter = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(log_format)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            metadata.level() == &tracing::Level::ERROR
                || (metadata.target().starts_with("background_logo")
                    && metadata.level() <= &log_level)
        }));

    tracing_subscriber::registry().with(log_filter).init();
}
