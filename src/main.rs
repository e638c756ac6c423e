// SPDX-License-Identifier: MPL-2.0

use background_logo_lib::engine::{EngineConfig, LogoEngine};
use background_logo_lib::{Monitor, Rect};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// Background logo - draws the distribution logo over the default wallpaper
#[derive(Parser, Debug)]
#[command(name = "background-logo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Monitor work area as WIDTHxHEIGHT+X+Y. Repeat for more monitors; the
    /// first one is primary.
    #[arg(long = "monitor", value_name = "GEOMETRY", value_parser = parse_geometry)]
    monitors: Vec<Rect>,

    /// Also draw on overview backgrounds.
    #[arg(long)]
    overview: bool,

    /// Write every overlay as a PNG into this directory when it settles.
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,
}

impl Args {
    fn engine_config(self) -> EngineConfig {
        let mut config = EngineConfig {
            overview: self.overview,
            dump_dir: self.dump_dir,
            ..EngineConfig::default()
        };

        if !self.monitors.is_empty() {
            config.monitors = self
                .monitors
                .into_iter()
                .enumerate()
                .map(|(index, work_area)| Monitor {
                    index,
                    work_area,
                    primary: index == 0,
                })
                .collect();
        }

        config
    }
}

fn parse_geometry(s: &str) -> Result<Rect, String> {
    let invalid = || format!("invalid geometry {s:?}, expected WIDTHxHEIGHT+X+Y");

    let (size, offset) = match s.find(['+', '-']) {
        Some(at) => s.split_at(at),
        None => (s, "+0+0"),
    };
    let (width, height) = size.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.parse().map_err(|_| invalid())?;
    let height: u32 = height.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }

    // Offsets keep their sign: "+1920+0", "-1280+0".
    let split = offset[1..].find(['+', '-']).map(|at| at + 1).ok_or_else(invalid)?;
    let (x, y) = offset.split_at(split);
    let x: i32 = x.parse().map_err(|_| invalid())?;
    let y: i32 = y.parse().map_err(|_| invalid())?;

    Ok(Rect::new(x, y, width, height))
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::var("RUST_SPANTRACE").is_err() {
        unsafe {
            std::env::set_var("RUST_SPANTRACE", "0");
        }
    }

    init_logger();

    let args = Args::parse();
    tracing::debug!(?args, "starting");

    LogoEngine::run(args.engine_config())?;

    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    let log_format = tracing_subscriber::fmt::format()
        .pretty()
        .without_time()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_thread_names(true);

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_geometry() {
        assert_eq!(parse_geometry("1920x1080+0+0"), Ok(Rect::new(0, 0, 1920, 1080)));
        assert_eq!(
            parse_geometry("1280x1024+1920+56"),
            Ok(Rect::new(1920, 56, 1280, 1024))
        );
        assert_eq!(
            parse_geometry("800x600-800+0"),
            Ok(Rect::new(-800, 0, 800, 600))
        );
        assert_eq!(parse_geometry("640x480"), Ok(Rect::new(0, 0, 640, 480)));

        assert!(parse_geometry("0x480").is_err());
        assert!(parse_geometry("1920").is_err());
        assert!(parse_geometry("1920x1080+5").is_err());
    }

    #[test]
    fn monitors_from_args() {
        let args = Args::parse_from([
            "background-logo",
            "--monitor",
            "1920x1080+0+0",
            "--monitor",
            "1280x1024+1920+0",
            "--overview",
        ]);
        let config = args.engine_config();

        assert!(config.overview);
        assert_eq!(config.monitors.len(), 2);
        assert!(config.monitors[0].primary);
        assert!(!config.monitors[1].primary);
        assert_eq!(config.monitors[1].work_area.x, 1920);
    }

    #[test]
    fn main_calls_library() {
        let _run: fn(EngineConfig) -> eyre::Result<()> = LogoEngine::run;
    }

    #[test]
    fn defaults_to_one_monitor() {
        let config = Args::parse_from(["background-logo"]).engine_config();
        assert_eq!(config.monitors.len(), 1);
        assert!(config.dump_dir.is_none());
    }
}
