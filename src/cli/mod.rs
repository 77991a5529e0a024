// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::core::types::{Direction, LayoutMode, Size};
use crate::error::Result;
use crate::LayoutOptions;
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::time::Instant;

#[derive(Debug, Clone, ValueEnum)]
pub enum Mode {
    Legacy,
    Modern,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum WritingDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct LayoutCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for LayoutCli {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"));

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        match matches.subcommand() {
            Some(("eval", sub_matches)) => handlers::handle_eval_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("symbols", sub_matches)) => handlers::handle_symbols_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.json or .toml)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                layout_args(Command::new("eval"))
                    .about("Lay out a document and print the resolved frames")
                    .arg(Arg::new("input").help("Layout document (.json or .toml)").required(true).index(1))
                    .arg(Arg::new("symbol").short('s').long("symbol").value_name("EXPR").help("Resolve a symbol on the root, e.g. '#title.width'").action(ArgAction::Append))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(OutputFormat)).default_value("text").help("Output format"))
                    .arg(Arg::new("stats").long("stats").help("Show evaluation statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("watch").short('w').long("watch").help("Watch the document and re-evaluate on change").action(ArgAction::SetTrue)),
            )
            .subcommand(
                layout_args(Command::new("check"))
                    .about("Check layout documents for evaluation errors")
                    .arg(Arg::new("input").help("Layout document or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check every document in the directory recursively").action(ArgAction::SetTrue)),
            )
            .subcommand(
                layout_args(Command::new("symbols"))
                    .about("List the symbols visible from a node")
                    .arg(Arg::new("input").help("Layout document").required(true).index(1))
                    .arg(Arg::new("node").short('n').long("node").value_name("ID").help("Node id (defaults to the root)")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    /// Flags win over the config file, which wins over the defaults
    pub fn build_layout_options(&self, matches: &clap::ArgMatches) -> Result<LayoutOptions> {
        let mut options = self.config.options();
        if let Some(mode) = matches.get_one::<Mode>("mode") {
            options.layout_mode = match mode {
                Mode::Legacy => LayoutMode::Legacy,
                Mode::Modern => LayoutMode::Modern,
            };
        }
        if let Some(direction) = matches.get_one::<WritingDirection>("direction") {
            options.default_direction = match direction {
                WritingDirection::Ltr => Direction::LeftToRight,
                WritingDirection::Rtl => Direction::RightToLeft,
            };
        }
        if matches.get_flag("debug") {
            options.debug_mode = true;
        }
        let width = matches.get_one::<f64>("width").copied();
        let height = matches.get_one::<f64>("height").copied();
        options.root_container = Size::new(
            width.unwrap_or(options.root_container.width),
            height.unwrap_or(options.root_container.height),
        );
        Ok(options)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}

/// Options shared by every subcommand that builds a tree
fn layout_args(command: Command) -> Command {
    command
        .arg(Arg::new("mode").short('m').long("mode").value_parser(clap::value_parser!(Mode)).help("Layout mode"))
        .arg(Arg::new("direction").long("direction").value_parser(clap::value_parser!(WritingDirection)).help("Default writing direction"))
        .arg(Arg::new("width").long("width").value_name("PT").value_parser(clap::value_parser!(f64)).help("Root container width"))
        .arg(Arg::new("height").long("height").value_name("PT").value_parser(clap::value_parser!(f64)).help("Root container height"))
        .arg(Arg::new("debug").short('d').long("debug").help("Keep unhandled errors for the debug overlay").action(ArgAction::SetTrue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = LayoutCli::new();
        let matches = cli
            .build_cli()
            .try_get_matches_from(["krylay", "eval", "card.toml", "--mode", "legacy", "--direction", "rtl", "--width", "1024", "-d"])
            .unwrap();
        let (_, sub_matches) = matches.subcommand().unwrap();
        let options = cli.build_layout_options(sub_matches).unwrap();

        assert_eq!(options.layout_mode, LayoutMode::Legacy);
        assert_eq!(options.default_direction, Direction::RightToLeft);
        assert_eq!(options.root_container, Size::new(1024.0, 667.0));
        assert!(options.debug_mode);
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let mut cli = LayoutCli::new();
        cli.config.root_height = Some(800.0);
        cli.config.layout_mode = Some(LayoutMode::Legacy);
        let matches = cli
            .build_cli()
            .try_get_matches_from(["krylay", "symbols", "card.json", "--mode", "modern"])
            .unwrap();
        let (_, sub_matches) = matches.subcommand().unwrap();
        let options = cli.build_layout_options(sub_matches).unwrap();

        assert_eq!(options.layout_mode, LayoutMode::Modern);
        assert_eq!(options.root_container, Size::new(375.0, 800.0));
    }
}
