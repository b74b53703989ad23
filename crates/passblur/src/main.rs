//! `passblur` - CLI for the passblur masking engine
//!
//! This binary scans text files the way the engine scans page text, lists the
//! built-in detection rules and manages configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use clap::Parser;

use passblur::cli::{
    read_input, scan_text, Cli, Command, ConfigCommand, OutputFormat, ScanCommand,
};
use passblur::detection::{builtin_rules, DetectionFilterSet};
use passblur::{init_logging, Config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Scan(scan_cmd) => handle_scan(config, &scan_cmd),
        Command::Patterns(patterns_cmd) => handle_patterns(patterns_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_scan(mut config: Config, cmd: &ScanCommand) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(cmd.file.as_deref(), std::io::stdin())?;

    if let Some(categories) = cmd.categories() {
        config.protection.filters = DetectionFilterSet::only(&categories);
    }

    let report = scan_text(&text, config)?;
    match cmd.format {
        OutputFormat::Plain => {
            print!("{}", report.masked_text);
            if !report.masked_text.ends_with('\n') {
                println!();
            }
            if report.status.suspended {
                eprintln!("Masked span limit reached; some values were left unmasked.");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn handle_patterns(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rules = builtin_rules();
    if json {
        let rules: Vec<serde_json::Value> = rules
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "category": rule.category,
                    "label": rule.label,
                    "min_match_length": rule.min_match_length,
                    "pattern": rule.pattern(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rules)?);
    } else {
        println!("{:<10} {:<16} {:>4}  PATTERN", "CATEGORY", "LABEL", "MIN");
        for rule in &rules {
            println!(
                "{:<10} {:<16} {:>4}  {}",
                rule.category.as_str(),
                rule.label,
                rule.min_match_length,
                rule.pattern()
            );
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let enabled: Vec<String> = config
                    .protection
                    .filters
                    .enabled_categories()
                    .iter()
                    .map(ToString::to_string)
                    .collect();

                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Protection]");
                println!("  Enabled:            {}", config.protection.enabled);
                println!("  Categories:         {}", enabled.join(", "));
                println!();
                println!("[Governor]");
                println!(
                    "  Max ops/second:     {}",
                    config.governor.max_operations_per_second
                );
                println!(
                    "  Overload cooldown:  {} ms",
                    config.governor.overload_cooldown_ms
                );
                println!("  Max masked spans:   {}", config.governor.max_masked_spans);
                println!(
                    "  Span cooldown:      {} ms",
                    config.governor.span_limit_cooldown_ms
                );
                println!();
                println!("[Watcher]");
                println!(
                    "  Fast poll:          {} ms x {}",
                    config.watcher.fast_interval_ms, config.watcher.fast_ticks
                );
                println!(
                    "  Steady poll:        {} ms",
                    config.watcher.steady_interval_ms
                );
                println!(
                    "  Max polled fields:  {}",
                    config.watcher.max_polled_fields
                );
                println!();
                println!("[Masking]");
                println!("  Blur radius:        {} px", config.masking.blur_radius_px);
                println!(
                    "  Container limits:   {} x {} px",
                    config.masking.container_max_width, config.masking.container_max_height
                );
                println!();
                println!("[Reveal]");
                println!("  Modifier:           {}", config.reveal.modifier);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
