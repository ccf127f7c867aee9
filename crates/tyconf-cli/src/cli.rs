//! tyconf CLI - Command-line interface for tyconf configuration files
//!
//! Usage:
//!   tyconf check app.conf --definitions app.defs
//!   tyconf dump app.conf --format json
//!   tyconf get app.conf server hosts

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tyconf_core::{Config, ConfigOptions, TypedValue};

/// tyconf - Typed, sectioned configuration files
#[derive(Parser)]
#[command(name = "tyconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log parse progress to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads a config
#[derive(Args)]
struct LoadArgs {
    /// Configuration file
    file: PathBuf,

    /// Definitions file to validate against
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Accept keywords missing from the definitions file
    #[arg(long)]
    accept_undefined: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a configuration file and report every error
    Check {
        #[command(flatten)]
        load: LoadArgs,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Export the parsed configuration
    Dump {
        #[command(flatten)]
        load: LoadArgs,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the value of one keyword
    Get {
        #[command(flatten)]
        load: LoadArgs,

        /// Section name
        section: String,

        /// Keyword name
        keyword: String,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List section names in file order
    Sections {
        #[command(flatten)]
        load: LoadArgs,
    },

    /// List the keywords of a section
    Keywords {
        #[command(flatten)]
        load: LoadArgs,

        /// Section name
        section: String,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Check { load, quiet } => cmd_check(&load, cli.debug, quiet),
        Commands::Dump {
            load,
            format,
            output,
        } => cmd_dump(&load, cli.debug, &format, output),
        Commands::Get {
            load,
            section,
            keyword,
            format,
        } => cmd_get(&load, cli.debug, &section, &keyword, &format),
        Commands::Sections { load } => cmd_sections(&load, cli.debug),
        Commands::Keywords { load, section } => cmd_keywords(&load, cli.debug, &section),
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &LoadArgs, debug: bool) -> Config {
    let options = ConfigOptions {
        accept_undefined_keywords: args.accept_undefined,
        debug,
    };
    Config::load(&args.file, args.definitions.clone(), options)
}

/// Load and bail out on a fatal error, printing it
fn load_complete(args: &LoadArgs, debug: bool) -> Result<Config, ExitCode> {
    let config = load_config(args, debug);
    if let Some(err) = config.fatal_error() {
        eprintln!("{} {}", "✗".red(), args.file.display());
        eprintln!("{}", err.to_string().red());
        return Err(ExitCode::from(2));
    }
    Ok(config)
}

fn print_errors(config: &Config) {
    for err in config.error_list() {
        eprintln!("{} {}", "✗".red(), err.message());
    }
}

fn cmd_check(args: &LoadArgs, debug: bool, quiet: bool) -> ExitCode {
    let config = load_config(args, debug);

    if config.fatal_error().is_some() {
        print_errors(&config);
        return ExitCode::from(2);
    }

    if config.error_count() == 0 {
        if !quiet {
            println!(
                "{} {}: {} section(s), no errors",
                "✓".green(),
                args.file.display(),
                config.sections().len()
            );
        }
        return ExitCode::SUCCESS;
    }

    print_errors(&config);
    eprintln!(
        "\n{} {}: {} error(s)",
        "✗".red(),
        args.file.display(),
        config.error_count()
    );
    ExitCode::from(1)
}

fn cmd_dump(args: &LoadArgs, debug: bool, format: &str, output: Option<PathBuf>) -> ExitCode {
    let config = match load_complete(args, debug) {
        Ok(c) => c,
        Err(code) => return code,
    };
    print_errors(&config);

    let result = match format {
        "json" => config.to_json(),
        "yaml" | "yml" => config.to_yaml(),
        _ => {
            eprintln!("Unsupported format: {}. Use yaml or json.", format);
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(content) => {
            if let Some(output_path) = output {
                if let Err(e) = std::fs::write(&output_path, &content) {
                    eprintln!("{}: {}", "Error writing file".red(), e);
                    return ExitCode::from(2);
                }
                eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
            } else {
                print!("{}", content);
                if format == "json" {
                    println!();
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(args: &LoadArgs, debug: bool, section: &str, keyword: &str, format: &str) -> ExitCode {
    let config = match load_complete(args, debug) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let value = match config.get_values(section, keyword) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e.message());
            return ExitCode::from(1);
        }
    };

    match format {
        "json" => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                return ExitCode::from(1);
            }
        },
        _ => print_text(value),
    }
    ExitCode::SUCCESS
}

fn print_text(value: &TypedValue) {
    match value {
        TypedValue::Scalar(s) => println!("{}", s),
        TypedValue::Array(items) => {
            for item in items {
                println!("{}", item);
            }
        }
        TypedValue::Hash(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                println!("{} = {}", key, map[key]);
            }
        }
    }
}

fn cmd_sections(args: &LoadArgs, debug: bool) -> ExitCode {
    let config = match load_complete(args, debug) {
        Ok(c) => c,
        Err(code) => return code,
    };
    for section in config.sections() {
        println!("{}", section);
    }
    ExitCode::SUCCESS
}

fn cmd_keywords(args: &LoadArgs, debug: bool, section: &str) -> ExitCode {
    let config = match load_complete(args, debug) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match config.keywords(section) {
        Ok(mut keywords) => {
            keywords.sort_unstable();
            for keyword in keywords {
                let type_name = config
                    .get_type(section, keyword)
                    .ok()
                    .flatten()
                    .map_or("unknown", |t| t.as_str());
                println!("{} ({})", keyword, type_name.dimmed());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e.message());
            ExitCode::from(1)
        }
    }
}
