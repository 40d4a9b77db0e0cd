use acorn::build::build_site;
use acorn::config::Config;
use clap::{crate_version, App, Arg, ArgMatches};
use std::error::Error;
use std::path::Path;
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LOG_LEVELS: &[&str] = &["debug", "info", "warning", "error", "critical"];

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("acorn")
        .version(crate_version!())
        .about("A static blog generator")
        .arg(
            Arg::with_name("generate")
                .short("g")
                .long("generate")
                .help("Generate the source for your site"),
        )
        .arg(
            Arg::with_name("loglevel")
                .long("loglevel")
                .takes_value(true)
                .possible_values(LOG_LEVELS)
                .default_value("warning")
                .help("Set the log output level"),
        )
        .arg(
            Arg::with_name("layout")
                .short("l")
                .long("layout")
                .takes_value(true)
                .help("Set the layout to use (overrides the settings file)"),
        )
        .arg(
            Arg::with_name("destination")
                .short("d")
                .long("destination")
                .takes_value(true)
                .help("Set the destination of the output (overrides the settings file)"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .default_value("settings.yaml")
                .help("The settings file"),
        )
}

fn setup_logging(level: &str) {
    let directive = match level {
        "warning" => "warn",
        "critical" => "error",
        level => level,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(std::io::stdout)
        .init();
}

fn generate(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    // `config` has a default value.
    let settings = Path::new(matches.value_of("config").unwrap_or("settings.yaml"));
    let mut config = Config::from_file(settings)?;
    if let Some(layout) = matches.value_of("layout") {
        config = config.with_layout(layout);
    }
    if let Some(destination) = matches.value_of("destination") {
        config = config.with_destination(Path::new(destination));
    }
    info!("Settings loaded.");
    build_site(&config)?;
    info!("Generation completed.");
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    setup_logging(matches.value_of("loglevel").unwrap_or("warning"));

    if !matches.is_present("generate") {
        if cli().print_help().is_err() {
            exit(1);
        }
        println!();
        return;
    }

    if let Err(err) = generate(&matches) {
        error!("{}", err);
        eprintln!("Error: {}", err);
        exit(1);
    }
}
