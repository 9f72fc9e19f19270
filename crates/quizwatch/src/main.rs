use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use quizwatch::logging::{self, LogFormat};
use quizwatch::{run_simulator, ObserverConfig, SimulatorConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("quizwatch-sim")
        .version(quizwatch::VERSION)
        .about("Drive the quizwatch observer against a simulated host")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v, -vv, -vvv)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run one simulated session")
                .arg(
                    Arg::new("components")
                        .long("components")
                        .default_value("9")
                        .value_parser(value_parser!(usize))
                        .help("Number of healthy components"),
                )
                .arg(
                    Arg::new("faulty")
                        .long("faulty")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Components whose adapter abandons"),
                )
                .arg(
                    Arg::new("volatile")
                        .long("volatile")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Components whose adapter panics"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("accuracy")
                        .long("accuracy")
                        .default_value("0.75")
                        .value_parser(value_parser!(f64))
                        .help("Probability the scripted operator answers correctly"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Observer configuration file (TOML)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let verbose = args.get_count("verbose");
            let json = args.get_flag("json");
            let format = if json { LogFormat::Json } else { LogFormat::Text };
            logging::init(logging::directives_for_verbosity(verbose), format)?;

            let mut config = SimulatorConfig::default();
            if let Some(path) = args.get_one::<PathBuf>("config") {
                config.observer = ObserverConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?;
            }
            config.components = *args.get_one::<usize>("components").context("components")?;
            config.faulty = *args.get_one::<usize>("faulty").context("faulty")?;
            config.volatile = *args.get_one::<usize>("volatile").context("volatile")?;
            config.seed = *args.get_one::<u64>("seed").context("seed")?;
            config.accuracy = *args.get_one::<f64>("accuracy").context("accuracy")?;

            let report = run_simulator(config).await?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => Ok(()),
    }
}
