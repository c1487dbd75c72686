use clap::{value_parser, Arg, Command, ValueHint};
use phosphors_cli::input::Input;
use phosphors_cli::runner::Runner;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PHOSPHORS_LOG", "error,phosphors=info"))
        .init();

    let matches = Command::new("phosphors")
        .version(clap::crate_version!())
        .author("Michael Lazear <michaellazear92@gmail.com>")
        .about("PhosphoRS - which residue carries the modification?")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("query_paths")
                .num_args(1..)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Paths to JSON files of peptide-spectrum matches to localize. Overrides \
                     query files listed in the configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path where site probabilities will be written (default = stdout)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("fragment-da")
                .long("fragment-da")
                .value_parser(value_parser!(f64))
                .conflicts_with("fragment-ppm")
                .help("Symmetric fragment tolerance in Da")
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("fragment-ppm")
                .long("fragment-ppm")
                .value_parser(value_parser!(f64))
                .help("Symmetric fragment tolerance in ppm")
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("neutral-losses")
                .long("neutral-losses")
                .action(clap::ArgAction::SetTrue)
                .help("Match neutral loss fragments when scoring"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let input = Input::from_arguments(&matches)?;
    let runner = input.build().map(Runner::new)?;
    runner.run()?;

    Ok(())
}
