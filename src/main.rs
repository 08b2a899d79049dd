use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use nbpost::config::Config;
use nbpost::convert::{ConvertOptions, Converter};
use nbpost::export::NbConvert;
use nbpost::figures::data_figure;
use nbpost::post::Variant;
use nbpost::regression::{generate_data, GenerateOptions};
use nbpost::verify::verify;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = app().get_matches();
    let verbosity = match matches.subcommand() {
        (_, Some(sub)) => matches.occurrences_of("verbose").max(sub.occurrences_of("verbose")),
        _ => matches.occurrences_of("verbose"),
    };
    init_logging(verbosity);
    if let Err(e) = run(&matches) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn app() -> App<'static, 'static> {
    App::new("nbpost")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .global(true)
                .help("Project file to use instead of searching for nbpost.yaml"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Logs more detail (repeat for more)"),
        )
        .subcommand(
            SubCommand::with_name("convert")
                .about("Converts a notebook into a post")
                .arg(
                    Arg::with_name("notebook")
                        .required(true)
                        .help("The notebook to convert"),
                )
                .arg(
                    Arg::with_name("dated")
                        .long("dated")
                        .help("Prefixes the post and its assets with the publish date and adds front-matter"),
                )
                .arg(
                    Arg::with_name("date")
                        .long("date")
                        .takes_value(true)
                        .value_name("YYYY-MM-DD")
                        .validator(|s| parse_date(&s).map(|_| ()).map_err(|e| e.to_string()))
                        .help("Publish date (implies --dated); defaults to the notebook's creation date"),
                )
                .arg(
                    Arg::with_name("layout")
                        .long("layout")
                        .takes_value(true)
                        .help("Front-matter layout [default: post]"),
                )
                .arg(
                    Arg::with_name("title")
                        .long("title")
                        .takes_value(true)
                        .help("Front-matter title"),
                )
                .arg(
                    Arg::with_name("published")
                        .long("published")
                        .takes_value(true)
                        .value_name("BOOL")
                        .default_value("true")
                        .validator(|s| parse_bool(&s).map(|_| ())),
                )
                .arg(
                    Arg::with_name("mathjax")
                        .long("mathjax")
                        .takes_value(true)
                        .value_name("BOOL")
                        .default_value("true")
                        .validator(|s| parse_bool(&s).map(|_| ()))
                        .help("Appends the mathjax include to the post"),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Checks that every dated asset directory has a post")
                .arg(
                    Arg::with_name("assets-dir")
                        .long("assets-dir")
                        .takes_value(true)
                        .value_name("DIR"),
                )
                .arg(
                    Arg::with_name("posts-dir")
                        .long("posts-dir")
                        .takes_value(true)
                        .value_name("DIR"),
                ),
        )
        .subcommand(
            SubCommand::with_name("regression")
                .about("Prints synthetic linear-regression data and its figure series as JSON")
                .arg(number_arg("n", "1000", "Number of observations"))
                .arg(number_arg("p", "2", "Number of features including the bias"))
                .arg(number_arg("seed", "1", "Random seed"))
                .arg(
                    Arg::with_name("theta")
                        .long("theta")
                        .takes_value(true)
                        .value_name("A,B,...")
                        .help("Regression coefficients; random if omitted"),
                ),
        )
}

fn number_arg(name: &'static str, default: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .default_value(default)
        .validator(|s| s.parse::<u64>().map(|_| ()).map_err(|e| e.to_string()))
        .help(help)
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("convert", Some(m)) => convert(matches, m),
        ("verify", Some(m)) => verify_site(matches, m),
        ("regression", Some(m)) => regression(m),
        (other, _) => Err(anyhow!("unknown subcommand `{}`", other)),
    }
}

// Global arguments may appear before or after the subcommand.
fn load_config(global: &ArgMatches, m: &ArgMatches, variant: Option<Variant>) -> Result<Config> {
    match m.value_of("config").or_else(|| global.value_of("config")) {
        Some(path) => Config::from_project_file(Path::new(path), variant)
            .with_context(|| format!("Loading configuration `{}`", path)),
        None => {
            let cwd = std::env::current_dir().context("Getting working directory")?;
            Config::from_directory(&cwd, variant)
        }
    }
}

fn convert(global: &ArgMatches, m: &ArgMatches) -> Result<()> {
    let date = m.value_of("date").map(parse_date).transpose()?;
    let config = load_config(global, m, variant(m))?;
    let notebook = m
        .value_of_os("notebook")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("no notebook given"))?;

    let options = ConvertOptions {
        date,
        layout: m.value_of("layout").map(str::to_owned),
        title: m.value_of("title").map(str::to_owned),
        published: parse_bool(m.value_of("published").unwrap_or("true")).map_err(|e| anyhow!(e))?,
        mathjax: parse_bool(m.value_of("mathjax").unwrap_or("true")).map_err(|e| anyhow!(e))?,
    };
    let exporter = NbConvert {
        command: config.export_command.clone(),
        timeout: config.export_timeout,
    };

    let converted = Converter::new(&config, &exporter)
        .convert(&notebook, &options)
        .with_context(|| format!("Converting `{}`", notebook.display()))?;
    println!("{}", converted.post.display());
    Ok(())
}

/// `--dated` or `--date` selects the dated variant; otherwise the project
/// file decides.
fn variant(m: &ArgMatches) -> Option<Variant> {
    match m.is_present("dated") || m.is_present("date") {
        true => Some(Variant::Dated),
        false => None,
    }
}

fn verify_site(global: &ArgMatches, m: &ArgMatches) -> Result<()> {
    let config = load_config(global, m, None)?;
    let assets = m
        .value_of("assets-dir")
        .map(PathBuf::from)
        .unwrap_or(config.assets_directory);
    let posts = m
        .value_of("posts-dir")
        .map(PathBuf::from)
        .unwrap_or(config.posts_directory);
    verify(&assets, &posts)?;
    Ok(())
}

fn regression(m: &ArgMatches) -> Result<()> {
    let number = |name: &str| -> Result<u64> {
        m.value_of(name)
            .ok_or_else(|| anyhow!("missing --{}", name))?
            .parse::<u64>()
            .with_context(|| format!("Parsing --{}", name))
    };
    let theta = match m.value_of("theta") {
        None => None,
        Some(s) => Some(
            s.split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .context("Parsing --theta")?,
        ),
    };

    let data = generate_data(&GenerateOptions {
        n: number("n")? as usize,
        p: number("p")? as usize,
        seed: number("seed")?,
        theta,
        ..GenerateOptions::default()
    })?;
    let figure = data_figure(&data);

    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(
        stdout.lock(),
        &serde_json::json!({ "data": data, "figure": figure }),
    )?;
    println!();
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date `{}`; expected YYYY-MM-DD", s))
}

fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected a boolean; found `{}`", s)),
    }
}

fn init_logging(verbosity: u64) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
