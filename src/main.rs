use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use portscout::{
    config::ScanConfig,
    history::HistoryManager,
    network::{self, provider},
    output::{self, progress::ScanProgressBar, OutputFormat, ScanReport},
    scanner::progress::{spawn_reporter, DEFAULT_REPORT_INTERVAL},
    services::{parse_port_spec, PortList},
    Deadline, PortSet, ProgressTracker, ScanEngine,
};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(limit: u64) {
    use rlimit::Resource;

    match Resource::NOFILE.set(limit, limit) {
        Ok(()) => log::info!("Raised open file limit to {}", limit),
        Err(e) => eprintln!(
            "{} {}",
            "[!] Failed to set ulimit value:".bright_yellow(),
            e
        ),
    }

    if let Ok((soft, _)) = Resource::NOFILE.get() {
        log::debug!("Open file limit is now {}", soft);
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_limit: u64) {
    log::debug!("--ulimit has no effect on this platform");
}

fn build_cli() -> Command {
    Command::new("portscout")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Deadline-bounded concurrent TCP port scanner")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Host, IP address or URL to scan")
                .required_unless_present("history")
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Ports to scan, e.g. 22,80-85,443")
                .conflicts_with("list"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .value_name("LIST")
                .help("Built-in port list")
                .value_parser(["default", "important"]),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Per-probe timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("deadline")
                .short('d')
                .long("deadline")
                .value_name("MS")
                .help("Wall-clock budget for the whole scan in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("N")
                .help("Maximum probes in flight at once")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .value_parser(["text", "json", "csv"])
                .default_value("text"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write results to FILE instead of stdout")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("provider")
                .long("provider")
                .help("Look up the hosting provider of the resolved address")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-history")
                .long("no-history")
                .help("Don't save scan results to history")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Hide the progress bar")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Load settings from a TOML file (default: ~/.portscout.toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the open file limit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        // History management arguments
        .arg(
            Arg::new("history")
                .long("history")
                .value_name("COMMAND")
                .help("History command: list, show, delete")
                .value_parser(["list", "show", "delete"]),
        )
        .arg(
            Arg::new("history-id")
                .long("history-id")
                .value_name("ID")
                .help("Scan history ID for show/delete commands"),
        )
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config = config.with_timeout(timeout);
    }
    if let Some(&deadline) = matches.get_one::<u64>("deadline") {
        config = config.with_deadline(deadline);
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config = config.with_concurrency(concurrency);
    }

    config.validate()?;
    Ok(config)
}

/// Ports to scan plus the scan type recorded in the report.
fn select_ports(matches: &ArgMatches) -> anyhow::Result<(Vec<u16>, &'static str)> {
    if let Some(spec) = matches.get_one::<String>("ports") {
        return Ok((parse_port_spec(spec)?, "custom"));
    }

    let list: PortList = match matches.get_one::<String>("list") {
        Some(name) => name.parse()?,
        None => PortList::Default,
    };
    Ok((list.ports(), list.name()))
}

fn handle_history(command: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    let history_manager = HistoryManager::new()?;

    match command {
        "list" => history_manager.print_list()?,
        "show" | "delete" => {
            let Some(id) = matches.get_one::<String>("history-id") else {
                bail!("--history-id required for '{}' command", command);
            };

            if command == "show" {
                history_manager.print_scan(id)?;
            } else {
                history_manager.delete(id)?;
                println!("{} {}", "Deleted scan".bright_green(), id.bright_yellow());
            }
        }
        other => bail!("Unknown history command '{}'", other),
    }

    Ok(())
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    if let Some(command) = matches.get_one::<String>("history") {
        return handle_history(command, matches);
    }

    let config = load_config(matches)?;

    if let Some(&limit) = matches.get_one::<u64>("ulimit") {
        adjust_ulimit_size(limit);
    }

    let input = matches
        .get_one::<String>("target")
        .context("A target is required")?;
    let host = network::extract_hostname(input)?;
    let target = network::resolve(&host, config.resolve_timeout_duration()).await?;

    let (ports, scan_type) = select_ports(matches)?;
    let ports = PortSet::new(ports)?;

    let format: OutputFormat = matches
        .get_one::<String>("format")
        .map(|f| f.parse::<OutputFormat>())
        .transpose()?
        .unwrap_or(OutputFormat::Text);

    let hosting = if matches.get_flag("provider") {
        Some(provider::lookup_provider(target.address(), config.provider_timeout_duration()).await)
    } else {
        None
    };

    let engine = ScanEngine::new(target.address(), config.clone())?;

    let show_progress = !matches.get_flag("no-progress") && !format.is_machine_readable();
    let bar = if show_progress {
        ScanProgressBar::new(ports.len())
    } else {
        ScanProgressBar::hidden(ports.len())
    };

    let tracker = Arc::new(ProgressTracker::new(ports.len()));
    let deadline = Deadline::new(config.deadline_duration());
    let handle = bar.handle();
    let reporter = spawn_reporter(
        tracker.clone(),
        deadline,
        DEFAULT_REPORT_INTERVAL,
        move |snapshot| handle.update(snapshot),
    );

    let start_time = Instant::now();
    let result = engine.scan_until(&ports, deadline, tracker.clone()).await;
    let duration = start_time.elapsed();

    reporter.abort();
    bar.finish(tracker.snapshot());

    let mut report = ScanReport::new(input.as_str(), target.address(), scan_type, result, duration);
    if let Some(info) = hosting {
        report = report.with_hosting(info);
    }

    output::emit(&report, format, matches.get_one::<PathBuf>("output").map(PathBuf::as_path))?;

    // Save to history unless disabled
    if !matches.get_flag("no-history") {
        match HistoryManager::new().and_then(|manager| manager.save(&report)) {
            Ok(id) => eprintln!("{} {}", "Scan saved to history:".bright_blue(), id.bright_cyan()),
            Err(e) => log::warn!("Failed to save scan history: {}", e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let code = tokio::select! {
        outcome = run(&matches) => match outcome {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
                EXIT_FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupted".bright_yellow());
            EXIT_INTERRUPTED
        }
    };

    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }

    /// Parse `args` with `--config` pointing at a file holding `toml`.
    fn matches_with_config(toml: &str, args: &[&str]) -> (tempfile::NamedTempFile, ArgMatches) {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), toml).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let mut argv = vec!["portscout", "localhost", "--config", path.as_str()];
        argv.extend_from_slice(args);
        let matches = build_cli().try_get_matches_from(argv).unwrap();
        (file, matches)
    }

    #[test]
    fn unreadable_config_file_is_an_error() {
        let matches = build_cli()
            .try_get_matches_from(["portscout", "localhost", "--config", "/nonexistent"])
            .unwrap();
        assert!(load_config(&matches).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let (_file, matches) = matches_with_config(
            "timeout = 900\ndeadline = 5000\nmax_concurrency = 50\n",
            &["--timeout", "250", "-c", "4", "--deadline", "0"],
        );
        let config = load_config(&matches).unwrap();
        assert_eq!(config.timeout, 250);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.deadline, 0);

        let (_file, matches) = matches_with_config("timeout = 900\n", &[]);
        let config = load_config(&matches).unwrap();
        assert_eq!(config.timeout, 900);
        assert_eq!(config.max_concurrency, ScanConfig::default().max_concurrency);
    }

    #[test]
    fn out_of_range_concurrency_is_rejected() {
        let (_file, matches) = matches_with_config("", &["-c", "0"]);
        assert!(load_config(&matches).is_err());

        let huge = usize::MAX.to_string();
        let (_file, matches) = matches_with_config("", &["-c", huge.as_str()]);
        assert!(load_config(&matches).is_err());
    }

    #[test]
    fn port_selection() {
        let matches = build_cli()
            .try_get_matches_from(["portscout", "h", "-p", "443,22"])
            .unwrap();
        assert_eq!(select_ports(&matches).unwrap(), (vec![22, 443], "custom"));

        let matches = build_cli()
            .try_get_matches_from(["portscout", "h", "--list", "important"])
            .unwrap();
        assert_eq!(select_ports(&matches).unwrap().1, "important");

        let matches = build_cli().try_get_matches_from(["portscout", "h"]).unwrap();
        assert_eq!(select_ports(&matches).unwrap(), (vec![21, 22, 80, 443], "default"));

        assert!(build_cli()
            .try_get_matches_from(["portscout", "h", "-p", "80", "--list", "default"])
            .is_err());
    }

    #[test]
    fn history_needs_no_target() {
        let matches = build_cli()
            .try_get_matches_from(["portscout", "--history", "list"])
            .unwrap();
        let command = matches.get_one::<String>("history").map(String::as_str);
        assert_eq!(command, Some("list"));
    }
}
