use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Arg, ArgAction, Command, value_parser};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use securetrace::config::{RootHints, TraceConfig};
use securetrace::dns::enums::{DNSResourceClass, DNSResourceType};
use securetrace::dns::name::DomainName;
use securetrace::dnssec::{load_trusted_keys, root_trust_anchors};
use securetrace::error::{ConfigError, Result};
use securetrace::printer::{TextReporter, render_json};
use securetrace::resolver::{IpFamily, StubResolver, ZoneResolver};
use securetrace::trace::{DsMatchAnnotator, SilentReporter, TraceEngine, TraceQuery};

fn build_cli() -> Command {
    Command::new("securetrace")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Trace a name from the root down, collecting DNSSEC keys and DS records at every zone cut")
        .arg(
            Arg::new("name")
                .value_name("NAME")
                .help("Name to trace")
                .required(true),
        )
        .arg(
            Arg::new("type")
                .value_name("TYPE")
                .help("Record type to query")
                .default_value("A"),
        )
        .arg(
            Arg::new("class")
                .short('c')
                .long("class")
                .value_name("CLASS")
                .help("Record class to query")
                .default_value("IN"),
        )
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("ADDRESS")
                .help("Local recursive resolver (repeatable)")
                .value_parser(value_parser!(IpAddr))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Destination port for all queries")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("key-file")
                .short('k')
                .long("key-file")
                .value_name("FILE")
                .help("File with trusted DNSKEY or DS records (repeatable)")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("root-anchor")
                .short('r')
                .long("root-anchor")
                .help("Trust the built-in root key")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ipv4")
                .short('4')
                .help("Only contact servers over IPv4")
                .action(ArgAction::SetTrue)
                .conflicts_with("ipv6"),
        )
        .arg(
            Arg::new("ipv6")
                .short('6')
                .help("Only contact servers over IPv6")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tcp")
                .short('t')
                .long("tcp")
                .help("Use TCP for every query")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Verbose logging on stderr")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Per-query timeout")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("COUNT")
                .help("Retries per server")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the collected trace as JSON")
                .action(ArgAction::SetTrue),
        )
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_from_args(matches: &clap::ArgMatches) -> Result<TraceConfig> {
    let mut config = TraceConfig::from_env()?;

    if let Some(servers) = matches.get_many::<IpAddr>("server") {
        config.local_servers = servers.copied().collect();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.timeout = Duration::from_secs(*secs);
    }
    if let Some(retries) = matches.get_one::<u8>("retries") {
        config.retries = *retries;
    }
    if matches.get_flag("ipv4") {
        config.ip_family = IpFamily::V4Only;
    } else if matches.get_flag("ipv6") {
        config.ip_family = IpFamily::V6Only;
    }
    if matches.get_flag("tcp") {
        config.use_tcp = true;
    }
    config.debug = matches.get_flag("debug");

    config.validate()?;
    Ok(config)
}

fn query_from_args(matches: &clap::ArgMatches) -> Result<TraceQuery> {
    let parse_error = |e: String| ConfigError::ParseError(e);

    let name: DomainName = matches
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or(".")
        .parse()?;
    let qtype: DNSResourceType = matches
        .get_one::<String>("type")
        .map(String::as_str)
        .unwrap_or("A")
        .parse()
        .map_err(parse_error)?;
    let qclass: DNSResourceClass = matches
        .get_one::<String>("class")
        .map(String::as_str)
        .unwrap_or("IN")
        .parse()
        .map_err(parse_error)?;

    Ok(TraceQuery::new(name, qtype, qclass))
}

async fn run(matches: &clap::ArgMatches) -> Result<()> {
    let config = config_from_args(matches)?;
    let query = query_from_args(matches)?;
    debug!("Configuration: {:?}", config);

    let mut local = StubResolver::new(config.resolver_settings());
    local.push_servers(&config.local_servers)?;

    let mut trusted = Vec::new();
    if let Some(files) = matches.get_many::<PathBuf>("key-file") {
        for file in files {
            trusted.extend(load_trusted_keys(file)?);
        }
    }
    if matches.get_flag("root-anchor") {
        trusted.extend(root_trust_anchors());
    }

    let mut engine = TraceEngine::new(RootHints::default());
    if !trusted.is_empty() {
        engine = engine.with_verifier(Box::new(DsMatchAnnotator));
    }

    if matches.get_flag("json") {
        let report = engine
            .trace(&local, &query, &trusted, &mut SilentReporter)
            .await?;
        println!("{}", render_json(&report)?);
    } else {
        let mut reporter = TextReporter::stdout();
        engine.trace(&local, &query, &trusted, &mut reporter).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("debug"));

    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("securetrace: {}", e);
            ExitCode::FAILURE
        }
    }
}
