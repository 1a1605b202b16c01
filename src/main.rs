//! Zimbra SOAP command line client.
//!
//! Run with: `zimbra-soap --server mail.example.com --user admin@example.com --password secret GetAccount --arg account=user@example.com`

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zimbra_soap::{
    parse_attributes, Arguments, CallOptions, ClientConfig, Element, Endpoint, ZimbraClient,
};

/// Call an operation on a Zimbra SOAP endpoint.
///
/// The operation name may omit the `Request` suffix. Arguments given with
/// `--arg` become child elements of the request; `--body` reads a YAML
/// argument tree where mappings with a `value` key carry attributes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host name or full SOAP URL
    #[arg(short, long)]
    server: Option<String>,

    /// SOAP interface to use
    #[arg(short, long, value_enum)]
    endpoint: Option<EndpointArg>,

    /// Port used when the server is a bare host name
    #[arg(long)]
    port: Option<u16>,

    /// Account name to authenticate as before the call
    #[arg(short, long)]
    user: Option<String>,

    /// Password for --user
    #[arg(short, long)]
    password: Option<String>,

    /// Operation to invoke, e.g. GetAccount or GetAccountRequest
    operation: String,

    /// Attribute on the request element (key=value, repeatable)
    #[arg(long = "attr", value_parser = parse_key_value)]
    attrs: Vec<(String, String)>,

    /// Child element of the request (tag=text, repeatable)
    #[arg(long = "arg", value_parser = parse_key_value)]
    args: Vec<(String, String)>,

    /// YAML file holding the request argument tree
    #[arg(long)]
    body: Option<PathBuf>,

    /// Do not append the Request suffix
    #[arg(long)]
    no_suffix: bool,

    /// Print attribute records instead of the raw response
    #[arg(long)]
    attributes: bool,

    /// Log full request and response documents
    #[arg(long)]
    trace: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EndpointArg {
    Admin,
    Mail,
}

impl From<EndpointArg> for Endpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::Admin => Endpoint::Admin,
            EndpointArg::Mail => Endpoint::Mail,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let mut log_level = args.log_level.parse().unwrap_or(Level::WARN);
    if args.trace && log_level < Level::DEBUG {
        log_level = Level::DEBUG;
    }
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = load_config(&args)?;
    info!(
        location = %config.location(),
        namespace = config.namespace(),
        "Configuration loaded"
    );

    let mut client = ZimbraClient::new(&config).context("Failed to create client")?;

    if let Some((user, password)) = credentials(&args)? {
        client
            .auth_with_password(user, password)
            .context("Authentication failed")?;
    }

    let options = call_options(&args)?;
    let response = client
        .call(&args.operation, options)
        .with_context(|| format!("{} failed", args.operation))?;

    if args.attributes {
        print!("{}", serde_yaml::to_string(&attribute_report(&response))?);
    } else {
        println!("{}", response.to_xml()?);
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match args.config {
        Some(ref path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(ref server) = args.server {
        config.server = server.clone();
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint.into();
    }
    if args.port.is_some() {
        config.port = args.port;
    }
    config.trace |= args.trace;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Account and password to authenticate with, if any. Both or neither must be given.
fn credentials(args: &Args) -> Result<Option<(&str, &str)>> {
    match (&args.user, &args.password) {
        (Some(user), Some(password)) => Ok(Some((user.as_str(), password.as_str()))),
        (Some(_), None) => bail!("--user requires --password"),
        (None, Some(_)) => bail!("--password requires --user"),
        (None, None) => Ok(None),
    }
}

fn call_options(args: &Args) -> Result<CallOptions> {
    let mut body = match args.body {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Arguments::from_yaml_str(&content).context("Failed to parse request body")?
        }
        None => Arguments::new(),
    };
    for (tag, text) in &args.args {
        body.insert(tag.as_str(), text.as_str());
    }

    let mut options = CallOptions::new().body(body);
    for (key, value) in &args.attrs {
        options = options.attr(key.as_str(), value);
    }
    if args.no_suffix {
        options = options.suppress_suffix();
    }
    Ok(options)
}

/// Attribute records of the response and of each of its direct children.
fn attribute_report(response: &Element) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    let mut report = BTreeMap::new();
    for element in std::iter::once(response).chain(response.children()) {
        let attrs = parse_attributes(element.children());
        if attrs.is_empty() {
            continue;
        }
        let key = match element.attr("name") {
            Some(name) => format!("{}[{}]", element.name(), name),
            None => element.name().to_string(),
        };
        report.insert(key, attrs.into_iter().collect());
    }
    report
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}
