use std::time::Duration;

use clap::{App, Arg, ArgMatches, ErrorKind};
use failure::{err_msg, Error};

use crate::analyzer::endpoints::EndpointConfig;
use crate::dispatcher::Credentials;
use crate::filter;
use crate::log_parser::log_format::{DEFAULT_LOG_FORMAT, DEFAULT_TIME_FORMAT};
use crate::scheduler::{PacingConfig, PacingMode};

#[derive(PartialEq, Debug)]
pub struct ReplayArgs {
    pub filename: String,
    pub prefix: String,
    pub output: String,
    pub summary: Option<String>,
    pub prometheus_file: Option<String>,
    pub log_format: String,
    pub time_format: String,
    pub conditions: filter::FilterConditions,
    pub pacing: PacingConfig,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub endpoints: Option<EndpointConfig>,
    pub quiet: bool,
}

fn values(app: &ArgMatches, name: &str) -> Option<Vec<String>> {
    app.values_of(name)
        .map(|values| values.map(|v| v.to_string()).collect())
}

fn parse_number<T: std::str::FromStr>(app: &ArgMatches, name: &str, default: T) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    match app.value_of(name) {
        Some(value) => value
            .parse()
            .map_err(|err| err_msg(format!("--{} must be numeric ({})", name, err))),
        None => Ok(default),
    }
}

fn parse_rewrites(app: &ArgMatches) -> Result<Vec<(String, String)>, Error> {
    let mut rewrites = Vec::new();

    for rewrite in values(app, "replace-param").unwrap_or_default() {
        match rewrite.find('=') {
            Some(index) if index > 0 => rewrites.push((
                rewrite[..index].to_string(),
                rewrite[index + 1..].to_string(),
            )),
            _ => {
                return Err(err_msg(format!(
                    "--replace-param must look like KEY=VALUE ({})",
                    rewrite
                )))
            }
        }
    }

    Ok(rewrites)
}

pub fn parse_args<T>(args: T) -> Result<ReplayArgs, Error>
where
    T: IntoIterator<Item = String>,
{
    let app = App::new("Access Log Replayer")
        .author(crate_authors!())
        .version(crate_version!())
        .after_help(crate_description!())
        .arg(
            Arg::with_name("filename")
                .index(1)
                .value_name("FILE")
                .required(true)
                .help("Access log to replay, may be gzipped")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("prefix")
                .value_name("URL")
                .long("prefix")
                .required(true)
                .help("Target to replay against, e.g. 'https://staging.example.com'")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .value_name("FILE")
                .short("o")
                .long("output")
                .help("Write one result line per replayed request to this file")
                .takes_value(true)
                .default_value("replay-results.log"),
        )
        .arg(
            Arg::with_name("summary")
                .value_name("FILE")
                .long("summary")
                .help("Also write a condensed report to this file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("prometheus-file")
                .value_name("FILE")
                .long("prometheus-file")
                .help("Write the final statistics in Prometheus text format to this file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-format")
                .value_name("FORMAT")
                .long("log-format")
                .help("nginx log_format the access log was written with")
                .takes_value(true)
                .default_value(DEFAULT_LOG_FORMAT),
        )
        .arg(
            Arg::with_name("time-format")
                .value_name("FORMAT")
                .long("time-format")
                .help("strftime format of $time_local")
                .takes_value(true)
                .default_value(DEFAULT_TIME_FORMAT),
        )
        .arg(
            Arg::with_name("start-timestamp")
                .value_name("MILLISECONDS")
                .long("start-timestamp")
                .help("Only replay requests logged after this epoch timestamp")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("only")
                .value_name("TERM")
                .long("only")
                .help("Only replay requests whose request line contains one of these terms")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("skip")
                .value_name("TERM")
                .long("skip")
                .help("Skip requests whose request line contains one of these terms")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("replace-param")
                .value_name("KEY=VALUE")
                .long("replace-param")
                .help("Replace (or add) this query parameter in every replayed URL")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("ratio")
                .value_name("RATIO")
                .short("r")
                .long("ratio")
                .help("Replay speed, 2 replays twice as fast as recorded")
                .takes_value(true),
        )
        .arg(Arg::with_name("scale").long("scale").help(
            "Spread requests logged in the same second evenly across that second",
        ))
        .arg(
            Arg::with_name("skip-sleep")
                .long("skip-sleep")
                .help("Send requests back to back without pacing"),
        )
        .arg(
            Arg::with_name("username")
                .value_name("USERNAME")
                .long("username")
                .help("Basic auth user, replaces recorded authorization headers")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("password")
                .value_name("PASSWORD")
                .long("password")
                .requires("username")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .value_name("SECONDS")
                .long("timeout")
                .help("Per request timeout")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("insecure")
                .short("k")
                .long("insecure")
                .help("Do not verify TLS certificates of the target"),
        )
        .arg(
            Arg::with_name("count-endpoints")
                .long("count-endpoints")
                .help("Report how often every endpoint was replayed"),
        )
        .arg(
            Arg::with_name("endpoint-path-only")
                .long("endpoint-path-only")
                .help("Count endpoints by path, ignoring the query"),
        )
        .arg(
            Arg::with_name("strip-query-key")
                .value_name("KEY")
                .long("strip-query-key")
                .help("Ignore this query parameter when counting endpoints")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("endpoint-threshold")
                .value_name("COUNT")
                .long("endpoint-threshold")
                .help("Only list endpoints hit more often than this")
                .takes_value(true),
        )
        .arg(Arg::with_name("quiet").short("q").long("quiet").help(
            "Don't output the report to stdout",
        ))
        .get_matches_from_safe(args)
        .map_err(|err| match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => err.exit(),
            _ => err_msg(err.message),
        })?;

    let ratio: f64 = parse_number(&app, "ratio", 1.0)?;
    if !(ratio > 0.0) {
        return Err(err_msg("--ratio must be greater than 0"));
    }

    let pacing = PacingConfig {
        mode: if app.is_present("scale") {
            PacingMode::Scale
        } else {
            PacingMode::Normal
        },
        ratio,
        skip_sleep: app.is_present("skip-sleep"),
    };

    let conditions = filter::FilterConditions {
        include_terms: values(&app, "only"),
        exclude_terms: values(&app, "skip"),
        start_timestamp: parse_number(&app, "start-timestamp", 0)?,
        param_rewrites: parse_rewrites(&app)?,
    };

    let credentials = app.value_of("username").map(|username| Credentials {
        username: username.to_string(),
        password: app.value_of("password").map(String::from),
    });

    let endpoints = if app.is_present("count-endpoints") {
        Some(EndpointConfig {
            path_only: app.is_present("endpoint-path-only"),
            strip_keys: values(&app, "strip-query-key").unwrap_or_default(),
            threshold: parse_number(&app, "endpoint-threshold", 1)?,
        })
    } else {
        None
    };

    Ok(ReplayArgs {
        filename: app.value_of("filename").unwrap_or_default().to_string(),
        prefix: app
            .value_of("prefix")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string(),
        output: app.value_of("output").unwrap_or_default().to_string(),
        summary: app.value_of("summary").map(String::from),
        prometheus_file: app.value_of("prometheus-file").map(String::from),
        log_format: app.value_of("log-format").unwrap_or(DEFAULT_LOG_FORMAT).to_string(),
        time_format: app.value_of("time-format").unwrap_or(DEFAULT_TIME_FORMAT).to_string(),
        conditions,
        pacing,
        credentials,
        timeout: Duration::from_secs(parse_number(&app, "timeout", 60)?),
        verify_tls: !app.is_present("insecure"),
        endpoints,
        quiet: app.is_present("quiet"),
    })
}
