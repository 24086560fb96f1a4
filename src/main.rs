#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use failure::{err_msg, Error};

mod analyzer;
mod args;
mod classifier;
mod dispatcher;
mod filter;
mod log_parser;
mod render;
mod replay;
mod result;
mod scheduler;

use crate::analyzer::ReplayAnalyzer;
use crate::dispatcher::transport::HttpTransport;
use crate::dispatcher::{DispatchConfig, Dispatcher, RetryPolicy};
use crate::filter::ReplayEvent;
use crate::log_parser::log_format::LogFormat;
use crate::render::Renderer;
use crate::replay::{Replayer, RunStatus};
use crate::scheduler::{Pacer, Sleeper};

fn same_path(a: &str, b: &str) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => Path::new(a) == Path::new(b),
    }
}

fn render_reports(args: &args::ReplayArgs, result: &result::ReplayResult) -> Result<(), Error> {
    if !args.quiet {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        render::terminal::TerminalRenderer::new(&mut stdout).render(result)?;
        stdout.flush()?;
    }

    if let Some(ref summary) = args.summary {
        let mut summary_file = BufWriter::new(File::create(summary)?);
        render::condensed::CondensedRenderer::new(&mut summary_file).render(result)?;
    }

    if let Some(ref prometheus_file) = args.prometheus_file {
        let mut renderer = render::prometheus::PrometheusRenderer::new()?;
        renderer.render(result)?;
        fs::write(prometheus_file, &renderer.buffer)?;
    }

    Ok(())
}

fn load_events(args: &args::ReplayArgs) -> Result<Vec<ReplayEvent>, Error> {
    let format = LogFormat::new(&args.log_format)?;
    let input = log_parser::open_logfile(&args.filename)?;
    let records = log_parser::parse(input, &format, &args.time_format);

    Ok(filter::build_events(records, &args.conditions))
}

/// The final report when filtering left nothing to send.
fn report_without_replay(
    events: &[ReplayEvent],
    analyzer: &ReplayAnalyzer,
) -> Option<result::ReplayResult> {
    if !events.is_empty() {
        return None;
    }

    info!("no logs to replay");
    Some(analyzer.result(Duration::from_secs(0)))
}

fn run(args: args::ReplayArgs) -> Result<(), Error> {
    if same_path(&args.filename, &args.output) {
        return Err(err_msg(format!(
            "Output {} would overwrite the log file that is replayed",
            args.output
        )));
    }

    let events = load_events(&args)?;
    let mut analyzer = ReplayAnalyzer::new(&events, args.pacing.ratio, args.endpoints.clone());

    if let Some(result) = report_without_replay(&events, &analyzer) {
        return render_reports(&args, &result);
    }

    info!(
        "Replaying {} requests against {} at ratio {}",
        events.len(),
        args.prefix,
        args.pacing.ratio
    );

    let (interrupt_sender, interrupt_receiver) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_sender.send(());
    })?;

    let transport = HttpTransport::new(args.timeout, args.verify_tls)?;
    let dispatcher = Dispatcher::new(
        transport,
        DispatchConfig {
            prefix: args.prefix.clone(),
            credentials: args.credentials.clone(),
            retry: RetryPolicy::default(),
        },
    );
    let pacer = Pacer::new(args.pacing.clone(), &events);
    let sleeper = Sleeper::new(interrupt_receiver);
    let mut results = BufWriter::new(File::create(&args.output)?);

    let started = Instant::now();
    let status = {
        let mut replayer = Replayer::new(&dispatcher, &pacer, &sleeper, &mut results);
        replayer.run(&events, &mut analyzer)?
    };
    results.flush()?;

    if status == RunStatus::Interrupted {
        warn!("Interrupted, reporting what was replayed so far");
    }

    render_reports(&args, &analyzer.result(started.elapsed()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match args::parse_args(env::args()) {
        Ok(args) => args,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        error!("{}", err);
        process::exit(1);
    }
}
