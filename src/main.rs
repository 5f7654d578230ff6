use synthcap::builder::CaptureFileBuilder;
use synthcap::config::{self, Config};
use synthcap::error::{Error, Result};
use synthcap::export;
use synthcap::hosts::HostPool;
use synthcap::pcap::GLOBAL_HEADER_LEN;
use synthcap::schedule::{self, FilePlan};
use synthcap::stats::{self, Stats};
use synthcap::temporal;
mod cmd;

use std::fs;
use std::panic;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use rand_core::{OsRng, RngCore, SeedableRng};
use rand_pcg::Pcg32;

const CHANNEL_SIZE: usize = 50;

fn main() {
    let args = cmd::Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let result = match args.command {
        cmd::Command::CreatePcaps(params) => create_pcaps(params),
        cmd::Command::Profile { weekend } => profile(weekend),
    };
    if let Err(e) = result {
        log::error!("{e}");
        process::exit(1);
    }
}

/// Log the duration scalar every half hour
fn profile(weekend: bool) -> Result<()> {
    log::info!(
        "Duration scalar on {}",
        if weekend { "weekends" } else { "weekdays" }
    );
    for half_hours in 0..48 {
        let hour = half_hours as f64 / 2.;
        log::info!(
            "At {:02}:{:02}: {:.3}",
            half_hours / 2,
            (half_hours % 2) * 30,
            temporal::duration_scalar(hour, weekend)?
        );
    }
    Ok(())
}

fn parse_duration(s: &str) -> Result<u64> {
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| Error::Configuration(format!("cannot parse duration \"{s}\": {e}")))
}

fn local_offset(epoch_seconds: u64) -> Result<FixedOffset> {
    let date = i64::try_from(epoch_seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| Error::Configuration(format!("timestamp {epoch_seconds} is out of range")))?
        .naive_utc();
    Ok(chrono::Local.offset_from_utc_datetime(&date).fix())
}

/// Resolve the start time and the UTC offset of the series.
///
/// A Unix timestamp is used as is. A date is read as a local time, so it is
/// shifted by the offset. Without a start time, the series starts now.
fn resolve_start(start_time: Option<&str>, config: &Config) -> Result<(u64, FixedOffset)> {
    let (naive_ts, is_local_date) = match start_time {
        Some(s) => {
            if let Ok(d) = humantime::parse_rfc3339_weak(s) {
                let secs = d
                    .duration_since(UNIX_EPOCH)
                    .map_err(|_| Error::Configuration(format!("start time {s} is before 1970")))?
                    .as_secs();
                (secs, true)
            } else if let Ok(n) = s.parse::<u64>() {
                (n, false)
            } else {
                return Err(Error::Configuration(format!(
                    "cannot parse start time \"{s}\""
                )));
            }
        }
        None => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| Error::Configuration("system clock is before 1970".into()))?
                .as_secs();
            log::info!("No start time given, starting now ({now})");
            (now, false)
        }
    };
    let offset = match config.utc_offset()? {
        Some(offset) => offset,
        None => local_offset(naive_ts)?,
    };
    log::info!("Using UTC{offset} for the time of day");
    let start = if is_local_date {
        let shifted = naive_ts as i64 - offset.local_minus_utc() as i64;
        u64::try_from(shifted)
            .map_err(|_| Error::Configuration("start time is before 1970".into()))?
    } else {
        naive_ts
    };
    Ok((start, offset))
}

fn create_pcaps(params: cmd::CreatePcapsArgs) -> Result<()> {
    let config = match &params.config {
        Some(path) => config::import_config(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    let builder = CaptureFileBuilder::new(config.settings()?);
    // fail before spawning anything
    builder.packet_budget(params.max_size)?;

    let min_duration = parse_duration(&params.min_duration)?;
    let max_duration = parse_duration(&params.max_duration)?;
    let (start, offset) = resolve_start(params.start_time.as_deref(), &config)?;

    let seed = params.seed.unwrap_or_else(|| OsRng.next_u64());
    log::info!("Generating with seed {seed}");
    let mut rng = Pcg32::seed_from_u64(seed);

    let hosts = HostPool::with_prefix(
        params.internal_hosts.unwrap_or(config.internal_hosts()),
        params.external_hosts.unwrap_or(config.external_hosts()),
        config.internal_prefix(),
        &mut rng,
    )?;
    let plans = schedule::plan_series(
        start,
        params.file_count,
        min_duration,
        max_duration,
        &params.outfile,
        offset,
        &mut rng,
    )?;

    let jobs = params
        .jobs
        .unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get() / 2)
                .unwrap_or(1)
        })
        .clamp(1, plans.len());
    log::info!("Creating {} files with {jobs} workers", plans.len());

    run(
        plans,
        Worker {
            builder,
            hosts,
            max_size: params.max_size,
            streaming: params.streaming,
        },
        jobs,
    )
}

/// Everything needed to build and export files. Each worker thread owns a
/// copy.
#[derive(Clone)]
struct Worker {
    builder: CaptureFileBuilder,
    hosts: HostPool,
    max_size: u64,
    streaming: bool,
}

impl Worker {
    fn export(&self, plan: &FilePlan) -> Result<(u64, u64)> {
        let mut rng = Pcg32::seed_from_u64(plan.seed);
        let request = plan.request(self.max_size);
        let path = plan.path.as_path();
        if self.streaming {
            let count = export::build_to_file(path, &self.builder, &request, &self.hosts, &mut rng)?;
            Ok((
                count,
                GLOBAL_HEADER_LEN as u64 + count * self.builder.per_packet_size(),
            ))
        } else {
            let capture = self.builder.build(&request, &self.hosts, &mut rng)?;
            export::write_capture(path, &capture)?;
            Ok((capture.packet_count, capture.len() as u64))
        }
    }

    fn run(self, rx: Receiver<FilePlan>, stats: Arc<Stats>) -> Result<()> {
        while let Ok(plan) = rx.recv() {
            if stats.should_stop() {
                log::debug!("Skipping {}", plan.path.display());
                continue;
            }
            match self.export(&plan) {
                Ok((packets, bytes)) => {
                    log::info!(
                        "{}: {packets} packets over {}s",
                        plan.path.display(),
                        plan.duration
                    );
                    stats.increase(packets, bytes);
                }
                Err(e) => {
                    // the other workers finish their current file and stop
                    stats.stop_early();
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

fn run(plans: Vec<FilePlan>, worker: Worker, jobs: usize) -> Result<()> {
    let stats = Arc::new(Stats::new(plans.len() as u64));

    // Handle ctrl+C
    let stats_ctrlc = Arc::clone(&stats);
    if let Err(e) = ctrlc::set_handler(move || {
        if !stats_ctrlc.should_stop() {
            log::warn!("Finishing the files in progress, please wait");
            stats_ctrlc.stop_early();
        } else {
            log::warn!("Ending immediately");
            process::exit(1);
        }
    }) {
        log::warn!("Cannot set the Ctrl-C handler: {e}");
    }

    let monitor = {
        let stats = Arc::clone(&stats);
        thread::Builder::new()
            .name("Monitoring".into())
            .spawn(move || stats::run(stats))?
    };

    let mut workers = vec![];
    // block to automatically drop the channel before the joins
    {
        let (tx, rx) = bounded::<FilePlan>(CHANNEL_SIZE);
        for i in 0..jobs {
            let rx = rx.clone();
            let worker = worker.clone();
            let stats = Arc::clone(&stats);
            let builder = thread::Builder::new().name(format!("Worker-{i}"));
            workers.push(builder.spawn(move || worker.run(rx, stats))?);
        }
        // sending fails once every worker has returned
        drop(rx);
        for plan in plans {
            if stats.should_stop() || tx.send(plan).is_err() {
                break;
            }
        }
    }

    let mut result = Ok(());
    for w in workers {
        match w.join() {
            Ok(r) => result = result.and(r),
            Err(e) => panic::resume_unwind(e),
        }
    }
    stats.finish();
    if let Err(e) = monitor.join() {
        panic::resume_unwind(e);
    }
    stats.log_progress();
    result
}
