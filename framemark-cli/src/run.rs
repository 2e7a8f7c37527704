//! The `framemark run` subcommand: configure, drive, and report one suite.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::*;
use framemark_runtime::{
    run_suite, KvStore, MonotonicClock, NullObserver, Observer, Record, RecordSink, SessionSource,
    StatusLine, SuiteConfig, SuiteContext, SuiteDeps, SuiteMeta, SurfaceSelection,
};

use crate::env_meta;
use crate::output;
use crate::progress::RunProgress;
use crate::store::{FilePinStore, FileSink, StdoutSink};
use crate::synthetic::{SyntheticAssets, SyntheticRenderer, SyntheticSessionSource};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Config file; defaults to framemark.toml when present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Surface to measure: windowed, immersive, or combined
    #[arg(long)]
    pub surface: Option<String>,

    /// Reported backend name for the synthetic renderer, e.g. gl or wgpu
    #[arg(long)]
    pub backend: Option<String>,

    /// Comma-separated instance counts, e.g. 100,1000,5000
    #[arg(long)]
    pub instances: Option<String>,

    /// Trials per instance count
    #[arg(long)]
    pub trials: Option<u32>,

    /// Measured window length per trial, in milliseconds
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Warmup length per trial, in milliseconds
    #[arg(long)]
    pub warmup_ms: Option<u64>,

    /// Shuffle the condition order
    #[arg(long)]
    pub shuffle: bool,

    /// Shuffle seed; 0 selects the built-in golden seed
    #[arg(long)]
    pub seed: Option<u32>,

    /// Collect renderer perf counters after each trial
    #[arg(long)]
    pub collect_perf: bool,

    /// Embed raw per-frame sample arrays in records
    #[arg(long)]
    pub raw_samples: bool,

    /// Deliver this many views per immersive frame; exceeding the configured
    /// maximum demonstrates the comparability guard
    #[arg(long)]
    pub force_views: Option<u32>,

    /// Records destination; `-` streams NDJSON to stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Suite id stamped into every record
    #[arg(long)]
    pub suite_id: Option<String>,

    /// Suppress progress display and per-trial output
    #[arg(long)]
    pub quiet: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SuiteConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SuiteConfig::load(),
    };
    apply_overrides(&mut config, args)?;
    execute(config, args)
}

/// CLI flags sit above the file and env layers. Unlike env overrides, a
/// flag that does not parse is a hard error.
fn apply_overrides(config: &mut SuiteConfig, args: &RunArgs) -> Result<()> {
    if let Some(surface) = &args.surface {
        config.surface = match surface.as_str() {
            "windowed" => SurfaceSelection::Windowed,
            "immersive" => SurfaceSelection::Immersive,
            "combined" => SurfaceSelection::Combined,
            other => bail!(
                "unknown surface '{}': expected windowed, immersive, or combined",
                other
            ),
        };
    }

    if let Some(instances) = &args.instances {
        let counts = instances
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .with_context(|| format!("bad instance count '{}'", part.trim()))
            })
            .collect::<Result<Vec<u32>>>()?;
        config.plan.instance_counts = counts;
    }

    if let Some(trials) = args.trials {
        config.plan.trials = trials;
    }
    if let Some(duration) = args.duration_ms {
        config.timing.duration_ms = duration;
    }
    if let Some(warmup) = args.warmup_ms {
        config.timing.warmup_ms = warmup;
    }
    if args.shuffle {
        config.plan.shuffle = true;
    }
    if let Some(seed) = args.seed {
        config.plan.seed = seed;
    }
    if args.collect_perf {
        config.perf.collect = true;
    }
    if args.raw_samples {
        config.perf.include_raw_samples = true;
    }

    if let Some(path) = &args.output {
        if path.as_os_str() == "-" {
            config.output.to_stdout = true;
        } else {
            let Some(file) = path.file_name() else {
                bail!("--output needs a file path, got '{}'", path.display());
            };
            config.output.records_file = file.to_string_lossy().into_owned();
            config.output.dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            config.output.to_stdout = false;
        }
    }

    Ok(())
}

/// Drive one suite on the synthetic backend and report the outcome.
///
/// Exit code 2 marks a run whose records include an abort; the stream on
/// disk is still valid and flushed.
pub fn execute(config: SuiteConfig, args: &RunArgs) -> Result<()> {
    let suite_id = args
        .suite_id
        .clone()
        .unwrap_or_else(|| format!("fm-{}", Utc::now().format("%Y%m%d-%H%M%S")));

    let backend = args.backend.as_deref().unwrap_or("synthetic");
    let mut renderer = SyntheticRenderer::named(backend);
    let mut assets = SyntheticAssets;
    let mut session_source = SyntheticSessionSource::new();
    if let Some(views) = args.force_views {
        session_source.views = views;
    }
    let mut pin_store = FilePinStore::new(config.output.dir.join("pins.json"));
    let clock = MonotonicClock::new();

    let mut meta = SuiteMeta::stamped(backend, config.scene.model_url.clone(), suite_id);
    meta.env = env_meta::collect();

    let records_to_stdout = config.output.to_stdout;
    let records_path = config.output.dir.join(&config.output.records_file);
    let mut sink: Box<dyn RecordSink> = if records_to_stdout {
        Box::new(StdoutSink)
    } else {
        Box::new(FileSink::new(records_path.clone()))
    };

    // Progress bar on a tty, status lines otherwise, nothing when quiet.
    let mut observer: Box<dyn Observer> = if args.quiet {
        Box::new(NullObserver)
    } else {
        let progress = RunProgress::new(false);
        if progress.is_enabled() {
            Box::new(progress)
        } else {
            Box::new(StatusLine::new())
        }
    };

    let needs_session = config.surface.includes_immersive();
    let pin_identity = config.protocol.pin_identity;
    let mut ctx = SuiteContext::new(config, meta).context("invalid configuration")?;

    let started = Instant::now();
    let outcome = {
        let session_source_ref: Option<&mut dyn SessionSource> = if needs_session {
            Some(&mut session_source)
        } else {
            None
        };
        let identity_store_ref: Option<&mut dyn KvStore> = if pin_identity {
            Some(&mut pin_store)
        } else {
            None
        };
        let mut deps = SuiteDeps {
            renderer: &mut renderer,
            assets: &mut assets,
            session_source: session_source_ref,
            identity_store: identity_store_ref,
            sink: sink.as_mut(),
            clock: &clock,
            observer: observer.as_mut(),
        };
        run_suite(&mut ctx, &mut deps).context("suite run failed")?
    };
    // Clear any live progress bar before printing result lines.
    drop(observer);

    if !records_to_stdout && !args.quiet {
        for record in ctx.log.records() {
            match record {
                Record::Trial(trial) => output::print_trial_line(trial),
                Record::Abort(abort) => output::print_abort_line(abort),
            }
        }
        output::print_suite_summary(&outcome, started.elapsed());
        println!("{} {}", "Records:".dimmed(), records_path.display());
    }

    if outcome.aborted.is_some() {
        std::process::exit(2);
    }
    Ok(())
}
