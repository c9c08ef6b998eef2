//! Resistance simulation entry point.
//!
//! Runs one session either headless on a virtual clock with the autopilot
//! playing, or in real time with commands read from stdin.
//!
//! ```text
//! resistance_sim --seed 7 --events run.jsonl
//! resistance_sim --realtime
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use resist_core::autoplay::{run_headless, Autopilot};
use resist_core::config::{default_tuning_toml, Tuning};
use resist_core::economy::EarningKind;
use resist_core::events::JsonlWriter;
use resist_core::narrative::NoopJudge;
use resist_core::rng::SimRng;
use resist_core::runtime::{spawn_session, RuntimeError, SessionHandle};
use resist_core::session::Session;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "resistance_sim")]
#[command(about = "Real-time resistance simulation against an AI city administration")]
struct Args {
    /// Random seed for reproducibility (entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Tuning file in TOML
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Write the event log to this JSONL file
    #[arg(long)]
    events: Option<PathBuf>,

    /// Override the session length in seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Run on the wall clock and read commands from stdin
    #[arg(long)]
    realtime: bool,

    /// Headless only: let the world run without player moves
    #[arg(long)]
    no_autoplay: bool,

    /// Print the default tuning file and exit
    #[arg(long)]
    print_default_tuning: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.print_default_tuning {
        print!("{}", default_tuning_toml());
        return Ok(());
    }

    let mut tuning = match &args.tuning {
        Some(path) => Tuning::from_file(path)?,
        None => Tuning::default(),
    };
    if let Some(secs) = args.duration_secs {
        tuning.session.duration_secs = secs;
        tuning.validate()?;
    }
    info!(
        seed = ?args.seed,
        duration_secs = tuning.session.duration_secs,
        targets = tuning.targets.len(),
        "tuning loaded"
    );

    let rng = match args.seed {
        Some(seed) => SimRng::seeded(seed),
        None => SimRng::from_entropy(),
    };
    let mut session = Session::new(tuning, Box::new(rng));
    if let Some(path) = &args.events {
        session.set_event_sink(JsonlWriter::create(path)?);
    }

    if args.realtime {
        run_realtime(session).await
    } else {
        let autopilot = Autopilot::default();
        let pilot = (!args.no_autoplay).then_some(&autopilot);
        let snapshot = run_headless(&mut session, pilot, |entry| println!("{}", entry));
        session.flush_log()?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}

const HELP: &str = "commands: select <target> | act <action> | sell | crowdfund | status | restart | quit";

async fn run_realtime(session: Session) -> Result<(), Box<dyn Error>> {
    let (handle, actor) = spawn_session(session, Arc::new(NoopJudge));

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(entry) = events.recv().await {
            println!("{}", entry);
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match dispatch(&handle, line.trim()).await {
            Ok(true) => {}
            Ok(false) => break,
            // rejections are already in the event stream
            Err(RuntimeError::Rejected(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;
    let session = actor.await?;
    info!(generation = session.generation(), "session closed");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Runs one stdin command. Returns false on quit.
async fn dispatch(handle: &SessionHandle, line: &str) -> Result<bool, RuntimeError> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (Some("select"), Some(target)) => handle.select_target(target).await?,
        (Some("act"), Some(action)) => {
            handle.perform(action).await?;
        }
        (Some("sell"), None) => {
            handle.sell_collectible().await?;
        }
        (Some("crowdfund"), None) => {
            handle.crowdfund().await?;
        }
        (Some("status"), None) => {
            let snapshot = handle.snapshot().await?;
            let wait = handle
                .earning_cooldown_remaining(EarningKind::Crowdfunding)
                .await?;
            println!(
                "[{}] power {:.0} heat {:.0} currency {} participants {} crowdfunding in {}s",
                snapshot.elapsed,
                snapshot.power,
                snapshot.heat,
                snapshot.currency,
                snapshot.active_participants,
                wait.div_ceil(1000)
            );
            if let Some(outcome) = &snapshot.outcome {
                println!("{}", outcome.message);
            }
        }
        (Some("restart"), None) => handle.restart().await?,
        (Some("quit"), None) | (Some("exit"), None) => return Ok(false),
        (None, _) => {}
        _ => println!("{}", HELP),
    }
    Ok(true)
}
