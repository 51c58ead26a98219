//! `stator run`: concurrent producers against one counter store.
//!
//! Every producer issues `--sets` mutations; every third one returns an
//! equal snapshot and must not reach any subscriber. Subscribers record
//! the totals they observe until they see the final one, so each recorded
//! sequence is checked for strict commit order.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stator_core::{Store, StoreConfig, Subscription};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

// ── State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Tally {
    total: usize,
    per_producer: Vec<usize>,
}

impl Tally {
    fn new(producers: usize) -> Self {
        Self {
            total: 0,
            per_producer: vec![0; producers],
        }
    }

    fn bump(&self, producer: usize) -> Self {
        let mut next = self.clone();
        next.total += 1;
        if let Some(count) = next.per_producer.get_mut(producer) {
            *count += 1;
        }
        next
    }
}

fn is_noop(step: usize) -> bool {
    step % 3 == 2
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
struct SubscriberReport {
    #[tabled(rename = "Subscriber")]
    id: usize,
    #[tabled(rename = "Slow")]
    slow: bool,
    #[tabled(rename = "Received")]
    received: usize,
    #[tabled(rename = "First")]
    first: usize,
    #[tabled(rename = "Last")]
    last: usize,
    #[tabled(rename = "In order")]
    strictly_increasing: bool,
}

impl SubscriberReport {
    fn new(id: usize, slow: bool, seen: &[usize]) -> Self {
        Self {
            id,
            slow,
            received: seen.len(),
            first: seen.first().copied().unwrap_or_default(),
            last: seen.last().copied().unwrap_or_default(),
            strictly_increasing: seen.windows(2).all(|w| w[0] < w[1]),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    config: StoreConfig,
    producers: usize,
    sets_per_producer: usize,
    expected_total: usize,
    final_state: Tally,
    commits: u64,
    subscribers: Vec<SubscriberReport>,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl RunReport {
    fn summary_rows(&self) -> Vec<SummaryRow> {
        let row = |field, value: String| SummaryRow { field, value };
        vec![
            row("mode", self.config.mode.to_string()),
            row("overflow", self.config.overflow.to_string()),
            row("expected total", self.expected_total.to_string()),
            row("final total", self.final_state.total.to_string()),
            row("commits", self.commits.to_string()),
            row("per producer", format!("{:?}", self.final_state.per_producer)),
        ]
    }

    fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        let subscribers = output::render(format, self, &self.subscribers)?;
        if format == OutputFormat::Json {
            return Ok(subscribers);
        }
        Ok(format!(
            "{subscribers}\n{}",
            output::render_table(&self.summary_rows())
        ))
    }
}

// ── Tasks ───────────────────────────────────────────────────────────

async fn produce(store: Store<Tally>, id: usize, sets: usize) {
    for step in 0..sets {
        if is_noop(step) {
            store.set(|s: &Tally| s.clone());
        } else {
            store.set(move |s: &Tally| s.bump(id));
        }
        if step % 8 == 7 {
            tokio::task::yield_now().await;
        }
    }
    debug!(producer = id, sets, "producer finished");
}

fn observe(
    mut sub: Subscription<Tally>,
    target: usize,
    delay: Option<Duration>,
) -> JoinHandle<Vec<usize>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(snap) = sub.next_snapshot().await {
            seen.push(snap.total);
            if snap.total >= target {
                break;
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        seen
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.producers == 0 {
        return Err(CliError::Validation {
            field: "producers".into(),
            reason: "must be at least 1".into(),
        });
    }

    let mut config = super::load_config(global)?;
    if let Some(policy) = args.overflow {
        config.overflow = policy;
    }
    if args.deterministic {
        config.mode = stator_core::SchedulingMode::Deterministic;
    }

    let scope = CancellationToken::new();
    let store = Store::builder(Tally::new(args.producers))
        .config(config.clone())
        .build(&scope)?;

    let applied = (0..args.sets).filter(|step| !is_noop(*step)).count();
    let expected_total = applied * args.producers;
    info!(
        mode = %config.mode,
        overflow = %config.overflow,
        producers = args.producers,
        sets = args.sets,
        subscribers = args.subscribers,
        "starting run"
    );

    let slow = (args.slow_ms > 0).then(|| Duration::from_millis(args.slow_ms));
    let observers: Vec<_> = (0..args.subscribers)
        .map(|id| {
            let delay = if id == 0 { slow } else { None };
            observe(store.subscribe(), expected_total, delay)
        })
        .collect();

    if config.is_deterministic() {
        for id in 0..args.producers {
            produce(store.clone(), id, args.sets).await;
        }
    } else {
        let producers: Vec<_> = (0..args.producers)
            .map(|id| tokio::spawn(produce(store.clone(), id, args.sets)))
            .collect();
        for producer in producers {
            producer.await?;
        }
    }

    let final_state = store.with_state(Tally::clone).await?;
    let mut subscribers = Vec::with_capacity(observers.len());
    for (id, observer) in observers.into_iter().enumerate() {
        let seen = observer.await?;
        subscribers.push(SubscriberReport::new(id, id == 0 && slow.is_some(), &seen));
    }

    let commits = store.version();
    store.shutdown().await;
    info!(commits, "run finished");

    let report = RunReport {
        config,
        producers: args.producers,
        sets_per_producer: args.sets,
        expected_total,
        final_state,
        commits,
        subscribers,
    };
    output::print_output(&report.render(global.output)?);
    Ok(())
}
