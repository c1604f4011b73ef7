use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use keyplot::clustering::ClusterMethod;
use keyplot::config::Config;
use keyplot::db::sqlite::SqliteStore;
use keyplot::interest::volume::VolumeInterest;
use keyplot::keywords::{parse_keyword_line, Keyword, RankMetric};
use keyplot::ledger::Ledger;
use keyplot::pipeline::Pipeline;

/// Keyplot: keyword intent clustering and opportunity tracking.
///
/// Groups candidate SEO keywords by meaning and search intent, labels each
/// group with an audience profile, and tracks which groups are new, growing,
/// shrinking or stale from one run to the next.
#[derive(Parser)]
#[command(name = "keyplot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the snapshot database
    Init,

    /// Cluster keywords, compare with the last run, and record a snapshot
    Cluster {
        /// Comma-separated keywords (e.g. "buy running shoes,best running shoes")
        #[arg(long)]
        keywords: Option<String>,

        /// Keyword file, one `keyword[,volume[,cpc[,competition]]]` per line
        #[arg(long)]
        file: Option<PathBuf>,

        /// Clustering method: threshold, fixed-k (kmeans) or graph
        #[arg(long, default_value = "threshold")]
        method: String,

        /// Number of clusters for fixed-k
        #[arg(long)]
        clusters: Option<usize>,

        /// Similarity threshold for threshold and graph methods (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Seed for fixed-k initialization (rejected for other methods)
        #[arg(long)]
        seed: Option<u64>,

        /// Keywords to show per cluster (default: 5)
        #[arg(long, default_value = "5")]
        top_n: usize,

        /// Metric for ranking keywords inside a cluster: interest, volume, cpc, competition
        #[arg(long, default_value = "interest")]
        metric: String,

        /// Interest table, one `keyword,value` per line (overrides the trend endpoint)
        #[arg(long)]
        interest_file: Option<PathBuf>,

        /// Compare against a previous JSON export instead of the latest stored snapshot
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Write the run result as JSON
        #[arg(long)]
        export: Option<PathBuf>,

        /// Compare but don't record the snapshot
        #[arg(long)]
        dry_run: bool,

        /// Cluster all keywords together instead of per intent
        #[arg(long)]
        no_intent_split: bool,
    },

    /// Compare the latest snapshot with the one before it
    Opportunities,

    /// List recorded snapshots
    History {
        /// Number of snapshots to show (default: 10)
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Show one cluster's interest across snapshots instead
        #[arg(long)]
        cluster: Option<String>,
    },

    /// Show system status (DB stats, latest run)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keyplot=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing keyplot database...");
            let config = Config::load()?;
            let conn = keyplot::db::initialize(&config.db_path)?;
            let table_count = keyplot::db::schema::table_count(&conn)?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: cluster a keyword list, e.g.");
            println!("  keyplot cluster --file keywords.txt");
        }

        Commands::Cluster {
            keywords,
            file,
            method,
            clusters,
            threshold,
            seed,
            top_n,
            metric,
            interest_file,
            previous,
            export,
            dry_run,
            no_intent_split,
        } => {
            let config = Config::load()?;
            config.require_embedder()?;

            let metric = RankMetric::parse(&metric).with_context(|| {
                format!("Unknown metric '{metric}' (expected interest, volume, cpc or competition)")
            })?;

            let method = ClusterMethod::from_name(&method, clusters, threshold)?.with_seed(seed)?;

            let input = load_keywords(keywords.as_deref(), file.as_deref())?;
            if input.is_empty() {
                anyhow::bail!("No keywords given. Use --keywords a,b,c or --file keywords.txt");
            }

            let mut pipeline_config = config.pipeline_config(method)?;
            pipeline_config.split_by_intent = !no_intent_split;
            pipeline_config.persist = !dry_run;
            pipeline_config.show_progress = true;

            let ledger = open_ledger(&config, dry_run)?;
            let mut pipeline = Pipeline::new(pipeline_config, config.build_embedder()?, ledger)?
                .with_fallback(config.build_fallback())
                .with_classifier(config.classifier());

            if let Some(path) = interest_file {
                let table = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let provider = VolumeInterest::from_table(&table);
                println!("Loaded interest for {} keywords from {}", provider.len(), path.display());
                pipeline = pipeline.with_interest(Box::new(provider));
            } else if let Some(provider) = config.build_interest()? {
                pipeline = pipeline.with_interest(provider);
            }

            let previous = match previous {
                Some(path) => Some(keyplot::output::export::read_json(&path)?.snapshot),
                None => None,
            };

            println!("Clustering {} keywords...", input.len());
            let result = pipeline.run(input, previous).await?;

            keyplot::output::terminal::display_run(&result, metric, top_n);

            if let Some(path) = export {
                keyplot::output::export::write_json(&result, &path)?;
                println!("  Exported to {}", path.display());
            }
        }

        Commands::Opportunities => {
            let config = Config::load()?;
            let ledger = open_ledger(&config, false)?;
            let policy = config.pipeline_config(ClusterMethod::default())?.change_policy;

            match ledger.latest_opportunities(&policy).await? {
                Some((latest, previous, records)) => {
                    println!(
                        "Latest snapshot: {}",
                        latest.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    match &previous {
                        Some(p) => println!(
                            "Compared with:   {}",
                            p.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
                        ),
                        None => println!("{}", "No earlier snapshot to compare with.".dimmed()),
                    }
                    println!();
                    keyplot::output::terminal::display_opportunities(&records, previous.is_some());
                }
                None => {
                    println!("No snapshots recorded yet. Run `keyplot cluster` first.");
                }
            }
        }

        Commands::History { limit, cluster } => {
            let config = Config::load()?;
            let ledger = open_ledger(&config, false)?;
            match cluster {
                Some(id) => {
                    let points = ledger.cluster_history(&id).await?;
                    keyplot::output::terminal::display_cluster_trend(&id, &points);
                }
                None => {
                    let summaries = ledger.history(limit).await?;
                    keyplot::output::terminal::display_history(&summaries);
                }
            }
        }

        Commands::Status => {
            let config = Config::load()?;
            let ledger = if Path::new(&config.db_path).exists() {
                Some(open_ledger(&config, false)?)
            } else {
                None
            };
            keyplot::status::show(ledger.as_deref(), &config).await?;
        }
    }

    Ok(())
}

/// Open the snapshot ledger. Dry runs against a missing database use an
/// in-memory store so there is nothing to compare against but nothing fails.
fn open_ledger(config: &Config, dry_run: bool) -> Result<Arc<Ledger>> {
    let store = if dry_run && !Path::new(&config.db_path).exists() {
        info!("No database yet, dry run uses an empty in-memory ledger");
        SqliteStore::in_memory()?
    } else {
        SqliteStore::new(keyplot::db::open(&config.db_path)?)
    };
    Ok(Arc::new(Ledger::new(Arc::new(store))))
}

/// Gather keywords from `--keywords` and `--file`, in that order.
fn load_keywords(inline: Option<&str>, file: Option<&Path>) -> Result<Vec<Keyword>> {
    let mut keywords: Vec<Keyword> = inline
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(Keyword::new)
        .filter(|k| !k.text.is_empty())
        .map(|k| k.with_source("cli"))
        .collect();

    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyword file {}", path.display()))?;
        keywords.extend(contents.lines().filter_map(parse_keyword_line));
    }

    Ok(keywords)
}
