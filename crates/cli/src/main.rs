use clap::{Parser, Subcommand, ValueEnum};
use navgraph_core::config;
use navgraph_core::diagnostics::HistogramMode;
use navgraph_core::hnsw::{Graph, GraphOptions, Metric, ReadOnlyGraph, SelectionHeuristic};
use navgraph_core::storage::{open_read_only_file, save_snapshot};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod vectors;

#[derive(Parser)]
#[command(name = "navgraph", about = "Build, query and inspect HNSW graph snapshots")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a graph from a vector file and save a snapshot
    Build(BuildArgs),
    /// Run k-NN queries against a snapshot
    Query(QueryArgs),
    /// Print level statistics and degree distribution of a snapshot
    Stats(StatsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Euclidean,
    SquaredEuclidean,
    Cosine,
    Dot,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::SquaredEuclidean => Metric::SquaredEuclidean,
            MetricArg::Cosine => Metric::Cosine,
            MetricArg::Dot => Metric::DotProduct,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HeuristicArg {
    Simple,
    Heuristic,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Sqrt,
    Log,
}

impl From<ModeArg> for HistogramMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Sqrt => HistogramMode::Sqrt,
            ModeArg::Log => HistogramMode::Log,
        }
    }
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Input vectors (u32 count, u32 dim, f32 data)
    #[arg(short, long)]
    input: PathBuf,

    /// Snapshot output path
    #[arg(short, long)]
    output: PathBuf,

    /// Links per node on upper levels (level 0 allows twice as many)
    #[arg(long, default_value_t = config::DEFAULT_M)]
    m: usize,

    /// Search beam width
    #[arg(long, default_value_t = config::DEFAULT_EF)]
    ef: usize,

    /// Construction beam width
    #[arg(long, default_value_t = config::DEFAULT_EF_CONSTRUCTION)]
    ef_construction: usize,

    /// Number of levels
    #[arg(long, default_value_t = config::DEFAULT_LAYERS_COUNT)]
    layers: usize,

    #[arg(long, value_enum, default_value_t = MetricArg::Euclidean)]
    metric: MetricArg,

    #[arg(long, value_enum, default_value_t = HeuristicArg::Heuristic)]
    heuristic: HeuristicArg,

    /// Backfill heuristic selections from rejected candidates on every level
    #[arg(long, default_value_t = false)]
    expand_best_selection: bool,

    /// Do not backfill level-0 selections from rejected candidates
    #[arg(long, default_value_t = false)]
    no_keep_pruned: bool,

    /// Level generator seed for reproducible builds
    #[arg(long)]
    seed: Option<u64>,
}

impl BuildArgs {
    fn options(&self) -> GraphOptions {
        let heuristic = match self.heuristic {
            HeuristicArg::Simple => SelectionHeuristic::Simple,
            HeuristicArg::Heuristic => SelectionHeuristic::Heuristic,
        };
        let options = GraphOptions::default()
            .with_m(self.m)
            .with_ef(self.ef)
            .with_ef_construction(self.ef_construction)
            .with_layers_count(self.layers)
            .with_heuristic(heuristic)
            .with_expand_best_selection(self.expand_best_selection)
            .with_keep_pruned_connections(!self.no_keep_pruned);
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Snapshot to open
    #[arg(short, long)]
    graph: PathBuf,

    /// Query vectors (u32 count, u32 dim, f32 data)
    #[arg(short, long)]
    queries: PathBuf,

    /// Neighbours per query
    #[arg(short, long, default_value_t = 10)]
    k: usize,

    /// Search beam width
    #[arg(long, default_value_t = config::DEFAULT_EF)]
    ef: usize,

    /// Must match the metric the graph was built with
    #[arg(long, value_enum, default_value_t = MetricArg::Euclidean)]
    metric: MetricArg,
}

#[derive(clap::Args)]
struct StatsArgs {
    /// Snapshot to open
    #[arg(short, long)]
    graph: PathBuf,

    /// Histogram bucket rule
    #[arg(long, value_enum, default_value_t = ModeArg::Sqrt)]
    mode: ModeArg,

    #[arg(long, value_enum, default_value_t = MetricArg::Euclidean)]
    metric: MetricArg,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("navgraph_cli=info".parse()?)
        .add_directive("navgraph_core=info".parse()?);
    if args.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match args.command {
        Command::Build(build_args) => build(&build_args),
        Command::Query(query_args) => query(&query_args),
        Command::Stats(stats_args) => stats(&stats_args),
    }
}

fn open(path: &Path, ef: usize, metric: MetricArg) -> Result<ReadOnlyGraph<Vec<f32>, Metric>, Box<dyn Error>> {
    let options = GraphOptions::default()
        .with_ef(ef)
        .with_layers_count(config::MAX_LAYERS_COUNT);
    Ok(open_read_only_file(path, options, Metric::from(metric))?)
}

fn build(args: &BuildArgs) -> Result<(), Box<dyn Error>> {
    let items = vectors::read_vectors(&args.input)?;
    tracing::info!("Read {} vectors from {:?}", items.len(), args.input);

    let graph = Graph::new(args.options(), Metric::from(args.metric))?;
    let start = Instant::now();
    graph.append(items);
    let elapsed = start.elapsed();
    tracing::info!(
        "Built graph: {} nodes, max layer {} in {:.2?}",
        graph.len(),
        graph.max_layer(),
        elapsed
    );

    save_snapshot(&graph, &args.output)?;
    Ok(())
}

fn query(args: &QueryArgs) -> Result<(), Box<dyn Error>> {
    let graph = open(&args.graph, args.ef, args.metric)?;
    let queries = vectors::read_vectors(&args.queries)?;

    let start = Instant::now();
    for (qi, q) in queries.iter().enumerate() {
        for (rank, hit) in graph.search(q, args.k).iter().enumerate() {
            println!("{qi}\t{rank}\t{}\t{:.6}", hit.id, hit.distance);
        }
    }
    let elapsed = start.elapsed();
    if !queries.is_empty() {
        tracing::info!(
            "{} queries in {:.2?} ({:.0} QPS)",
            queries.len(),
            elapsed,
            queries.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
        );
    }
    Ok(())
}

fn stats(args: &StatsArgs) -> Result<(), Box<dyn Error>> {
    let graph = open(&args.graph, config::DEFAULT_EF, args.metric)?;
    print!("{}", graph.stats());

    let mut histogram = graph.degree_histogram(0, args.mode.into());
    if histogram.is_empty() {
        return Ok(());
    }
    println!(
        "level 0 degree histogram ({:?}, {} buckets):",
        histogram.mode(),
        histogram.bucket_count()
    );
    let bounds = histogram.bounds();
    for (i, count) in histogram.counts().iter().enumerate() {
        println!("  [{:>7.2}, {:>7.2})  {count}", bounds[i], bounds[i + 1]);
    }

    histogram.smooth();
    println!("peaks (smoothed): {}", histogram.peak_count());
    match histogram.otsu_threshold() {
        Some(t) => println!("otsu threshold: {t:.2}"),
        None => println!("otsu threshold: n/a"),
    }
    Ok(())
}
