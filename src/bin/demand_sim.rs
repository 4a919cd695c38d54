use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use trafsim_rs::demand::{Demand, FlowGenerator, ScenarioSpec};
use trafsim_rs::sim::{FirstComeFirstServed, SessionSummary, Simulator};

#[derive(Debug, Parser)]
#[command(
    name = "demand-sim",
    about = "Generate traffic demand from scenario.json and replay it on the slotted queue simulator"
)]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: PathBuf,

    /// Override the generator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override num_demands_factor
    #[arg(long)]
    num_demands_factor: Option<usize>,

    /// Override the simulator slot size
    #[arg(long)]
    slot_size: Option<f64>,

    /// Override the per-pair queue limit (number of flows)
    #[arg(long)]
    max_flows: Option<usize>,

    /// Stop the session once simulated time reaches this value
    #[arg(long)]
    until: Option<f64>,

    /// Write the generated demand as JSON
    #[arg(long)]
    demand_json: Option<PathBuf>,

    /// Write the session summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_else(|| "none".to_string())
}

fn print_summary(s: &SessionSummary) {
    println!(
        "summary arrived={} completed={} dropped={} mean_fct={} p99_fct={} info_arrived={:.3} info_transported={:.3} throughput={}",
        s.num_arrived_flows,
        s.num_completed_flows,
        s.num_dropped_flows,
        fmt_opt(s.mean_fct),
        fmt_opt(s.p99_fct),
        s.info_arrived,
        s.info_transported,
        fmt_opt(s.throughput),
    );
}

fn fail(what: &str, err: trafsim_rs::Error) -> ! {
    error!(%err, "{what}");
    eprintln!("error: {what}: {err}");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let raw = fs::read_to_string(&args.scenario).expect("read scenario.json");
    let mut scenario: ScenarioSpec = serde_json::from_str(&raw).expect("parse scenario.json");

    if let Some(seed) = args.seed {
        scenario.generator.seed = seed;
    }
    if let Some(factor) = args.num_demands_factor {
        scenario.generator.num_demands_factor = factor;
    }
    if let Some(slot_size) = args.slot_size {
        scenario.sim.slot_size = slot_size;
    }
    if args.max_flows.is_some() {
        scenario.sim.max_flows = args.max_flows;
    }
    if args.until.is_some() {
        scenario.sim.max_time = args.until;
    }

    let star = scenario.topology.build();
    let flow_size_dist = scenario
        .flow_size_dist()
        .unwrap_or_else(|e| fail("invalid flow_size_dist", e));
    let interarrival_dist = scenario
        .interarrival_dist()
        .unwrap_or_else(|e| fail("invalid interarrival_dist", e));
    let node_dist = scenario
        .node_dist(star.endpoints.len())
        .unwrap_or_else(|e| fail("invalid node_dist", e));

    let config = scenario.generator_config(&star);
    let mut generator = FlowGenerator::new(star.endpoints.clone(), node_dist, config)
        .unwrap_or_else(|e| fail("invalid generator config", e));
    let generated = generator
        .generate(&flow_size_dist, &interarrival_dist)
        .unwrap_or_else(|e| fail("demand generation failed", e));
    info!(
        flows = generated.demand.len(),
        load_rate = generated.load_rate,
        scale = generated.interarrival_scale,
        "📦 需求生成完成"
    );
    println!(
        "demand flows={} load_rate={:.3} interarrival_scale={:.6}",
        generated.demand.len(),
        generated.load_rate,
        generated.interarrival_scale
    );

    let demand = Demand::FlowCentric(generated.demand);
    if let Some(path) = &args.demand_json {
        let out = serde_json::to_string_pretty(&demand).expect("serialize demand");
        fs::write(path, out).expect("write demand json");
        info!(path = %path.display(), "写出需求 JSON");
    }

    let mut sim = Simulator::new(star.topology.clone(), demand, scenario.sim.clone())
        .unwrap_or_else(|e| fail("invalid simulation setup", e));
    let mut policy = FirstComeFirstServed::new(|src, dst| star.path(src, dst));
    let summary = sim
        .run(&mut policy)
        .unwrap_or_else(|e| fail("simulation failed", e));
    print_summary(&summary);

    if let Some(path) = &args.summary_json {
        let out = serde_json::to_string_pretty(&summary).expect("serialize summary");
        fs::write(path, out).expect("write summary json");
    }
}
