use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "trafsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(dir: &PathBuf, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write temp file");
    path
}

const SMALL_STAR: &str = r#"
{
    "topology": { "kind": "star", "num_endpoints": 4, "ep_link_capacity": 10.0 },
    "flow_size_dist": [[10.0, 0.5], [20.0, 0.5]],
    "interarrival_dist": [[1.0, 1.0]],
    "generator": { "num_demands_factor": 2, "seed": 1 }
}
"#;

fn summary_line(stdout: &str) -> &str {
    stdout
        .lines()
        .find(|line| line.starts_with("summary "))
        .expect("summary line")
}

#[test]
fn demand_sim_runs_every_generated_flow_to_completion() {
    let dir = unique_temp_dir("demand-sim-complete");
    let scenario = write_file(&dir, "scenario.json", SMALL_STAR);
    let demand_json = dir.join("demand.json");
    let summary_json = dir.join("summary.json");

    let output = Command::new(env!("CARGO_BIN_EXE_demand_sim"))
        .args([
            "--scenario",
            scenario.to_str().unwrap(),
            "--demand-json",
            demand_json.to_str().unwrap(),
            "--summary-json",
            summary_json.to_str().unwrap(),
        ])
        .output()
        .expect("run demand_sim");
    assert!(
        output.status.success(),
        "demand_sim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("demand flows=8 "), "stdout={stdout}");
    assert!(
        summary_line(&stdout).starts_with("summary arrived=8 completed=8 dropped=0 "),
        "stdout={stdout}"
    );

    let raw = fs::read_to_string(&demand_json).expect("read demand.json");
    let v: Value = serde_json::from_str(&raw).expect("parse demand.json");
    assert_eq!(v.get("kind").and_then(|k| k.as_str()), Some("flow_centric"));
    let ids = v
        .get("flow_id")
        .and_then(|ids| ids.as_array())
        .expect("flow_id column");
    assert_eq!(ids.len(), 8);

    let raw = fs::read_to_string(&summary_json).expect("read summary.json");
    let s: Value = serde_json::from_str(&raw).expect("parse summary.json");
    assert_eq!(s.get("num_completed_flows").and_then(|n| n.as_u64()), Some(8));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn demand_sim_is_reproducible_for_a_seed() {
    let dir = unique_temp_dir("demand-sim-seed");
    let scenario = write_file(&dir, "scenario.json", SMALL_STAR);

    let run = |name: &str| {
        let out = dir.join(name);
        let output = Command::new(env!("CARGO_BIN_EXE_demand_sim"))
            .args([
                "--scenario",
                scenario.to_str().unwrap(),
                "--seed",
                "7",
                "--demand-json",
                out.to_str().unwrap(),
            ])
            .output()
            .expect("run demand_sim");
        assert!(output.status.success());
        fs::read_to_string(&out).expect("read demand json")
    };
    assert_eq!(run("a.json"), run("b.json"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn demand_sim_until_stops_before_all_demand_arrives() {
    let dir = unique_temp_dir("demand-sim-until");
    let scenario = write_file(&dir, "scenario.json", SMALL_STAR);

    let output = Command::new(env!("CARGO_BIN_EXE_demand_sim"))
        .args(["--scenario", scenario.to_str().unwrap(), "--until", "2"])
        .output()
        .expect("run demand_sim");
    assert!(
        output.status.success(),
        "demand_sim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = summary_line(&stdout);
    assert!(line.starts_with("summary arrived=1 "), "line={line}");
    assert!(!line.contains("completed=8 "), "line={line}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn demand_sim_exits_nonzero_on_excessive_target_load() {
    let dir = unique_temp_dir("demand-sim-bad-load");
    let scenario = write_file(
        &dir,
        "scenario.json",
        r#"
{
    "topology": { "kind": "star", "num_endpoints": 4, "ep_link_capacity": 10.0 },
    "flow_size_dist": [[10.0, 1.0]],
    "interarrival_dist": [[1.0, 1.0]],
    "target_load_fraction": 0.99,
    "generator": { "num_demands_factor": 2 }
}
        "#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_demand_sim"))
        .args(["--scenario", scenario.to_str().unwrap()])
        .output()
        .expect("run demand_sim");
    assert!(
        !output.status.success(),
        "expected non-zero exit, got success"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid generator config"),
        "stderr did not contain expected message: {stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}
