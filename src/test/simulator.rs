use crate::Error;
use crate::demand::{Demand, DependencyType, FlowDemand, FlowEvent, JobDemand, JobEvent, JobFlowSpec};
use crate::net::{ChannelId, NodeId};
use crate::sim::{Action, FirstComeFirstServed, FlowRef, Phase, Policy, SimConfig, Simulator, StepResult};
use crate::topo::{StarOpts, StarTopology, build_star};

fn star(n: usize) -> StarTopology {
    build_star(&StarOpts {
        num_endpoints: n,
        ep_link_capacity: 10.0,
        num_channels: 1,
    })
}

fn flows(rows: &[(u64, usize, usize, f64, f64)]) -> Demand {
    let mut d = FlowDemand::default();
    for (i, &(flow_id, src, dst, size, t)) in rows.iter().enumerate() {
        d.push(FlowEvent {
            flow_id,
            src: NodeId(src),
            dst: NodeId(dst),
            size,
            event_time: t,
            establish: true,
            index: i,
        });
    }
    Demand::FlowCentric(d)
}

fn job_flow(flow_id: u64, src: usize, dst: usize, size: f64) -> JobFlowSpec {
    JobFlowSpec {
        flow_id,
        src: NodeId(src),
        dst: NodeId(dst),
        size,
        parent_deps: Vec::new(),
        child_deps: Vec::new(),
        parent_op: 0,
        parent_op_run_time: 0.0,
        dependency_type: DependencyType::DataDep,
    }
}

fn jobs(jobs: Vec<(u64, f64, Vec<JobFlowSpec>)>) -> Demand {
    Demand::JobCentric(JobDemand {
        jobs: jobs
            .into_iter()
            .map(|(job_id, event_time, flows)| JobEvent {
                job_id,
                event_time,
                establish: true,
                flows,
            })
            .collect(),
    })
}

fn fcfs(s: &StarTopology) -> impl Policy + use<> {
    let hub = s.hub;
    FirstComeFirstServed::new(move |src, dst| vec![src, hub, dst])
}

fn sim(s: &StarTopology, demand: Demand, config: SimConfig) -> Simulator {
    Simulator::new(s.topology.clone(), demand, config).expect("simulator")
}

fn step_with(sim: &mut Simulator, policy: &mut dyn Policy) -> StepResult {
    let action = policy.decide(&sim.observation());
    sim.step(action).expect("step")
}

fn flow_ref(sim: &Simulator, s: &StarTopology, src: usize, dst: usize, flow_id: u64) -> FlowRef {
    let flow = sim
        .queues()
        .find(NodeId(src), NodeId(dst), flow_id, None)
        .expect("queued");
    FlowRef::for_flow(flow, s.path(NodeId(src), NodeId(dst)), ChannelId(0))
}

#[test]
fn fcfs_session_completes_every_flow() {
    let s = star(3);
    let demand = flows(&[
        (0, 0, 1, 10.0, 0.0),
        (1, 1, 2, 10.0, 0.0),
        (2, 0, 2, 5.0, 2.0),
    ]);
    let mut sim = sim(&s, demand, SimConfig::default());
    assert_eq!(sim.phase(), Phase::Reset);
    assert_eq!(sim.num_slots(), 3);
    assert_eq!(sim.curr_time(), 1.0);
    assert_eq!(sim.queues().num_queued(), 2);

    let mut policy = fcfs(&s);
    let first = step_with(&mut sim, &mut policy);
    assert_eq!(first.reward, -1.0);
    assert!(!first.done);
    assert_eq!(sim.phase(), Phase::Stepping);

    let summary = sim.run(&mut policy).expect("run");
    assert_eq!(sim.phase(), Phase::Done);
    assert_eq!(sim.curr_step(), 3);
    assert_eq!(summary.num_arrived_flows, 3);
    assert_eq!(summary.num_completed_flows, 3);
    assert_eq!(summary.num_dropped_flows, 0);
    let mean = summary.mean_fct.expect("mean fct");
    assert!((mean - 4.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.first_arrival, Some(1.0));
    assert_eq!(summary.last_completion, Some(4.0));
    assert!((summary.info_arrived - 25.0).abs() < 1e-9);
    assert!((summary.info_transported - 25.0).abs() < 1e-9);

    let mut fcts: Vec<(u64, f64)> = sim
        .ledger()
        .completed_flows
        .iter()
        .map(|r| (r.flow_id, r.fct().expect("completed")))
        .collect();
    fcts.sort_by_key(|(id, _)| *id);
    assert_eq!(fcts, vec![(0, 1.0), (1, 2.0), (2, 1.0)]);
}

#[test]
fn stepping_after_done_is_rejected() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 10.0, 0.0)]), SimConfig::default());
    sim.run(&mut fcfs(&s)).expect("run");
    let err = sim.step(Action::default()).expect_err("finished");
    assert!(matches!(err, Error::SessionFinished));
}

#[test]
fn demand_with_unknown_endpoint_is_rejected() {
    let s = star(3);
    let err = Simulator::new(s.topology.clone(), flows(&[(0, 0, 99, 10.0, 0.0)]), SimConfig::default())
        .err()
        .expect("unknown endpoint");
    assert!(matches!(err, Error::UnknownEndpoint(NodeId(99))));

    let err = Simulator::new(s.topology.clone(), flows(&[(0, 0, 3, 10.0, 0.0)]), SimConfig::default())
        .err()
        .expect("hub is not an endpoint");
    assert!(matches!(err, Error::UnknownEndpoint(NodeId(3))));
}

#[test]
fn invalid_slot_size_is_rejected() {
    let s = star(3);
    let config = SimConfig {
        slot_size: 0.0,
        ..SimConfig::default()
    };
    let err = Simulator::new(s.topology.clone(), flows(&[(0, 0, 1, 10.0, 0.0)]), config)
        .err()
        .expect("bad slot");
    assert!(matches!(err, Error::InvalidSlotSize(_)));
}

#[test]
fn full_queue_drops_new_flows() {
    let s = star(3);
    let config = SimConfig {
        max_flows: Some(1),
        ..SimConfig::default()
    };
    let demand = flows(&[(0, 0, 1, 10.0, 0.0), (1, 0, 1, 10.0, 0.5)]);
    let mut sim = sim(&s, demand, config);
    assert_eq!(sim.ledger().dropped_flows.len(), 1);
    assert_eq!(sim.ledger().dropped_flows[0].flow_id, 1);

    let summary = sim.run(&mut fcfs(&s)).expect("run");
    assert_eq!(summary.num_arrived_flows, 2);
    assert_eq!(summary.num_completed_flows, 1);
    assert_eq!(summary.num_dropped_flows, 1);
}

#[test]
fn dropping_one_job_flow_drops_the_whole_job() {
    let s = star(3);
    let config = SimConfig {
        max_flows: Some(1),
        ..SimConfig::default()
    };
    let demand = jobs(vec![
        (0, 0.0, vec![job_flow(0, 0, 1, 10.0)]),
        (1, 0.0, vec![job_flow(0, 0, 2, 10.0), job_flow(1, 0, 1, 10.0)]),
    ]);
    let mut sim = sim(&s, demand, config);

    assert!(sim.queues().queue(NodeId(0), NodeId(2)).expect("queue").is_empty());
    assert_eq!(sim.queues().queue(NodeId(0), NodeId(1)).expect("queue").len(), 1);
    assert_eq!(sim.ledger().dropped_jobs, vec![1]);
    assert_eq!(sim.ledger().dropped_flows.len(), 1);
    assert_eq!(sim.ledger().dropped_flows[0].job_id, Some(1));

    let summary = sim.run(&mut fcfs(&s)).expect("run");
    assert_eq!(summary.num_arrived_jobs, 2);
    assert_eq!(summary.num_completed_jobs, 1);
    assert_eq!(summary.num_dropped_jobs, 1);
    assert_eq!(summary.num_dropped_flows, 1);
}

#[test]
fn job_completes_when_its_last_flow_finishes() {
    let s = star(6);
    let demand = jobs(vec![(
        0,
        0.0,
        vec![
            job_flow(0, 0, 1, 10.0),
            job_flow(1, 2, 3, 30.0),
            job_flow(2, 4, 5, 20.0),
        ],
    )]);
    let mut sim = sim(&s, demand, SimConfig::default());
    let mut policy = fcfs(&s);

    assert!(!step_with(&mut sim, &mut policy).done);
    assert!(sim.ledger().completed_jobs.is_empty());
    assert!(!step_with(&mut sim, &mut policy).done);
    assert!(sim.ledger().completed_jobs.is_empty());
    assert!(step_with(&mut sim, &mut policy).done);

    let jobs = &sim.ledger().completed_jobs;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].time_arrived, 1.0);
    assert_eq!(jobs[0].time_completed, 4.0);
    assert_eq!(sim.summary().mean_jct, Some(3.0));
}

#[test]
fn blocked_job_flow_is_not_scheduled() {
    let s = star(3);
    let mut parent = job_flow(0, 0, 1, 10.0);
    parent.child_deps = vec![1];
    let mut child = job_flow(1, 1, 2, 10.0);
    child.parent_deps = vec![0];
    let mut sim = sim(&s, jobs(vec![(0, 0.0, vec![parent, child])]), SimConfig::default());

    let blocked = sim
        .queues()
        .find(NodeId(1), NodeId(2), 1, Some(0))
        .expect("queued");
    assert!(!blocked.schedulable);
    let fr = FlowRef::for_flow(blocked, s.path(NodeId(1), NodeId(2)), ChannelId(0));
    let result = sim.step(Action { chosen_flows: vec![fr] }).expect("step");
    assert!(!result.done);
    assert_eq!(sim.ledger().info_transported, 0.0);

    let summary = sim.run(&mut fcfs(&s)).expect("run");
    assert_eq!(summary.num_completed_flows, 2);
    assert_eq!(summary.num_completed_jobs, 1);
}

#[test]
fn demand_without_real_flows_reports_no_arrivals() {
    let s = star(3);
    let mut sim = sim(
        &s,
        flows(&[(0, 0, 1, 0.0, 0.0), (1, 2, 2, 10.0, 0.0)]),
        SimConfig::default(),
    );
    let err = sim.step(Action::default()).expect_err("nothing arrived");
    assert!(matches!(err, Error::NoFlowsArrived));
    assert_eq!(sim.phase(), Phase::Done);
}

#[test]
fn unknown_flow_in_action_is_rejected() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 10.0, 0.0)]), SimConfig::default());
    let mut fr = flow_ref(&sim, &s, 0, 1, 0);
    fr.flow_id = 42;
    let err = sim.step(Action { chosen_flows: vec![fr] }).expect_err("missing");
    assert!(matches!(err, Error::FlowNotFound { flow_id: 42, .. }));
}

#[test]
fn duplicate_flow_refs_are_served_once() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 30.0, 0.0)]), SimConfig::default());
    let fr = flow_ref(&sim, &s, 0, 1, 0);
    sim.step(Action {
        chosen_flows: vec![fr.clone(), fr],
    })
    .expect("step");
    assert_eq!(sim.ledger().info_transported, 10.0);
    assert_eq!(sim.connections().len(), 1);
}

#[test]
fn connection_capacity_is_returned_on_completion() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 20.0, 0.0)]), SimConfig::default());
    let mut policy = fcfs(&s);

    step_with(&mut sim, &mut policy);
    assert_eq!(sim.network().active_connections, 1);
    assert!(sim.network().capacity_used > 0.0);

    assert!(step_with(&mut sim, &mut policy).done);
    assert_eq!(sim.network().active_connections, 0);
    assert_eq!(sim.network().capacity_used, 0.0);
    assert!(sim.connections().is_empty());
}

#[test]
fn packets_are_sent_whole() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 12.0, 0.0)]), SimConfig::default());
    let mut fr = flow_ref(&sim, &s, 0, 1, 0);
    fr.packets = Some(vec![4.0, 4.0, 4.0]);
    sim.step(Action {
        chosen_flows: vec![fr.clone()],
    })
    .expect("step");
    assert_eq!(sim.ledger().info_transported, 8.0);

    fr.packets = Some(vec![1.0; 12]);
    let result = sim.step(Action { chosen_flows: vec![fr] }).expect("step");
    assert!(result.done);
    assert_eq!(sim.ledger().info_transported, 12.0);
}

#[test]
fn queue_evolution_is_sampled_every_step() {
    let s = star(3);
    let demand = flows(&[(0, 0, 1, 10.0, 0.0), (1, 1, 2, 10.0, 0.0)]);
    let mut sim = sim(&s, demand, SimConfig::default());
    step_with(&mut sim, &mut fcfs(&s));

    let evo = sim.queue_evolution();
    assert_eq!(evo[&(NodeId(0), NodeId(1))], vec![(1.0, 0.0)]);
    assert_eq!(evo[&(NodeId(1), NodeId(2))], vec![(1.0, 10.0)]);
    assert_eq!(evo.len(), 6);
}

#[test]
fn max_time_ends_the_session_early() {
    let s = star(3);
    let config = SimConfig {
        max_time: Some(3.0),
        ..SimConfig::default()
    };
    let demand = flows(&[(0, 0, 1, 10.0, 0.0), (1, 1, 2, 10.0, 10.0)]);
    let mut sim = sim(&s, demand, config);
    let summary = sim.run(&mut fcfs(&s)).expect("run");
    assert_eq!(sim.curr_step(), 3);
    assert_eq!(summary.num_arrived_flows, 1);
    assert_eq!(summary.num_completed_flows, 1);
}

#[test]
fn take_down_events_are_ignored() {
    let s = star(3);
    let mut d = FlowDemand::default();
    for (i, (t, establish)) in [(0.0, true), (1.0, false)].into_iter().enumerate() {
        d.push(FlowEvent {
            flow_id: 0,
            src: NodeId(0),
            dst: NodeId(1),
            size: 20.0,
            event_time: t,
            establish,
            index: i,
        });
    }
    let demand = Demand::FlowCentric(d);
    assert_eq!(demand.num_demands(), 1);
    let mut sim = sim(&s, demand, SimConfig::default());
    let summary = sim.run(&mut fcfs(&s)).expect("run");
    assert_eq!(summary.num_arrived_flows, 1);
    assert_eq!(summary.num_completed_flows, 1);
}

#[test]
fn reset_restores_initial_state() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 10.0, 0.0)]), SimConfig::default());
    sim.run(&mut fcfs(&s)).expect("run");
    sim.reset().expect("reset");
    assert_eq!(sim.phase(), Phase::Reset);
    assert_eq!(sim.curr_step(), 0);
    assert!(sim.ledger().completed_flows.is_empty());
    assert_eq!(sim.queues().num_queued(), 1);
    assert!(sim.queue_evolution().is_empty());
}

#[derive(Debug)]
struct QueuedInfoPenalty;

impl crate::sim::RewardFn for QueuedInfoPenalty {
    fn reward(&self, queues: &crate::queue::QueueManager, _slot_size: f64) -> f64 {
        -queues.queued_info().map(|(_, v)| v).sum::<f64>()
    }
}

#[test]
fn custom_reward_function_is_used() {
    let s = star(3);
    let demand = flows(&[(0, 0, 1, 10.0, 0.0), (1, 1, 2, 10.0, 0.0)]);
    let mut sim = sim(&s, demand, SimConfig::default()).with_reward(Box::new(QueuedInfoPenalty));
    let result = step_with(&mut sim, &mut fcfs(&s));
    assert_eq!(result.reward, -10.0);
}

#[test]
fn action_path_must_run_from_source_to_destination() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 1_000_000.0, 0.0)]), SimConfig::default());
    let fr = flow_ref(&sim, &s, 0, 1, 0);

    for path in [vec![], vec![NodeId(0)], vec![NodeId(2), s.hub], vec![NodeId(0), s.hub, NodeId(2)]] {
        let bad = FlowRef { path, ..fr.clone() };
        let err = sim
            .step(Action { chosen_flows: vec![bad] })
            .expect_err("path rejected");
        assert!(matches!(
            err,
            Error::InvalidPath {
                from: NodeId(0),
                to: NodeId(1)
            }
        ));
    }
    assert_eq!(sim.ledger().info_transported, 0.0);
    assert_eq!(sim.network().capacity_used, 0.0);
    assert!(sim.connections().is_empty());
    assert_eq!(sim.curr_step(), 0);

    sim.step(Action { chosen_flows: vec![fr] }).expect("step");
    assert_eq!(sim.ledger().info_transported, 10.0);
}

#[test]
fn mixed_packets_never_exceed_the_slot_budget() {
    let s = star(3);
    let mut sim = sim(&s, flows(&[(0, 0, 1, 101.0, 0.0)]), SimConfig::default());
    let mut fr = flow_ref(&sim, &s, 0, 1, 0);
    fr.packets = Some(vec![1.0, 100.0]);
    let result = sim.step(Action { chosen_flows: vec![fr] }).expect("step");
    assert!(!result.done);
    assert_eq!(sim.ledger().info_transported, 1.0);
    let flow = sim.queues().find(NodeId(0), NodeId(1), 0, None).expect("queued");
    assert_eq!(flow.packets.as_deref(), Some(&[100.0][..]));
}

#[test]
fn duplicate_flow_ids_are_rejected() {
    let s = star(3);
    let err = Simulator::new(
        s.topology.clone(),
        flows(&[(7, 0, 1, 10.0, 0.0), (7, 1, 2, 10.0, 0.5)]),
        SimConfig::default(),
    )
    .err()
    .expect("duplicate flow id");
    assert!(matches!(err, Error::InvalidDemand(_)));

    let err = Simulator::new(
        s.topology.clone(),
        jobs(vec![
            (0, 0.0, vec![job_flow(0, 0, 1, 10.0)]),
            (0, 1.0, vec![job_flow(0, 1, 2, 10.0)]),
        ]),
        SimConfig::default(),
    )
    .err()
    .expect("duplicate job id");
    assert!(matches!(err, Error::InvalidDemand(_)));

    let err = Simulator::new(
        s.topology.clone(),
        jobs(vec![(0, 0.0, vec![job_flow(3, 0, 1, 10.0), job_flow(3, 1, 2, 10.0)])]),
        SimConfig::default(),
    )
    .err()
    .expect("duplicate flow id within a job");
    assert!(matches!(err, Error::InvalidDemand(_)));
}

#[test]
fn queues_record_completion_times() {
    let s = star(3);
    let demand = flows(&[(0, 0, 1, 10.0, 0.0), (1, 0, 1, 10.0, 0.0)]);
    let mut sim = sim(&s, demand, SimConfig::default());
    sim.run(&mut fcfs(&s)).expect("run");
    let q = sim.queues().queue(NodeId(0), NodeId(1)).expect("queue");
    assert!(q.is_empty());
    assert_eq!(q.completion_times(), &[2.0, 3.0]);
}
