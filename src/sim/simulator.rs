//! 仿真器
//!
//! 时隙驱动的虚拟队列仿真器。每步先应用调度动作（建立/拆除连接、
//! 按路径瓶颈容量消费数据），再推进时钟、把新时隙的需求送入队列并
//! 让依赖计时器生效。

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use super::action::{Action, FlowRef, Observation, StepResult};
use super::dependency::{DependencyResolver, Resolution};
use super::ledger::{FlowRecord, JobRecord, Ledger, SessionSummary};
use super::policy::Policy;
use super::reward::{QueueOccupancyReward, RewardFn};
use super::time::round_to;
use crate::demand::{Demand, DemandEvent, FlowEvent, JobEvent, TimeSlot, TimeSlotter};
use crate::error::{Error, Result};
use crate::net::{Connection, ConnectionManager, NetworkState, NodeId, Topology};
use crate::queue::{Flow, FlowKey, QueueManager};

/// 仿真配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub slot_size: f64,
    /// 每个端点对队列的流数上限；None 为不限
    pub max_flows: Option<usize>,
    /// 仿真时钟到达该时间即结束
    pub max_time: Option<f64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            slot_size: 1.0,
            max_flows: None,
            max_time: None,
        }
    }
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    Stepping,
    Done,
}

/// 时隙驱动的仿真器：独占队列、依赖与连接状态。
pub struct Simulator {
    topo: Topology,
    demand: Demand,
    config: SimConfig,
    slotter: TimeSlotter,
    reward_fn: Box<dyn RewardFn>,
    slots: BTreeMap<usize, TimeSlot<DemandEvent>>,
    total_events: usize,
    events_processed: usize,
    state: NetworkState,
    queues: QueueManager,
    connections: ConnectionManager,
    resolver: DependencyResolver,
    ledger: Ledger,
    queue_evolution: BTreeMap<(NodeId, NodeId), Vec<(f64, f64)>>,
    phase: Phase,
    curr_step: usize,
    curr_time: f64,
}

impl Simulator {
    /// 创建仿真器并立即 `reset`
    pub fn new(topo: Topology, demand: Demand, config: SimConfig) -> Result<Self> {
        let slotter = TimeSlotter::new(config.slot_size)?;
        demand.validate()?;
        let state = NetworkState::new(&topo);
        let queues = QueueManager::new(&topo.endpoints(), config.max_flows);
        let mut sim = Self {
            topo,
            demand,
            config,
            slotter,
            reward_fn: Box::new(QueueOccupancyReward),
            slots: BTreeMap::new(),
            total_events: 0,
            events_processed: 0,
            state,
            queues,
            connections: ConnectionManager::new(),
            resolver: DependencyResolver::new(),
            ledger: Ledger::default(),
            queue_evolution: BTreeMap::new(),
            phase: Phase::Reset,
            curr_step: 0,
            curr_time: 0.0,
        };
        sim.reset()?;
        Ok(sim)
    }

    /// 替换奖励函数
    pub fn with_reward(mut self, reward_fn: Box<dyn RewardFn>) -> Self {
        self.reward_fn = reward_fn;
        self
    }

    /// 清空所有状态并载入第一个时隙
    #[instrument(skip(self))]
    pub fn reset(&mut self) -> Result<()> {
        if let Some(ep) = self
            .demand
            .endpoints()
            .into_iter()
            .find(|ep| !self.topo.is_endpoint(*ep))
        {
            return Err(Error::UnknownEndpoint(ep));
        }

        self.slots = self.slotter.slot(self.demand.events());
        self.total_events = self.slots.values().map(|s| s.events.len()).sum();
        self.events_processed = 0;
        self.state = NetworkState::new(&self.topo);
        self.queues = QueueManager::new(&self.topo.endpoints(), self.config.max_flows);
        self.connections = ConnectionManager::new();
        self.resolver.clear();
        self.ledger = Ledger::default();
        self.queue_evolution.clear();
        self.phase = Phase::Reset;
        self.curr_step = 0;
        self.curr_time = 0.0;

        info!(
            num_slots = self.slots.len(),
            num_events = self.total_events,
            job_centric = self.demand.is_job_centric(),
            "🔄 仿真已重置"
        );
        self.load_slot()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn curr_step(&self) -> usize {
        self.curr_step
    }

    pub fn curr_time(&self) -> f64 {
        self.curr_time
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn network(&self) -> &NetworkState {
        &self.state
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// 每个有序端点对的 (时间, 排队信息量) 序列
    pub fn queue_evolution(&self) -> &BTreeMap<(NodeId, NodeId), Vec<(f64, f64)>> {
        &self.queue_evolution
    }

    /// 正在运行的父操作：(job_id, op_id) -> 所在端点
    pub fn running_ops(&self) -> &BTreeMap<(u64, u64), NodeId> {
        self.resolver.running_ops()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_ledger(&self.ledger)
    }

    /// 当前观测；需求耗尽后时隙为最后一个
    pub fn observation(&self) -> Observation<'_> {
        Observation {
            step: self.curr_step,
            time: self.curr_time,
            slot: self.current_slot(),
            topology: &self.topo,
            network: &self.state,
            queues: &self.queues,
        }
    }

    fn current_slot(&self) -> Option<&TimeSlot<DemandEvent>> {
        self.slots
            .get(&self.curr_step)
            .or_else(|| self.slots.values().next_back())
    }

    /// 以策略驱动整个会话，返回汇总
    #[instrument(skip(self, policy))]
    pub fn run(&mut self, policy: &mut dyn Policy) -> Result<SessionSummary> {
        info!("▶️  开始运行仿真");
        loop {
            let action = policy.decide(&self.observation());
            if self.step(action)?.done {
                break;
            }
        }
        let summary = self.summary();
        info!(
            steps = self.curr_step,
            final_time = self.curr_time,
            arrived = summary.num_arrived_flows,
            completed = summary.num_completed_flows,
            dropped = summary.num_dropped_flows,
            "✅ 仿真完成"
        );
        Ok(summary)
    }

    /// 应用一个动作并推进一个时隙
    #[instrument(skip(self, action), fields(step = self.curr_step, time = self.curr_time, chosen = action.chosen_flows.len()))]
    pub fn step(&mut self, action: Action) -> Result<StepResult> {
        if self.phase == Phase::Done {
            return Err(Error::SessionFinished);
        }
        self.phase = Phase::Stepping;
        let slot_size = self.config.slot_size;
        let finish_time = round_to(self.curr_time + slot_size, self.slotter.decimals());

        // 先校验整个动作，再修改状态
        let mut seen = BTreeSet::new();
        let mut plans = Vec::with_capacity(action.chosen_flows.len());
        for fr in action.chosen_flows {
            let flow = self.queues.find(fr.src, fr.dst, fr.flow_id, fr.job_id)?;
            if !flow.schedulable {
                warn!(flow_id = fr.flow_id, job_id = ?fr.job_id, "选中的流依赖未满足，忽略");
                continue;
            }
            if !seen.insert((fr.flow_id, fr.job_id)) {
                continue;
            }
            check_path(&fr)?;
            let conn = Connection::new(&self.topo, fr.flow_id, fr.job_id, flow.size, &fr.path, fr.channel)?;
            let budget = self.topo.path_capacity(&fr.path)? * slot_size;
            plans.push((fr, conn, budget));
        }

        let mut conns = Vec::with_capacity(plans.len());
        let mut budgets = Vec::with_capacity(plans.len());
        for (fr, conn, budget) in plans {
            let flow = self.queues.find_mut(fr.src, fr.dst, fr.flow_id, fr.job_id)?;
            if flow.packets.is_none() {
                flow.packets = fr.packets;
            }
            flow.path = Some(fr.path);
            flow.channel = Some(fr.channel);
            conns.push(conn);
            budgets.push((fr.src, fr.dst, fr.flow_id, fr.job_id, budget));
        }
        let delta = self.connections.sync(&mut self.state, conns);
        trace!(
            established = delta.established.len(),
            torn_down = delta.torn_down.len(),
            "连接已同步"
        );

        let mut finished = Vec::new();
        for (src, dst, flow_id, job_id, budget) in budgets {
            let flow = self.queues.find_mut(src, dst, flow_id, job_id)?;
            let sent = flow.consume(budget);
            self.ledger.info_transported += sent;
            if flow.is_finished() {
                finished.push(flow.key());
            }
        }
        for key in finished {
            self.complete_flow(key, finish_time)?;
        }

        self.curr_step += 1;
        for (pair, queued) in self.queues.queued_info() {
            self.queue_evolution
                .entry(pair)
                .or_default()
                .push((self.curr_time, queued));
        }
        let reward = self.reward_fn.reward(&self.queues, slot_size);

        let done = self.check_done();
        if done {
            self.phase = Phase::Done;
            if self.ledger.arrived_flows.is_empty() {
                return Err(Error::NoFlowsArrived);
            }
            debug!(step = self.curr_step, time = self.curr_time, "会话结束");
        } else {
            self.load_slot()?;
        }
        Ok(StepResult { reward, done })
    }

    fn check_done(&self) -> bool {
        if self.config.max_time.is_some_and(|m| self.curr_time >= m) {
            return true;
        }
        if self.events_processed < self.total_events {
            return false;
        }
        if self.demand.is_job_centric() {
            self.ledger.num_unresolved_jobs() == 0 && self.resolver.num_active_jobs() == 0
        } else {
            self.ledger.num_unresolved_flows() == 0
        }
    }

    /// 推进时钟，把当前时隙的新需求送入队列，并让到期的计时器生效
    fn load_slot(&mut self) -> Result<()> {
        let (ub, events) = match self.slots.get(&self.curr_step) {
            Some(slot) => (Some(slot.ub), slot.events.clone()),
            None => (self.slots.values().next_back().map(|s| s.ub), Vec::new()),
        };
        match ub {
            Some(ub) if ub > self.curr_time => self.curr_time = ub,
            _ => {
                self.curr_time =
                    round_to(self.curr_time + self.config.slot_size, self.slotter.decimals());
            }
        }

        for ev in events {
            self.events_processed += 1;
            match ev {
                DemandEvent::Flow(f) if f.establish => self.admit_flow_event(f),
                DemandEvent::Job(j) if j.establish => self.admit_job(j)?,
                other => trace!(time = other.event_time(), "忽略拆除事件"),
            }
        }

        let resolutions = self.resolver.advance(self.curr_time);
        self.apply(resolutions, self.curr_time)
    }

    fn admit_flow_event(&mut self, ev: FlowEvent) {
        if ev.size <= 0.0 || ev.src == ev.dst {
            trace!(flow_id = ev.flow_id, "大小为 0 或源宿相同，不成为流");
            return;
        }
        let now = self.curr_time;
        let mut flow = Flow::new(ev.flow_id, None, ev.src, ev.dst, ev.size, ev.event_time);
        flow.mark_arrived(now);
        let record = arrived_record(&flow, now);
        self.ledger.arrived_flows.insert((flow.flow_id, None), record.clone());
        if let Err(flow) = self.queues.admit(flow) {
            debug!(flow_id = flow.flow_id, src = ?flow.src, dst = ?flow.dst, "队列已满，丢弃流");
            self.ledger.dropped_flows.push(record);
        }
    }

    fn admit_job(&mut self, job: JobEvent) -> Result<()> {
        let now = self.curr_time;
        self.ledger.arrived_jobs.insert(job.job_id, now);
        for flow in self.resolver.register_job(&job) {
            if let Err(flow) = self.queues.admit(flow) {
                let record = arrived_record(&flow, now);
                self.ledger
                    .arrived_flows
                    .insert((flow.flow_id, flow.job_id), record.clone());
                self.ledger.dropped_flows.push(record);
                let siblings = self.queues.remove_job(job.job_id);
                self.resolver.drop_job(job.job_id);
                self.ledger.dropped_jobs.push(job.job_id);
                info!(
                    job_id = job.job_id,
                    flow_id = flow.flow_id,
                    removed_siblings = siblings.len(),
                    "队列已满，丢弃作业"
                );
                return Ok(());
            }
        }
        let resolutions = self.resolver.release_initial(job.job_id, now);
        self.apply(resolutions, now)
    }

    fn complete_flow(&mut self, key: FlowKey, at: f64) -> Result<()> {
        let flow = self.queues.complete(&key, at)?;
        self.connections
            .teardown(&mut self.state, (flow.flow_id, flow.job_id));
        let mut record = self
            .ledger
            .arrived_flows
            .get(&(flow.flow_id, flow.job_id))
            .cloned()
            .unwrap_or_else(|| arrived_record(&flow, at));
        record.time_completed = Some(at);
        if let Some(r) = self.ledger.arrived_flows.get_mut(&(flow.flow_id, flow.job_id)) {
            r.time_completed = Some(at);
        }
        debug!(flow_id = flow.flow_id, job_id = ?flow.job_id, fct = ?record.fct(), "✅ 流完成");
        self.ledger.completed_flows.push(record);

        if let Some(job_id) = flow.job_id {
            let resolutions = self.resolver.complete_flow(job_id, flow.flow_id, at);
            self.apply(resolutions, at)?;
        }
        Ok(())
    }

    fn apply(&mut self, resolutions: Vec<Resolution>, now: f64) -> Result<()> {
        for r in resolutions {
            match r {
                Resolution::Schedulable {
                    job_id,
                    flow_id,
                    src,
                    dst,
                } => {
                    let flow = self.queues.find_mut(src, dst, flow_id, Some(job_id))?;
                    flow.schedulable = true;
                    flow.mark_arrived(now);
                    let record = arrived_record(flow, now);
                    self.ledger.arrived_flows.insert((flow_id, Some(job_id)), record);
                    self.resolver.mark_arrived(job_id, flow_id);
                }
                Resolution::JobCompleted { job_id, time } => {
                    let time_arrived = self.ledger.arrived_jobs.get(&job_id).copied().unwrap_or(time);
                    self.ledger.completed_jobs.push(JobRecord {
                        job_id,
                        time_arrived,
                        time_completed: time,
                    });
                }
            }
        }
        Ok(())
    }
}

/// 路径至少一跳，且从流的源走到流的宿
fn check_path(fr: &FlowRef) -> Result<()> {
    match (fr.path.first(), fr.path.last()) {
        (Some(&first), Some(&last)) if fr.path.len() >= 2 && first == fr.src && last == fr.dst => {
            Ok(())
        }
        _ => Err(Error::InvalidPath {
            from: fr.src,
            to: fr.dst,
        }),
    }
}

fn arrived_record(flow: &Flow, now: f64) -> FlowRecord {
    FlowRecord {
        flow_id: flow.flow_id,
        job_id: flow.job_id,
        src: flow.src,
        dst: flow.dst,
        size: flow.size,
        time_arrived: flow.time_arrived().unwrap_or(now),
        time_completed: None,
    }
}
