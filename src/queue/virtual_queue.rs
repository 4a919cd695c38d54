//! 虚拟队列
//!
//! 一个 (源, 宿) 端点对上的流队列，按入队顺序排列。
//! 设置了上限时，队列已满则直接丢弃新到达的流。
//! 完成的流出队时，完成时间追加到 `completion_times`。

use super::flow::{Flow, FlowKey};

#[derive(Debug, Clone, Default)]
pub struct VirtualQueue {
    max_flows: Option<usize>,
    flows: Vec<Flow>,
    completion_times: Vec<f64>,
}

impl VirtualQueue {
    pub fn new(max_flows: Option<usize>) -> Self {
        Self {
            max_flows,
            flows: Vec::new(),
            completion_times: Vec::new(),
        }
    }

    /// 入队：成功返回 Ok；若被丢弃则返回 Err(flow)
    pub fn admit(&mut self, flow: Flow) -> Result<(), Flow> {
        if self.is_full() {
            return Err(flow);
        }
        self.flows.push(flow);
        Ok(())
    }

    /// 按身份键移除
    pub fn remove(&mut self, key: &FlowKey) -> Option<Flow> {
        let idx = self.flows.iter().position(|f| f.key() == *key)?;
        Some(self.flows.remove(idx))
    }

    /// 流完成：出队、写入完成时间并记录
    pub fn complete(&mut self, key: &FlowKey, at: f64) -> Option<Flow> {
        let mut flow = self.remove(key)?;
        flow.time_completed = Some(at);
        self.completion_times.push(at);
        Some(flow)
    }

    /// 已从本队列完成的流的完成时间，按完成顺序
    pub fn completion_times(&self) -> &[f64] {
        &self.completion_times
    }

    /// 移除某个作业的所有流
    pub fn remove_job(&mut self, job_id: u64) -> Vec<Flow> {
        let (gone, kept): (Vec<Flow>, Vec<Flow>) = std::mem::take(&mut self.flows)
            .into_iter()
            .partition(|f| f.job_id == Some(job_id));
        self.flows = kept;
        gone
    }

    pub fn find(&self, flow_id: u64, job_id: Option<u64>) -> Option<&Flow> {
        self.flows.iter().find(|f| f.flow_id == flow_id && f.job_id == job_id)
    }

    pub fn find_mut(&mut self, flow_id: u64, job_id: Option<u64>) -> Option<&mut Flow> {
        self.flows
            .iter_mut()
            .find(|f| f.flow_id == flow_id && f.job_id == job_id)
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.max_flows.is_some_and(|max| self.flows.len() >= max)
    }

    pub fn max_flows(&self) -> Option<usize> {
        self.max_flows
    }

    /// 队列中尚未传输的信息量
    pub fn queued_info(&self) -> f64 {
        self.flows.iter().map(Flow::remaining_info).sum()
    }
}
