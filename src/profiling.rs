//! Profiling data collected from OpenCL events

use crate::error::Result;
use ocl::Event;
use ocl::core::{ProfilingInfo, ProfilingInfoResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Pipeline stage a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfilingStage {
    TransferIn,
    TransferOut,
    Compile,
    Execution,
}

impl ProfilingStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfilingStage::TransferIn => "transfer-in",
            ProfilingStage::TransferOut => "transfer-out",
            ProfilingStage::Compile => "compile",
            ProfilingStage::Execution => "execution",
        }
    }
}

impl fmt::Display for ProfilingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elapsed-time sample, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElapsedTime {
    /// From the command entering the queue to its completion
    pub queued_to_end_ns: u64,
    /// From the command starting on the device to its completion
    pub start_to_end_ns: u64,
}

/// Append-only record of elapsed times, grouped by stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilingData {
    samples: BTreeMap<ProfilingStage, Vec<ElapsedTime>>,
}

impl ProfilingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: ProfilingStage, elapsed: ElapsedTime) {
        self.samples.entry(stage).or_default().push(elapsed);
    }

    /// Record a host-side measurement that has no device event behind it
    pub fn record_duration(&mut self, stage: ProfilingStage, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.record(
            stage,
            ElapsedTime {
                queued_to_end_ns: ns,
                start_to_end_ns: ns,
            },
        );
    }

    /// Wait for `event` to complete, then record its profiling timestamps
    ///
    /// The event must come from a queue created with profiling enabled.
    pub fn record_event(&mut self, stage: ProfilingStage, event: &Event) -> Result<ElapsedTime> {
        event.wait_for()?;
        let queued = timestamp(event, ProfilingInfo::Queued)?;
        let start = timestamp(event, ProfilingInfo::Start)?;
        let end = timestamp(event, ProfilingInfo::End)?;
        let elapsed = ElapsedTime {
            queued_to_end_ns: end.saturating_sub(queued),
            start_to_end_ns: end.saturating_sub(start),
        };
        self.record(stage, elapsed);
        Ok(elapsed)
    }

    pub fn samples(&self, stage: ProfilingStage) -> &[ElapsedTime] {
        self.samples.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of start→end times for a stage
    pub fn total_ns(&self, stage: ProfilingStage) -> u64 {
        self.samples(stage).iter().map(|s| s.start_to_end_ns).sum()
    }

    pub fn stages(&self) -> impl Iterator<Item = ProfilingStage> + '_ {
        self.samples.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

fn timestamp(event: &Event, info: ProfilingInfo) -> Result<u64> {
    match event.profiling_info(info)? {
        ProfilingInfoResult::Queued(t)
        | ProfilingInfoResult::Submit(t)
        | ProfilingInfoResult::Start(t)
        | ProfilingInfoResult::End(t) => Ok(t),
    }
}
