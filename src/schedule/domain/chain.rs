//! Causal chain reconstruction over the schedule ledger.

use super::{
    LedgerRecord, ScheduleConfig, ScheduleEngineError, ScheduleHistoryEntry, ScheduleLedger, TaskId,
};
use chrono::TimeDelta;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// One history entry together with the change that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CausalLink {
    /// The explained entry.
    pub entry: ScheduleHistoryEntry,
    /// The causing task's latest change before `entry`, when recorded.
    pub cause: Option<Box<CausalLink>>,
}

impl CausalLink {
    /// Number of links from this one down to its deepest cause.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            depth += 1;
            current = cause;
        }
        depth
    }

    /// The task at the bottom of this chain: either a task with no recorded
    /// history of its own, or one whose change had no cause.
    #[must_use]
    pub fn root_cause(&self) -> TaskId {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
            .entry
            .causing_task_id()
            .unwrap_or_else(|| current.entry.task_id())
    }
}

/// Why a task's schedule moved, as a tree of causes.
///
/// Reconstruction fails closed: loops and over-deep chains end the affected
/// branch and are reported in `warnings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CausalChain {
    /// Explained task.
    pub task_id: TaskId,
    /// One link per history entry of the task, oldest first.
    pub links: Vec<CausalLink>,
    /// Problems met while walking causes.
    pub warnings: Vec<ScheduleEngineError>,
}

impl CausalChain {
    /// Returns `true` when every branch was followed to its end.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Root cause of the most recent change.
    #[must_use]
    pub fn root_cause(&self) -> Option<TaskId> {
        self.links.last().map(CausalLink::root_cause)
    }

    /// Net movement of the task's planned end across all its entries.
    #[must_use]
    pub fn net_end_shift(&self) -> TimeDelta {
        self.links
            .iter()
            .filter_map(|link| link.entry.end_shift())
            .fold(TimeDelta::zero(), |total, shift| {
                total.checked_add(&shift).unwrap_or(total)
            })
    }
}

impl ScheduleLedger {
    /// Rebuilds the causal tree explaining `task_id`'s schedule changes.
    ///
    /// Each entry's `causing_task_id` resolves to that task's latest entry
    /// recorded before it, recursively, up to `config.max_chain_depth`.
    #[must_use]
    pub fn reconstruct_chain(&self, task_id: TaskId, config: &ScheduleConfig) -> CausalChain {
        let mut walker = ChainWalker {
            ledger: self,
            max_depth: config.max_chain_depth,
            warnings: Vec::new(),
        };
        let links = self
            .records_for(task_id)
            .map(|record| {
                let mut path = BTreeSet::from([task_id]);
                walker.link(record, &mut path, 1)
            })
            .collect();

        if !walker.warnings.is_empty() {
            warn!(
                task = %task_id,
                warnings = walker.warnings.len(),
                "causal chain reconstruction returned a partial chain"
            );
        }
        CausalChain {
            task_id,
            links,
            warnings: walker.warnings,
        }
    }
}

struct ChainWalker<'a> {
    ledger: &'a ScheduleLedger,
    max_depth: usize,
    warnings: Vec<ScheduleEngineError>,
}

impl ChainWalker<'_> {
    fn link(
        &mut self,
        record: &LedgerRecord,
        path: &mut BTreeSet<TaskId>,
        depth: usize,
    ) -> CausalLink {
        let entry = record.entry().clone();
        let Some(cause_id) = entry.causing_task_id() else {
            return CausalLink { entry, cause: None };
        };

        if path.contains(&cause_id) {
            self.warnings
                .push(ScheduleEngineError::ChainReconstructionCycle(cause_id));
            return CausalLink { entry, cause: None };
        }
        let ledger = self.ledger;
        let Some(cause_record) = ledger.latest_before(cause_id, record.sequence()) else {
            return CausalLink { entry, cause: None };
        };
        if depth >= self.max_depth {
            self.warnings.push(ScheduleEngineError::ChainDepthExceeded {
                task_id: cause_id,
                depth: self.max_depth,
            });
            return CausalLink { entry, cause: None };
        }

        path.insert(cause_id);
        let cause = self.link(cause_record, path, depth + 1);
        path.remove(&cause_id);
        CausalLink {
            entry,
            cause: Some(Box::new(cause)),
        }
    }
}

impl fmt::Display for CausalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "task {}: {} schedule change(s)", self.task_id, self.links.len())?;
        for link in &self.links {
            write_link(f, link, 1)?;
        }
        for warning in &self.warnings {
            writeln!(f, "! {warning}")?;
        }
        Ok(())
    }
}

fn write_link(f: &mut fmt::Formatter<'_>, link: &CausalLink, level: usize) -> fmt::Result {
    let entry = &link.entry;
    let indent = "  ".repeat(level);
    write!(
        f,
        "{indent}- {} task {} {}",
        entry.created_at().format("%Y-%m-%d %H:%M"),
        entry.task_id(),
        entry.reason()
    )?;
    if let Some(shift) = entry.end_shift() {
        write!(f, " ({})", format_shift(shift))?;
    }
    match entry.causing_task_id() {
        Some(cause) => writeln!(f, ", shifted by task {cause}")?,
        None => writeln!(f)?,
    }
    match link.cause.as_deref() {
        Some(cause) => write_link(f, cause, level + 1),
        None => Ok(()),
    }
}

/// Formats a signed shift as days and hours, e.g. `+3d`, `-1d 6h`, `+5h`.
#[must_use]
pub fn format_shift(shift: TimeDelta) -> String {
    let sign = if shift < TimeDelta::zero() { '-' } else { '+' };
    let magnitude = shift.abs();
    let days = magnitude.num_days();
    let hours = magnitude.num_hours() - days * 24;
    match (days, hours) {
        (0, hours) => format!("{sign}{hours}h"),
        (days, 0) => format!("{sign}{days}d"),
        (days, hours) => format!("{sign}{days}d {hours}h"),
    }
}
