//! Tests for the append-only schedule history ledger.

use super::support::day;
use crate::schedule::domain::{
    LedgerDigest, LedgerError, LedgerRecord, ScheduleChange, ScheduleChangeReason,
    ScheduleHistoryEntry, ScheduleLedger, TaskId,
};
use chrono::{DateTime, Utc};
use eyre::ensure;
use rstest::{fixture, rstest};

fn entry_at(task_id: TaskId, created_at: DateTime<Utc>) -> ScheduleHistoryEntry {
    ScheduleHistoryEntry::new(
        ScheduleChange {
            task_id,
            old_expected_start: Some(day(1)),
            old_expected_end: Some(day(2)),
            new_expected_start: Some(day(3)),
            new_expected_end: Some(day(4)),
            reason: ScheduleChangeReason::DependencyDelay,
            causing_task_id: None,
            changed_by: None,
        },
        created_at,
    )
}

#[fixture]
fn ledger() -> ScheduleLedger {
    ScheduleLedger::new()
}

#[rstest]
fn records_are_sequenced_and_chained(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let task = TaskId::new();
    let first_digest = ledger.record(entry_at(task, day(0)))?.digest();
    let second = ledger.record(entry_at(task, day(1)))?;

    ensure!(second.sequence() == 1);
    ensure!(second.previous_digest() == first_digest);
    ensure!(first_digest != LedgerDigest::GENESIS);
    let last = ledger.records().last().map(LedgerRecord::digest);
    ensure!(last == Some(ledger.head()));
    ledger.verify()?;
    Ok(())
}

#[rstest]
fn empty_ledger_heads_at_genesis(ledger: ScheduleLedger) -> eyre::Result<()> {
    ensure!(ledger.is_empty());
    ensure!(ledger.head() == LedgerDigest::GENESIS);
    ensure!(ledger.head().to_string() == "0".repeat(64));
    ledger.verify()?;
    Ok(())
}

#[rstest]
fn duplicate_entries_are_rejected(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let entry = entry_at(TaskId::new(), day(0));
    ledger.record(entry.clone())?;

    let result = ledger.record(entry.clone()).map(|_| ());

    ensure!(result == Err(LedgerError::DuplicateEntry(entry.id())));
    ensure!(ledger.len() == 1);
    Ok(())
}

#[rstest]
fn out_of_order_entries_are_rejected(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    ledger.record(entry_at(TaskId::new(), day(2)))?;

    let late = entry_at(TaskId::new(), day(1));
    let result = ledger.record(late.clone()).map(|_| ());

    ensure!(
        result
            == Err(LedgerError::OutOfOrder {
                entry_id: late.id(),
                created_at: day(1),
                latest: day(2),
            }),
        "unexpected result {result:?}"
    );
    Ok(())
}

#[rstest]
fn failed_batch_leaves_the_ledger_untouched(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let task = TaskId::new();
    ledger.record(entry_at(task, day(0)))?;
    let head = ledger.head();

    let result = ledger.record_all([entry_at(task, day(3)), entry_at(task, day(2))]);

    ensure!(result.is_err());
    ensure!(ledger.len() == 1);
    ensure!(ledger.head() == head);
    Ok(())
}

#[rstest]
fn entries_for_filters_by_task_in_order(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let task = TaskId::new();
    let other = TaskId::new();
    let first = entry_at(task, day(0));
    let second = entry_at(task, day(1));
    ledger.record_all([first.clone(), entry_at(other, day(1)), second.clone()])?;

    let entries: Vec<_> = ledger.entries_for(task).cloned().collect();

    ensure!(entries == vec![first, second]);
    ensure!(ledger.entries_for(TaskId::new()).next().is_none());
    Ok(())
}

#[rstest]
fn tampering_is_detected_at_the_edited_record(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let task = TaskId::new();
    ledger.record_all([
        entry_at(task, day(0)),
        entry_at(task, day(1)),
        entry_at(task, day(2)),
    ])?;

    ledger.tamper_with(1, entry_at(task, day(1)));

    ensure!(ledger.verify() == Err(LedgerError::Tampered { sequence: 1 }));
    Ok(())
}

#[rstest]
fn entries_survive_json_round_trip(mut ledger: ScheduleLedger) -> eyre::Result<()> {
    let entry = entry_at(TaskId::new(), day(0));
    let encoded = serde_json::to_value(&entry)?;
    ensure!(
        encoded.get("reason").and_then(serde_json::Value::as_str) == Some("dependency_delay")
    );

    let decoded: ScheduleHistoryEntry = serde_json::from_value(encoded)?;
    ensure!(decoded == entry);
    ledger.record(decoded)?;
    ledger.verify()?;
    Ok(())
}
