//! Unit tests for the schedule bounded context.

mod support;

mod ledger_tests;
