// SPDX-License-Identifier: MIT OR Apache-2.0
//! S4 — twenty concurrent debits against a 100-cent budget at 10 cents each
//! let exactly ten succeed, never more, regardless of interleaving.

use requiem_budget::BudgetChecker;
use requiem_id::FixedClock;
use std::sync::Arc;

#[tokio::test]
async fn concurrent_debits_never_overdraw_the_budget() {
    let clock = Arc::new(FixedClock::new(0));
    let checker = Arc::new(BudgetChecker::new(clock, 100, 3600));
    checker.configure_tenant("tenant-a", 100, 3600);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let checker = checker.clone();
        handles.push(tokio::spawn(async move {
            checker.check_and_debit("tenant-a", 10).is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 10, "exactly ten of twenty 10-cent debits must fit in a 100-cent budget");
    let state = checker.state("tenant-a").unwrap();
    assert_eq!(state.used_cents, 100);
    assert!(state.used_cents <= state.limit_cents);
}
