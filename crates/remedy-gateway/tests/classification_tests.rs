use proptest::prelude::*;
use remedy_gateway::{InMemoryMetrics, OperationContext, SafetyGateway, SafetyMetrics, Verdict};

proptest! {
    // classify is a pure function: repeated calls with the same inputs
    // always agree, including across confirmation states.
    #[test]
    fn classify_is_deterministic(operation in ".{0,80}", confirmed in any::<bool>()) {
        let gateway = SafetyGateway::new();
        let mut ctx = OperationContext::new("proptest");
        if confirmed {
            ctx = ctx.confirmed();
        }
        let first = gateway.classify(&operation, &ctx);
        for _ in 0..3 {
            prop_assert_eq!(gateway.classify(&operation, &ctx), first.clone());
        }
    }

    // blocked + successful == total after any sequence of recordings.
    #[test]
    fn counter_invariant_holds(ops in prop::collection::vec(any::<bool>(), 0..64)) {
        let metrics = InMemoryMetrics::new();
        for blocked in &ops {
            if *blocked {
                metrics.record_blocked("rm -rf /data");
            } else {
                metrics.record_successful("restart service api");
            }
        }
        let totals = metrics.totals();
        prop_assert_eq!(totals.blocked_ops + totals.successful_ops, totals.total_ops);
        prop_assert_eq!(totals.total_ops, ops.len() as u64);
    }
}

#[test]
fn concurrent_classification_agrees() {
    let gateway = std::sync::Arc::new(SafetyGateway::new());
    let ctx = OperationContext::new("concurrent");
    let expected = gateway.classify("rm -rf /data", &ctx);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gateway = gateway.clone();
            let ctx = ctx.clone();
            std::thread::spawn(move || gateway.classify("rm -rf /data", &ctx))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(expected.decision, Verdict::Block);
}
