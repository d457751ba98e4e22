use sgn_common::AnalysisRequest;
use sgn_idempotency::{IdempotencyCache, IdempotencyError};
use std::sync::Arc;

#[test]
fn test_concurrent_lookups_never_cross_payloads() {
    let cache: Arc<IdempotencyCache<String>> = Arc::new(IdempotencyCache::default());
    let payloads = [
        AnalysisRequest::new("primeiro documento", "PGR"),
        AnalysisRequest::new("segundo documento", "PCMSO"),
    ];

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = cache.clone();
            let payloads = payloads.clone();
            std::thread::spawn(move || {
                let mine = worker % 2;
                let request = &payloads[mine];
                let response = format!("response-{}", mine);
                for round in 0..200 {
                    if round % 3 == 0 {
                        cache.save("shared", request, response.clone());
                    }
                    match cache.get("shared", request) {
                        Ok(Some(found)) => {
                            assert_eq!(found, response, "worker {} got another payload's response", worker);
                        }
                        Ok(None) => {}
                        Err(IdempotencyError::Conflict { key }) => assert_eq!(key, "shared"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Whichever save landed last, the survivor still matches its own payload.
    assert_eq!(cache.len(), 1);
    let outcomes: Vec<_> = payloads.iter().map(|p| cache.get("shared", p)).collect();
    let hits = outcomes.iter().filter(|o| matches!(o, Ok(Some(_)))).count();
    assert_eq!(hits, 1);
}
