use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use offercache::{Offer, OfferCache, OfferId, PushOutcome};

const WAIT: Duration = Duration::from_millis(200);

fn offer(id: &str) -> Offer<()> {
    Offer::new(id, id, ())
}

fn id(id: &str) -> OfferId {
    OfferId::from(id)
}

fn seven_offers(cache: &OfferCache<()>) {
    for name in ["a", "b", "c", "d", "e", "f", "g"] {
        cache.push(offer(name)).unwrap();
    }
}

/// Pop until a pop does not complete within `WAIT`, returning what was popped.
async fn drain(cache: &OfferCache<()>) -> Vec<OfferId> {
    let mut popped = Vec::new();
    while let Ok(offer) = tokio::time::timeout(WAIT, cache.pop()).await {
        popped.push(offer.id);
    }
    popped
}

#[test]
fn test_push_scenarios() {
    let cases: Vec<(Vec<&str>, usize)> = vec![
        (vec!["a"], 1),
        (vec!["a", "a"], 1),
        (vec!["a", "b", "a"], 2),
        (vec!["a", "b", "c", "d", "e", "f", "g"], 5),
    ];

    for (i, (pushes, want)) in cases.into_iter().enumerate() {
        let cache = OfferCache::new(5).unwrap();
        for name in pushes {
            cache.push(offer(name)).unwrap();
        }
        assert_eq!(cache.len(), want, "case #{}", i);
    }
}

#[test]
fn test_rescind_scenarios() {
    let cases: Vec<(Vec<&str>, Vec<&str>, usize)> = vec![
        (vec!["a"], vec!["a"], 0),
        (vec!["a"], vec!["b"], 1),
        (vec![], vec!["a"], 0),
        (vec!["a", "b", "c", "d", "e", "f", "g"], vec!["a", "g"], 4),
    ];

    for (i, (pushes, rescinds, want)) in cases.into_iter().enumerate() {
        let cache = OfferCache::new(5).unwrap();
        for name in pushes {
            cache.push(offer(name)).unwrap();
        }
        for name in rescinds {
            cache.rescind(&id(name));
        }
        assert_eq!(cache.len(), want, "case #{}", i);
    }
}

#[test]
fn test_capacity_holds_most_recent_distinct_ids() {
    let cache = OfferCache::new(5).unwrap();
    for i in 0..100 {
        cache.push(offer(&i.to_string())).unwrap();
        // Re-pushing an older id that is still cached must not refresh it
        if i >= 2 {
            cache.push(offer(&(i - 2).to_string())).unwrap();
        }
    }

    assert_eq!(cache.len(), 5);
    for i in 95..100 {
        assert!(cache.contains(&id(&i.to_string())), "missing {}", i);
    }
}

#[test]
fn test_rescind_churn_stays_bounded() {
    let cache = OfferCache::new(5).unwrap();
    for i in 0..5000i64 {
        cache.rescind(&id(&(i - 50).to_string()));
        cache.push(offer(&i.to_string())).unwrap();
    }

    assert_eq!(cache.len(), 5);
    let metrics = cache.metrics();
    assert_eq!(metrics.evicted, 4995);
    assert_eq!(metrics.rescinded, 0);
}

#[tokio::test]
async fn test_pop_after_rescind_scenarios() {
    let cache = OfferCache::new(5).unwrap();
    cache.push(offer("a")).unwrap();
    cache.rescind(&id("b"));
    assert_eq!(drain(&cache).await, vec![id("a")]);

    let cache = OfferCache::new(5).unwrap();
    seven_offers(&cache);
    cache.rescind(&id("a"));
    cache.rescind(&id("g"));

    let popped = drain(&cache).await;
    assert_eq!(popped, vec![id("c"), id("d"), id("e"), id("f")]);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_pop_serves_oldest_first_after_replace() {
    let cache = OfferCache::new(5).unwrap();
    cache.push(Offer::new("a", "agent-1", 1)).unwrap();
    cache.push(Offer::new("b", "agent-1", 2)).unwrap();
    cache.push(Offer::new("a", "agent-1", 3)).unwrap();

    let first = cache.pop().await;
    assert_eq!(first.id, id("a"));
    assert_eq!(first.payload, 3);
    assert_eq!(cache.pop().await.id, id("b"));
}

#[tokio::test]
async fn test_waiters_are_served_in_arrival_order() {
    let cache = Arc::new(OfferCache::new(5).unwrap());

    let mut consumers = Vec::new();
    for expected_waiting in 1..=3 {
        let consumer_cache = cache.clone();
        consumers.push(tokio::spawn(async move { consumer_cache.pop().await.id }));
        while cache.waiting() < expected_waiting {
            tokio::task::yield_now().await;
        }
    }

    for name in ["x", "y", "z"] {
        assert_eq!(cache.push(offer(name)).unwrap(), PushOutcome::HandedOff);
    }

    let mut received = Vec::new();
    for consumer in consumers {
        received.push(consumer.await.unwrap());
    }
    assert_eq!(received, vec![id("x"), id("y"), id("z")]);
    assert_eq!(cache.waiting(), 0);
}

#[tokio::test]
async fn test_timed_out_pop_does_not_lose_offers() {
    let cache = OfferCache::new(5).unwrap();

    for _ in 0..10 {
        assert!(tokio::time::timeout(Duration::from_millis(5), cache.pop()).await.is_err());
    }
    assert_eq!(cache.waiting(), 0);

    cache.push(offer("a")).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.pop().await.id, id("a"));
}

#[test]
fn test_blocking_pop_exhaustion() {
    let cache = Arc::new(OfferCache::new(5).unwrap());
    seven_offers(&cache);
    cache.rescind(&id("a"));
    cache.rescind(&id("g"));

    let mut popped = 0;
    while cache.len() > 0 {
        let (tx, rx) = std_mpsc::channel();
        let worker_cache = cache.clone();
        thread::spawn(move || {
            let offer = worker_cache.blocking_pop();
            let _ = tx.send(offer.id);
        });

        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(_) => popped += 1,
            Err(_) => break,
        }
    }
    assert_eq!(popped, 4);

    // Nothing left: the next pop has to wait for a push
    let (tx, rx) = std_mpsc::channel();
    let worker_cache = cache.clone();
    thread::spawn(move || {
        let offer = worker_cache.blocking_pop();
        let _ = tx.send(offer.id);
    });
    assert!(rx.recv_timeout(WAIT).is_err());

    cache.push(offer("late")).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), id("late"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_push_rescind_pop_never_double_delivers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 1000;

    // Large enough that nothing is evicted, so every offer is accounted for
    let cache = Arc::new(OfferCache::new(PRODUCERS * PER_PRODUCER).unwrap());
    let rescinded = Arc::new(std::sync::Mutex::new(HashSet::new()));

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        consumers.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            while let Ok(offer) = tokio::time::timeout(Duration::from_millis(500), cache.pop()).await {
                ids.push(offer.id);
            }
            ids
        }));
    }

    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let cache = cache.clone();
        let rescinded = rescinded.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..PER_PRODUCER {
                let name = format!("{}-{}", p, i);
                cache.push(offer(&name)).unwrap();
                if i % 10 == 0 && cache.rescind(&id(&name)) {
                    rescinded.lock().unwrap().insert(id(&name));
                }
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    for producer in producers {
        producer.await.unwrap();
    }

    let mut delivered = HashSet::new();
    let mut delivered_count = 0;
    for consumer in consumers {
        for offer_id in consumer.await.unwrap() {
            delivered_count += 1;
            delivered.insert(offer_id);
        }
    }

    let rescinded = rescinded.lock().unwrap();
    assert_eq!(delivered.len(), delivered_count, "an offer was delivered twice");
    assert!(delivered.is_disjoint(&rescinded), "a rescinded offer was delivered");
    assert_eq!(delivered.len() + rescinded.len(), PRODUCERS * PER_PRODUCER);
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_churn_never_exceeds_capacity() {
    let cache = Arc::new(OfferCache::new(5).unwrap());
    let max_seen = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            let max_seen = max_seen.clone();
            thread::spawn(move || {
                for i in 0..5000i64 {
                    cache.rescind(&id(&format!("{}-{}", t, i - 50)));
                    cache.push(offer(&format!("{}-{}", t, i))).unwrap();
                    max_seen.fetch_max(cache.len(), Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 5);
    assert!(max_seen.load(Ordering::Relaxed) <= 5);
}
