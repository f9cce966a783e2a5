use std::sync::Arc;
use std::thread;

use qualify::{
    field, Bucket, CategorizedResults, Context, EligibilityEngine, RuleDefinition, RulePackage,
};

fn engine() -> EligibilityEngine {
    let package = RulePackage::new("federal", "US", "1.0.0")
        .rule(RuleDefinition::new(
            "snap-gross-income",
            "snap",
            field("householdIncome").lte(2500_i64),
        ))
        .rule(RuleDefinition::new("snap-size", "snap", field("householdSize").gte(1_i64)))
        .rule(RuleDefinition::new("ssi-age", "ssi", field("age").gte(65_i64)))
        .rule(RuleDefinition::new("ssi-citizen", "ssi", field("citizenship").eq("citizen")));
    EligibilityEngine::default().with_package(package).unwrap()
}

#[test]
fn evaluate_across_threads() {
    let engine = Arc::new(engine());
    let mut handles = vec![];

    // Thread 1: low income senior citizen -> both programs
    let e = Arc::clone(&engine);
    handles.push(thread::spawn(move || {
        let ctx = Context::new()
            .set("householdIncome", 1200_i64)
            .set("householdSize", 1_i64)
            .set("age", 70_i64)
            .set("citizenship", "citizen");
        e.evaluate(&ctx)
    }));

    // Thread 2: over the income limit -> snap hard stop
    let e = Arc::clone(&engine);
    handles.push(thread::spawn(move || {
        let ctx = Context::new()
            .set("householdIncome", 4000_i64)
            .set("householdSize", 4_i64)
            .set("age", 30_i64)
            .set("citizenship", "citizen");
        e.evaluate(&ctx)
    }));

    // Thread 3: empty profile -> snap stopped by income, ssi needs answers
    let e = Arc::clone(&engine);
    handles.push(thread::spawn(move || e.evaluate(&Context::new())));

    let results: Vec<CategorizedResults> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results[0].bucket_of("snap"), Some(Bucket::Qualified));
    assert_eq!(results[0].bucket_of("ssi"), Some(Bucket::Qualified));

    assert_eq!(results[1].bucket_of("snap"), Some(Bucket::NotQualified));
    assert_eq!(
        results[1].verdict("snap").unwrap().hard_stop.as_deref(),
        Some("snap-gross-income")
    );
    assert_eq!(results[1].bucket_of("ssi"), Some(Bucket::Maybe));

    assert_eq!(results[2].total_programs(), 2);
    assert_eq!(results[2].bucket_of("snap"), Some(Bucket::NotQualified));
    assert_eq!(results[2].bucket_of("ssi"), Some(Bucket::Maybe));
    assert!(results[2].verdict("ssi").unwrap().incomplete_profile);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_shared_with_async_tasks() {
    let engine = Arc::new(engine());
    let tasks: Vec<_> = (0..8_i64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || {
                let ctx = Context::new()
                    .set("householdIncome", 1000 + i * 500)
                    .set("householdSize", 2_i64);
                engine.evaluate(&ctx).bucket_of("snap")
            })
        })
        .collect();

    let mut buckets = Vec::new();
    for task in tasks {
        buckets.push(task.await.unwrap());
    }
    // Income 1000..=2500 passes; above that the income rule is a hard stop.
    let expected: Vec<Option<Bucket>> = (0..8_i64)
        .map(|i| {
            if 1000 + i * 500 <= 2500 {
                Some(Bucket::Qualified)
            } else {
                Some(Bucket::NotQualified)
            }
        })
        .collect();
    assert_eq!(buckets, expected);
}
