use std::collections::BTreeSet;
use std::sync::Arc;

use super::*;

fn pool(size: u64) -> Vec<FeederRecord> {
    (0..size)
        .map(|id| {
            FeederRecord::new(BTreeMap::from([
                ("id".to_owned(), SessionValue::from(id)),
                ("name".to_owned(), SessionValue::from(format!("game-{}", id))),
            ]))
        })
        .collect()
}

#[test]
fn non_circular_feeders_exhaust_after_pool_size() -> Result<(), String> {
    for policy in [FeederPolicy::Sequential, FeederPolicy::Random] {
        let feeder = Feeder::new(pool(4), policy);
        for call in 0..4 {
            feeder
                .next()
                .map_err(|err| format!("{:?} call {} failed: {}", policy, call, err))?;
        }
        if feeder.next() != Err(StepError::FeederExhausted) {
            return Err(format!("{:?} should be exhausted", policy));
        }
    }
    Ok(())
}

#[test]
fn circular_feeder_never_exhausts() -> Result<(), String> {
    let feeder = Feeder::new(pool(3), FeederPolicy::Circular);
    for call in 0_usize..30 {
        let record = feeder
            .next()
            .map_err(|err| format!("call {} failed: {}", call, err))?;
        let expected = u64::try_from(call % 3).map_err(|err| err.to_string())?;
        if record.get("id") != Some(&SessionValue::from(expected)) {
            return Err(format!("call {} returned {:?}", call, record.get("id")));
        }
    }
    Ok(())
}

#[test]
fn empty_pool_is_exhausted_for_every_policy() -> Result<(), String> {
    for policy in [
        FeederPolicy::Sequential,
        FeederPolicy::Random,
        FeederPolicy::Circular,
    ] {
        let feeder = Feeder::new(Vec::new(), policy);
        if feeder.next() != Err(StepError::FeederExhausted) {
            return Err(format!("{:?} should fail on empty pool", policy));
        }
    }
    Ok(())
}

#[test]
fn sequential_feeder_never_double_issues_under_contention() -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(async {
        let feeder = Arc::new(Feeder::new(pool(200), FeederPolicy::Sequential));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let feeder = Arc::clone(&feeder);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(record) = feeder.next() {
                    seen.push(record.get("id").map(ToString::to_string));
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.map_err(|err| err.to_string())?);
        }
        let unique: BTreeSet<_> = all.iter().cloned().collect();
        if all.len() != 200 || unique.len() != 200 {
            return Err(format!(
                "Expected 200 unique records, got {} ({} unique)",
                all.len(),
                unique.len()
            ));
        }
        Ok(())
    })
}

#[test]
fn parse_records_rejects_non_objects() -> Result<(), String> {
    let value = serde_json::json!([{"id": 1}, "oops"]);
    if parse_records(value).is_ok() {
        return Err("Expected non-object row to be rejected".to_owned());
    }
    if parse_records(serde_json::json!({"id": 1})).is_ok() {
        return Err("Expected non-array document to be rejected".to_owned());
    }
    Ok(())
}

#[test]
fn load_records_reads_json_file() -> Result<(), String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("games.json");
    std::fs::write(
        &path,
        r#"[{"id": 1, "name": "Mario", "reviewScore": 95}, {"id": 2, "name": "Zelda", "reviewScore": 98}]"#,
    )
    .map_err(|err| err.to_string())?;
    let records = load_records(&path).map_err(|err| err.to_string())?;
    if records.len() != 2 {
        return Err(format!("Expected 2 records, got {}", records.len()));
    }
    let name = records
        .get(1)
        .and_then(|record| record.get("name"))
        .and_then(SessionValue::as_str);
    if name != Some("Zelda") {
        return Err(format!("Unexpected name: {:?}", name));
    }
    Ok(())
}
