//! Mutating a directory between resumed iteration calls may skip or repeat entries,
//! but never corrupts the indices or yields records that are gone.

use attrdir::api::AttrApi;
use attrdir::config::AttrConfig;
use attrdir::iterate::IterStatus;
use attrdir::model::{AttrCreateParams, IndexType, IterOrder};
use attrdir::store::mem_backend::MemBackend;
use attrdir::store::StorageMode;

fn api_with(names: &[String]) -> AttrApi<MemBackend> {
    let mut api = AttrApi::init(MemBackend::new(), AttrConfig::default()).unwrap();
    let dt = api.register_datatype(1).unwrap();
    let sp = api.register_dataspace(&[]).unwrap();
    for n in names {
        api.create("/", n, dt, sp, AttrCreateParams::default())
            .unwrap();
    }
    api
}

fn step(
    api: &AttrApi<MemBackend>,
    index_type: IndexType,
    cursor: &mut u64,
    seen: &mut Vec<String>,
) -> IterStatus {
    api.iterate("/", index_type, IterOrder::Increasing, cursor, |n, _| {
        seen.push(n.to_string());
        1
    })
    .unwrap()
}

#[test]
fn test_interleaved_deletes_across_demotion() {
    let names: Vec<String> = (0..12).map(|i| format!("n{:02}", i)).collect();
    let mut api = api_with(&names);
    assert_eq!(api.storage_mode("/").unwrap(), StorageMode::Dense);

    let mut cursor = 0;
    let mut seen = Vec::new();
    let mut victims = names.iter();

    loop {
        if step(&api, IndexType::Name, &mut cursor, &mut seen).is_completed() {
            break;
        }
        // Deleting records behind the cursor slides unvisited ones below it, so they are skipped.
        for victim in victims.by_ref().take(2) {
            api.delete("/", victim).unwrap();
        }
        api.container().directory("/").unwrap().verify().unwrap();
        if cursor > api.count("/").unwrap() as u64 {
            break;
        }
    }

    assert_eq!(api.storage_mode("/").unwrap(), StorageMode::Compact);
    assert_eq!(seen, vec!["n00", "n03", "n06", "n09"]);
    for n in &seen {
        assert!(names.contains(n));
    }
}

#[test]
fn test_interleaved_inserts_in_creation_order() {
    let names: Vec<String> = (0..4).map(|i| format!("a{}", i)).collect();
    let mut api = api_with(&names);
    let dt = api.register_datatype(1).unwrap();
    let sp = api.register_dataspace(&[]).unwrap();

    let mut cursor = 0;
    let mut seen = Vec::new();
    let mut added = 0;
    while !step(&api, IndexType::CreationOrder, &mut cursor, &mut seen).is_completed() {
        if added < 8 {
            api.create("/", &format!("b{}", added), dt, sp, AttrCreateParams::default())
                .unwrap();
            added += 1;
        }
    }

    // Appends land after the cursor in creation order, so every record is seen once.
    let all: Vec<String> = api
        .list("/", IndexType::CreationOrder, IterOrder::Increasing)
        .unwrap()
        .into_iter()
        .map(|(n, _)| n)
        .collect();
    assert_eq!(seen, all);
    assert_eq!(cursor, 12);
    api.container().directory("/").unwrap().verify().unwrap();
}

#[test]
fn test_cursor_past_shrunken_directory_is_rejected() {
    let names: Vec<String> = (0..5).map(|i| format!("x{}", i)).collect();
    let mut api = api_with(&names);
    let mut cursor = 4;
    let mut seen = Vec::new();
    step(&api, IndexType::Name, &mut cursor, &mut seen);
    assert_eq!(cursor, 5);

    api.delete("/", "x0").unwrap();
    let err = api
        .iterate("/", IndexType::Name, IterOrder::Increasing, &mut cursor, |_, _| 0)
        .unwrap_err();
    assert!(err.to_string().contains("Index out of range"));
}
