#![forbid(unsafe_code)]

use kb_core::ids::TaskId;
use kb_storage::{FieldOverrides, MemoryOverrideCache, OverrideCache, SqliteOverrideCache};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("kb_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn durable(id: &str) -> TaskId {
    TaskId::durable(id).expect("durable id")
}

fn exercise_last_write_wins(cache: &mut dyn OverrideCache) {
    let id = durable("t1");
    assert_eq!(cache.status(&id).expect("get"), None);

    cache.set_status(&id, "inprogress").expect("set");
    cache.set_status(&id, "done").expect("set again");
    assert_eq!(cache.status(&id).expect("get"), Some("done".to_string()));

    assert!(cache.clear(&id).expect("clear"));
    assert!(!cache.clear(&id).expect("clear twice"));
    assert_eq!(cache.get(&id).expect("get"), None);
}

fn exercise_tag_separation_and_rename(cache: &mut dyn OverrideCache) {
    let temp = TaskId::temporary("same").expect("temp id");
    let same_durable = durable("same");
    let target = durable("srv-9");

    cache.set_status(&temp, "done").expect("set temp");
    assert_eq!(cache.status(&same_durable).expect("get"), None);

    assert!(cache.rename(&temp, &target).expect("rename"));
    assert_eq!(cache.status(&temp).expect("get temp"), None);
    assert_eq!(
        cache.status(&target).expect("get target"),
        Some("done".to_string())
    );
    assert!(!cache.rename(&temp, &target).expect("rename missing"));
}

#[test]
fn memory_cache_is_last_write_wins() {
    let mut cache = MemoryOverrideCache::new();
    exercise_last_write_wins(&mut cache);
    exercise_tag_separation_and_rename(&mut cache);
    assert_eq!(cache.len(), 1);
}

#[test]
fn sqlite_cache_is_last_write_wins() {
    let dir = temp_dir("sqlite_cache_is_last_write_wins");
    let mut cache = SqliteOverrideCache::open(&dir).expect("open cache");
    exercise_last_write_wins(&mut cache);
    exercise_tag_separation_and_rename(&mut cache);
    assert_eq!(cache.len().expect("len"), 1);
}

#[test]
fn sqlite_cache_survives_reopen() {
    let dir = temp_dir("sqlite_cache_survives_reopen");
    {
        let mut cache = SqliteOverrideCache::open(&dir).expect("open cache");
        cache.set_status(&durable("t7"), "done").expect("set");
        cache.set_status(&durable("t8"), "todo").expect("set");
        cache.clear(&durable("t8")).expect("clear");
    }
    let cache = SqliteOverrideCache::open(&dir).expect("reopen cache");
    assert_eq!(
        cache.status(&durable("t7")).expect("get"),
        Some("done".to_string())
    );
    assert_eq!(cache.status(&durable("t8")).expect("get"), None);
}

#[test]
fn empty_overrides_remove_the_record() {
    let dir = temp_dir("empty_overrides_remove_the_record");
    let mut cache = SqliteOverrideCache::open(&dir).expect("open cache");
    let id = durable("t1");
    cache.set_status(&id, "done").expect("set");
    cache.put(&id, &FieldOverrides::default()).expect("put empty");
    assert_eq!(cache.get(&id).expect("get"), None);
    assert_eq!(cache.len().expect("len"), 0);
}
