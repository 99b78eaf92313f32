//! Integration tests for stylestore.
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::too_many_lines,
    clippy::doc_markdown,
    clippy::redundant_closure_for_method_calls
)]

use chrono::{Duration, Local, TimeZone};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stylestore::config::StyleStoreConfig;
use stylestore::services::NoopStylesChanged;
use stylestore::{
    BackgroundTask, BackupService, Collection, EncryptionSettings, Error, RestoreError, StylePaths,
    StyleRecord, StyleService, StylesChanged,
};
use tempfile::TempDir;

fn service_in(dir: &TempDir) -> StyleService {
    StyleService::new(StyleStoreConfig::rooted_at(dir.path())).unwrap()
}

fn names(collection: &Collection) -> Vec<String> {
    collection.iter().map(|r| r.name.clone()).collect()
}

fn name_set(collection: &Collection) -> BTreeSet<String> {
    collection.iter().map(|r| r.name.clone()).collect()
}

fn records(names: &[&str]) -> Collection {
    names
        .iter()
        .map(|n| StyleRecord::new(*n, format!("{n} prompt"), format!("{n} negative")))
        .collect()
}

#[test]
fn test_roundtrip_through_service() {
    let dir = TempDir::new().unwrap();
    let data: Collection = vec![
        StyleRecord::new("portrait", "a face, \"smiling\"", "blurry"),
        StyleRecord::new("landscape", "mountains; lake", ""),
        StyleRecord::new("empty", "", ""),
    ]
    .into();

    {
        let service = service_in(&dir);
        service.save_collection("", data.clone()).unwrap();
    }

    let reopened = service_in(&dir);
    let loaded = reopened.collection("").unwrap();
    let triples = |c: &Collection| -> Vec<(String, String, String)> {
        c.iter()
            .map(|r| (r.name.clone(), r.prompt.clone(), r.negative_prompt.clone()))
            .collect()
    };
    assert_eq!(triples(&loaded), triples(&data));
}

#[test]
fn test_duplicate_names_get_suffixed() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service.save_collection("", records(&["a", "a", "a"])).unwrap();

    let reopened = service_in(&dir);
    assert_eq!(names(&reopened.collection("").unwrap()), vec!["a", "ax", "axx"]);
}

#[test]
fn test_newline_survives_once() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection(
            "",
            vec![StyleRecord::new("multi", "line1<br>line2", "").with_notes("a\nb")].into(),
        )
        .unwrap();

    let raw = std::fs::read_to_string(service.paths().default_style_file()).unwrap();
    assert!(raw.contains("line1\nline2"));

    for _ in 0..3 {
        let reopened = service_in(&dir);
        let loaded = reopened.collection("").unwrap();
        assert_eq!(loaded.records()[0].prompt, "line1<br>line2");
        assert_eq!(loaded.records()[0].notes, "a<br>b");
        reopened.save_collection("", loaded).unwrap();
    }
}

#[test]
fn test_file_starts_with_bom_and_header_heals() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    let path = service.paths().default_style_file().to_path_buf();
    std::fs::write(&path, "Wrong,Header\nkept,p,n\n").unwrap();

    let loaded = service.collection("").unwrap();
    assert_eq!(names(&loaded), vec!["kept"]);
    service.save_collection("", loaded).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBFname,prompt,negative_prompt\n"));
}

#[test]
fn test_extract_merge_inverse() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection("", records(&["cat::x", "cat::y", "plain"]))
        .unwrap();

    service.extract().unwrap();
    let merged = service.merge().unwrap();

    let expected: BTreeSet<String> = ["cat::x", "cat::y", "plain"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(name_set(&merged), expected);
    assert_eq!(merged.records()[0].name, "plain");
    assert_eq!(names(&service.collection("cat").unwrap()), vec!["x", "y"]);
    assert_eq!(service.partitions(false).unwrap(), vec!["cat"]);
}

#[test]
fn test_partition_edits_flow_back_on_merge() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection("", records(&["cat::x", "plain"]))
        .unwrap();
    service.extract().unwrap();

    let mut cat = service.collection("cat").unwrap();
    cat.push(StyleRecord::new("manual", "typed in partition", ""));
    service.save_collection("cat", cat).unwrap();

    let merged = service.merge().unwrap();
    assert_eq!(names(&merged), vec!["plain", "cat::x", "cat::manual"]);
    assert_eq!(
        merged.get("cat::manual").unwrap().prompt,
        "typed in partition"
    );
}

#[test]
fn test_emptied_partition_removed_on_merge() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection("", records(&["cat::x", "dog::y"]))
        .unwrap();
    service.extract().unwrap();

    service.save_collection("cat", Collection::new()).unwrap();
    service.merge().unwrap();

    assert_eq!(service.partitions(false).unwrap(), vec!["dog"]);
    assert!(!service.paths().partition_dir().join("cat.csv").exists());
}

#[test]
fn test_partition_mode_toggle_keeps_unmappable_prefixes() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection("", records(&["::empty", "..::dots", "a/b::slash", "cat::x", "plain"]))
        .unwrap();

    service.set_partition_mode(true).unwrap();
    assert_eq!(service.partitions(false).unwrap(), vec!["cat"]);
    service.set_partition_mode(false).unwrap();

    let merged = service.collection("").unwrap();
    assert_eq!(
        name_set(&merged),
        ["::empty", "..::dots", "a/b::slash", "cat::x", "plain"]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
    );
    assert_eq!(merged.get("a/b::slash").unwrap().prompt, "a/b::slash prompt");
}

#[test]
fn test_failed_move_leaves_default_unchanged() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service.save_collection("", records(&["x"])).unwrap();

    assert!(matches!(service.move_style("x", ".."), Err(Error::InvalidInput(_))));
    assert_eq!(names(&service.collection("").unwrap()), vec!["x"]);
    assert_eq!(names(&service.merge().unwrap()), vec!["x"]);
}

#[test]
fn test_notes_follow_styles_into_partitions() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection(
            "",
            vec![StyleRecord::new("cat::x", "p", "").with_notes("remember me")].into(),
        )
        .unwrap();
    service.extract().unwrap();

    let reopened = service_in(&dir);
    assert_eq!(
        reopened.collection("cat").unwrap().records()[0].notes,
        "remember me"
    );
}

#[test]
fn test_backup_retention_keeps_24_newest() {
    let dir = TempDir::new().unwrap();
    let config = StyleStoreConfig::rooted_at(dir.path());
    let paths = Arc::new(StylePaths::from_config(&config));
    paths.ensure_dirs().unwrap();
    std::fs::write(paths.default_style_file(), "name,prompt,negative_prompt\n").unwrap();
    let backups = BackupService::new(
        Arc::clone(&paths),
        config.backup_retention,
        EncryptionSettings::default(),
    );

    let start = Local.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap();
    for minute in 0..30 {
        backups.backup_at(start + Duration::minutes(minute)).unwrap();
    }

    let kept: Vec<String> = backups
        .list()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: Vec<String> = (6..30)
        .rev()
        .map(|m| (start + Duration::minutes(m)).format("%y%m%d_%H%M.csv").to_string())
        .collect();
    assert_eq!(kept.len(), 24);
    assert_eq!(kept, expected);
}

#[test]
fn test_restore_bad_extension_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service.save_collection("", records(&["a", "b"])).unwrap();
    let path = service.paths().default_style_file().to_path_buf();
    let before = std::fs::read(&path).unwrap();

    let bad = dir.path().join("bad.txt");
    std::fs::write(&bad, "name,prompt,negative_prompt\nz,,\n").unwrap();
    let err = service.restore(&bad).unwrap_err();

    assert!(matches!(err, Error::Restore(RestoreError::UnsupportedExtension)));
    assert_eq!(err.to_string(), "Can only restore from .csv or .aes file");
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_restore_refreshes_collections_and_partitions() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service
        .save_collection("", records(&["cat::x", "plain"]))
        .unwrap();
    let backup = service.backup_now().unwrap().unwrap();

    service.save_collection("", records(&["other"])).unwrap();
    assert_eq!(names(&service.collection("").unwrap()), vec!["other"]);

    service.restore(&backup).unwrap();
    assert_eq!(
        names(&service.collection("").unwrap()),
        vec!["cat::x", "plain"]
    );
    assert_eq!(names(&service.collection("cat").unwrap()), vec!["x"]);
    assert!(backup.exists());
}

#[cfg(feature = "encryption")]
#[test]
fn test_encrypted_backup_and_wrong_key_rollback() {
    let dir = TempDir::new().unwrap();
    let config = StyleStoreConfig::rooted_at(dir.path())
        .with_encryption(EncryptionSettings::with_passphrase("open sesame"));
    let service = StyleService::new(config).unwrap();
    service.save_collection("", records(&["secret"])).unwrap();

    let backup = service.backup_now().unwrap().unwrap();
    assert_eq!(backup.extension().unwrap(), "aes");
    let raw = std::fs::read(&backup).unwrap();
    assert!(!String::from_utf8_lossy(&raw).contains("secret prompt"));

    service.save_collection("", records(&["changed"])).unwrap();
    let path = service.paths().default_style_file().to_path_buf();
    let before = std::fs::read(&path).unwrap();

    service.set_encryption(EncryptionSettings::with_passphrase("wrong"));
    let err = service.restore(&backup).unwrap_err();
    assert!(matches!(err, Error::Restore(RestoreError::DecryptionFailed)));
    assert_eq!(std::fs::read(&path).unwrap(), before);

    service.set_encryption(EncryptionSettings::with_passphrase("open sesame"));
    service.restore(&backup).unwrap();
    assert_eq!(names(&service.collection("").unwrap()), vec!["secret"]);
}

#[test]
fn test_scheduler_idle_then_single_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let task = BackgroundTask::new("idle-check", std::time::Duration::from_secs(3600), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    for _ in 0..1000 {
        task.tick();
    }
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    task.set_pending();
    for _ in 0..10 {
        task.tick();
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!task.is_pending());
}

#[test]
fn test_idle_service_never_backs_up() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    std::fs::write(
        service.paths().default_style_file(),
        "name,prompt,negative_prompt\na,,\n",
    )
    .unwrap();

    for _ in 0..20 {
        service.auto_backup().tick();
    }
    assert!(service.backups().unwrap().is_empty());

    let _ = service.collection("").unwrap();
    service.auto_backup().tick();
    assert!(service.backups().unwrap().is_empty());

    service.save_collection("", records(&["b"])).unwrap();
    service.auto_backup().tick();
    service.auto_backup().tick();
    assert_eq!(service.backups().unwrap().len(), 1);
}

#[derive(Default)]
struct CountingHook(AtomicUsize);

impl StylesChanged for CountingHook {
    fn styles_changed(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_host_hook_called_after_saves() {
    let dir = TempDir::new().unwrap();
    let hook = Arc::new(CountingHook::default());
    let service =
        StyleService::with_hook(StyleStoreConfig::rooted_at(dir.path()), hook.clone()).unwrap();

    service.save_collection("", records(&["cat::x"])).unwrap();
    service.extract().unwrap();
    assert_eq!(hook.0.load(Ordering::SeqCst), 2);

    let quiet = StyleService::with_hook(
        StyleStoreConfig::rooted_at(dir.path()),
        Arc::new(NoopStylesChanged),
    )
    .unwrap();
    assert_eq!(names(&quiet.collection("cat").unwrap()), vec!["x"]);
}
