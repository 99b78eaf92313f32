//! Property-based tests for style naming and persistence.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Qualified names split and merge back losslessly
//! - Saved collections always have unique names
//! - Save then load preserves the persisted columns
//! - Line break markers are reversed exactly once

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use stylestore::config::StyleStoreConfig;
use stylestore::models::name;
use stylestore::{Collection, StyleRecord, StyleService};
use tempfile::TempDir;

fn bare_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 _-]{0,10}"
}

fn field_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.;:'\"()-]{0,30}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_split_merge_roundtrip(prefix in bare_name(), bare in bare_name()) {
        let full = name::merge(Some(&prefix), &bare);
        prop_assert!(name::has_prefix(&full));
        prop_assert_eq!(name::split(&full), (Some(prefix.as_str()), bare.as_str()));
        prop_assert_eq!(name::merge(None, &bare), bare.clone());
        prop_assert_eq!(name::resolve(&full, "other", false), full.clone());
        prop_assert_eq!(name::resolve(&bare, &prefix, false), full);
    }

    #[test]
    fn prop_saved_names_are_unique(names in proptest::collection::vec("[ab]{1,2}", 0..16)) {
        let dir = TempDir::new().unwrap();
        let service = StyleService::new(StyleStoreConfig::rooted_at(dir.path())).unwrap();
        let data: Collection = names.iter().map(|n| StyleRecord::new(n.clone(), "", "")).collect();

        let saved = service.save_collection("", data).unwrap();
        let unique: HashSet<&str> = saved.iter().map(|r| r.name.as_str()).collect();
        prop_assert_eq!(unique.len(), names.len());
        for (original, record) in names.iter().zip(saved.iter()) {
            prop_assert!(record.name.starts_with(original.as_str()));
        }
    }

    #[test]
    fn prop_save_load_preserves_columns(
        rows in proptest::collection::btree_map(bare_name(), (field_text(), field_text()), 0..10)
    ) {
        let dir = TempDir::new().unwrap();
        let data: Collection = rows
            .iter()
            .map(|(n, (p, neg))| StyleRecord::new(n.clone(), p.clone(), neg.clone()))
            .collect();
        StyleService::new(StyleStoreConfig::rooted_at(dir.path()))
            .unwrap()
            .save_collection("", data.clone())
            .unwrap();

        let loaded = StyleService::new(StyleStoreConfig::rooted_at(dir.path()))
            .unwrap()
            .collection("")
            .unwrap();
        prop_assert_eq!(loaded.len(), data.len());
        for (a, b) in loaded.iter().zip(data.iter()) {
            prop_assert_eq!(&a.name, &b.name);
            prop_assert_eq!(&a.prompt, &b.prompt);
            prop_assert_eq!(&a.negative_prompt, &b.negative_prompt);
        }
    }

    #[test]
    fn prop_line_breaks_reversed_once(lines in proptest::collection::vec("[a-z ]{0,8}", 1..5)) {
        let dir = TempDir::new().unwrap();
        let service = StyleService::new(StyleStoreConfig::rooted_at(dir.path())).unwrap();
        let display = lines.join("<br>");
        service
            .save_collection("", vec![StyleRecord::new("s", display.clone(), "")].into())
            .unwrap();

        let raw = std::fs::read_to_string(service.paths().default_style_file()).unwrap();
        prop_assert!(!raw.contains("<br>"));

        let reloaded = StyleService::new(StyleStoreConfig::rooted_at(dir.path()))
            .unwrap()
            .collection("")
            .unwrap();
        prop_assert_eq!(&reloaded.records()[0].prompt, &display);
    }
}
