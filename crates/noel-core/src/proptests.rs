//! Property-based tests for noel-core.
//!
//! # Properties Tested
//!
//! - Swap round-trip: swap-out, clear and restore-in bring back the original bytes
//! - Backup uniqueness: swap-outs at distinct seconds keep distinct backups
//! - Patch idempotence: setting the current value never rewrites the file
//! - Patch isolation: only the targeted setting changes
//! - Missing keys: an unknown key fails without touching the file

#![cfg(test)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use proptest::sample::Index;
use tempfile::TempDir;

use crate::app_config::{self, set_setting_value, PatchOutcome};
use crate::clock::FixedClock;
use crate::config::{DatabaseConfig, UpdaterConfig};
use crate::error::NoelError;
use crate::paths::PathResolver;
use crate::swap::DatabaseSwap;

// =============================================================================
// Generators
// =============================================================================

/// Database content, empty included.
fn arb_database_content() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8192)
}

fn arb_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (0i64..10 * 365 * 24 * 60 * 60).prop_map(|secs| {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::seconds(secs)
    })
}

/// Settings with unique keys; values may need escaping.
fn arb_settings() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[A-Za-z][A-Za-z0-9]{0,12}", "[ -~]{0,24}", 1..8)
        .prop_map(|map: BTreeMap<String, String>| map.into_iter().collect())
}

// =============================================================================
// Helpers
// =============================================================================

fn swap_at(temp: &TempDir, at: NaiveDateTime) -> DatabaseSwap<FixedClock> {
    let app_data = temp.path().join("appdata");
    fs::create_dir_all(app_data.join("Ketarin")).unwrap();
    fs::create_dir_all(temp.path().join("work")).unwrap();

    let mut database = DatabaseConfig::default();
    database.working_dir = Some(temp.path().join("work"));
    let resolver = PathResolver::with_app_data(database, UpdaterConfig::default(), Some(app_data));
    DatabaseSwap::with_clock(resolver, FixedClock(at))
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_chocopkgup_config(temp: &TempDir, settings: &[(String, String)]) -> PathBuf {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n  <appSettings>\n");
    for (key, value) in settings {
        xml.push_str(&format!(
            "    <add key=\"{}\" value=\"{}\"/>\n",
            escape_attr(key),
            escape_attr(value)
        ));
    }
    xml.push_str("  </appSettings>\n  <!-- keep -->\n  <startup>\n    <supportedRuntime version=\"v4.0\" sku=\".NETFramework,Version=v4.0\"/>\n  </startup>\n</configuration>\n");

    let path = temp.path().join("chocopkgup.exe.config");
    fs::write(&path, xml).unwrap();
    path
}

// =============================================================================
// Database swap
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// For any live content, swap-out produces identical working and backup
    /// copies, and restoring after a clear brings the original bytes back.
    #[test]
    fn prop_swap_round_trip(content in arb_database_content(), at in arb_timestamp()) {
        let temp = TempDir::new().unwrap();
        let swap = swap_at(&temp, at);
        let live = swap.resolver().live_database_path().unwrap();
        fs::write(&live, &content).unwrap();

        let outcome = swap.swap_out().unwrap();
        prop_assert_eq!(&fs::read(&outcome.working).unwrap(), &content);
        prop_assert_eq!(&fs::read(&outcome.backup).unwrap(), &content);
        prop_assert_eq!(&fs::read(&live).unwrap(), &content);
        prop_assert_eq!(outcome.bytes, content.len() as u64);

        swap.clear().unwrap();
        prop_assert!(!live.exists());

        let restored = swap.restore_in().unwrap();
        prop_assert_eq!(&fs::read(&live).unwrap(), &content);
        prop_assert_eq!(restored.sha256, outcome.sha256);
    }

    /// Swap-outs at distinct seconds keep every backup with the content the
    /// live database had at that moment.
    #[test]
    fn prop_backups_unique_per_timestamp(
        first in arb_database_content(),
        second in arb_database_content(),
        at in arb_timestamp(),
        gap in 1i64..100_000,
    ) {
        let temp = TempDir::new().unwrap();
        let earlier = swap_at(&temp, at);
        let later = swap_at(&temp, at + Duration::seconds(gap));
        let live = earlier.resolver().live_database_path().unwrap();

        fs::write(&live, &first).unwrap();
        let a = earlier.swap_out().unwrap();
        fs::write(&live, &second).unwrap();
        let b = later.swap_out().unwrap();

        prop_assert_ne!(&a.backup, &b.backup);
        prop_assert_eq!(&fs::read(&a.backup).unwrap(), &first);
        prop_assert_eq!(&fs::read(&b.backup).unwrap(), &second);

        let listed = later.list_backups().unwrap();
        prop_assert_eq!(listed.len(), 2);
        prop_assert_eq!(&listed[0].path, &b.backup);
    }
}

// =============================================================================
// Config patching
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Setting a key to the value it already has leaves the file byte for
    /// byte as it was.
    #[test]
    fn prop_patch_same_value_is_noop(settings in arb_settings(), pick in any::<Index>()) {
        let temp = TempDir::new().unwrap();
        let path = write_chocopkgup_config(&temp, &settings);
        let before = fs::read(&path).unwrap();

        let (key, value) = &settings[pick.index(settings.len())];
        let outcome = set_setting_value(&path, key, value).unwrap();

        prop_assert_eq!(outcome, PatchOutcome::Unchanged);
        prop_assert_eq!(fs::read(&path).unwrap(), before);
    }

    /// Patching one key changes exactly that value. A second identical patch
    /// is a no-op.
    #[test]
    fn prop_patch_changes_only_target(
        settings in arb_settings(),
        pick in any::<Index>(),
        new_value in "[ -~]{0,24}",
    ) {
        let temp = TempDir::new().unwrap();
        let path = write_chocopkgup_config(&temp, &settings);
        let before = app_config::load(&path).unwrap();

        let target = pick.index(settings.len());
        let (key, old_value) = &settings[target];
        let outcome = set_setting_value(&path, key, &new_value).unwrap();
        if *old_value == new_value {
            prop_assert!(outcome.is_noop());
        } else {
            prop_assert_eq!(outcome, PatchOutcome::Updated { previous: old_value.clone() });
        }

        let after = app_config::load(&path).unwrap();
        let mut expected = before.settings();
        expected[target].value = new_value.clone();
        prop_assert_eq!(after.settings(), expected);
        prop_assert_eq!(after.supported_runtime(), before.supported_runtime());

        let written = fs::read(&path).unwrap();
        prop_assert!(set_setting_value(&path, key, &new_value).unwrap().is_noop());
        prop_assert_eq!(fs::read(&path).unwrap(), written);
    }

    /// An unknown key is reported and the file is not touched.
    #[test]
    fn prop_patch_missing_key_leaves_file(settings in arb_settings(), value in "[ -~]{0,24}") {
        let temp = TempDir::new().unwrap();
        let path = write_chocopkgup_config(&temp, &settings);
        let before = fs::read(&path).unwrap();

        // Generated keys never contain '-'.
        let result = set_setting_value(&path, "Missing-Key", &value);
        let is_not_found = matches!(result, Err(NoelError::SettingNotFound { .. }));
        prop_assert!(is_not_found);
        prop_assert_eq!(fs::read(&path).unwrap(), before);
    }
}
