use super::*;

fn flat_layout() -> TreeLayout {
    TreeLayout::new(3, 0, 1).unwrap()
}

fn listing(entries: &[&str]) -> TreeListing {
    TreeListing {
        truncated: false,
        entries: entries.iter().map(|e| (*e).to_owned()).collect(),
    }
}

#[test]
fn test_from_listing_keeps_names_and_paths_consistent() {
    let (shard, rejected) = Shard::from_listing(
        "a",
        "v1",
        &listing(&[
            "pkg",
            "pkg/1.0",
            "pkg/1.0/m.json",
            "pkg/1.1/m.json",
            "other/0.1/m.json",
        ]),
        &flat_layout(),
    );

    assert!(rejected.is_empty());
    assert_eq!(
        shard.manifest_paths(),
        ["a/pkg/1.0/m.json", "a/pkg/1.1/m.json", "a/other/0.1/m.json"]
    );
    assert_eq!(
        shard.package_names().iter().collect::<Vec<_>>(),
        ["other", "pkg"]
    );
    assert!(shard.deprecations().is_none());

    let layout = flat_layout();
    for path in shard.manifest_paths() {
        let name = layout.package_name(path).unwrap();
        assert!(shard.package_names().contains(name), "{name} missing");
    }
}

#[test]
fn test_from_listing_reports_rejected_entries() {
    let (shard, rejected) = Shard::from_listing(
        "a",
        "v1",
        &listing(&["pkg/1.0/m.json", "pkg/1.0/nested/m.json"]),
        &flat_layout(),
    );

    assert_eq!(shard.manifest_paths().len(), 1);
    assert_eq!(rejected.len(), 1);
}

#[test]
fn test_truncated_flag_is_carried() {
    let (shard, _) = Shard::from_listing(
        "a",
        "v1",
        &TreeListing {
            truncated: true,
            entries: vec![],
        },
        &flat_layout(),
    );

    assert!(shard.truncated());
}

#[test]
fn test_with_deprecations_sorts_and_drops_foreign_paths() {
    let (shard, _) = Shard::from_listing(
        "a",
        "v1",
        &listing(&["zed/1.0/m.json", "pkg/1.0/m.json"]),
        &flat_layout(),
    );

    let scanned = shard.with_deprecations(vec![
        "a/zed/1.0/m.json".to_owned(),
        "b/elsewhere/1.0/m.json".to_owned(),
        "a/pkg/1.0/m.json".to_owned(),
        "a/zed/1.0/m.json".to_owned(),
    ]);

    assert_eq!(
        scanned.deprecations().unwrap(),
        ["a/pkg/1.0/m.json", "a/zed/1.0/m.json"]
    );
    assert_eq!(scanned.version_marker(), "v1");
    assert!(shard.deprecations().is_none());
}

#[test]
fn test_supersede_is_shared_with_snapshots_and_copies() {
    let (shard, _) = Shard::from_listing("a", "v1", &listing(&[]), &flat_layout());
    let snapshot = shard.snapshot();
    let scanned = shard.with_deprecations(vec![]);

    shard.supersede();

    assert!(snapshot.superseded.is_cancelled());
    assert!(scanned.is_superseded());
}

#[test]
fn test_versions_listing_groups_by_name() {
    let layout = TreeLayout::default();
    let (shard, _) = Shard::from_listing(
        "1",
        "v1",
        &listing(&[
            "2/3/Beta/1.0/Beta.podspec.json",
            "2/3/Alpha/0.1/Alpha.podspec.json",
            "2/3/Beta/1.1/Beta.podspec.json",
            "2/4/Gamma/2.0/Gamma.podspec.json",
        ]),
        &layout,
    );

    assert_eq!(
        shard.versions_listing("1/2/3", &layout),
        ["Beta/1.0/1.1", "Alpha/0.1"]
    );
    assert_eq!(shard.versions_listing("1/2/4", &layout), ["Gamma/2.0"]);
    assert!(shard.versions_listing("1/2/5", &layout).is_empty());
}

#[test]
fn test_validator_quotes_marker() {
    let (shard, _) = Shard::from_listing("a", "abc123", &listing(&[]), &flat_layout());

    assert_eq!(shard.validator(), "\"abc123\"");
}
