//! Ingest pipeline from a scripted pod listing to the in-memory store.

use std::cell::RefCell;

use cephgraph::command::{render_command, CommandOutput, CommandRunner};
use cephgraph::config::ClusterConfig;
use cephgraph::graph::{CONTAINS, IS, OBJECT_LABEL, OSD_LABEL, PG_LABEL, UNIQUE_OBJECT_LABEL};
use cephgraph::inventory::{fetch_inventory, validate_osd_pod};
use cephgraph::loader::ingest;
use cephgraph::{parse_inventory, CephGraphError, InventoryFormat, InventorySource, MemoryStore};

const POD: &str = "rook-ceph-osd-4-7d9f8c6b4-abcde";

/// Answers `get pod` and `exec ... --op list` with a fixed listing.
struct FakeOsdPod {
    listing: String,
    calls: RefCell<Vec<String>>,
}

impl FakeOsdPod {
    fn new(listing: &str) -> Self {
        Self {
            listing: listing.to_string(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl CommandRunner for FakeOsdPod {
    fn run(&self, program: &str, args: &[&str]) -> cephgraph::Result<CommandOutput> {
        let rendered = render_command(program, args);
        self.calls.borrow_mut().push(rendered.clone());
        if args.contains(&"get") && args.contains(&POD) {
            return Ok(CommandOutput::success(format!("pod/{}\n", POD)));
        }
        if rendered.ends_with("--op list") && args.contains(&POD) {
            return Ok(CommandOutput::success(self.listing.clone()));
        }
        Ok(CommandOutput::failure(1, format!("Error from server (NotFound): {}", rendered)))
    }
}

fn source() -> InventorySource {
    InventorySource::for_pod(POD, "rook-ceph", &ClusterConfig::default()).unwrap()
}

async fn run_ingest(runner: &FakeOsdPod, store: &mut MemoryStore, batch_size: usize) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let source = source();
    validate_osd_pod(runner, "kubectl", &source).unwrap();
    let artifact = dir.path().join(format!("osd-{}-pgs.json", source.osd_id));
    let raw = fetch_inventory(runner, "kubectl", &source, &artifact).unwrap();
    assert!(artifact.exists());

    let groups = parse_inventory(&raw, InventoryFormat::Auto).unwrap();
    let mut out = Vec::new();
    ingest(store, i64::from(source.osd_id), &groups, batch_size, &mut out)
        .await
        .unwrap();
    out
}

#[tokio::test]
async fn test_line_listing_builds_topology() {
    let listing = "[\"1.2\",{\"oid\":\"obj1\",\"key\":\"\",\"snapid\":-2}]\n\
                   [\"1.2\",{\"oid\":\"obj2\",\"key\":\"\",\"snapid\":-2}]\n\
                   [\"1.3\",{\"oid\":\"obj3\",\"key\":\"\",\"snapid\":-2}]\n";
    let runner = FakeOsdPod::new(listing);
    let mut store = MemoryStore::new();

    let out = run_ingest(&runner, &mut store, 200).await;

    assert_eq!(store.count_label(OSD_LABEL), 1);
    assert_eq!(store.count_label(PG_LABEL), 2);
    assert_eq!(store.count_label(OBJECT_LABEL), 3);
    assert_eq!(store.count_label(UNIQUE_OBJECT_LABEL), 3);
    assert!(store.has_edge((OSD_LABEL, "4"), CONTAINS, (PG_LABEL, "1.2")));
    assert!(store.has_edge((PG_LABEL, "1.3"), CONTAINS, (OBJECT_LABEL, "obj3")));
    assert!(store.has_edge((OBJECT_LABEL, "obj1"), IS, (UNIQUE_OBJECT_LABEL, "4-obj1")));
    assert!(!store.has_edge((PG_LABEL, "1.3"), CONTAINS, (OBJECT_LABEL, "obj1")));
    assert_eq!(store.get_node(UNIQUE_OBJECT_LABEL, "4-obj2").unwrap().name, "[4] Obj obj2");
    assert_eq!(store.snapshot_count(), 1);

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("PG Count: 2"));
    assert!(printed.contains("UniqueObject Count: 3"));
}

#[tokio::test]
async fn test_record_without_oid_is_dropped() {
    let listing = "[\"1.2\",{\"oid\":\"obj1\"}]\n\
                   [\"1.2\",{\"key\":\"orphan\"}]\n\
                   [\"1.2\",{\"oid\":\"obj2\"}]\n";
    let runner = FakeOsdPod::new(listing);
    let mut store = MemoryStore::new();

    run_ingest(&runner, &mut store, 200).await;

    assert_eq!(store.count_label(OBJECT_LABEL), 2);
    assert!(store.get_node(OBJECT_LABEL, "obj1").is_some());
    assert!(store.get_node(OBJECT_LABEL, "obj2").is_some());
}

#[tokio::test]
async fn test_rerun_keeps_creation_timestamps() {
    let first = "[\"1.2\",{\"oid\":\"obj1\"}]\n[\"1.2\",{\"oid\":\"obj2\"}]\n";
    let second = "[\"1.2\",{\"oid\":\"obj2\"}]\n[\"1.2\",{\"oid\":\"obj3\"}]\n";
    let mut store = MemoryStore::new();

    store.set_time(1_000);
    run_ingest(&FakeOsdPod::new(first), &mut store, 1).await;
    let counts = (store.node_count(), store.edge_count());

    store.set_time(2_000);
    run_ingest(&FakeOsdPod::new(second), &mut store, 1).await;

    for (label, key) in [
        (OSD_LABEL, "4"),
        (PG_LABEL, "1.2"),
        (OBJECT_LABEL, "obj2"),
        (UNIQUE_OBJECT_LABEL, "4-obj2"),
    ] {
        assert_eq!(store.get_node(label, key).unwrap().created_at, 1_000, "{label} {key}");
    }
    assert_eq!(store.get_node(OBJECT_LABEL, "obj3").unwrap().created_at, 2_000);
    // Only obj3 and its unique copy are new.
    assert_eq!(store.node_count(), counts.0 + 2);
    assert_eq!(store.edge_count(), counts.1 + 4);
}

#[tokio::test]
async fn test_array_listing_matches_line_listing() {
    let lines = "[\"1.2\",{\"oid\":\"a\"}]\n[\"1.3\",{\"oid\":\"b\"}]\n";
    let array = "[[\"1.2\",{\"oid\":\"a\"}],[\"1.3\",{\"oid\":\"b\"}]]";

    let mut from_lines = MemoryStore::new();
    run_ingest(&FakeOsdPod::new(lines), &mut from_lines, 200).await;
    let mut from_array = MemoryStore::new();
    run_ingest(&FakeOsdPod::new(array), &mut from_array, 200).await;

    assert_eq!(from_lines.node_count(), from_array.node_count());
    assert_eq!(from_lines.edge_count(), from_array.edge_count());
}

#[test]
fn test_missing_pod_stops_before_fetch() {
    let runner = FakeOsdPod::new("");
    let missing = InventorySource::for_pod("rook-ceph-osd-9-abc", "rook-ceph", &ClusterConfig::default()).unwrap();

    let err = validate_osd_pod(&runner, "kubectl", &missing).unwrap_err();

    assert!(matches!(err, CephGraphError::PodNotFound { .. }));
    assert_eq!(runner.calls.borrow().len(), 1);
}
