//! File staging and snapshots against the in-memory guest filesystem.

use std::rc::Rc;
use std::time::Duration;

use pollster::block_on;
use sbx_cli::testing::{MockMachine, MockPlatform};
use sbx_cli::{
    CliConfig, FileInfo, LocalState, MemoryStore, MountSource, Session, StageError, StateError,
};

struct Harness {
    session: Session<MockMachine, MockPlatform>,
    machine: Rc<MockMachine>,
    platform: Rc<MockPlatform>,
}

fn harness() -> Harness {
    let platform = Rc::new(MockPlatform::new());
    let session = Session::new(CliConfig::default(), platform.clone());
    let machine = Rc::new(MockMachine::new());
    session.attach(machine.clone());
    Harness {
        session,
        machine,
        platform,
    }
}

fn paths(entries: &[FileInfo]) -> Vec<&str> {
    entries.iter().map(|e| e.path.as_str()).collect()
}

#[test]
fn test_write_then_list_and_read() {
    let h = harness();
    block_on(h.session.write("/root/tutorial/data/reads.fq", "@r1\nACGT\n")).unwrap();

    let listing = h.session.list("/root/tutorial");
    assert_eq!(
        paths(&listing),
        vec!["/root/tutorial/data", "/root/tutorial/data/reads.fq"]
    );
    assert!(listing[0].is_dir);
    assert!(!listing[1].is_dir);

    let bytes = block_on(h.session.read("/root/tutorial/data/reads.fq")).unwrap();
    assert_eq!(bytes, b"@r1\nACGT\n");
}

#[test]
fn test_read_missing_and_empty() {
    let h = harness();
    assert_eq!(block_on(h.session.read("/root/nope.txt")), None);

    block_on(h.session.write("/root/empty.txt", "")).unwrap();
    assert_eq!(block_on(h.session.read("/root/empty.txt")), Some(Vec::new()));
}

#[test]
fn test_make_directory_is_idempotent() {
    let h = harness();
    block_on(h.session.make_directory("/root/tutorial/a/b")).unwrap();
    block_on(h.session.make_directory("/root/tutorial/a/b")).unwrap();

    assert_eq!(
        paths(&h.session.list("/root/tutorial")),
        vec!["/root/tutorial/a", "/root/tutorial/a/b"]
    );
}

#[test]
fn test_make_directory_through_a_file_fails() {
    let h = harness();
    block_on(h.session.write("/root/tutorial/notes", "x")).unwrap();

    let err = block_on(h.session.make_directory("/root/tutorial/notes/sub")).unwrap_err();
    assert!(matches!(err, StageError::Vfs(_)));
}

#[test]
fn test_mount_local_file_into_directory() {
    let h = harness();
    let mounted = block_on(
        h.session
            .mount("data/", MountSource::file("ref.fa", b">chr1\nACGT\n".to_vec())),
    )
    .unwrap();

    assert_eq!(mounted, "data/ref.fa");
    let bytes = block_on(h.session.read("/root/tutorial/data/ref.fa")).unwrap();
    assert_eq!(bytes, b">chr1\nACGT\n");
}

#[test]
fn test_mount_url_infers_name() {
    let h = harness();
    h.platform
        .respond("https://data.sandbox.bio/genomes/ecoli.fa", ">ecoli\n");

    let mounted = block_on(
        h.session
            .mount("", MountSource::url("https://data.sandbox.bio/genomes/ecoli.fa")),
    )
    .unwrap();

    assert_eq!(mounted, "ecoli.fa");
    assert_eq!(
        block_on(h.session.read("/root/tutorial/ecoli.fa")).unwrap(),
        b">ecoli\n"
    );
    assert_eq!(
        h.platform.fetched(),
        vec![String::from("https://data.sandbox.bio/genomes/ecoli.fa")]
    );
}

#[test]
fn test_mount_url_to_explicit_path() {
    let h = harness();
    h.platform.respond("https://x/a.txt", "a");

    let mounted =
        block_on(h.session.mount("inputs/renamed.txt", MountSource::url("https://x/a.txt")))
            .unwrap();

    assert_eq!(mounted, "inputs/renamed.txt");
    assert!(block_on(h.session.read("/root/tutorial/inputs/renamed.txt")).is_some());
}

#[test]
fn test_mount_failed_fetch_writes_nothing() {
    let h = harness();
    let err = block_on(h.session.mount("", MountSource::url("https://x/missing.bam"))).unwrap_err();

    assert!(matches!(err, StageError::Fetch { .. }));
    assert!(h.session.list("/root/tutorial").is_empty());
}

#[test]
fn test_drop_caches_uses_keyboard_and_waits() {
    let h = harness();
    block_on(h.session.drop_caches());

    assert_eq!(
        h.machine.keyboard_text(),
        vec![String::from("sync; echo 3 >/proc/sys/vm/drop_caches\n")]
    );
    assert_eq!(h.platform.sleeps(), vec![Duration::from_millis(200)]);
}

#[test]
fn test_operations_without_session_are_soft() {
    let platform = Rc::new(MockPlatform::new());
    let session: Session<MockMachine, MockPlatform> =
        Session::new(CliConfig::default(), platform.clone());

    assert!(session.list("/root").is_empty());
    assert_eq!(block_on(session.read("/root/a")), None);
    block_on(session.write("/root/a", "x")).unwrap();
    block_on(session.make_directory("/root/b")).unwrap();
    block_on(session.drop_caches());
    assert!(platform.sleeps().is_empty());
}

#[test]
fn test_snapshot_round_trip_into_fresh_machine() {
    let h = harness();
    let state = LocalState::new(MemoryStore::new());
    block_on(h.session.write("/root/tutorial/a.txt", "alpha")).unwrap();
    block_on(h.session.write("/root/tutorial/out/empty.log", "")).unwrap();
    block_on(h.session.make_directory("/root/tutorial/scratch")).unwrap();

    let saved = block_on(h.session.save_fs_state(&state, "bowtie2-intro")).unwrap();
    assert_eq!(saved, 4);

    // Reboot: a fresh machine with an empty disk.
    h.session.detach();
    let fresh = Rc::new(MockMachine::new());
    h.session.attach(fresh.clone());
    assert!(h.session.list("/root/tutorial").is_empty());

    let restored = block_on(h.session.restore_fs_state(&state, "bowtie2-intro")).unwrap();
    assert_eq!(restored, 4);
    assert_eq!(
        block_on(h.session.read("/root/tutorial/a.txt")).unwrap(),
        b"alpha"
    );
    assert_eq!(
        block_on(h.session.read("/root/tutorial/out/empty.log")).unwrap(),
        b""
    );
    assert!(h
        .session
        .list("/root/tutorial")
        .iter()
        .any(|e| e.path == "/root/tutorial/scratch" && e.is_dir));
}

#[test]
fn test_snapshot_requires_tutorial() {
    let h = harness();
    let state = LocalState::new(MemoryStore::new());

    let err = block_on(h.session.save_fs_state(&state, "")).unwrap_err();
    assert!(matches!(err, StageError::State(StateError::NoActiveTutorial)));
    assert!(state.store().is_empty());
}

#[test]
fn test_restore_unknown_tutorial_is_empty() {
    let h = harness();
    let state = LocalState::new(MemoryStore::new());

    assert_eq!(block_on(h.session.restore_fs_state(&state, "never-saved")).unwrap(), 0);
}
