mod helpers;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use helpers::*;
use keepsake_infra::archive::build_archive;
use keepsake_infra::capacity::StorageInspector;
use keepsake_worker::prune;

const MB: usize = 1024 * 1024;

/// Create upload units and an archive holding them, stamped `age_secs` old.
fn seed_archive(env: &TestEnv, name: &str, units: &[(&str, Vec<u8>)], age_secs: u64) -> PathBuf {
    let upload_dir = &env.config().upload_dir;
    let then = SystemTime::now() - Duration::from_secs(age_secs);

    let unit_paths: Vec<PathBuf> = units
        .iter()
        .map(|(unit, contents)| make_unit(upload_dir, unit, &[("media.bin", contents.as_slice())], then))
        .collect();

    let path = env.config().archive_dir.join(name);
    build_archive(upload_dir, &unit_paths, &path).unwrap();
    set_mtime(&path, then);
    path
}

/// 100 KB budget against a disk that reports 10 MB used no matter what.
fn over_budget_env() -> (TestEnv, Arc<ScriptedInspector>) {
    let inspector = Arc::new(ScriptedInspector::constant(10_000_000));
    let shared = Arc::clone(&inspector);
    let env = TestEnv::with(
        |c| c.max_local_storage_gb = budget_gb(100 * 1024),
        move |_| shared as Arc<dyn StorageInspector>,
    );
    (env, inspector)
}

#[tokio::test]
async fn within_budget_is_a_no_op() {
    let env = TestEnv::new();
    let archive = seed_archive(&env, "batch_1.zip", &[("u1", b"x".to_vec())], 3600);
    env.replicator.insert("batch_1.zip");

    let report = prune(&env.ctx, true).await.unwrap();

    assert!(report.archives_deleted.is_empty());
    assert!(!report.over_budget);
    assert!(archive.exists());
    assert!(env.replicator.exists_calls().is_empty());
}

#[tokio::test]
async fn converges_when_every_archive_is_on_the_remote() {
    // Two archives of ~1 MB each against a 100 KB budget.
    let env = TestEnv::with(
        |c| c.max_local_storage_gb = budget_gb(100 * 1024),
        |root| Arc::new(DirectorySizeInspector::new(root)),
    );
    let old = seed_archive(&env, "batch_1.zip", &[("u1", noise(MB, 1))], 7200);
    let new = seed_archive(&env, "batch_2.zip", &[("u2", noise(MB, 2))], 3600);
    env.replicator.insert("batch_1.zip");
    env.replicator.insert("batch_2.zip");

    let report = prune(&env.ctx, true).await.unwrap();

    assert_eq!(report.archives_deleted, vec!["batch_1.zip", "batch_2.zip"]);
    assert_eq!(report.units_deleted, vec!["u1", "u2"]);
    assert!(!report.over_budget);
    assert!(!old.exists());
    assert!(!new.exists());
    assert!(env.config().upload_dir.is_dir(), "upload root must survive");
}

#[tokio::test]
async fn nothing_is_deleted_without_remote_confirmation() {
    let (env, _) = over_budget_env();
    let a = seed_archive(&env, "batch_1.zip", &[("u1", b"a".to_vec())], 7200);
    let b = seed_archive(&env, "batch_2.zip", &[("u2", b"b".to_vec())], 3600);
    // Remote answers "absent" for everything.

    let report = prune(&env.ctx, true).await.unwrap();

    assert!(report.archives_deleted.is_empty());
    assert!(report.units_deleted.is_empty());
    assert_eq!(report.archives_skipped, vec!["batch_1.zip", "batch_2.zip"]);
    assert!(report.over_budget);
    assert!(a.exists() && b.exists());
    assert!(env.config().upload_dir.join("u1").is_dir());
    assert!(env.config().upload_dir.join("u2").is_dir());
}

#[tokio::test]
async fn remote_errors_never_count_as_present() {
    let (env, _) = over_budget_env();
    let a = seed_archive(&env, "batch_1.zip", &[("u1", b"a".to_vec())], 7200);
    let b = seed_archive(&env, "batch_2.zip", &[("u2", b"b".to_vec())], 3600);
    env.replicator.force("batch_1.zip", Presence::Unreachable);
    env.replicator.force("batch_2.zip", Presence::Present);

    let report = prune(&env.ctx, true).await.unwrap();

    assert_eq!(report.archives_skipped, vec!["batch_1.zip"]);
    assert_eq!(report.archives_deleted, vec!["batch_2.zip"]);
    assert!(a.exists());
    assert!(!b.exists());
    assert!(env.config().upload_dir.join("u1").is_dir());
    assert!(!env.config().upload_dir.join("u2").exists());
}

#[tokio::test]
async fn unconfigured_replication_refuses_before_measuring() {
    let (env, inspector) = over_budget_env();
    let a = seed_archive(&env, "batch_1.zip", &[("u1", b"a".to_vec())], 7200);
    env.replicator.set_configured(false);

    let report = prune(&env.ctx, true).await.unwrap();

    assert!(report.refused_unconfigured);
    assert!(report.archives_deleted.is_empty());
    assert!(a.exists());
    assert_eq!(inspector.calls(), 0);
    assert!(env.replicator.exists_calls().is_empty());
}

#[tokio::test]
async fn deletes_oldest_first_and_stops_within_budget() {
    // Over budget at first, under budget after one deletion.
    let env = TestEnv::with(
        |c| c.max_local_storage_gb = budget_gb(100 * 1024),
        |_| Arc::new(ScriptedInspector::new(&[10_000_000, 1_000])),
    );
    let newer = seed_archive(&env, "batch_a.zip", &[("u_new", b"n".to_vec())], 600);
    let older = seed_archive(&env, "batch_z.zip", &[("u_old", b"o".to_vec())], 86_400);
    env.replicator.insert("batch_a.zip");
    env.replicator.insert("batch_z.zip");

    let report = prune(&env.ctx, true).await.unwrap();

    assert_eq!(report.archives_deleted, vec!["batch_z.zip"]);
    assert_eq!(report.units_deleted, vec!["u_old"]);
    assert!(!report.over_budget);
    assert!(!older.exists());
    assert!(newer.exists());
    assert!(env.config().upload_dir.join("u_new").is_dir());
    assert_eq!(env.replicator.exists_calls(), vec!["batch_z.zip"]);
}

#[tokio::test]
async fn unreadable_manifest_deletes_archive_but_keeps_units() {
    let (env, _) = over_budget_env();
    let then = SystemTime::now() - Duration::from_secs(3600);
    make_unit(&env.config().upload_dir, "u1", &[("a.jpg", b"a")], then);
    let garbage = env.config().archive_dir.join("batch_1.zip");
    fs::write(&garbage, b"this is not a zip file").unwrap();
    env.replicator.insert("batch_1.zip");

    let report = prune(&env.ctx, true).await.unwrap();

    assert_eq!(report.archives_deleted, vec!["batch_1.zip"]);
    assert!(report.units_deleted.is_empty());
    assert!(!garbage.exists());
    assert!(env.config().upload_dir.join("u1").is_dir());
}

#[tokio::test]
async fn verification_disabled_skips_remote_checks() {
    let (env, _) = over_budget_env();
    let a = seed_archive(&env, "batch_1.zip", &[("u1", b"a".to_vec())], 3600);
    env.replicator.set_configured(false);

    let report = prune(&env.ctx, false).await.unwrap();

    assert_eq!(report.archives_deleted, vec!["batch_1.zip"]);
    assert_eq!(report.units_deleted, vec!["u1"]);
    assert!(!a.exists());
    assert!(env.replicator.exists_calls().is_empty());
    // Scripted usage never drops, so the pass ends over budget.
    assert!(report.over_budget);
}

#[tokio::test]
async fn database_backups_and_state_are_never_pruned() {
    let (env, _) = over_budget_env();
    let archive_dir = env.config().archive_dir.clone();
    fs::write(archive_dir.join("db_backup_20240601_180509.sqlite"), b"db").unwrap();
    env.state().update(|s| s.last_run = 5.0).unwrap();

    let report = prune(&env.ctx, true).await.unwrap();

    assert!(report.archives_deleted.is_empty());
    assert!(report.over_budget);
    assert!(archive_dir.join("db_backup_20240601_180509.sqlite").exists());
    assert!(env.state().path().exists());
}
