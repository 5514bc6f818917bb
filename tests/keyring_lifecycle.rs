mod common;

use ceph_nodecfg::core::keyring::KeyringManager;
use ceph_nodecfg::core::keyring_store;
use ceph_nodecfg::core::paths::NodePaths;
use ceph_nodecfg::error::Error;
use ceph_nodecfg::models::identity::ClusterIdentity;
use ceph_nodecfg::models::role::Role;
use common::{Recorder, KEY};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, NodePaths) {
    let dir = TempDir::new().unwrap();
    let paths = NodePaths::from_root(dir.path().to_path_buf());
    (dir, paths)
}

#[test]
fn create_remove_create_cycle() {
    let (_dir, paths) = setup();
    let runner = Recorder::new();
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");
    let identity = ClusterIdentity::new("ceph", Some("node1"));
    let osd = manager.bind(Role::Osd, &identity).unwrap();

    assert_eq!(
        osd.path(),
        paths.lib_ceph.join("bootstrap-osd/ceph.keyring").as_path()
    );
    assert!(!osd.present());

    let first = osd.create(None).unwrap();
    assert!(osd.present());
    assert_eq!(fs::read_to_string(osd.path()).unwrap(), first);
    assert_eq!(keyring_store::decode(&first).unwrap().principal, "client.bootstrap-osd");

    // present: no second tool run, same content
    let again = osd.create(Some("AQBotherotherotherotherotherotherothe==")).unwrap();
    assert_eq!(again, first);
    assert_eq!(runner.calls.borrow().len(), 1);

    assert!(osd.remove().unwrap());
    assert!(!osd.present());
    assert!(osd.remove().unwrap());

    osd.create(Some(KEY)).unwrap();
    let stanza = keyring_store::decode(&osd.read().unwrap()).unwrap();
    assert_eq!(stanza.key.as_deref(), Some(KEY));
    assert_eq!(runner.calls.borrow().len(), 2);
}

#[test]
fn write_paths_never_overwrite() {
    let (_dir, paths) = setup();
    let runner = Recorder::new();
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");
    let identity = ClusterIdentity::new("ceph", None);
    let admin = manager.bind(Role::Admin, &identity).unwrap();

    let original = keyring_store::encode("client.admin", &[("mon", "allow *")], Some(KEY));
    assert!(admin.write_content(&original).unwrap());
    let stored = admin.read().unwrap();

    assert!(admin.write_content("[client.admin]\n\tkey = other\n").unwrap());
    assert!(admin.write_secret(Some("AQBdifferentdifferentdifferentdiffe==")).unwrap());
    admin.create(None).unwrap();

    assert_eq!(admin.read().unwrap(), stored);
    assert!(runner.calls.borrow().is_empty());
}

#[test]
fn write_secret_requires_a_secret() {
    let (_dir, paths) = setup();
    let runner = Recorder::new();
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");
    let identity = ClusterIdentity::new("ceph", None);
    let rgw = manager.bind(Role::Rgw, &identity).unwrap();

    assert!(matches!(rgw.write_secret(None), Err(Error::InvalidSecret)));
    assert!(matches!(rgw.write_secret(Some("  ")), Err(Error::InvalidSecret)));
    assert!(!rgw.present());

    assert!(rgw.write_secret(Some(KEY)).unwrap());
    let stanza = keyring_store::decode(&rgw.read().unwrap()).unwrap();
    assert_eq!(stanza.principal, "client.bootstrap-rgw");
    assert_eq!(stanza.key.as_deref(), Some(KEY));
}

#[test]
fn generation_failure_leaves_nothing_behind() {
    let (_dir, paths) = setup();
    let runner = Recorder::new().fail("ceph-authtool", 5);
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");
    let identity = ClusterIdentity::new("ceph", None);
    let mds = manager.bind(Role::Mds, &identity).unwrap();

    match mds.create(Some(KEY)) {
        Err(Error::GenerationFailed { exit_code, command, .. }) => {
            assert_eq!(exit_code, 5);
            assert!(!command.contains(KEY));
        }
        other => panic!("expected GenerationFailed, got {:?}", other.map(|_| ())),
    }
    assert!(!mds.present());
}

#[test]
fn identity_and_role_errors() {
    let (_dir, paths) = setup();
    let runner = Recorder::new();
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");

    let no_host = ClusterIdentity::new("ceph", None);
    assert!(matches!(
        manager.bind(Role::Mon, &no_host),
        Err(Error::MissingIdentity(_))
    ));
    assert!(matches!(
        manager.bind_name("client", &no_host),
        Err(Error::InvalidRole(_))
    ));

    let no_cluster = ClusterIdentity::default();
    for role in Role::ALL {
        assert!(matches!(
            manager.bind(role, &no_cluster),
            Err(Error::MissingIdentity(_))
        ));
    }

    let with_host = ClusterIdentity::new("backup", Some("node7"));
    let mon = manager.bind_name("mon", &with_host).unwrap();
    assert_eq!(
        mon.path(),
        paths.lib_ceph.join("bootstrap-mon/backup-node7.keyring").as_path()
    );
    assert_eq!(mon.principal(), "mon.");
}

#[test]
fn path_like_names_are_refused_before_any_write() {
    let dir = TempDir::new().unwrap();
    let paths = NodePaths::from_root(dir.path().join("node"));
    let runner = Recorder::new();
    let manager = KeyringManager::new(&paths, &runner, "ceph-authtool");

    let escaping = ClusterIdentity::new("../../../victim", Some("node1"));
    for role in Role::ALL {
        assert!(matches!(
            manager.bind(role, &escaping),
            Err(Error::InvalidIdentity { .. })
        ));
    }
    let bad_host = ClusterIdentity::new("ceph", Some("../node1"));
    assert!(matches!(
        manager.bind(Role::Mon, &bad_host),
        Err(Error::InvalidIdentity { .. })
    ));

    assert!(runner.calls.borrow().is_empty());
    assert!(!dir.path().join("victim.client.admin.keyring").exists());
    assert!(!paths.etc_ceph.exists());
}
