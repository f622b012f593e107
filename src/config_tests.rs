//! Tests for configuration provisioning and the in-place upgrade path.

use super::*;
use camino::Utf8PathBuf;

fn temp_data_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let dir = Utf8PathBuf::try_from(temp.path().join("data")).expect("utf-8 path");
    (temp, dir)
}

fn read_config(data_dir: &Utf8Path) -> String {
    std::fs::read_to_string(data_dir.join(CONFIG_FILENAME).as_std_path()).expect("read config")
}

#[test]
fn fresh_provision_writes_all_hardening_keys_and_credential() {
    let (_temp, data_dir) = temp_data_dir();

    let report = provision(&data_dir).expect("provision");

    assert!(matches!(report, ConfigReport::Created { .. }));
    let contents = read_config(&data_dir);
    for (key, value) in HARDENING_KEYS {
        assert_eq!(key_value(&contents, key), Some(value), "missing {key}");
    }
    assert!(key_value(&contents, "rpcuser").is_some());
    let secret = key_value(&contents, "rpcpassword").expect("secret present");
    assert!(secret.len() >= 32);
}

#[test]
fn fresh_provision_writes_side_credential_file() {
    let (_temp, data_dir) = temp_data_dir();

    provision(&data_dir).expect("provision");

    let line = std::fs::read_to_string(data_dir.join(CREDENTIAL_FILENAME).as_std_path())
        .expect("read credential file");
    let (user, secret) = line.trim().split_once(':').expect("user:secret form");
    let contents = read_config(&data_dir);
    assert_eq!(key_value(&contents, "rpcuser"), Some(user));
    assert_eq!(key_value(&contents, "rpcpassword"), Some(secret));
}

#[cfg(unix)]
#[test]
fn fresh_provision_sets_owner_only_modes() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, data_dir) = temp_data_dir();
    provision(&data_dir).expect("provision");

    let dir_mode = std::fs::metadata(data_dir.as_std_path())
        .expect("dir metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(dir_mode, DATA_DIR_MODE);

    for file in [CONFIG_FILENAME, CREDENTIAL_FILENAME] {
        let mode = std::fs::metadata(data_dir.join(file).as_std_path())
            .expect("file metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, SECURE_FILE_MODE, "wrong mode on {file}");
    }
}

#[test]
fn existing_config_keeps_secret_and_gains_missing_keys() {
    let (_temp, data_dir) = temp_data_dir();
    std::fs::create_dir_all(data_dir.as_std_path()).expect("data dir");
    let config_path = data_dir.join(CONFIG_FILENAME);
    std::fs::write(
        config_path.as_std_path(),
        "rpcuser=operator\nrpcpassword=pre-existing-secret\nlisten=0\n",
    )
    .expect("seed config");

    let report = provision(&data_dir).expect("provision");

    let ConfigReport::Upgraded { appended } = report else {
        panic!("expected upgrade report");
    };
    assert!(appended.contains(&"datacarrier".to_owned()));
    assert!(!appended.contains(&"listen".to_owned()));

    let contents = read_config(&data_dir);
    assert_eq!(key_value(&contents, "rpcpassword"), Some("pre-existing-secret"));
    assert_eq!(key_value(&contents, "datacarrier"), Some("0"));
    assert!(contents.starts_with("rpcuser=operator\n"), "existing content must lead");
}

#[test]
fn upgrade_is_idempotent() {
    let (_temp, data_dir) = temp_data_dir();
    std::fs::create_dir_all(data_dir.as_std_path()).expect("data dir");
    let config_path = data_dir.join(CONFIG_FILENAME);
    std::fs::write(config_path.as_std_path(), "rpcuser=operator\n").expect("seed config");

    provision(&data_dir).expect("first upgrade");
    let after_first = read_config(&data_dir);

    let report = provision(&data_dir).expect("second upgrade");
    let after_second = read_config(&data_dir);

    assert_eq!(after_first, after_second);
    assert!(matches!(
        report,
        ConfigReport::Upgraded { appended } if appended.is_empty()
    ));
}

#[test]
fn upgrade_appends_exactly_one_line_for_single_missing_key() {
    let (_temp, data_dir) = temp_data_dir();
    std::fs::create_dir_all(data_dir.as_std_path()).expect("data dir");
    let config_path = data_dir.join(CONFIG_FILENAME);
    let mut seeded = String::new();
    for (key, value) in HARDENING_KEYS {
        if key != "datacarrier" {
            seeded.push_str(&format!("{key}={value}\n"));
        }
    }
    seeded.push_str("rpcuser=u\nrpcpassword=p\n");
    std::fs::write(config_path.as_std_path(), &seeded).expect("seed config");

    let report = provision(&data_dir).expect("provision");

    let ConfigReport::Upgraded { appended } = report else {
        panic!("expected upgrade report");
    };
    assert_eq!(appended, vec!["datacarrier".to_owned()]);
    let contents = read_config(&data_dir);
    assert_eq!(contents, format!("{seeded}datacarrier=0\n"));
}

#[test]
fn upgrade_handles_missing_trailing_newline() {
    let (_temp, data_dir) = temp_data_dir();
    std::fs::create_dir_all(data_dir.as_std_path()).expect("data dir");
    let config_path = data_dir.join(CONFIG_FILENAME);
    std::fs::write(config_path.as_std_path(), "rpcuser=operator").expect("seed config");

    provision(&data_dir).expect("provision");

    let contents = read_config(&data_dir);
    assert_eq!(key_value(&contents, "rpcuser"), Some("operator"));
    assert!(!contents.contains("operatorlisten"), "keys must not fuse with last line");
}

#[test]
fn commented_keys_do_not_count_as_present() {
    let (_temp, data_dir) = temp_data_dir();
    std::fs::create_dir_all(data_dir.as_std_path()).expect("data dir");
    let config_path = data_dir.join(CONFIG_FILENAME);
    std::fs::write(config_path.as_std_path(), "# datacarrier=1\n").expect("seed config");

    let report = provision(&data_dir).expect("provision");

    let ConfigReport::Upgraded { appended } = report else {
        panic!("expected upgrade report");
    };
    assert!(appended.contains(&"datacarrier".to_owned()));
    assert_eq!(key_value(&read_config(&data_dir), "datacarrier"), Some("0"));
}

#[test]
fn key_value_trims_whitespace_around_name_and_value() {
    let contents = "  rpcbind = 127.0.0.1  \n";
    assert_eq!(key_value(contents, "rpcbind"), Some("127.0.0.1"));
}

#[test]
fn report_describes_each_outcome() {
    let created = ConfigReport::Created {
        user: "operator".to_owned(),
    };
    assert!(created.describe().contains("operator"));

    let unchanged = ConfigReport::Upgraded { appended: Vec::new() };
    assert!(unchanged.describe().contains("no changes"));

    let upgraded = ConfigReport::Upgraded {
        appended: vec!["datacarrier".to_owned()],
    };
    assert!(upgraded.describe().contains("datacarrier"));
}
