// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const TEST_PIN: &str = "482913";
const TEST_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";
// RFC 6979 A.2.5 private key and the start of its public key x coordinate.
const P256_PRIVATE_KEY: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
const P256_PUBLIC_PREFIX: &str = "60fed4ba255a9d31";

struct KeywardCmd {
    cmd: Command,
}

impl KeywardCmd {
    fn new(home: &TempDir) -> Self {
        let config_dir = home.path().join("config");
        std::fs::create_dir_all(config_dir.join("keyward")).unwrap();
        std::fs::write(
            config_dir.join("keyward").join("config.toml"),
            "kdf = \"testing\"\n",
        )
        .unwrap();

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_keyward"));
        cmd.env("XDG_CONFIG_HOME", &config_dir);
        cmd.env("KEYWARD_YES", "1");
        cmd.env("KEYWARD_PIN", TEST_PIN);
        cmd.env_remove("KEYWARD_PRIVATE_KEY");
        cmd.env_remove("KEYWARD_MNEMONIC");
        cmd.arg("--data-dir").arg(home.path().join("data"));
        Self { cmd }
    }

    fn backup_dir(mut self, path: &Path) -> Self {
        self.cmd.arg("--backup-dir").arg(path);
        self
    }

    fn env(mut self, key: &str, val: &str) -> Self {
        self.cmd.env(key, val);
        self
    }

    fn run(mut self, args: &[&str]) -> Output {
        self.cmd.args(args).output().unwrap()
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_mnemonic_generate() {
    let home = TempDir::new().unwrap();
    let output = KeywardCmd::new(&home).run(&["mnemonic", "generate", "--words", "15"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stderr(&output);
    assert!(text.contains("15."));
    assert!(!text.contains("16."));
    assert!(text.contains("ECDSA_secp256k1 primary"));

    let output = KeywardCmd::new(&home).run(&["mnemonic", "generate", "--words", "13"]);
    assert!(!output.status.success());
}

#[test]
fn test_key_lifecycle() {
    let home = TempDir::new().unwrap();

    let output = KeywardCmd::new(&home)
        .env("KEYWARD_PRIVATE_KEY", P256_PRIVATE_KEY)
        .run(&["key", "import", "--prefix", "alice", "--algorithm", "p256"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("prefix_key_alice"));

    let output = KeywardCmd::new(&home).run(&["key", "show", "--prefix", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stderr(&output);
    assert!(text.contains(P256_PUBLIC_PREFIX));
    assert!(text.contains("current storage"));

    let output = KeywardCmd::new(&home).run(&["key", "list"]);
    assert!(stderr(&output).contains("alice"));

    let output = KeywardCmd::new(&home).run(&["key", "diagnose", "--prefix", "alice"]);
    let text = stderr(&output);
    assert!(text.contains("=== Key Storage Diagnostic for prefix: alice ==="));
    assert!(text.contains("Old Android Keystore"));

    let output = KeywardCmd::new(&home).run(&["key", "migrate"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stderr(&output);
    assert!(text.contains("alice: already current"));
    assert!(text.contains("Migration complete"));

    let output = KeywardCmd::new(&home).run(&["key", "migrate"]);
    assert!(stderr(&output).contains("Migration already completed"));

    let output = KeywardCmd::new(&home).run(&["key", "delete", "--prefix", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = KeywardCmd::new(&home).run(&["key", "show", "--prefix", "alice"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No usable key found"));
}

#[test]
fn test_backup_round_trip() {
    let home = TempDir::new().unwrap();
    let backups = home.path().join("backups");

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .env("KEYWARD_MNEMONIC", TEST_MNEMONIC)
        .run(&[
            "backup", "upload", "--user-id", "u1", "--address", "0xf8d6e0586b0a20c7", "--name",
            "alice",
        ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(backups.join("outblock_multi_backup").exists());

    let output = KeywardCmd::new(&home).backup_dir(&backups).run(&["backup", "list"]);
    let text = stderr(&output);
    assert!(text.contains("u1"));
    assert!(text.contains("0xf8d6e0586b0a20c7"));

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .run(&["backup", "restore", "--user-id", "u1"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("sausage"));

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .env("KEYWARD_PIN", "000000")
        .run(&["backup", "restore", "--user-id", "u1"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Wrong PIN"));

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .run(&["backup", "check", "--user-id", "u1"]);
    assert!(stderr(&output).contains("not an active account key"));

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .run(&["backup", "delete", "--user-id", "u1"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = KeywardCmd::new(&home)
        .backup_dir(&backups)
        .run(&["backup", "check", "--user-id", "u1"]);
    assert!(stderr(&output).contains("No backup for 'u1'"));
}
