//! CLI tests for lkimg

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use lkimg::{CertType, LkImage, NewPartition};
use tempfile::tempdir;

/// Write a small two-partition image and return its path
fn write_sample_image(dir: &Path) -> PathBuf {
    let mut image = LkImage::from_bytes(Vec::new()).unwrap();
    image
        .add_partition(
            NewPartition::new("lk", b"lk payload with MARKER inside".to_vec())
                .extended(true)
                .load_address(0x4800_0000),
        )
        .unwrap();
    image
        .add_partition(
            NewPartition::new("lk_main_dtb", b"device tree payload".to_vec()).extended(true),
        )
        .unwrap();
    image
        .add_certificate("lk", b"certificate".to_vec(), CertType::Cert1)
        .unwrap();
    image.rebuild();

    let path = dir.join("lk.img");
    image.save(&path).unwrap();
    path
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.arg("--version").assert().success();
}

#[test]
fn test_cli_requires_subcommand() {
    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_cli_list() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args(["list", image_path.to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("lk"));
    assert!(stdout.contains("lk_main_dtb"));
    assert!(stdout.contains("1 certs"));
}

#[test]
fn test_cli_list_headers() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args(["list", image_path.to_str().unwrap(), "--headers"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Partition Name"));
    assert!(stdout.contains("Memory Address"));
}

#[test]
fn test_cli_list_missing_file() {
    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args(["list", "/nonexistent/lk.img"]).assert().failure();
}

#[test]
fn test_cli_add() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let data_path = dir.path().join("logo.bin");
    fs::write(&data_path, b"logo data").unwrap();
    let output_path = dir.path().join("out.img");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "add",
        image_path.to_str().unwrap(),
        "logo",
        data_path.to_str().unwrap(),
        "-a",
        "0x41000000",
        "-o",
        output_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let image = LkImage::from_file(&output_path).unwrap();
    assert_eq!(image.partition_names(), ["lk", "lk_main_dtb", "logo"]);
    let logo = image.partition("logo").unwrap();
    assert_eq!(logo.data(), b"logo data");
    assert_eq!(logo.header().load_address(), 0x4100_0000);
}

#[test]
fn test_cli_add_duplicate_fails() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let data_path = dir.path().join("data.bin");
    fs::write(&data_path, b"data").unwrap();
    let output_path = dir.path().join("out.img");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args([
            "add",
            image_path.to_str().unwrap(),
            "lk",
            data_path.to_str().unwrap(),
            "-o",
            output_path.to_str().unwrap(),
        ])
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("duplicate partition name"));
    // The failed operation must not produce an output file.
    assert!(!output_path.exists());
}

#[test]
fn test_cli_remove() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());
    let output_path = dir.path().join("out.img");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "remove",
        image_path.to_str().unwrap(),
        "lk_main_dtb",
        "-o",
        output_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let image = LkImage::from_file(&output_path).unwrap();
    assert_eq!(image.partition_names(), ["lk"]);
}

#[test]
fn test_cli_remove_missing_partition() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args(["remove", image_path.to_str().unwrap(), "recovery"])
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("partition not found"));
}

#[test]
fn test_cli_cert() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let cert_path = dir.path().join("cert.der");
    fs::write(&cert_path, b"certificate body").unwrap();
    let output_path = dir.path().join("out.img");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "cert",
        image_path.to_str().unwrap(),
        "lk_main_dtb",
        cert_path.to_str().unwrap(),
        "--cert-type",
        "cert2",
        "-o",
        output_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let image = LkImage::from_file(&output_path).unwrap();
    let dtb = image.partition("lk_main_dtb").unwrap();
    assert_eq!(dtb.certs().len(), 1);
    assert_eq!(dtb.certs()[0].name(), "cert2_lk_main_dtb");
    assert_eq!(dtb.certs()[0].data(), b"certificate body");
}

#[test]
fn test_cli_patch_partition() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());
    let output_path = dir.path().join("out.img");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "patch",
        image_path.to_str().unwrap(),
        &hex::encode(b"MARKER"),
        &hex::encode(b"mARKEr"),
        "-p",
        "lk",
        "-o",
        output_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let image = LkImage::from_file(&output_path).unwrap();
    assert_eq!(
        image.partition("lk").unwrap().data(),
        b"lk payload with mARKEr inside"
    );
    assert_eq!(
        image.partition("lk_main_dtb").unwrap().data(),
        b"device tree payload"
    );
}

#[test]
fn test_cli_patch_needle_missing() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());
    let original = fs::read(&image_path).unwrap();

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args([
            "patch",
            image_path.to_str().unwrap(),
            "deadbeefcafebabe",
            "00207047",
        ])
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("needle not found"));
    // The input image stays untouched.
    assert_eq!(fs::read(&image_path).unwrap(), original);
}

#[test]
fn test_cli_patch_rejects_bad_hex() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    let assert = cmd
        .args(["patch", image_path.to_str().unwrap(), "zz", "00"])
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("invalid hex string"));
}

#[test]
fn test_cli_extract() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());
    let out_dir = dir.path().join("parts");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "extract",
        image_path.to_str().unwrap(),
        "-d",
        out_dir.to_str().unwrap(),
    ])
    .assert()
    .success();

    assert_eq!(
        fs::read(out_dir.join("lk.bin")).unwrap(),
        b"lk payload with MARKER inside"
    );
    assert_eq!(
        fs::read(out_dir.join("lk_main_dtb.bin")).unwrap(),
        b"device tree payload"
    );
}

#[test]
fn test_cli_extract_single_partition() {
    let dir = tempdir().unwrap();
    let image_path = write_sample_image(dir.path());
    let out_dir = dir.path().join("parts");

    let mut cmd = Command::cargo_bin("lkimg").unwrap();
    cmd.args([
        "extract",
        image_path.to_str().unwrap(),
        "-p",
        "lk_main_dtb",
        "-d",
        out_dir.to_str().unwrap(),
    ])
    .assert()
    .success();

    assert!(out_dir.join("lk_main_dtb.bin").exists());
    assert!(!out_dir.join("lk.bin").exists());
}
