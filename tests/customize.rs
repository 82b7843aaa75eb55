//! End-to-end tests for the customization pipeline.
//!
//! Everything here shells out to curl. Tests that also build or rebuild
//! images need gzip, cpio and squashfs-tools and are ignored by default;
//! run them with `cargo test -- --ignored`.

mod common;

use common::{initram_without_image, sample_initram, sample_resources, TestServer};
use coreos_customizer::artifact::cpio::unpack_initram;
use coreos_customizer::artifact::fetch::download;
use coreos_customizer::artifact::squashfs::{list_squashfs, SquashfsOptions};
use coreos_customizer::customize::WORKDIR_PREFIX;
use coreos_customizer::{build_custom_image, CustomizeConfig, FailureKind, StepError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn config(vmlinuz: String, initram: String, resources: PathBuf, custom: PathBuf) -> CustomizeConfig {
    CustomizeConfig {
        vmlinuz,
        initram,
        resources,
        custom,
        squashfs_image: PathBuf::from("usr.squashfs"),
        oem_dir: PathBuf::from("share/oem"),
        gzip_level: 6,
        squashfs: SquashfsOptions::default(),
        work_root: None,
        preflight: false,
    }
}

fn leftover_workdirs(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(WORKDIR_PREFIX))
        .collect()
}

fn embedded_listing(initram: &Path, scratch: &Path) -> Vec<String> {
    unpack_initram(initram, scratch).unwrap();
    list_squashfs(&scratch.join("usr.squashfs")).unwrap()
}

#[test]
fn download_fails_on_error_status() {
    let server = TestServer::start(HashMap::new());
    let temp = TempDir::new().unwrap();

    let result = download(&temp.path().join("index.html"), &server.url("/error"));
    assert!(result.is_err());
}

#[test]
fn download_overwrites_existing_file() {
    let server = TestServer::start(HashMap::from([(
        "/success".to_string(),
        b"fresh".to_vec(),
    )]));
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("index.html");
    fs::write(&dest, "stale contents").unwrap();

    download(&dest, &server.url("/success")).unwrap();

    assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh");
}

#[test]
#[ignore = "needs curl, gzip, cpio and squashfs-tools"]
fn customizes_initram_over_http() {
    let fixtures = TempDir::new().unwrap();
    let initram = sample_initram(fixtures.path());
    let resources = sample_resources(fixtures.path());
    let original = embedded_listing(&initram, &fixtures.path().join("original"));

    let server = TestServer::start(HashMap::from([
        ("/example.vmlinuz".to_string(), b"kernel image".to_vec()),
        ("/example.cpio.gz".to_string(), fs::read(&initram).unwrap()),
    ]));

    let out = TempDir::new().unwrap();
    let custom = out.path().join("out/new.cpio.gz");
    let mut settings = config(
        server.url("/example.vmlinuz"),
        server.url("/example.cpio.gz"),
        resources,
        custom.clone(),
    );
    settings.work_root = Some(out.path().join("work"));
    settings.preflight = true;
    let report = build_custom_image(&settings).unwrap();

    assert_eq!(leftover_workdirs(&out.path().join("work")), Vec::<String>::new());

    assert_eq!(report.custom, custom);
    assert!(report.custom_size > 0);
    assert_eq!(fs::metadata(&custom).unwrap().len(), report.custom_size);
    assert_eq!(report.vmlinuz, out.path().join("out/example.vmlinuz"));
    assert_eq!(fs::read_to_string(&report.vmlinuz).unwrap(), "kernel image");
    assert_eq!(report.original_initram, out.path().join("out/example.cpio.gz"));

    let mut expected = original;
    expected.extend(
        [
            "squashfs-root/share/oem",
            "squashfs-root/share/oem/cloud-config.yml",
            "squashfs-root/share/oem/setup.sh",
        ]
        .map(String::from),
    );
    let customized = embedded_listing(&custom, &out.path().join("check"));
    assert_eq!(customized, expected);

    // Non-image initram contents survive the repack.
    assert!(out.path().join("check/init").is_file());
}

#[test]
#[ignore = "needs curl, gzip, cpio and squashfs-tools"]
fn customizes_initram_from_file_urls() {
    let fixtures = TempDir::new().unwrap();
    let initram = sample_initram(fixtures.path());
    let resources = sample_resources(fixtures.path());
    let vmlinuz = fixtures.path().join("example.vmlinuz");
    fs::write(&vmlinuz, "kernel image").unwrap();

    let out = TempDir::new().unwrap();
    let custom = out.path().join("new.cpio.gz");
    build_custom_image(&config(
        format!("file://{}", vmlinuz.display()),
        format!("file://{}", initram.display()),
        resources,
        custom.clone(),
    ))
    .unwrap();

    let listing = embedded_listing(&custom, &out.path().join("check"));
    assert!(listing.contains(&"squashfs-root/share/oem/setup.sh".to_string()));
    assert!(listing.contains(&"squashfs-root/bin/busybox".to_string()));
}

#[test]
#[ignore = "needs curl, gzip, cpio and squashfs-tools"]
fn missing_embedded_image_aborts_before_pack() {
    let fixtures = TempDir::new().unwrap();
    let initram = initram_without_image(fixtures.path());
    let resources = sample_resources(fixtures.path());
    let vmlinuz = fixtures.path().join("example.vmlinuz");
    fs::write(&vmlinuz, "kernel image").unwrap();

    let out = TempDir::new().unwrap();
    let custom = out.path().join("new.cpio.gz");
    let mut settings = config(
        format!("file://{}", vmlinuz.display()),
        format!("file://{}", initram.display()),
        resources,
        custom.clone(),
    );
    settings.work_root = Some(out.path().join("work"));
    let err = build_custom_image(&settings).unwrap_err();

    let step = err.downcast_ref::<StepError>().expect("step error");
    assert_eq!(step.step, "RebuildSquashFS");
    assert_eq!(step.kind, FailureKind::Assembly);
    assert!(!custom.exists());
    assert_eq!(leftover_workdirs(&out.path().join("work")), Vec::<String>::new());
}

#[test]
fn http_error_aborts_pipeline() {
    let fixtures = TempDir::new().unwrap();
    let resources = sample_resources(fixtures.path());
    let server = TestServer::start(HashMap::from([(
        "/example.vmlinuz".to_string(),
        b"kernel image".to_vec(),
    )]));

    let out = TempDir::new().unwrap();
    let custom = out.path().join("new.cpio.gz");
    let mut settings = config(
        server.url("/example.vmlinuz"),
        server.url("/missing.cpio.gz"),
        resources,
        custom.clone(),
    );
    settings.work_root = Some(out.path().join("work"));
    let err = build_custom_image(&settings).unwrap_err();

    let step = err.downcast_ref::<StepError>().expect("step error");
    assert_eq!(step.step, "DownloadInitram");
    assert_eq!(step.kind, FailureKind::Transfer);
    assert!(out.path().join("example.vmlinuz").is_file());
    assert!(!custom.exists());
    assert_eq!(leftover_workdirs(&out.path().join("work")), Vec::<String>::new());
}
