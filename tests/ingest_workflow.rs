// tests/ingest_workflow.rs

//! End-to-end ingestion tests against a recording publication service.

mod common;

use common::{Call, FakeService, TAG_MESSAGE, TestRepo, install_helper, tarball};
use eessi_ingest::{
    ContentType, Error, IngestOptions, Pipeline, Provenance, TagEntry, Taxonomy, ValidationError,
    Workflow,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::PathBuf;

fn provenance() -> Provenance {
    Provenance::new("EESSI/software-layer", "2023.06-software", "617", "alice")
}

fn pipeline(cache_helper: Option<PathBuf>) -> Pipeline {
    Pipeline::new(
        Taxonomy::default(),
        IngestOptions {
            cache_helper,
            ..Default::default()
        },
    )
}

fn ingest_calls(name: &str) -> Vec<Call> {
    vec![
        Call::Ingest {
            base_dir: "versions".to_string(),
            tag_message: TAG_MESSAGE.to_string(),
        },
        Call::ListTags,
        Call::AddTag {
            name: "generic-1-meta".to_string(),
            message: format!(
                "{} ingested from EESSI/software-layer branch 2023.06-software change 617 submitted by alice",
                name
            ),
        },
        Call::Transaction,
        Call::Publish(format!("Generate catalogs after ingesting {}", name)),
    ]
}

#[cfg(unix)]
#[test]
fn test_software_ingest_regenerates_caches() {
    let repo = TestRepo::new();
    let scratch = repo.scratch();
    let log = scratch.join("helper.log");
    let helper = install_helper(&scratch, &format!("echo \"$1\" > {}", log.display()));

    let name = "eessi-2023.06-software-linux-x86_64-generic-1690000000.tar.gz";
    let path = tarball(
        &scratch,
        name,
        &[
            "2023.06/software/linux/x86_64/generic/modules/all/GCC/12.3.0.lua",
            "2023.06/software/linux/x86_64.generic/somefile",
        ],
    );

    let mut publisher = repo.publisher();
    let outcome = pipeline(Some(helper))
        .run(&mut publisher, &path, provenance())
        .unwrap();

    assert_eq!(outcome.dispatch.workflow, Workflow::IngestWithCacheUpdate);
    assert!(outcome.dispatch.report.warnings.is_empty());
    assert_eq!(
        outcome.dispatch.report.audit_tag.as_deref(),
        Some("generic-1-meta")
    );

    let request = &outcome.inspection.request;
    assert_eq!(request.archive.content_type, ContentType::Software);
    let platform = request.archive.platform.as_ref().unwrap();
    assert_eq!(platform.os, "linux");
    assert_eq!(platform.arch, "x86_64");

    let mut expected = ingest_calls(name);
    expected.push(Call::Transaction);
    expected.push(Call::Publish(format!("update Lmod caches after ingesting {}", name)));
    assert_eq!(publisher.service().calls, expected);

    let version_dir = repo.config.version_path("2023.06");
    assert_eq!(
        std::fs::read_to_string(&log).unwrap().trim(),
        version_dir.to_string_lossy()
    );
    assert!(version_dir.join("software/linux/x86_64.generic/somefile").exists());
}

#[test]
fn test_version_mismatch_never_reaches_the_service() {
    let repo = TestRepo::new();
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.07-software-linux-x86_64-generic-1690000000.tar.gz",
        &["2023.06/software/linux/x86_64/generic/somefile"],
    );

    let mut publisher = repo.publisher();
    let err = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    match err {
        Error::Validation(ValidationError::VersionMismatch {
            version,
            top_level_dir,
        }) => {
            assert_eq!(version, "2023.07");
            assert_eq!(top_level_dir, "2023.06");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(publisher.service().calls.is_empty());
}

#[test]
fn test_unsupported_architecture_is_rejected() {
    let repo = TestRepo::new();
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-software-linux-sparc64-1690000000.tar.gz",
        &["2023.06/software/linux/sparc64/somefile"],
    );

    let mut publisher = repo.publisher();
    let err = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::UnsupportedArch(ref arch)) if arch == "sparc64"
    ));
    assert!(publisher.service().calls.is_empty());
}

#[test]
fn test_init_tarball_ingests_without_platform() {
    let repo = TestRepo::new();
    let name = "eessi-2023.06-init-1690000000.tar.gz";
    let path = tarball(
        &repo.scratch(),
        name,
        &["2023.06/init/bash", "2023.06/init/lmod/bash"],
    );

    let mut publisher = repo.publisher();
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    assert_eq!(outcome.dispatch.workflow, Workflow::Ingest);
    assert!(outcome.inspection.request.archive.platform.is_none());
    assert_eq!(publisher.service().calls, ingest_calls(name));
    assert!(repo.config.version_path("2023.06").join("init/lmod/bash").exists());
}

#[test]
fn test_audit_tag_ignores_trunk_pointers() {
    let repo = TestRepo::new();
    let name = "eessi-2023.06-init-1690000000.tar.gz";
    let path = tarball(&repo.scratch(), name, &["2023.06/init/bash"]);

    let mut service = FakeService::publishing_into(repo.repo_root());
    for moving in ["trunk-previous", "trunk"] {
        service.tags.push(TagEntry {
            name: moving.to_string(),
            revision: 99,
            timestamp: 1_800_000_000,
            description: String::new(),
        });
    }
    let mut publisher = repo.publisher_with(service);
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    assert_eq!(outcome.dispatch.report.audit_tag.as_deref(), Some("generic-1-meta"));
    assert_eq!(publisher.service().calls, ingest_calls(name));
}

#[test]
fn test_compat_update_replaces_published_tree() {
    let repo = TestRepo::new();
    let marker = repo.publish_file("2023.06/compat/linux/x86_64/startprefix", "old");
    let stale = repo.publish_file("2023.06/compat/linux/x86_64/usr/lib/stale.so", "old");
    let sibling = repo.publish_file("2023.06/compat/linux/aarch64/startprefix", "arm");

    let path = common::tarball(
        &repo.scratch(),
        "eessi-2023.06-compat-linux-x86_64-1690000000.tar.gz",
        &[
            "2023.06/compat/linux/x86_64/startprefix",
            "2023.06/compat/linux/x86_64/usr/bin/bash",
        ],
    );

    let mut publisher = repo.publisher();
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    assert_eq!(outcome.dispatch.workflow, Workflow::CompatReplace);
    assert_eq!(
        publisher.service().published_messages(),
        vec!["updated compat layer for 2023.06, linux, x86_64"]
    );
    let calls = &publisher.service().calls;
    assert_eq!(calls[0], Call::Transaction);
    assert!(!calls.iter().any(|c| matches!(c, Call::Ingest { .. })));
    assert!(matches!(calls.last(), Some(Call::AddTag { name, .. }) if name == "generic-1-meta"));

    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "payload\n");
    assert!(!stale.exists());
    assert!(marker.parent().unwrap().join("usr/bin/bash").exists());
    assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "arm");
}

#[test]
fn test_compat_without_marker_is_a_fresh_ingest() {
    let repo = TestRepo::new();
    let name = "eessi-2023.06-compat-linux-aarch64-1690000000.tar.gz";
    let path = tarball(
        &repo.scratch(),
        name,
        &["2023.06/compat/linux/aarch64/startprefix"],
    );

    let mut publisher = repo.publisher();
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    assert_eq!(outcome.dispatch.workflow, Workflow::Ingest);
    assert_eq!(publisher.service().calls, ingest_calls(name));
    assert_eq!(publisher.service().count(&Call::Abort), 0);
}

#[test]
fn test_compat_update_publish_failure_aborts() {
    let repo = TestRepo::new();
    repo.publish_file("2023.06/compat/linux/x86_64/startprefix", "old");
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-compat-linux-x86_64-1690000000.tar.gz",
        &["2023.06/compat/linux/x86_64/startprefix"],
    );

    let mut publisher = repo.publisher_with(
        FakeService::publishing_into(repo.repo_root()).fail_on("publish"),
    );
    let err = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    assert!(matches!(err, Error::CompatUpdateAborted(_)));
    assert_eq!(
        publisher.service().calls,
        vec![
            Call::Transaction,
            Call::Publish("updated compat layer for 2023.06, linux, x86_64".to_string()),
            Call::Abort,
        ]
    );
}

#[test]
fn test_compat_update_extraction_failure_aborts() {
    let repo = TestRepo::new();
    repo.publish_file("2023.06/compat/linux/x86_64/startprefix", "old");
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-compat-linux-x86_64-1690000000.tar.gz",
        &["2023.06/compat/linux/x86_64/startprefix"],
    );
    let inspection = pipeline(None).inspect(&path, provenance()).unwrap();

    // Valid gzip, but the payload is no tar stream
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(&[b'x'; 1024]).unwrap();
    encoder.finish().unwrap();

    let mut publisher = repo.publisher();
    let err = eessi_ingest::dispatch(&mut publisher, &inspection.request, None).unwrap_err();

    assert!(matches!(err, Error::CompatUpdateAborted(_)));
    assert_eq!(publisher.service().calls, vec![Call::Transaction, Call::Abort]);
}

#[test]
fn test_compat_update_reports_failed_abort() {
    let repo = TestRepo::new();
    repo.publish_file("2023.06/compat/linux/x86_64/startprefix", "old");
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-compat-linux-x86_64-1690000000.tar.gz",
        &["2023.06/compat/linux/x86_64/startprefix"],
    );

    let service = FakeService::new().fail_on("publish").fail_on("abort");
    let mut publisher = repo.publisher_with(service);
    let err = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    assert!(err.to_string().contains("abort failed as well"));
}

#[test]
fn test_failed_ingest_is_fatal() {
    let repo = TestRepo::new();
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-scripts-1690000000.tar.gz",
        &["2023.06/scripts/gpu_support/nvidia/install.sh"],
    );

    let mut publisher = repo.publisher_with(FakeService::new().fail_on("ingest"));
    let err = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    assert!(matches!(err, Error::Service(ref e) if e.operation == "ingest"));
    assert_eq!(publisher.service().calls.len(), 1);
}

#[test]
fn test_audit_tag_failure_is_a_warning() {
    let repo = TestRepo::new();
    let name = "eessi-2023.06-init-1690000000.tar.gz";
    let path = tarball(&repo.scratch(), name, &["2023.06/init/bash"]);

    let mut publisher = repo.publisher_with(FakeService::new().fail_on("tag"));
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    let report = &outcome.dispatch.report;
    assert!(report.audit_tag.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("audit tag"));
    assert_eq!(
        publisher.service().published_messages(),
        vec![format!("Generate catalogs after ingesting {}", name)]
    );
}

#[test]
fn test_catalog_regeneration_failure_is_a_warning() {
    let repo = TestRepo::new();
    let path = tarball(
        &repo.scratch(),
        "eessi-2023.06-init-1690000000.tar.gz",
        &["2023.06/init/bash"],
    );

    let mut publisher = repo.publisher_with(FakeService::new().fail_on("publish"));
    let outcome = pipeline(None)
        .run(&mut publisher, &path, provenance())
        .unwrap();

    let report = &outcome.dispatch.report;
    assert_eq!(report.audit_tag.as_deref(), Some("generic-1-meta"));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("nested catalogs"));
    assert_eq!(publisher.service().count(&Call::Abort), 0);
}

#[test]
fn test_missing_cache_helper_fails_before_ingest() {
    let repo = TestRepo::new();
    let scratch = repo.scratch();
    let path = tarball(
        &scratch,
        "eessi-2023.06-software-linux-x86_64-generic-1690000000.tar.gz",
        &["2023.06/software/linux/x86_64/generic/somefile"],
    );

    let mut publisher = repo.publisher();
    let err = pipeline(Some(scratch.join("update_lmod_caches.sh")))
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    assert!(matches!(err, Error::CacheHelper(_)));
    assert!(publisher.service().calls.is_empty());
}

#[cfg(unix)]
#[test]
fn test_failing_cache_helper_still_publishes() {
    let repo = TestRepo::new();
    let scratch = repo.scratch();
    let helper = install_helper(&scratch, "echo 'lmod not found' >&2\nexit 1");
    let name = "eessi-2023.06-software-linux-x86_64-generic-1690000000.tar.gz";
    let path = tarball(&scratch, name, &["2023.06/software/linux/x86_64/generic/somefile"]);

    let mut publisher = repo.publisher();
    let outcome = pipeline(Some(helper))
        .run(&mut publisher, &path, provenance())
        .unwrap();

    let warnings = &outcome.dispatch.report.warnings;
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("lmod not found"));
    assert_eq!(
        publisher.service().calls.last(),
        Some(&Call::Publish(format!("update Lmod caches after ingesting {}", name)))
    );
}

#[cfg(unix)]
#[test]
fn test_cache_publish_failure_is_fatal() {
    let repo = TestRepo::new();
    let scratch = repo.scratch();
    let helper = install_helper(&scratch, "exit 0");
    let path = tarball(
        &scratch,
        "eessi-2023.06-software-linux-x86_64-generic-1690000000.tar.gz",
        &["2023.06/software/linux/x86_64/generic/somefile"],
    );

    let mut publisher = repo.publisher_with(FakeService::new().fail_on("publish"));
    let err = pipeline(Some(helper))
        .run(&mut publisher, &path, provenance())
        .unwrap_err();

    assert!(matches!(err, Error::Service(ref e) if e.operation == "publish"));
}
