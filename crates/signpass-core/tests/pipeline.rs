use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use sha1::{Digest, Sha1};
use signpass_core::config::{Credentials, PackConfig, Passphrase};
use signpass_core::package::Package;
use signpass_core::{
    DigestAlgorithm, ErrorKind, MANIFEST_JSON, PackageBuilder, SIGNATURE, SigningClient,
    SigningError,
};
use tempfile::TempDir;

/// Stub signer returning a fixed blob and counting calls.
struct StubSigner {
    blob: Vec<u8>,
    calls: AtomicUsize,
}

impl StubSigner {
    fn new(blob: Vec<u8>) -> Self {
        Self {
            blob,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SigningClient for StubSigner {
    fn sign(&self, manifest: &[u8], _: &Credentials) -> Result<Vec<u8>, SigningError> {
        assert!(!manifest.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blob.clone())
    }
}

/// Test context with input, output and workspace-root directories.
struct TestContext {
    _root: TempDir,
    input: PathBuf,
    output: PathBuf,
    workspaces: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let input = root.path().join("pass");
        let output = root.path().join("out");
        let workspaces = root.path().join("work");
        for dir in [&input, &output, &workspaces] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            _root: root,
            input,
            output,
            workspaces,
        }
    }

    fn with_pass(self) -> Self {
        fs::write(self.input.join("pass.json"), br#"{"serialNumber":"old"}"#).unwrap();
        fs::write(self.input.join("icon.png"), [0x89, b'P', b'N', b'G', 0, 1, 2]).unwrap();
        self
    }

    fn config(&self) -> PackConfig {
        PackConfig {
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
            workspace_root: Some(self.workspaces.clone()),
            digest: DigestAlgorithm::Sha1,
            credentials: Credentials {
                trust_anchor: "wwdr.pem".into(),
                signer_cert: "cert.pem".into(),
                signer_key: "key.pem".into(),
                passphrase: Passphrase::new("secret"),
            },
        }
    }

    fn leftover_workspaces(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.workspaces)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

fn read_members(archive: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut members = BTreeMap::new();
    for i in 0..zip.len() {
        let mut member = zip.by_index(i).unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        members.insert(member.name().to_string(), data);
    }
    members
}

#[test]
fn end_to_end_produces_signed_pkpass() {
    let ctx = TestContext::new().with_pass();
    let config = ctx.config();
    let signer = StubSigner::new(vec![0xAB; 128]);

    let outcome = PackageBuilder::new(&config, &signer).build().unwrap();

    assert!(outcome.cleanup_error.is_none());
    assert_eq!(signer.calls(), 1);
    assert_eq!(
        outcome.output,
        ctx.output.join(format!("{}.pkpass", outcome.identifier))
    );
    assert!(ctx.leftover_workspaces().is_empty(), "workspace not removed");

    let members = read_members(&outcome.output);
    let names: Vec<&str> = members.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["icon.png", MANIFEST_JSON, "pass.json", SIGNATURE]);

    let pass: serde_json::Value = serde_json::from_slice(&members["pass.json"]).unwrap();
    assert_eq!(pass["serialNumber"], outcome.identifier.as_str());

    let manifest: BTreeMap<String, String> =
        serde_json::from_slice(&members[MANIFEST_JSON]).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest["icon.png"], sha1_hex(&members["icon.png"]));
    assert_eq!(manifest["pass.json"], sha1_hex(&members["pass.json"]));

    assert_eq!(members[SIGNATURE], vec![0xAB; 128]);
}

#[test]
fn manifest_covers_every_top_level_file() {
    let ctx = TestContext::new().with_pass();
    for i in 0..5 {
        fs::write(ctx.input.join(format!("strip{i}.png")), vec![i; 32]).unwrap();
    }
    fs::create_dir(ctx.input.join("en.lproj")).unwrap();
    fs::write(ctx.input.join("en.lproj/pass.strings"), b"\"a\" = \"b\";").unwrap();

    let config = ctx.config();
    let signer = StubSigner::new(vec![1; 8]);
    let outcome = PackageBuilder::new(&config, &signer).build().unwrap();

    assert_eq!(outcome.manifest.len(), 7);
    for (name, digest) in outcome.manifest.iter() {
        assert_eq!(digest.as_str().len(), 40, "{name}");
        assert!(digest.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert!(outcome.manifest.get("en.lproj").is_none());
}

#[test]
fn reserved_names_in_input_are_not_listed() {
    let ctx = TestContext::new().with_pass();
    fs::write(ctx.input.join(MANIFEST_JSON), b"{\"stale\":\"x\"}").unwrap();
    fs::write(ctx.input.join(SIGNATURE), b"stale").unwrap();

    let config = ctx.config();
    let signer = StubSigner::new(vec![7; 64]);
    let outcome = PackageBuilder::new(&config, &signer).build().unwrap();

    assert!(outcome.manifest.get(MANIFEST_JSON).is_none());
    assert!(outcome.manifest.get(SIGNATURE).is_none());
    assert_eq!(outcome.manifest.len(), 2);

    let members = read_members(&outcome.output);
    assert_eq!(members[SIGNATURE], vec![7; 64]);
}

#[test]
fn sha256_manifest_when_configured() {
    let ctx = TestContext::new().with_pass();
    let mut config = ctx.config();
    config.digest = DigestAlgorithm::Sha256;
    let signer = StubSigner::new(vec![1; 8]);

    let outcome = PackageBuilder::new(&config, &signer).build().unwrap();
    let digest = outcome.manifest.get("icon.png").unwrap();
    assert_eq!(digest.as_str().len(), 64);
}

#[test]
fn signer_without_output_fails_the_run() {
    let ctx = TestContext::new().with_pass();
    let config = ctx.config();
    let signer = StubSigner::new(Vec::new());

    let err = PackageBuilder::new(&config, &signer).build().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Signing);
    assert!(fs::read_dir(&ctx.output).unwrap().next().is_none());
    let left = ctx.leftover_workspaces();
    assert_eq!(left.len(), 1, "failed run keeps its workspace");
    assert!(!left[0].join(SIGNATURE).exists());
}

#[test]
fn missing_descriptor_stops_before_manifest() {
    let ctx = TestContext::new();
    fs::write(ctx.input.join("icon.png"), b"png").unwrap();
    let config = ctx.config();
    let signer = StubSigner::new(vec![1; 8]);

    let err = PackageBuilder::new(&config, &signer).build().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(signer.calls(), 0);
    let left = ctx.leftover_workspaces();
    assert_eq!(left.len(), 1);
    assert!(!left[0].join(MANIFEST_JSON).exists());
    assert!(fs::read_dir(&ctx.output).unwrap().next().is_none());
}

#[test]
fn missing_input_creates_no_workspace() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.input_dir = ctx.input.join("does-not-exist");
    let signer = StubSigner::new(vec![1; 8]);

    let err = PackageBuilder::new(&config, &signer).build().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ctx.leftover_workspaces().is_empty());
}

#[test]
fn missing_output_dir_is_not_found() {
    let ctx = TestContext::new().with_pass();
    let mut config = ctx.config();
    config.output_dir = ctx.output.join("nested");
    let signer = StubSigner::new(vec![1; 8]);

    let err = PackageBuilder::new(&config, &signer).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn staging_twice_yields_identical_trees() {
    let ctx = TestContext::new().with_pass();
    fs::create_dir_all(ctx.input.join("en.lproj")).unwrap();
    fs::write(ctx.input.join("en.lproj/pass.strings"), b"x").unwrap();

    let a = Package::create(Some(&ctx.workspaces))
        .unwrap()
        .stage_from(&ctx.input)
        .unwrap();
    let b = Package::create(Some(&ctx.workspaces))
        .unwrap()
        .stage_from(&ctx.input)
        .unwrap();

    assert_eq!(snapshot(a.location()), snapshot(b.location()));
    assert_eq!(snapshot(a.location()), snapshot(&ctx.input));
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}
