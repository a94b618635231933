use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch pass directory, output directory and workspace root.
struct TestContext {
    temp_dir: TempDir,
    raw: PathBuf,
    out: PathBuf,
    work: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let raw = temp_dir.path().join("pass");
        let out = temp_dir.path().join("out");
        let work = temp_dir.path().join("work");
        for dir in [&raw, &out, &work] {
            fs::create_dir_all(dir).expect("failed to create dir");
        }
        fs::write(raw.join("pass.json"), r#"{"serialNumber":"0"}"#).unwrap();
        fs::write(raw.join("icon.png"), b"png").unwrap();
        Self {
            temp_dir,
            raw,
            out,
            work,
        }
    }

    fn signpass(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_signpass"));
        cmd.env_remove("SIGNPASS_PASSWORD")
            .env_remove("SIGNPASS_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// `pack` with every required flag and the given signer program.
    fn pack_with(&self, openssl: &str) -> Command {
        let mut cmd = self.signpass();
        cmd.arg("pack")
            .args(["-w", "wwdr.pem", "-s", "cert.pem", "-k", "key.pem"])
            .arg("-r")
            .arg(&self.raw)
            .args(["-p", "hunter2"])
            .arg("-d")
            .arg(&self.out)
            .arg("--workspace-root")
            .arg(&self.work)
            .args(["--openssl", openssl]);
        cmd
    }

    fn is_empty(dir: &PathBuf) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.signpass().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    for sub in ["pack", "cert", "key"] {
        assert!(stdout.contains(sub), "missing {sub}");
    }
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.signpass().arg("--version").output().unwrap();
    assert!(output.status.success());
}

#[test]
fn test_pack_lists_every_missing_parameter() {
    let ctx = TestContext::new();
    let output = ctx.signpass().arg("pack").output().unwrap();
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("Missing required parameters: wwdr, signer, key, raw, pass, dir"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_password_from_environment() {
    let ctx = TestContext::new();
    let output = ctx
        .signpass()
        .env("SIGNPASS_PASSWORD", "hunter2")
        .arg("pack")
        .args(["-w", "a", "-s", "b", "-k", "c"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("raw, dir"), "{err}");
    assert!(!err.contains("pass,"), "{err}");
}

#[test]
fn test_config_file_supplies_credentials() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.path().join("signpass.toml");
    fs::write(
        &config,
        "[credentials]\nwwdr = \"w.pem\"\nsigner = \"s.pem\"\nkey = \"k.pem\"\n",
    )
    .unwrap();

    let output = ctx
        .signpass()
        .arg("pack")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Missing required parameters: raw, pass, dir"), "{err}");
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let ctx = TestContext::new();
    let config = ctx.temp_dir.path().join("signpass.toml");
    fs::write(&config, "colour = \"blue\"\n").unwrap();

    let output = ctx
        .signpass()
        .arg("pack")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to parse config"));
}

#[test]
fn test_missing_pass_directory() {
    let ctx = TestContext::new();
    fs::remove_dir_all(&ctx.raw).unwrap();

    let output = ctx.pack_with("true").output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Not found"));
    assert!(TestContext::is_empty(&ctx.work));
}

#[cfg(unix)]
#[test]
fn test_failing_signer_aborts_without_output() {
    let ctx = TestContext::new();
    let output = ctx.pack_with("false").output().unwrap();
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Signing failed"), "{err}");
    assert!(!err.contains("hunter2"));
    assert!(TestContext::is_empty(&ctx.out));
    assert!(output.stdout.is_empty());
}

#[cfg(unix)]
#[test]
fn test_silent_signer_is_not_trusted() {
    let ctx = TestContext::new();
    let output = ctx.pack_with("true").output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no signature"), "{}", stderr(&output));
    assert!(TestContext::is_empty(&ctx.out));
}

#[test]
fn test_export_missing_bundle() {
    let ctx = TestContext::new();
    let output = ctx
        .signpass()
        .arg("cert")
        .arg("--in")
        .arg(ctx.temp_dir.path().join("absent.p12"))
        .arg("--out")
        .arg(ctx.temp_dir.path().join("cert.pem"))
        .args(["--pass", "pw"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Bundle not found"));
}

#[test]
fn test_native_export_is_unsupported() {
    let ctx = TestContext::new();
    let bundle = ctx.temp_dir.path().join("pass.p12");
    fs::write(&bundle, b"not really pkcs12").unwrap();

    let output = ctx
        .signpass()
        .arg("key")
        .arg("--in")
        .arg(&bundle)
        .arg("--out")
        .arg(ctx.temp_dir.path().join("key.pem"))
        .args(["--pass", "pw", "--native"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not implemented"));
    assert!(!ctx.temp_dir.path().join("key.pem").exists());
}
