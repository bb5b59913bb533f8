//! Integration tests for Lamina

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config file
    fn lamina(config_dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("lamina");
        cmd.env("LAMINA_CONFIG", config_dir.join("config.toml"))
            .env_remove("LAMINA_REGISTRY_USERNAME")
            .env_remove("LAMINA_REGISTRY_PASSWORD")
            .env("CI", "1");
        cmd
    }

    #[test]
    fn help_displays() {
        let config = TempDir::new().unwrap();
        lamina(config.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("layered container images"));
    }

    #[test]
    fn version_displays() {
        let config = TempDir::new().unwrap();
        lamina(config.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("lamina"));
    }

    #[test]
    fn config_path() {
        let config = TempDir::new().unwrap();
        lamina(config.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let config = TempDir::new().unwrap();
        lamina(config.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("concurrency = 4"));
    }

    #[test]
    fn invalid_config_reported() {
        let config = TempDir::new().unwrap();
        std::fs::write(config.path().join("config.toml"), "[build\n").unwrap();
        lamina(config.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn inspect_python_directory() {
        let config = TempDir::new().unwrap();
        let app = TempDir::new().unwrap();
        std::fs::write(app.path().join("requirements.txt"), "flask==1.0\n").unwrap();
        std::fs::write(app.path().join("package.json"), "{}").unwrap();

        lamina(config.path())
            .args(["inspect", "--format", "json", "--directory"])
            .arg(app.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("\"strategy\": \"python\""))
            .stdout(predicate::str::contains("python-requirements-cache"));
    }

    #[test]
    fn inspect_missing_directory() {
        let config = TempDir::new().unwrap();
        lamina(config.path())
            .args(["inspect", "--directory", "/nonexistent/lamina-app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn dry_run_app_build() {
        let config = TempDir::new().unwrap();
        let app = TempDir::new().unwrap();
        std::fs::write(app.path().join("index.html"), "<h1>hello</h1>").unwrap();

        lamina(config.path())
            .args([
                "build",
                "--dry-run",
                "--base",
                "registry.local/base:1",
                "--name",
                "registry.local/site:1",
                "--directory",
            ])
            .arg(app.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("strategy: app"))
            .stdout(predicate::str::contains("layers: 1"))
            .stdout(predicate::str::contains("sha256:"));
    }

    #[test]
    fn dry_run_node_build_unsupported() {
        let config = TempDir::new().unwrap();
        let app = TempDir::new().unwrap();
        std::fs::write(app.path().join("package.json"), "{}").unwrap();

        lamina(config.path())
            .args([
                "build",
                "--dry-run",
                "--base",
                "registry.local/node:20",
                "--name",
                "registry.local/web:1",
                "--directory",
            ])
            .arg(app.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported ecosystem"));
    }

    #[test]
    fn dry_run_batch() {
        let config = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        for name in ["one", "two"] {
            let dir = work.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("main.sh"), "echo hi\n").unwrap();
        }
        let batch = work.path().join("builds.toml");
        std::fs::write(
            &batch,
            r#"
[[build]]
base = "registry.local/base:1"
name = "registry.local/one:1"
directory = "one"

[[build]]
base = "registry.local/base:1"
name = "registry.local/two:1"
directory = "two"
"#,
        )
        .unwrap();

        lamina(config.path())
            .args(["batch", "--dry-run", "--jobs", "2"])
            .arg(&batch)
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.local/one:1"))
            .stdout(predicate::str::contains("registry.local/two:1"));
    }
}
