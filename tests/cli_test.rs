//! CLI integration tests for the apimorph binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("apimorph"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const VERSIONS: &str = r#"{
    "versions": [
        {
            "name": "2025-06",
            "properties": [
                { "kind": "field", "name": "name", "type": "string", "required": true },
                { "kind": "field", "name": "email", "type": "string", "map": "contact/email" }
            ]
        },
        {
            "name": "2025-08",
            "extends": "2025-06",
            "properties": [
                { "kind": "field", "name": "phone", "type": "string" }
            ]
        }
    ]
}"#;

mod compile_command {
    use super::*;

    #[test]
    fn prints_latest_schema_by_default() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);

        cmd()
            .args(["compile", versions.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""phone""#))
            .stdout(predicate::str::contains(r#""required":["name"]"#));
    }

    #[test]
    fn inexact_version_downgrades() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);

        cmd()
            .args([
                "compile",
                versions.to_str().unwrap(),
                "--version",
                "2025-07",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""email""#).and(
                predicate::str::contains(r#""phone""#).not(),
            ));
    }

    #[test]
    fn mapping_artifact_prints_rows() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);

        cmd()
            .args([
                "compile",
                versions.to_str().unwrap(),
                "--artifact",
                "mapping",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""email":"contact/email""#));
    }

    #[test]
    fn writes_to_output_file() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let output = dir.path().join("schema.json");

        cmd()
            .args([
                "compile",
                versions.to_str().unwrap(),
                "--pretty",
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("\"properties\""));
        assert!(content.contains("{\n"));
    }

    #[test]
    fn version_before_earliest_fails_with_code_2() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);

        cmd()
            .args([
                "compile",
                versions.to_str().unwrap(),
                "--version",
                "2024-01",
            ])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("version not found"));
    }

    #[test]
    fn bad_definition_fails_with_code_2() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(
            &dir,
            "versions.json",
            r#"{
                "versions": [
                    {
                        "name": "2025-06",
                        "extends": "2024-01",
                        "properties": []
                    }
                ]
            }"#,
        );

        cmd()
            .args(["compile", versions.to_str().unwrap()])
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("unknown version"));
    }

    #[test]
    fn missing_file_fails_with_code_3() {
        cmd()
            .args(["compile", "no-such-file.json"])
            .assert()
            .failure()
            .code(3)
            .stderr(predicate::str::contains("Error reading"));
    }
}

mod transform_command {
    use super::*;

    #[test]
    fn transforms_document_through_mapping() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let doc = write_temp_file(
            &dir,
            "doc.json",
            r#"{ "name": "Ada", "email": "ada@example.com" }"#,
        );

        cmd()
            .args(["transform", versions.to_str().unwrap(), doc.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                r#""contact":{"email":"ada@example.com"}"#,
            ));
    }

    #[test]
    fn validation_failure_exits_1() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let doc = write_temp_file(&dir, "doc.json", r#"{ "email": "ada@example.com" }"#);

        cmd()
            .args([
                "transform",
                versions.to_str().unwrap(),
                doc.to_str().unwrap(),
                "--validate",
            ])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Validation failed"));
    }

    #[test]
    fn reverse_applies_inverse_mapping() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let doc = write_temp_file(
            &dir,
            "doc.json",
            r#"{ "name": "Ada", "contact": { "email": "ada@example.com" } }"#,
        );

        cmd()
            .args([
                "transform",
                versions.to_str().unwrap(),
                doc.to_str().unwrap(),
                "--reverse",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""email":"ada@example.com""#))
            .stdout(predicate::str::contains("contact").not());
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_document_reports_valid() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let doc = write_temp_file(&dir, "doc.json", r#"{ "name": "Ada" }"#);

        cmd()
            .args([
                "validate",
                versions.to_str().unwrap(),
                doc.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn invalid_document_exits_1_with_json_errors() {
        let dir = TempDir::new().unwrap();
        let versions = write_temp_file(&dir, "versions.json", VERSIONS);
        let doc = write_temp_file(&dir, "doc.json", r#"{ "name": 7 }"#);

        cmd()
            .args([
                "validate",
                versions.to_str().unwrap(),
                doc.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains(r#""pointer":"/name""#));
    }
}
