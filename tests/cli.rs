use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::cargo_bin("lynn").expect("binary exists");
    cmd.env("NO_COLOR", "1").env_remove("LYNN_LOG");
    cmd
}

#[test]
fn displays_help() {
    let mut cmd = cargo_bin();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Run declarative HTTP requests"));
}

#[test]
fn displays_version() {
    let mut cmd = cargo_bin();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn errors_when_request_missing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path())
        .arg("--working-folder")
        .arg(temp.path())
        .arg("request")
        .arg("missing");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Request missing not found"));
}

#[test]
fn executes_a_request_and_saves_the_response() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/pets/7")
            .header("x-trace", "cli");
        then.status(200)
            .header("content-type", "application/json")
            .body("{\"id\":7}");
    });

    temp.child("environment/local.json")
        .write_str(&format!(
            r#"{{"HOST": "{}", "PORT": {}, "PROTOCOL": "http:", "petId": 7}}"#,
            server.host(),
            server.port()
        ))
        .unwrap();
    temp.child("requests/pets.yaml")
        .write_str(
            r#"
servers:
  - url: https://petstore.example.com
paths:
  /pets/{petId}:
    get:
      operationId: showPet
      parameters:
        - name: X-Trace
          in: header
          schema:
            default: cli
"#,
        )
        .unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path())
        .arg("--working-folder")
        .arg(temp.path())
        .arg("--env")
        .arg("local")
        .arg("--auto-save")
        .arg("request")
        .arg("showPet");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("showPet [200]"));

    mock.assert();
    temp.child("log/showPet").assert(predicate::path::is_dir());
}

#[test]
fn lists_requests() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("requests/login.json")
        .write_str(r#"{"requestId": "login", "summary": "Log in"}"#)
        .unwrap();

    let mut cmd = cargo_bin();
    cmd.arg("--working-folder").arg(temp.path()).arg("requests");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("login - Log in"));
}

#[test]
fn shell_reads_commands_from_stdin() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = assert_cmd::Command::from_std(cargo_bin());
    cmd.arg("--working-folder")
        .arg(temp.path())
        .write_stdin("set greeting hello\nenvironment\nquit\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("greeting: hello"));
}
