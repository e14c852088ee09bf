use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;

fn discovery_document(base_url: &str) -> String {
    r#"{
        "name": "issuetracker",
        "version": "v1",
        "baseUrl": "BASE/",
        "resources": {
            "issues": {
                "methods": {
                    "get": {
                        "id": "issuetracker.issues.get",
                        "path": "v1/issues/{+issueId}",
                        "httpMethod": "GET"
                    },
                    "list": {
                        "id": "issuetracker.issues.list",
                        "path": "v1/issues",
                        "httpMethod": "GET"
                    },
                    "modify": {
                        "id": "issuetracker.issues.modify",
                        "path": "v1/issues/{+issueId}:modify",
                        "httpMethod": "POST"
                    }
                }
            }
        }
    }"#
    .replace("BASE", base_url)
}

fn bugz_cmd(server_url: &str) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("bugz"));
    cmd.env_remove("BUGZ_DISCOVERY_URL");
    cmd.env("GOOGLE_OAUTH_ACCESS_TOKEN", "it-token");
    cmd.arg("--discovery-url")
        .arg(format!("{}/discovery", server_url));
    cmd
}

#[test]
fn test_get_end_to_end() {
    let mut server = Server::new();
    let url = server.url();

    let discovery = server
        .mock("GET", "/discovery")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(discovery_document(&url))
        .create();
    let issue = server
        .mock("GET", "/v1/issues/302703317")
        .match_header("authorization", "Bearer it-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "issueId": "302703317",
                "issueState": {"title": "Crash in parser", "status": "NEW"}
            })
            .to_string(),
        )
        .create();

    bugz_cmd(&url)
        .arg("get")
        .arg("302703317")
        .assert()
        .success()
        .stdout(predicate::str::contains("302703317"))
        .stdout(predicate::str::contains("Crash in parser"));

    discovery.assert();
    issue.assert();
}

#[test]
fn test_get_missing_issue_fails() {
    let mut server = Server::new();
    let url = server.url();

    let _discovery = server
        .mock("GET", "/discovery")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(discovery_document(&url))
        .create();
    let _issue = server
        .mock("GET", "/v1/issues/999")
        .with_status(404)
        .with_body("issue 999 does not exist")
        .create();

    bugz_cmd(&url)
        .arg("get")
        .arg("999")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Issue 999 not found"));
}

#[test]
fn test_comment_end_to_end() {
    let mut server = Server::new();
    let url = server.url();

    let _discovery = server
        .mock("GET", "/discovery")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(discovery_document(&url))
        .create();
    let modify = server
        .mock("POST", "/v1/issues/123:modify")
        .match_header("authorization", "Bearer it-token")
        .match_body(Matcher::Json(json!({
            "add": {},
            "addMask": "",
            "remove": {},
            "removeMask": "",
            "issueComment": {"comment": "test comment"},
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"issueId": "123"}"#)
        .create();

    bugz_cmd(&url)
        .arg("comment")
        .arg("123")
        .assert()
        .success()
        .stdout(predicate::str::contains("123"));

    modify.assert();
}

#[test]
fn test_search_end_to_end() {
    let mut server = Server::new();
    let url = server.url();

    let _discovery = server
        .mock("GET", "/discovery")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(discovery_document(&url))
        .create();
    let list = server
        .mock("GET", "/v1/issues")
        .match_query(Matcher::UrlEncoded(
            "query".into(),
            "\"crash\" status:open".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "issues": [
                    {"issueId": "42", "issueState": {"title": "Heap overflow", "status": "NEW"}}
                ]
            })
            .to_string(),
        )
        .create();

    bugz_cmd(&url)
        .arg("search")
        .arg("crash")
        .arg("--open")
        .assert()
        .success()
        .stdout(predicate::str::contains("issues/42"))
        .stdout(predicate::str::contains("Heap overflow"));

    list.assert();
}

#[test]
fn test_missing_credentials_is_an_explicit_error() {
    let mut cmd = Command::new(cargo::cargo_bin!("bugz"));
    cmd.env_remove("GOOGLE_OAUTH_ACCESS_TOKEN");
    cmd.env_remove("BUGZ_DISCOVERY_URL");
    // The metadata server does not resolve off GCE, so credential
    // resolution fails before any discovery request is made.
    cmd.arg("get")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "No application default credentials",
        ));
}
