// End-to-end pull over a config file with several targets

use connector_manager::{collect, JsonLinesSink, ServiceContext};
use mockito::{Matcher, Server};
use std::io::Write;
use std::sync::Arc;
use tasksync::config::load_config;
use tasksync::credentials::{CredentialResolver, MemorySecretStore};
use tempfile::NamedTempFile;

const GERRIT_CHANGES: &str = ")]}'\n[{\"project\":\"core\",\"branch\":\"main\",\"topic\":\"parser\",\"_number\":7,\"subject\":\"Fix parser\",\"status\":\"NEW\",\"messages\":[{\"author\":{\"username\":\"bob\"},\"message\":\"Patch Set 1:\\n\\nLooks good\",\"_revision_number\":1}]}]";

const REDMINE_ISSUES: &str = r#"{"issues": [{
    "id": 42, "subject": "Fix",
    "tracker": {"id": 1, "name": "Bug"},
    "status": {"id": 1, "name": "Open"},
    "author": {"id": 3, "name": "Al"},
    "project": {"id": 7, "name": "My Proj!"},
    "priority": {"id": 4, "name": "High"},
    "estimated_hours": 0.0
}]}"#;

fn write_config(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_pull_all_targets_to_json_lines() {
    let mut server = Server::new_async().await;
    let _probe = server
        .mock("HEAD", "/gerrit/a/")
        .with_status(401)
        .with_header("www-authenticate", "Basic realm=\"Gerrit Code Review\"")
        .create_async()
        .await;
    let _changes = server
        .mock("GET", Matcher::Regex("^/gerrit/a/changes/".into()))
        .with_body(GERRIT_CHANGES)
        .create_async()
        .await;
    let _issues = server
        .mock("GET", "/redmine/issues.json")
        .match_query(Matcher::Any)
        .with_body(REDMINE_ISSUES)
        .create_async()
        .await;

    let file = write_config(&format!(
        r#"
        [general]
        targets = ["review", "bugs", "missing"]
        annotation_length = 0

        [review]
        service = "gerrit"
        base_uri = "{url}/gerrit"
        username = "alice"
        password = "@oracle:use_keyring"
        add_tags = ["review"]

        [bugs]
        service = "redmine"
        url = "{url}/redmine"
        key = "abc"
        default_priority = "L"

        [missing]
        service = "redmine"
        key = "abc"
        "#,
        url = server.url()
    ));
    let config = load_config(file.path()).unwrap();

    let store = MemorySecretStore::new();
    store.insert(&format!("gerrit://{}/gerrit", server.url()), "alice", "secret");
    let ctx = ServiceContext {
        general: config.general.clone(),
        credentials: CredentialResolver::new(Arc::new(store), false),
    };

    let mut sink = JsonLinesSink::new(Vec::new());
    let report = collect(&config, &ctx, &mut sink).await;
    assert_eq!(report.records, 2);
    assert_eq!(report.failed_targets, vec!["missing".to_string()]);

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let records: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);

    let review = &records[0];
    assert_eq!(review["target"], "review");
    assert_eq!(review["record"]["project"], "core");
    assert_eq!(review["record"]["gerritid"], 7);
    assert_eq!(review["record"]["gerrittopic"], "parser");
    assert_eq!(review["record"]["tags"], serde_json::json!(["review"]));
    assert_eq!(
        review["record"]["annotations"],
        serde_json::json!(["@bob - Looks good"])
    );
    assert!(review["description"]
        .as_str()
        .unwrap()
        .starts_with("(bw)PR#7 - Fix parser .. "));

    let bugs = &records[1];
    assert_eq!(bugs["target"], "bugs");
    assert_eq!(bugs["record"]["project"], "myproj");
    assert_eq!(bugs["record"]["priority"], "H");
    assert_eq!(bugs["record"]["redmineestimatedhours"], "PT0S");
    assert_eq!(bugs["record"]["redminecategory"], serde_json::Value::Null);
}
