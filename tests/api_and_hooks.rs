mod common;

use http::{HeaderMap, HeaderValue};
use integrated::hooks::HookTag;
use integrated::{run_test, Emulator, EmulatorError, Hook, HookRegistry, SqliteAdapter, TestCase};
use serde_json::json;

#[tokio::test]
async fn test_api_requests_skip_the_page_load_check() {
    let logs = tempfile::tempdir().unwrap();
    let (mut emulator, _) = common::emulator(logs.path());

    emulator
        .get("/api/users")
        .await
        .unwrap()
        .see_json()
        .unwrap()
        .see_status_code(200)
        .unwrap()
        .see_json_contains(json!({"name": "bob"}))
        .unwrap()
        .see_json_equals(json!([{"name": "alice", "id": 1}, {"id": 2, "name": "bob"}]))
        .unwrap();

    emulator
        .post("/api/users", json!({"name": "carol"}))
        .await
        .unwrap()
        .see_status_code_is(201)
        .unwrap()
        .see_json_contains(json!({"id": 3, "name": "carol"}))
        .unwrap();

    emulator.delete("/api/users/3").await.unwrap().see_status_code(204).unwrap();
    assert!(emulator.see_json().is_err());
}

#[tokio::test]
async fn test_extra_headers_reach_api_endpoints() {
    let logs = tempfile::tempdir().unwrap();
    let (mut emulator, _) = common::emulator(logs.path());

    emulator
        .get("/api/whoami")
        .await
        .unwrap()
        .see_json_equals(json!({"token": "anonymous"}))
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert("x-api-token", HeaderValue::from_static("t0ken"));
    emulator.with_headers(headers);

    emulator
        .get("/api/whoami")
        .await
        .unwrap()
        .see_json_equals(json!({"token": "t0ken"}))
        .unwrap();
    emulator
        .post("/api/whoami", json!({"name": "carol"}))
        .await
        .unwrap()
        .see_json_equals(json!({"token": "t0ken"}))
        .unwrap();

    emulator.with_headers(HeaderMap::new());
    emulator
        .get("/api/whoami")
        .await
        .unwrap()
        .see_json_equals(json!({"token": "anonymous"}))
        .unwrap();
}

#[tokio::test]
async fn test_json_mismatches_are_assertion_failures() {
    let logs = tempfile::tempdir().unwrap();
    let (mut emulator, _) = common::emulator(logs.path());

    emulator.hit("/api/users").await.unwrap();
    assert!(matches!(
        emulator.see_json_contains(json!({"name": "dave"})),
        Err(EmulatorError::AssertionFailure(_))
    ));
    assert!(matches!(
        emulator.see_status_code(404),
        Err(EmulatorError::AssertionFailure(_))
    ));
    assert!(matches!(
        emulator.see_json_contains(json!(["not", "an", "object"])),
        Err(EmulatorError::InvalidArguments { .. })
    ));
}

#[tokio::test]
async fn test_see_in_database_reads_the_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (name TEXT, email TEXT);
             INSERT INTO users VALUES ('alice', 'alice@example.com');",
        )
        .unwrap();
    }

    let config = integrated::Config::default().with_database(&path);
    let mut emulator = Emulator::crawler(config);

    emulator
        .see_in_database("users", json!({"name": "alice", "email": "alice@example.com"}))
        .unwrap()
        .verify_in_database("users", json!({"name": "alice"}))
        .unwrap();

    let missing = emulator.see_in_database("users", json!({"name": "bob"}));
    assert!(matches!(
        missing,
        Err(EmulatorError::AssertionFailure(msg)) if msg.contains("'users'")
    ));
}

#[tokio::test]
async fn test_injected_adapter_replaces_the_configured_one() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE posts (title TEXT); INSERT INTO posts VALUES ('Hello');")
        .unwrap();

    let mut emulator = Emulator::crawler(integrated::Config::default())
        .with_database(SqliteAdapter::from_connection(conn));
    emulator
        .see_in_database("posts", json!({"title": "Hello"}))
        .unwrap();
}

struct SignupTest {
    emulator: Emulator,
    journal: Vec<String>,
}

impl TestCase for SignupTest {
    fn emulator(&mut self) -> &mut Emulator {
        &mut self.emulator
    }

    fn hooks() -> Vec<Hook<Self>> {
        vec![
            Hook::setup("reset_journal", |case| {
                case.journal.clear();
                case.journal.push("setup".to_string());
                Ok(())
            }),
            Hook::teardown("record_teardown", |case| {
                let page = case
                    .emulator
                    .current_url()
                    .map(|url| url.path().to_string())
                    .unwrap_or_default();
                case.journal.push(format!("teardown at {}", page));
                Ok(())
            }),
        ]
    }
}

#[tokio::test]
async fn test_teardown_hooks_run_when_the_body_fails() {
    let logs = tempfile::tempdir().unwrap();
    let (emulator, _) = common::emulator(logs.path());
    let mut case = SignupTest {
        emulator,
        journal: vec!["stale".to_string()],
    };

    assert_eq!(
        HookRegistry::hooks_for::<SignupTest>(HookTag::Setup),
        vec!["reset_journal"]
    );

    let result = run_test(&mut case, |case| {
        Box::pin(async move {
            case.emulator().visit("/login").await?.see("Create account")?;
            Ok::<(), EmulatorError>(())
        })
    })
    .await;

    assert!(matches!(result, Err(EmulatorError::AssertionFailure(_))));
    assert_eq!(case.journal, vec!["setup", "teardown at /login"]);
    assert!(case.emulator().current_page().is_none());
}
