use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

const BASE: &str = "https://data.cms.gov/provider-data/sites/default/files";

fn command() -> Command {
    let mut cmd = Command::cargo_bin("cms-ingest").expect("Binary exists");
    cmd.env_clear();
    cmd
}

#[test]
fn catalog_command_prints_builtin_catalog() {
    command()
        .arg("catalog")
        .env("BASE_URL", BASE)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("hospice-care")
                .and(predicate::str::contains("supplier-directory"))
                .and(predicate::str::contains(format!(
                    "{BASE}/archive/Hospitals/current/hospitals_current_data.zip"
                ))),
        );
}

#[test]
fn catalog_command_reads_yaml_file() {
    let config = NamedTempFile::new().expect("Creating temp catalog file failed");
    write(
        config.path(),
        b"categories:\n  - name: only-one\n    locators:\n      - data/one.zip\n",
    )
    .expect("Writing temp catalog failed");

    command()
        .arg("catalog")
        .arg("--catalog")
        .arg(config.path())
        .env("BASE_URL", "https://example.org/files")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("only-one")
                .and(predicate::str::contains("https://example.org/files/data/one.zip"))
                .and(predicate::str::contains("hospice-care").not()),
        );
}

#[test]
fn catalog_command_fails_without_base_url() {
    command()
        .arg("catalog")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BASE_URL"));
}

#[test]
fn run_fails_before_any_transfer_when_configuration_is_missing() {
    command()
        .arg("run")
        .env("BASE_URL", BASE)
        .env("S3_BUCKET_NAME", "cms-provider-data")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OUTPUT_FOLDER").or(predicate::str::contains("TO_EMAILS_LIST")));
}

#[test]
fn invalid_error_policy_in_environment_is_fatal() {
    command()
        .arg("run")
        .env("BASE_URL", BASE)
        .env("TO_EMAILS_LIST", "a@example.org")
        .env("ERROR_POLICY", "sometimes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR_POLICY"));
}

#[test]
fn error_policy_flag_overrides_invalid_environment_value() {
    command()
        .arg("run")
        .arg("--error-policy")
        .arg("accumulate")
        .env("BASE_URL", BASE)
        .env("TO_EMAILS_LIST", "a@example.org")
        .env("ERROR_POLICY", "sometimes")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("S3_BUCKET_NAME")
                .and(predicate::str::contains("ERROR_POLICY").not()),
        );
}

#[test]
fn run_rejects_unknown_error_policy() {
    command()
        .arg("run")
        .arg("--error-policy")
        .arg("first-wins")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error policy"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::Context, Layer, Registry};
use tracing_subscriber::prelude::*;

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use cms_ingest::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Catalog {
            catalog: Some(std::path::PathBuf::from("does-not-exist.yaml")),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
