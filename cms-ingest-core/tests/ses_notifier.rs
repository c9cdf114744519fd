use aws_sdk_sesv2::config::retry::RetryConfig;
use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sesv2::Client;
use cms_ingest_core::contract::{NotificationError, Notifier};
use cms_ingest_core::notify::SesNotifier;
use cms_ingest_core::result::{ErrorPolicy, RunResult};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_EMAIL_PATH: &str = "/v2/email/outbound-emails";
const TITLE: &str = "Weekly CMS Provider Data Download Results";

fn ses_client(server: &MockServer) -> Client {
    let config = aws_sdk_sesv2::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test-key", "test-secret", None, None, "test"))
        .endpoint_url(server.uri())
        .retry_config(RetryConfig::disabled())
        .build();
    Client::from_conf(config)
}

fn run_result() -> RunResult {
    let mut result = RunResult::new("cms-provider-data");
    result.start_category("hospice-care");
    result.record_upload("hospice-care", "hospice_care_current_data.zip");
    result.record_error(
        "hospital-data",
        "https://example.org/h.zip: request returned HTTP 500",
        ErrorPolicy::LastWins,
    );
    result
}

fn recipients() -> Vec<String> {
    vec!["a@example.org".to_string(), "b@example.org".to_string()]
}

#[tokio::test]
async fn test_send_email_request_carries_recipients_configuration_set_and_charset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_EMAIL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"MessageId":"msg-123"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let notifier = SesNotifier::new(ses_client(&server), "cms-reports");
    let receipt = notifier
        .notify("reports@example.org", &recipients(), TITLE, &run_result())
        .await
        .expect("report should be sent");
    assert_eq!(receipt.message_id, "msg-123");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).expect("JSON request body");

    assert_eq!(body["FromEmailAddress"], "reports@example.org");
    assert_eq!(body["ConfigurationSetName"], "cms-reports");
    assert_eq!(
        body["Destination"]["ToAddresses"],
        serde_json::json!(["a@example.org", "b@example.org"])
    );

    let simple = &body["Content"]["Simple"];
    assert_eq!(simple["Subject"]["Data"], TITLE);
    assert_eq!(simple["Subject"]["Charset"], "UTF-8");
    assert_eq!(simple["Body"]["Html"]["Charset"], "UTF-8");
    let html = simple["Body"]["Html"]["Data"].as_str().expect("html body");
    assert!(html.contains("<h2>AWS CMS PROVIDER: Weekly CMS Provider Data Download Results</h2>"));
    assert!(html.contains("hospice_care_current_data.zip"));
    assert!(html.contains("<p><b>hospital-data</b>: https://example.org/h.zip: request returned HTTP 500</p>"));
}

#[tokio::test]
async fn test_rejected_send_is_a_send_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_EMAIL_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("content-type", "application/json")
                .insert_header("x-amzn-ErrorType", "MessageRejected")
                .set_body_string(r#"{"message":"Email address is not verified."}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let notifier = SesNotifier::new(ses_client(&server), "cms-reports");
    let err = notifier
        .notify("reports@example.org", &recipients(), TITLE, &run_result())
        .await
        .unwrap_err();

    assert!(matches!(err, NotificationError::Send(_)), "got {err:?}");
}
