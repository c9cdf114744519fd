//! Run report rendering and the SES implementation of [`Notifier`].

use async_trait::async_trait;
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client;
use tracing::{error, info};

use crate::contract::{DeliveryReceipt, NotificationError, Notifier};
use crate::result::RunResult;

const CHARSET: &str = "UTF-8";
const S3_CONSOLE_BUCKETS: &str = "https://s3.console.aws.amazon.com/s3/buckets";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// One paragraph per category with its comma-joined uploads, in catalog order.
pub fn render_category_lines(run_result: &RunResult) -> Vec<String> {
    run_result
        .per_category_uploads
        .iter()
        .map(|(category, files)| {
            format!(
                "<p>Downloaded files for \"<b>{}</b>\" category were: [<b>{}</b>]</p>",
                escape_html(category),
                escape_html(&files.join(","))
            )
        })
        .collect()
}

/// Errors section, or `None` when the run had no failures.
pub fn render_error_section(run_result: &RunResult) -> Option<String> {
    if !run_result.has_errors() {
        return None;
    }
    let items: String = run_result
        .per_category_errors
        .iter()
        .map(|(category, message)| {
            format!(
                "<p><b>{}</b>: {}</p>",
                escape_html(category),
                escape_html(message)
            )
        })
        .collect();
    Some(format!(
        "<br><p><b>Errors on execution were:</b></p>{items}"
    ))
}

/// Full HTML body of the run report.
pub fn render_report(report_title: &str, run_result: &RunResult) -> String {
    let bucket = escape_html(&run_result.destination_bucket);
    let mut html = String::new();
    html.push_str("<html>\n<head></head>\n<body>\n");
    html.push_str(&format!(
        "<h2>AWS CMS PROVIDER: {}</h2>\n",
        escape_html(report_title)
    ));
    html.push_str(&format!(
        "<p>The weekly CMS Provider execution finished. Files were uploaded to the S3 bucket \
         <b><a href=\"{S3_CONSOLE_BUCKETS}/{bucket}\">{bucket}</a></b>:</p>\n"
    ));
    for line in render_category_lines(run_result) {
        html.push_str(&line);
        html.push('\n');
    }
    if let Some(errors) = render_error_section(run_result) {
        html.push_str(&errors);
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Sends the report through the Amazon SES v2 `SendEmail` API.
pub struct SesNotifier {
    client: Client,
    configuration_set: String,
}

impl SesNotifier {
    pub fn new(client: Client, configuration_set: impl Into<String>) -> Self {
        Self {
            client,
            configuration_set: configuration_set.into(),
        }
    }

    fn content(data: impl Into<String>) -> Result<Content, NotificationError> {
        Content::builder()
            .data(data)
            .charset(CHARSET)
            .build()
            .map_err(|e| NotificationError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn notify(
        &self,
        sender: &str,
        recipients: &[String],
        report_title: &str,
        run_result: &RunResult,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let html = render_report(report_title, run_result);
        let message = Message::builder()
            .subject(Self::content(report_title)?)
            .body(Body::builder().html(Self::content(html)?).build())
            .build();
        let content = EmailContent::builder().simple(message).build();
        let destination = Destination::builder()
            .set_to_addresses(Some(recipients.to_vec()))
            .build();

        info!(
            sender,
            recipients = recipients.len(),
            configuration_set = %self.configuration_set,
            "Sending run report"
        );
        let output = self
            .client
            .send_email()
            .from_email_address(sender)
            .destination(destination)
            .content(content)
            .configuration_set_name(&self.configuration_set)
            .send()
            .await
            .map_err(|e| {
                error!(error = %DisplayErrorContext(&e), "SES rejected the run report");
                NotificationError::Send(DisplayErrorContext(&e).to_string())
            })?;

        let receipt = DeliveryReceipt {
            message_id: output.message_id().unwrap_or_default().to_string(),
        };
        info!(message_id = %receipt.message_id, "Run report sent");
        Ok(receipt)
    }
}
