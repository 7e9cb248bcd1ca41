use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// --- Environment helpers ---

fn smtp_host() -> Result<String, String> {
    std::env::var("SMTP_HOST").map_err(|_| "SMTP_HOST is not configured".to_string())
}

fn smtp_port() -> u16 {
    std::env::var("SMTP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(587)
}

fn smtp_credentials() -> Option<Credentials> {
    let user = std::env::var("SMTP_USER").ok()?;
    let pass = std::env::var("SMTP_PASS").ok()?;
    Some(Credentials::new(user, pass))
}

fn smtp_from() -> Result<String, String> {
    match std::env::var("SMTP_FROM") {
        Ok(v) => Ok(v),
        Err(_) => Ok(format!("Alerts <alerts@{}>", smtp_host()?)),
    }
}

fn smtp_secure() -> bool {
    std::env::var("SMTP_SECURE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn build_transport() -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    let host = smtp_host()?;
    let mut builder = if smtp_secure() {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| format!("SMTP relay setup failed: {e}"))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
    };
    builder = builder.port(smtp_port());
    if let Some(credentials) = smtp_credentials() {
        builder = builder.credentials(credentials);
    }
    Ok(builder.build())
}

// --- Core email sending ---

#[tracing::instrument(skip(html_body))]
pub async fn send_email(to: &str, subject: &str, html_body: &str) -> Result<(), String> {
    let message = Message::builder()
        .from(
            smtp_from()?
                .parse()
                .map_err(|e| format!("Invalid SMTP_FROM address: {e}"))?,
        )
        .to(to
            .parse()
            .map_err(|e| format!("Invalid recipient address: {e}"))?)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| format!("Failed to build email: {e}"))?;

    build_transport()?
        .send(message)
        .await
        .map_err(|e| format!("SMTP send failed: {e}"))?;

    tracing::info!(to = to, subject = subject, "Email sent successfully");
    Ok(())
}

// --- Higher-level helpers ---

pub async fn send_alert_email(
    to: &str,
    rule_name: &str,
    log_count: i64,
    threshold: i64,
    time_window: i32,
) {
    let html = templates::alert_html(rule_name, log_count, threshold, time_window);
    let subject = format!("Alert triggered: {rule_name}");
    if let Err(e) = send_email(to, &subject, &html).await {
        tracing::error!(error = %e, to = to, "Failed to send alert email");
    }
}

pub async fn send_detection_email(to: &str, rule_title: &str, rule_level: &str, match_count: usize) {
    let html = templates::detection_html(rule_title, rule_level, match_count);
    let subject = format!("Detection: {rule_title}");
    if let Err(e) = send_email(to, &subject, &html).await {
        tracing::error!(error = %e, to = to, "Failed to send detection email");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_template_contains_rule_and_counts() {
        let html = templates::alert_html("High error rate", 25, 10, 5);
        assert!(html.contains("High error rate"));
        assert!(html.contains("25"));
        assert!(html.contains("10"));
        assert!(html.contains("5 minutes"));
    }

    #[test]
    fn detection_template_contains_rule_info() {
        let html = templates::detection_html("Suspicious login", "high", 3);
        assert!(html.contains("Suspicious login"));
        assert!(html.contains("high"));
        assert!(html.contains("3"));
    }
}

// --- Email templates ---

mod templates {
    pub fn alert_html(rule_name: &str, log_count: i64, threshold: i64, time_window: i32) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; color: #1a1a1a; padding: 20px;">
  <div style="max-width: 600px; margin: 0 auto; border: 1px solid #ddd; padding: 30px;">
    <h1 style="color: #c0392b;">Alert triggered: {rule_name}</h1>
    <p>{log_count} matching logs in the last {time_window} minutes (threshold: {threshold}).</p>
    <p style="color: #888;">Open the dashboard for details.</p>
  </div>
</body>
</html>"#,
        )
    }

    pub fn detection_html(rule_title: &str, rule_level: &str, match_count: usize) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; color: #1a1a1a; padding: 20px;">
  <div style="max-width: 600px; margin: 0 auto; border: 1px solid #ddd; padding: 30px;">
    <h1 style="color: #c0392b;">Detection: {rule_title}</h1>
    <p>Severity: <strong>{rule_level}</strong></p>
    <p>{match_count} matching events in the latest batch.</p>
  </div>
</body>
</html>"#,
        )
    }
}
