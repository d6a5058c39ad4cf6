//! Outbound email for sign-in codes.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

pub type MailError = Box<dyn std::error::Error + Send + Sync>;

/// Send a one-time sign-in code.
pub async fn send_magic_code(
    smtp_config: &SmtpConfig,
    to_email: &str,
    code: &str,
    ttl_minutes: i64,
) -> Result<(), MailError> {
    let email = Message::builder()
        .from(format!("{} <{}>", smtp_config.from_name, smtp_config.from_email).parse()?)
        .to(to_email.parse()?)
        .subject(format!("Your ProPhone sign-in code: {}", code))
        .header(ContentType::TEXT_HTML)
        .body(format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Sign-in code</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2563eb;">ProPhone sign-in</h2>
    <p>Use this code to finish signing in:</p>
    <p style="text-align: center; margin: 30px 0; font-size: 32px; letter-spacing: 8px; font-weight: bold;">{}</p>
    <p style="margin-top: 30px; color: #666; font-size: 14px;">This code expires in {} minutes.</p>
    <p style="color: #666; font-size: 14px;">If you didn't try to sign in, you can safely ignore this email.</p>
</body>
</html>"#,
            code, ttl_minutes
        ))?;

    if smtp_config.use_sendmail {
        let mailer = AsyncSendmailTransport::<Tokio1Executor>::new();
        mailer.send(email).await?;
        return Ok(());
    }

    let creds = Credentials::new(
        smtp_config.username.clone(),
        smtp_config.password.clone(),
    );

    let mailer: AsyncSmtpTransport<Tokio1Executor> = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_config.host)?
        .credentials(creds)
        .port(smtp_config.port)
        .build();

    mailer.send(email).await?;
    Ok(())
}
