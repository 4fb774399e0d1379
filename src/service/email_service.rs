//! Email Service
//!
//! Sends provisional credentials to newly created accounts. Delivery is best
//! effort: the account already exists when the mail goes out, so a failure is
//! reported back as a flag instead of an error.

use std::sync::Arc;

use anyhow::Result;
use chrono::Datelike;
use lettre::{
    message::{header, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, error, info, warn};
use tera::{Context, Tera};

use crate::config::env;
use crate::utils::error::{AppError, AppResult};

/// Port on which SMTP servers expect implicit TLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// Email service configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: String,
    /// From email address
    pub from_email: String,
    /// From name (display name)
    pub from_name: String,
    /// Login page linked from the mail body
    pub login_url: String,
}

impl EmailConfig {
    /// Create email configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            smtp_host: env::get_optional("MAIL_SERVER")
                .ok_or_else(|| anyhow::anyhow!("MAIL_SERVER environment variable is required"))?,
            smtp_port: env::get_u16("MAIL_PORT", 587),
            smtp_username: env::get_optional("MAIL_USERNAME")
                .ok_or_else(|| anyhow::anyhow!("MAIL_USERNAME environment variable is required"))?,
            smtp_password: env::get_optional("MAIL_PASSWORD")
                .ok_or_else(|| anyhow::anyhow!("MAIL_PASSWORD environment variable is required"))?,
            from_email: env::get_optional("MAIL_DEFAULT_SENDER").ok_or_else(|| {
                anyhow::anyhow!("MAIL_DEFAULT_SENDER environment variable is required")
            })?,
            from_name: env::get_string("MAIL_SENDER_NAME", "Sistema Académico UNFV"),
            login_url: env::get_string("APP_LOGIN_URL", "http://localhost:5173/login"),
        })
    }

    /// Mail is optional: without `MAIL_SERVER` the notifier stays disabled
    pub fn from_env_optional() -> Result<Option<Self>> {
        if !env::is_set("MAIL_SERVER") {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }
}

/// What a credential mail tells its recipient
#[derive(Debug, Clone)]
pub struct CredentialNotice {
    /// Mailbox the message is delivered to
    pub recipient: String,
    pub full_name: String,
    /// Address the account logs in with
    pub login_email: String,
    pub temporary_password: String,
    pub role_label: String,
}

/// Email service for account credential notifications
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    templates: Tera,
    config: EmailConfig,
}

impl EmailService {
    /// Create a new email service
    pub fn new(config: EmailConfig) -> AppResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let relay = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        };
        let builder = relay.map_err(|e| AppError::Configuration(format!("Failed to configure SMTP relay: {}", e)))?;

        let transport = builder.port(config.smtp_port).credentials(creds).build();

        let mut templates = Tera::default();
        Self::add_embedded_templates(&mut templates)?;
        debug!("Credential mail templates loaded");

        Ok(Self {
            transport,
            templates,
            config,
        })
    }

    /// Add embedded email templates
    fn add_embedded_templates(tera: &mut Tera) -> AppResult<()> {
        let credentials_html = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Credenciales de acceso</title>
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }
        .header { text-align: center; background: #003366; color: white; padding: 20px; border-radius: 8px 8px 0 0; }
        .content { background: white; padding: 30px; border: 1px solid #dee2e6; }
        .credentials { background: #f8f9fa; border-left: 4px solid #003366; padding: 15px; margin: 20px 0; }
        .credentials p { margin: 6px 0; }
        .button { display: inline-block; padding: 12px 24px; background: #003366; color: white; text-decoration: none; border-radius: 4px; margin: 20px 0; }
        .footer { background: #f8f9fa; padding: 20px; border-radius: 0 0 8px 8px; text-align: center; font-size: 12px; color: #666; }
    </style>
</head>
<body>
    <div class="header">
        <h1>Bienvenido(a) a {{ app_name }}</h1>
    </div>
    <div class="content">
        <p>Hola {{ full_name }},</p>

        <p>Se ha creado tu cuenta con el rol <strong>{{ role_label }}</strong>. Estas son tus credenciales de acceso:</p>

        <div class="credentials">
            <p><strong>Usuario:</strong> {{ login_email }}</p>
            <p><strong>Contraseña temporal:</strong> {{ temporary_password }}</p>
        </div>

        <p>Por seguridad, cambia tu contraseña después de iniciar sesión por primera vez.</p>

        <p style="text-align: center;"><a class="button" href="{{ login_url }}">Iniciar sesión</a></p>
    </div>
    <div class="footer">
        <p>Este es un mensaje automático, por favor no respondas a este correo.</p>
        <p>© {{ current_year }} {{ app_name }}</p>
    </div>
</body>
</html>
        "#;

        let credentials_text = r#"
Bienvenido(a) a {{ app_name }}

Hola {{ full_name }},

Se ha creado tu cuenta con el rol {{ role_label }}. Estas son tus credenciales de acceso:

Usuario: {{ login_email }}
Contraseña temporal: {{ temporary_password }}

Por seguridad, cambia tu contraseña después de iniciar sesión por primera vez.

Iniciar sesión: {{ login_url }}

---
Este es un mensaje automático, por favor no respondas a este correo.
© {{ current_year }} {{ app_name }}
        "#;

        tera.add_raw_template("credentials.html", credentials_html)
            .map_err(|e| AppError::Configuration(format!("Failed to add HTML template: {}", e)))?;

        tera.add_raw_template("credentials.txt", credentials_text)
            .map_err(|e| AppError::Configuration(format!("Failed to add text template: {}", e)))?;

        Ok(())
    }

    /// Render the HTML and plain-text bodies of a credential mail
    pub fn render_credentials(&self, notice: &CredentialNotice) -> AppResult<(String, String)> {
        let mut context = Context::new();
        context.insert("full_name", &notice.full_name);
        context.insert("login_email", &notice.login_email);
        context.insert("temporary_password", &notice.temporary_password);
        context.insert("role_label", &notice.role_label);
        context.insert("login_url", &self.config.login_url);
        context.insert("app_name", &self.config.from_name);
        context.insert("current_year", &chrono::Utc::now().year());

        let html_body = self
            .templates
            .render("credentials.html", &context)
            .map_err(|e| AppError::Internal(format!("Failed to render HTML template: {}", e)))?;

        let text_body = self
            .templates
            .render("credentials.txt", &context)
            .map_err(|e| AppError::Internal(format!("Failed to render text template: {}", e)))?;

        Ok((html_body, text_body))
    }

    /// Send the credential mail
    pub async fn send_credentials(&self, notice: &CredentialNotice) -> AppResult<()> {
        info!("Sending credentials email to: {}", notice.recipient);

        let (html_body, text_body) = self.render_credentials(notice)?;

        let message = Message::builder()
            .from(
                format!("{} <{}>", self.config.from_name, self.config.from_email)
                    .parse()
                    .map_err(|e| AppError::Configuration(format!("Invalid from address: {}", e)))?,
            )
            .to(notice
                .recipient
                .parse()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient email: {}", e)))?)
            .subject("Credenciales de acceso al sistema académico")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email message: {}", e)))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Credentials email sent successfully to: {}", notice.recipient);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send credentials email to {}: {}", notice.recipient, e);
                Err(AppError::ExternalService(format!("Failed to send email: {}", e)))
            }
        }
    }
}

/// Deliver a credential mail if a notifier is configured.
///
/// Returns whether the mail was handed to the SMTP server; never fails.
pub async fn deliver_credentials(
    email_service: Option<&Arc<EmailService>>,
    notice: &CredentialNotice,
) -> bool {
    match email_service {
        Some(service) => match service.send_credentials(notice).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Account {} created but credentials were not delivered: {}",
                    notice.login_email, e
                );
                false
            }
        },
        None => {
            warn!(
                "Mail is not configured; credentials for {} were not sent",
                notice.login_email
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer@example.com".to_string(),
            smtp_password: "password".to_string(),
            from_email: "noreply@unfv.edu.pe".to_string(),
            from_name: "Sistema Académico".to_string(),
            login_url: "http://localhost:5173/login".to_string(),
        }
    }

    fn notice() -> CredentialNotice {
        CredentialNotice {
            recipient: "ana@gmail.com".to_string(),
            full_name: "Ana Pérez".to_string(),
            login_email: "2024001@alumnounfv.edu.pe".to_string(),
            temporary_password: "4567".to_string(),
            role_label: "Alumno".to_string(),
        }
    }

    #[tokio::test]
    async fn test_template_rendering() {
        let service = EmailService::new(test_config()).unwrap();
        assert!(service
            .templates
            .get_template_names()
            .any(|name| name == "credentials.html"));

        let (html, text) = service.render_credentials(&notice()).unwrap();
        assert!(html.contains("2024001@alumnounfv.edu.pe"));
        assert!(html.contains("4567"));
        assert!(text.contains("Contraseña temporal: 4567"));
        assert!(text.contains("Alumno"));
    }

    #[tokio::test]
    async fn test_missing_notifier_reports_not_sent() {
        assert!(!deliver_credentials(None, &notice()).await);
    }
}
