use crate::task::Task;
use handlebars::Handlebars;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport, message::header::ContentType};
use rand::Rng;
use serde_json::json;
use std::env;
use std::error::Error;

/// HTML body of the daily reminder email
const REMINDER_TEMPLATE: &str = "\
<h1>Good Morning, {{name}}!</h1>
<p>Here is your plan for today (IST):</p>
<ul>
{{#each tasks}}  <li><strong>{{title}}</strong> ({{priority}})</li>
{{/each}}</ul>
<p><a href=\"{{dashboard_url}}\">Go to GoalGrid</a></p>
";

pub struct Mailer {
    smtp: SmtpTransport,
    from: String,
}

impl Mailer {
    /// Build the SMTP transport from the environment
    ///
    /// Reads `SMTP_HOST`, `SMTP_USER`, `SMTP_PASSWORD`, and optionally
    /// `SMTP_PORT` (465 when unset). The user doubles as the From address.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let host = env::var("SMTP_HOST")?;
        let user = env::var("SMTP_USER")?;
        let password = env::var("SMTP_PASSWORD")?;
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(465);

        let creds = Credentials::new(user.clone(), password);

        let tls_parameters = TlsParameters::new(host.clone())?;

        let smtp = SmtpTransport::relay(&host)?
            .credentials(creds)
            .port(port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(Mailer { smtp, from: user })
    }

    pub fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(format!("GoalGrid <{}>", self.from).parse()?)
            .to(to_email.parse()?)
            .subject("Password Reset Request")
            .body(format!(
                "Your password reset code is: {}\nThis code will expire in 1 hour.",
                reset_code
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }

    /// Send one daily reminder email
    pub fn send_reminder(
        &self,
        to_email: &str,
        subject: &str,
        html_body: String,
    ) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(format!("GoalGrid <{}>", self.from).parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)?;

        self.smtp.send(&email)?;
        Ok(())
    }
}

/// Subject line for a reminder covering `count` due tasks
pub fn reminder_subject(count: usize) -> String {
    format!("You have {} tasks due today!", count)
}

/// Render the reminder email body for a user's due tasks
pub fn render_reminder_html(display_name: &str, tasks: &[Task]) -> Result<String, String> {
    let mut handlebars = Handlebars::new();
    if handlebars
        .register_template_string("reminder", REMINDER_TEMPLATE)
        .is_err()
    {
        return Err("Failed to register reminder template".to_string());
    }

    let dashboard_url =
        env::var("GOALGRID_PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());

    let data = json!({
        "name": if display_name.is_empty() { "there" } else { display_name },
        "tasks": tasks
            .iter()
            .map(|t| json!({ "title": t.title, "priority": t.priority }))
            .collect::<Vec<_>>(),
        "dashboard_url": dashboard_url,
    });

    match handlebars.render("reminder", &data) {
        Ok(html) => Ok(html),
        Err(_) => Err("Failed to render reminder email".to_string()),
    }
}

pub fn generate_reset_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
