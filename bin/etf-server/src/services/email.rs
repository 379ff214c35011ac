//! Outbound e-mail through the SendGrid v3 REST API.
//!
//! Bodies are rendered from the HTML templates under `templates/`, which are
//! compiled into the binary.

use std::time::Duration;

use minijinja::{context, Environment};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    (
        "investment_reminder.html",
        include_str!("templates/investment_reminder.html"),
    ),
    (
        "portfolio_analysis.html",
        include_str!("templates/portfolio_analysis.html"),
    ),
    ("system.html", include_str!("templates/system.html")),
];

#[derive(Debug, Error)]
pub enum MailError {
    #[error("e-mail delivery is not configured")]
    Disabled,

    #[error("template rendering failed: {0}")]
    Render(#[from] minijinja::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SendGrid returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// One ETF line in reminder and analysis mails.
#[derive(Debug, Clone, Serialize)]
pub struct EtfLine {
    pub symbol: String,
    pub name: String,
    pub amount: f64,
}

pub struct Mailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from_email: String,
    from_name: String,
    templates: Environment<'static>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("enabled", &self.is_enabled())
            .field("from_email", &self.from_email)
            .finish()
    }
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let mut templates = Environment::new();
        for &(name, source) in TEMPLATES {
            templates.add_template(name, source)?;
        }
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        if config.sendgrid_api_key.is_none() {
            warn!("SENDGRID_API_KEY is not set; e-mail notifications are disabled");
        }
        Ok(Self {
            client,
            api_key: config.sendgrid_api_key.clone(),
            from_email: config.sendgrid_from_email.clone(),
            from_name: config.sendgrid_from_name.clone(),
            templates,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    fn render(&self, template: &str, ctx: minijinja::Value) -> Result<String, MailError> {
        Ok(self.templates.get_template(template)?.render(ctx)?)
    }

    /// Deliver one HTML mail. 200, 201 and 202 count as success.
    pub async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), MailError> {
        let Some(api_key) = &self.api_key else {
            return Err(MailError::Disabled);
        };

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }], "subject": subject }],
            "from": { "email": self.from_email, "name": self.from_name },
            "content": [{ "type": "text/html", "value": html }],
        });

        let resp = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if matches!(status, 200 | 201 | 202) {
            info!(to = %to, subject = %subject, "e-mail sent");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(MailError::Status { status, body })
        }
    }

    pub fn render_investment_reminder(
        &self,
        user_name: &str,
        etfs: &[EtfLine],
        total_amount: f64,
    ) -> Result<String, MailError> {
        self.render(
            "investment_reminder.html",
            context! { user_name, etfs, total_amount },
        )
    }

    pub fn render_portfolio_analysis(
        &self,
        user_name: &str,
        etfs: &[EtfLine],
        total_amount: f64,
        analysis: &str,
        recommendation: &str,
        confidence: f64,
    ) -> Result<String, MailError> {
        let confidence_percent = (confidence * 100.0).round() as i64;
        self.render(
            "portfolio_analysis.html",
            context! { user_name, etfs, total_amount, analysis, recommendation, confidence_percent },
        )
    }

    pub fn render_system(
        &self,
        user_name: &str,
        title: &str,
        content: &str,
    ) -> Result<String, MailError> {
        self.render("system.html", context! { user_name, title, content })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(&Config::for_tests()).unwrap()
    }

    #[test]
    fn disabled_without_api_key() {
        assert!(!mailer().is_enabled());
    }

    #[tokio::test]
    async fn send_refuses_when_disabled() {
        let err = mailer()
            .send("a@example.com", "s", "<p>x</p>".into())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Disabled));
    }

    #[test]
    fn reminder_lists_every_etf() {
        let etfs = vec![
            EtfLine { symbol: "SPY".into(), name: "미국 S&P500".into(), amount: 10.0 },
            EtfLine { symbol: "EWY".into(), name: "한국".into(), amount: 5.0 },
        ];
        let html = mailer().render_investment_reminder("홍길동", &etfs, 15.0).unwrap();
        assert!(html.contains("안녕하세요, 홍길동님!"));
        assert!(html.contains("SPY"));
        assert!(html.contains("EWY"));
        assert!(html.contains("총 투자 금액: 15"));
    }

    #[test]
    fn analysis_shows_confidence_percent() {
        let html = mailer()
            .render_portfolio_analysis("kim", &[], 0.0, "본문", "유지", 0.8)
            .unwrap();
        assert!(html.contains("신뢰도: 80"));
        assert!(html.contains("본문"));
    }

    #[test]
    fn system_mail_escapes_html() {
        let html = mailer().render_system("kim", "공지", "<b>x</b>").unwrap();
        assert!(html.contains("공지"));
        assert!(!html.contains("<b>x</b>"));
    }
}
