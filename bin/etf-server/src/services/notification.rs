//! Notification dispatch: stores the in-app row and mirrors it by e-mail
//! when the user opted in.

use std::sync::Arc;

use tracing::{info, warn};

use crate::entities::{
    NewNotification, NotificationChannel, NotificationRecord, NotificationStore, NotificationType,
    PortfolioEntry, SettingsRecord, SqliteStore, UserRecord,
};
use crate::services::analysis::{Assessment, ANALYSIS_HEADER, RECOMMENDATION_HEADER};
use crate::services::email::{EtfLine, MailError, Mailer};

/// Format an amount with thousands separators, e.g. `1,500,000`.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if amount < 0.0 && fixed != "0.00" {
        out.push('-');
    }
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if frac != "00" {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn etf_lines(entries: &[PortfolioEntry]) -> Vec<EtfLine> {
    entries
        .iter()
        .map(|e| EtfLine {
            symbol: e.etf.symbol.clone(),
            name: e.etf.name.clone(),
            amount: e.portfolio.monthly_investment,
        })
        .collect()
}

fn total(entries: &[PortfolioEntry]) -> f64 {
    entries.iter().map(|e| e.portfolio.monthly_investment).sum()
}

#[derive(Debug, Clone)]
pub struct Notifier {
    store: Arc<SqliteStore>,
    mailer: Arc<Mailer>,
}

impl Notifier {
    pub fn new(store: Arc<SqliteStore>, mailer: Arc<Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Store a notification for `user`, e-mailing it first when enabled.
    ///
    /// Returns `None` when the user switched notifications off.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        user: &UserRecord,
        settings: &SettingsRecord,
        kind: NotificationType,
        title: String,
        content: String,
        subject: &str,
        html: impl FnOnce(&Mailer) -> Result<String, MailError>,
    ) -> Result<Option<NotificationRecord>, sqlx::Error> {
        if !settings.notification_enabled {
            info!(user_id = user.id, kind = %kind, "notifications disabled; skipping");
            return Ok(None);
        }
        self.deliver(
            user,
            &settings.notification_channels,
            kind,
            title,
            content,
            subject,
            html,
        )
        .await
        .map(Some)
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver(
        &self,
        user: &UserRecord,
        channels: &str,
        kind: NotificationType,
        title: String,
        content: String,
        subject: &str,
        html: impl FnOnce(&Mailer) -> Result<String, MailError>,
    ) -> Result<NotificationRecord, sqlx::Error> {
        let wants_email = NotificationChannel::is_enabled(channels, NotificationChannel::Email);
        let mut sent_via = NotificationChannel::App;
        let address = user.email.as_deref().filter(|_| wants_email && self.mailer.is_enabled());
        if let Some(address) = address {
            match html(&self.mailer) {
                Ok(body) => match self.mailer.send(address, subject, body).await {
                    Ok(()) => sent_via = NotificationChannel::Email,
                    Err(e) => warn!(user_id = user.id, error = %e, "e-mail delivery failed"),
                },
                Err(e) => warn!(user_id = user.id, error = %e, "e-mail rendering failed"),
            }
        }

        let record = self
            .store
            .create_notification(NewNotification {
                user_id: user.id,
                title,
                content,
                kind,
                sent_via: Some(sent_via),
            })
            .await?;
        info!(user_id = user.id, kind = %kind, sent_via = %sent_via, id = record.id, "notification created");
        Ok(record)
    }

    /// System notice; stored even when notifications are switched off.
    pub async fn send_system(
        &self,
        user: &UserRecord,
        settings: Option<&SettingsRecord>,
        title: &str,
        content: &str,
    ) -> Result<NotificationRecord, sqlx::Error> {
        let channels = settings.map_or("app", |s| s.notification_channels.as_str());
        self.deliver(
            user,
            channels,
            NotificationType::System,
            title.to_owned(),
            content.to_owned(),
            &format!("[ETF앱] {title}"),
            |m| m.render_system(&user.name, title, content),
        )
        .await
    }

    /// Plain reminder listing the ETFs due today.
    pub async fn send_investment_reminder(
        &self,
        user: &UserRecord,
        settings: &SettingsRecord,
        due: &[PortfolioEntry],
    ) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let lines = due
            .iter()
            .map(|e| format!("• {}: {}원", e.etf.symbol, format_amount(e.portfolio.monthly_investment)))
            .collect::<Vec<_>>()
            .join("\n");
        let amount = total(due);
        let content = format!(
            "📅 오늘은 투자일입니다!\n\n💰 투자할 ETF 목록:\n{lines}\n\n💵 총 투자 금액: {}원\n\n⏰ 투자 시간을 잊지 마세요!",
            format_amount(amount)
        );
        let kind = NotificationType::InvestmentReminder;
        self.dispatch(
            user,
            settings,
            kind,
            kind.title().to_owned(),
            content,
            "[ETF앱] 오늘은 투자일입니다!",
            |m| m.render_investment_reminder(&user.name, &etf_lines(due), amount),
        )
        .await
    }

    /// Integrated analysis of every ETF due today.
    pub async fn send_portfolio_analysis(
        &self,
        user: &UserRecord,
        settings: &SettingsRecord,
        due: &[PortfolioEntry],
        analysis: &str,
        assessment: &Assessment,
    ) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let lines = due
            .iter()
            .map(|e| {
                format!(
                    "• {} ({}): {}원",
                    e.etf.symbol,
                    e.etf.name,
                    format_amount(e.portfolio.monthly_investment)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let amount = total(due);
        let confidence = (assessment.confidence * 100.0).round();
        let content = format!(
            "🤖 {name}님의 ETF 포트폴리오 투자 분석 결과\n\n\
             📊 오늘 투자일인 ETF:\n{lines}\n\n\
             💰 총 투자 금액: {amount}원\n\n\
             {ANALYSIS_HEADER}{analysis}\n\n\
             {RECOMMENDATION_HEADER}{recommendation}\n\n\
             🎯 신뢰도: {confidence}%",
            name = user.name,
            amount = format_amount(amount),
            recommendation = assessment.recommendation,
        );
        let kind = NotificationType::PortfolioAnalysis;
        let title = format!("{} ({}개 종목)", kind.title(), due.len());
        self.dispatch(
            user,
            settings,
            kind,
            title,
            content,
            "[ETF앱] ETF 포트폴리오 투자 분석 알림",
            |m| {
                m.render_portfolio_analysis(
                    &user.name,
                    &etf_lines(due),
                    amount,
                    analysis,
                    &assessment.recommendation,
                    assessment.confidence,
                )
            },
        )
        .await
    }
}
