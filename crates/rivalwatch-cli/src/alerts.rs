//! Alert command handlers. Alerts are append-only; the only change a user
//! can make is marking one read or dismissed.

use clap::Subcommand;
use rivalwatch_core::{AppConfig, MonitoringAlert};
use rivalwatch_db::{DbError, MonitoringStore, PgStore};

/// Sub-commands available under `alerts`.
#[derive(Debug, Subcommand)]
pub enum AlertsCommands {
    /// List a competitor's alerts, newest first
    List {
        #[arg(long)]
        competitor: i64,
        /// Maximum number of alerts to show
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Hide dismissed alerts
        #[arg(long)]
        active: bool,
    },
    /// Mark an alert read
    Read { id: i64 },
    /// Dismiss an alert
    Dismiss { id: i64 },
}

pub(crate) async fn run_alerts(config: &AppConfig, command: AlertsCommands) -> anyhow::Result<()> {
    let pool = rivalwatch_db::connect_pool_from_config(config).await?;
    let store = PgStore::new(pool);

    match command {
        AlertsCommands::List {
            competitor,
            limit,
            active,
        } => {
            let alerts = store.list_alerts(competitor, limit).await?;
            tracing::debug!(competitor_id = competitor, fetched = alerts.len(), "alerts loaded");
            let shown: Vec<&MonitoringAlert> =
                alerts.iter().filter(|a| !(active && a.is_dismissed)).collect();
            if shown.is_empty() {
                println!("no alerts for competitor {competitor}");
            }
            for alert in shown {
                println!("{}", format_alert(alert));
            }
            Ok(())
        }
        AlertsCommands::Read { id } => {
            update_flags(&store, id, Some(true), None).await?;
            println!("alert {id} marked read");
            Ok(())
        }
        AlertsCommands::Dismiss { id } => {
            update_flags(&store, id, None, Some(true)).await?;
            println!("alert {id} dismissed");
            Ok(())
        }
    }
}

async fn update_flags(
    store: &PgStore,
    id: i64,
    is_read: Option<bool>,
    is_dismissed: Option<bool>,
) -> anyhow::Result<()> {
    tracing::debug!(alert_id = id, ?is_read, ?is_dismissed, "updating alert flags");
    match store.set_alert_flags(id, is_read, is_dismissed).await {
        Err(DbError::NotFound) => anyhow::bail!("alert {id} not found"),
        other => Ok(other?),
    }
}

fn format_alert(alert: &MonitoringAlert) -> String {
    let marker = match (alert.is_read, alert.is_dismissed) {
        (_, true) => 'x',
        (false, false) => '*',
        (true, false) => ' ',
    };
    format!(
        "{marker} #{:<6} {} [{}/{}] {}",
        alert.id.unwrap_or_default(),
        alert.created_at.format("%Y-%m-%d %H:%M"),
        alert.alert_type,
        alert.priority,
        alert.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rivalwatch_core::{AlertMetadata, AlertPriority, AlertType, Platform};

    fn alert(is_read: bool, is_dismissed: bool) -> MonitoringAlert {
        MonitoringAlert {
            id: Some(42),
            competitor_id: 1,
            alert_type: AlertType::NewPost,
            priority: AlertPriority::Low,
            title: "New website post: Pricing".to_string(),
            message: "A new website post was detected.".to_string(),
            metadata: AlertMetadata {
                platform: Platform::Website,
                post_id: "p".to_string(),
                post_url: None,
                content_hash: "h".to_string(),
                previous_content_hash: None,
            },
            is_read,
            is_dismissed,
            created_at: Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn unread_alerts_are_starred() {
        let line = format_alert(&alert(false, false));
        assert!(line.starts_with("* #42"));
        assert!(line.contains("2026-05-01 10:00"));
        assert!(line.ends_with("New website post: Pricing"));
    }

    #[test]
    fn dismissed_alerts_are_crossed_out() {
        assert!(format_alert(&alert(true, true)).starts_with("x "));
        assert!(format_alert(&alert(true, false)).starts_with("  #42"));
    }
}
