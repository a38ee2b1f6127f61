//! Emit order events to the hub.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, ValueEnum};
use relay_core::config::RelayConfig;
use relay_core::notifier::HubNotifier;
use relay_core::order::{
    CREATED_AT, CUSTOMER_IDENTIFIER, ORDER_NO, RESTAURANT, STATUS, TRANSITION, UPDATED_AT,
};
use relay_core::InboundEvent;
use serde_json::{Map, Value};

use crate::output;

#[derive(Clone, Copy, ValueEnum)]
pub enum EmitKind {
    /// A new order (order:created)
    Created,
    /// A status change (order:statusChanged)
    StatusChanged,
}

#[derive(Args)]
pub struct EmitArgs {
    /// Which event to send
    #[arg(value_enum)]
    pub kind: EmitKind,

    /// Order number
    #[arg(long)]
    pub order_no: String,

    /// Order status
    #[arg(long, default_value = "Pending")]
    pub status: String,

    /// Customer identifier the order belongs to
    #[arg(long)]
    pub customer_id: Option<String>,

    /// Restaurant reference
    #[arg(long)]
    pub restaurant: Option<String>,

    /// Creation timestamp (RFC 3339). Defaults to now for `created`.
    #[arg(long)]
    pub created_at: Option<String>,

    /// Explicit transition tag (created, accepted, rejected)
    #[arg(long)]
    pub transition: Option<String>,

    /// Extra JSON object merged into the payload
    #[arg(long)]
    pub data: Option<String>,

    /// Hub HTTP address (defaults to ORDER_RELAY_API_URL or http://127.0.0.1:3030)
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn execute(args: EmitArgs, config: RelayConfig) -> Result<()> {
    let payload = build_payload(&args)?;
    let event = match args.kind {
        EmitKind::Created => InboundEvent::OrderCreated(payload),
        EmitKind::StatusChanged => InboundEvent::OrderStatusChanged(payload),
    };
    let name = event.name();

    let url = args
        .url
        .clone()
        .or(config.client.api_url)
        .unwrap_or_else(|| relay_core::config::DEFAULT_HUB_URL.to_string());
    let notifier = HubNotifier::with_url(&url);

    let accepted = notifier.emit(event).await;
    output::print_emit_result(name, accepted, &url);
    Ok(())
}

fn build_payload(args: &EmitArgs) -> Result<Value> {
    let mut payload = match &args.data {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("--data is not valid JSON")? {
            Value::Object(map) => map,
            _ => bail!("--data must be a JSON object"),
        },
        None => Map::new(),
    };

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    payload.insert(ORDER_NO.into(), Value::String(args.order_no.clone()));
    payload.insert(STATUS.into(), Value::String(args.status.clone()));
    if let Some(id) = &args.customer_id {
        payload.insert(CUSTOMER_IDENTIFIER.into(), Value::String(id.clone()));
    }
    if let Some(restaurant) = &args.restaurant {
        payload.insert(RESTAURANT.into(), Value::String(restaurant.clone()));
    }
    if let Some(transition) = &args.transition {
        payload.insert(TRANSITION.into(), Value::String(transition.clone()));
    }

    let created_at = match (&args.created_at, args.kind) {
        (Some(ts), _) => Some(ts.clone()),
        (None, EmitKind::Created) => Some(now.clone()),
        (None, EmitKind::StatusChanged) => None,
    };
    if let Some(created_at) = created_at {
        payload.insert(CREATED_AT.into(), Value::String(created_at));
    }
    payload.insert(UPDATED_AT.into(), Value::String(now));

    Ok(Value::Object(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: EmitKind) -> EmitArgs {
        EmitArgs {
            kind,
            order_no: "15".into(),
            status: "Pending".into(),
            customer_id: Some("c-1".into()),
            restaurant: None,
            created_at: None,
            transition: None,
            data: Some(r#"{"total": 12.5}"#.into()),
            url: None,
        }
    }

    #[test]
    fn test_created_payload_has_equal_timestamps() {
        let payload = build_payload(&args(EmitKind::Created)).unwrap();
        assert_eq!(payload["createdAt"], payload["updatedAt"]);
        assert_eq!(payload["total"], 12.5);
        assert_eq!(payload["customerIdentifier"], "c-1");
        assert_eq!(relay_core::classify_payload(&payload), relay_core::Verdict::Ignore);
    }

    #[test]
    fn test_status_changed_with_earlier_creation_is_accepted() {
        let mut a = args(EmitKind::StatusChanged);
        a.created_at = Some("2020-01-01T00:00:00.000Z".into());
        let payload = build_payload(&a).unwrap();
        assert!(matches!(
            relay_core::classify_payload(&payload),
            relay_core::Verdict::Notify { kind: relay_core::NotifyKind::Success, .. }
        ));
    }

    #[test]
    fn test_data_must_be_object() {
        let mut a = args(EmitKind::Created);
        a.data = Some("[1,2]".into());
        assert!(build_payload(&a).is_err());
    }
}
