//! Phase 1: channels and their Android sync history.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::source::ChannelRow;
use crate::warehouse::{CreateResult, NewChannel, NewSyncEvent};

/// Android channels carry their device sync history across.
const ANDROID_TYPE: &str = "A";
/// Legacy websocket channels become the new web-chat type.
const WEBSOCKET_TYPE: &str = "WS";
const WEBCHAT_TYPE: &str = "WCH";
const FACEBOOK_TYPE: &str = "FB";

pub struct ChannelPhase;

#[async_trait]
impl PhaseMigrator for ChannelPhase {
    fn index(&self) -> i32 {
        1
    }

    fn name(&self) -> &'static str {
        "channels"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        if ctx.window().is_open() {
            ctx.warehouse.neutralize_channels(dest).await?;
        }

        for mut channel in ctx.source.channels(ctx.source_org(), ctx.window()).await? {
            if !channel.is_active {
                report.removed_channels.push(channel.uuid);
                report.absorb(&RecordOutcome::Skipped(SkipReason::Inactive));
                continue;
            }

            let mut config = channel.config_json();
            let mut secret = channel.secret.take();
            if channel.channel_type == FACEBOOK_TYPE {
                // Facebook page tokens moved from the secret column into config.
                if let Some(token) = secret.take() {
                    config["auth_token"] = Value::String(token);
                }
            }
            if channel.channel_type == WEBSOCKET_TYPE {
                if let Some(logo) = config.get("org_logo").and_then(Value::as_str) {
                    match ctx.media.import(logo).await {
                        Ok(hosted) => config["org_logo"] = Value::String(hosted),
                        Err(err) => {
                            ctx.log
                                .warn(format!("could not rehost logo for channel {}: {err:#}", channel.uuid));
                        }
                    }
                }
            }

            let channel_type = destination_type(&channel.channel_type).to_string();
            ctx.warehouse
                .clear_channel_counts(dest, channel.address.as_deref(), &channel_type)
                .await?;

            let schemes = destination_schemes(&channel);
            let created = ctx
                .warehouse
                .create_channel(
                    dest,
                    &NewChannel {
                        uuid: channel.uuid,
                        channel_type,
                        name: channel.name.clone(),
                        address: channel.address.clone(),
                        country: channel.country.clone(),
                        config,
                        role: channel.role.clone(),
                        schemes,
                        claim_code: channel.claim_code.clone(),
                        secret,
                        last_seen: channel.last_seen,
                        device: channel.device.clone(),
                        os: channel.os.clone(),
                        alert_email: channel.alert_email.clone(),
                        bod: channel.bod.clone(),
                        tps: ctx.options.default_channel_tps,
                    },
                )
                .await?;
            let new_channel = match created {
                CreateResult::Created(id) => id,
                CreateResult::Conflict => {
                    ctx.log.warn(format!(
                        "channel {} address already claimed by another org, not copied",
                        channel.uuid
                    ));
                    report.absorb(&RecordOutcome::Skipped(SkipReason::AlreadyMigrated));
                    continue;
                }
            };
            ctx.record(EntityType::Channel, channel.id, new_channel).await?;
            report.absorb(&RecordOutcome::Created(new_channel));

            if channel.channel_type == ANDROID_TYPE {
                for event in ctx.source.sync_events(channel.id).await? {
                    ctx.warehouse
                        .create_sync_event(
                            new_channel,
                            &NewSyncEvent {
                                power_source: event.power_source.clone(),
                                power_status: event.power_status.clone(),
                                power_level: event.power_level,
                                network_type: event.network_type.clone(),
                                lifetime: event.lifetime,
                                pending_message_count: event.pending_message_count,
                                retry_message_count: event.retry_message_count,
                                incoming_command_count: event.incoming_command_count,
                                outgoing_command_count: event.outgoing_command_count,
                            },
                        )
                        .await?;
                }
            }
        }

        Ok(report)
    }
}

fn destination_type(channel_type: &str) -> &str {
    match channel_type {
        WEBSOCKET_TYPE => WEBCHAT_TYPE,
        other => other,
    }
}

fn destination_schemes(channel: &ChannelRow) -> Vec<String> {
    if channel.channel_type == WEBSOCKET_TYPE {
        return vec!["ext".to_string()];
    }
    channel
        .schemes
        .clone()
        .unwrap_or_else(|| vec!["tel".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn channel(channel_type: &str, schemes: Option<Vec<String>>) -> ChannelRow {
        ChannelRow {
            id: 1,
            uuid: Uuid::new_v4(),
            channel_type: channel_type.to_string(),
            name: None,
            address: None,
            country: None,
            config: None,
            role: "SR".to_string(),
            schemes,
            claim_code: None,
            secret: None,
            last_seen: None,
            device: None,
            os: None,
            alert_email: None,
            bod: None,
            is_active: true,
        }
    }

    #[test]
    fn websocket_becomes_webchat() {
        assert_eq!(destination_type("WS"), "WCH");
        assert_eq!(destination_type("A"), "A");
        assert_eq!(destination_type("T"), "T");
    }

    #[test]
    fn websocket_channels_get_the_external_scheme() {
        let ws = channel("WS", Some(vec!["tel".to_string()]));
        assert_eq!(destination_schemes(&ws), vec!["ext".to_string()]);
    }

    #[test]
    fn schemes_default_to_tel() {
        let bare = channel("A", None);
        assert_eq!(destination_schemes(&bare), vec!["tel".to_string()]);

        let fb = channel("FB", Some(vec!["facebook".to_string()]));
        assert_eq!(destination_schemes(&fb), vec!["facebook".to_string()]);
    }
}
