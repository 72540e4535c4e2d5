//! Phase 10: channel request/response logs.
//!
//! Runs after messages so log rows can point at their migrated message.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::warehouse::NewChannelLog;

pub struct ChannelLogPhase;

#[async_trait]
impl PhaseMigrator for ChannelLogPhase {
    fn index(&self) -> i32 {
        10
    }

    fn name(&self) -> &'static str {
        "channel logs"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[1, 9]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());

        for channel in ctx.source.channels(ctx.source_org(), ctx.window()).await? {
            let Some(new_channel) = ctx.resolve(EntityType::Channel, channel.id).await? else {
                continue;
            };
            for log in ctx.source.channel_logs(channel.id).await? {
                let msg_id = match log.msg_id {
                    Some(old_msg) => match ctx.resolve(EntityType::Message, old_msg).await? {
                        Some(new_msg) => Some(new_msg),
                        None => {
                            report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                                EntityType::Message,
                                old_msg,
                            )));
                            continue;
                        }
                    },
                    None => None,
                };
                let created = ctx
                    .warehouse
                    .create_channel_log(
                        new_channel,
                        &NewChannelLog {
                            msg_id,
                            description: log.description.clone(),
                            is_error: log.is_error,
                            url: log.url.clone(),
                            method: log.method.clone(),
                            request: log.request.clone(),
                            response: log.response.clone(),
                            response_status: log.response_status,
                            request_time: log.request_time,
                            created_on: log.created_on,
                        },
                    )
                    .await?;
                report.absorb(&RecordOutcome::Created(created));
            }
        }

        Ok(report)
    }
}
