//! Phase 9: the message archive.
//!
//! By far the largest phase on real orgs, so rows are buffered and flushed in
//! bulk instead of inserted one at a time.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::warehouse::NewMessage;

/// Rows buffered before a bulk insert.
const MESSAGE_FLUSH: usize = 5000;

/// Attachment categories served inline by the destination, no rehosting.
const INLINE_CATEGORIES: [&str; 4] = ["image", "audio", "video", "geo"];

/// Attachments already on the destination store keep their URL.
const DEST_STORE_HOST: &str = "amazonaws.com";

pub struct MessagePhase;

#[async_trait]
impl PhaseMigrator for MessagePhase {
    fn index(&self) -> i32 {
        9
    }

    fn name(&self) -> &'static str {
        "messages"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[1, 3, 7, 8]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.release_messages(dest).await?;

        let mut buffer: Vec<NewMessage> = Vec::with_capacity(MESSAGE_FLUSH);
        let mut old_ids: Vec<i64> = Vec::with_capacity(MESSAGE_FLUSH);

        for msg in ctx.source.messages(ctx.source_org(), ctx.window()).await? {
            let Some(contact) = ctx.resolve(EntityType::Contact, msg.contact_id).await? else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::Contact,
                    msg.contact_id,
                )));
                continue;
            };
            let channel_id = ctx.resolve_opt(EntityType::Channel, msg.channel_id).await?;
            let contact_urn_id = ctx
                .resolve_opt(EntityType::ContactUrn, msg.contact_urn_id)
                .await?;
            let broadcast_id = ctx
                .resolve_opt(EntityType::Broadcast, msg.broadcast_id)
                .await?;
            let response_to_id = ctx
                .resolve_opt(EntityType::Message, msg.response_to_id)
                .await?;
            let topup_id = ctx.resolve_opt(EntityType::CreditGrant, msg.topup_id).await?;

            let mut attachments = Vec::new();
            for attachment in msg.attachments.as_deref().unwrap_or_default() {
                if let Some(translated) = self.translate_attachment(ctx, attachment).await {
                    attachments.push(translated);
                }
            }

            buffer.push(NewMessage {
                uuid: msg.uuid,
                channel_id,
                contact_id: contact,
                contact_urn_id,
                broadcast_id,
                response_to_id,
                topup_id,
                text: msg.text.clone(),
                high_priority: msg.high_priority.unwrap_or(false),
                created_on: msg.created_on,
                modified_on: msg.modified_on,
                sent_on: msg.sent_on,
                queued_on: msg.queued_on,
                direction: msg.direction.clone(),
                status: msg.status.clone(),
                visibility: msg.visibility.clone(),
                msg_type: msg.msg_type.clone(),
                msg_count: msg.msg_count,
                error_count: msg.error_count,
                next_attempt: msg.next_attempt,
                external_id: msg.external_id.clone(),
                attachments: if attachments.is_empty() {
                    None
                } else {
                    Some(attachments)
                },
                metadata: msg.metadata.clone(),
            });
            old_ids.push(msg.id);

            if buffer.len() >= MESSAGE_FLUSH {
                self.flush(ctx, &mut report, &mut buffer, &mut old_ids).await?;
            }
        }
        self.flush(ctx, &mut report, &mut buffer, &mut old_ids).await?;

        Ok(report)
    }
}

impl MessagePhase {
    async fn flush(
        &self,
        ctx: &PhaseContext<'_>,
        report: &mut PhaseReport,
        buffer: &mut Vec<NewMessage>,
        old_ids: &mut Vec<i64>,
    ) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let new_ids = ctx
            .warehouse
            .bulk_create_messages(ctx.dest_org(), buffer)
            .await?;
        for (old_id, new_id) in old_ids.iter().zip(&new_ids) {
            ctx.record(EntityType::Message, *old_id, *new_id).await?;
            report.absorb(&RecordOutcome::Created(*new_id));
        }
        buffer.clear();
        old_ids.clear();
        Ok(())
    }

    /// Rehost an attachment when [`rehost_target`] asks for it; a failed
    /// rehost drops the attachment rather than carrying a dead link.
    async fn translate_attachment(
        &self,
        ctx: &PhaseContext<'_>,
        attachment: &str,
    ) -> Option<String> {
        let Some((content_type, url)) = rehost_target(attachment) else {
            return Some(attachment.to_string());
        };
        match ctx.media.import(url).await {
            Ok(hosted) => Some(format!("{content_type}:{hosted}")),
            Err(err) => {
                ctx.log
                    .warn(format!("dropping attachment {url}, rehost failed: {err:#}"));
                None
            }
        }
    }
}

/// Attachments are stored as `content-type:url`. Returns the split parts when
/// the URL must move to the destination store; inline media categories and
/// URLs already on the destination store stay as they are.
fn rehost_target(attachment: &str) -> Option<(&str, &str)> {
    let (content_type, url) = attachment.split_once(':')?;
    let category = content_type.split('/').next().unwrap_or_default();
    if INLINE_CATEGORIES.contains(&category) || url.contains(DEST_STORE_HOST) {
        return None;
    }
    Some((content_type, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_media_is_not_rehosted() {
        assert_eq!(rehost_target("image/jpeg:https://old.example.com/a.jpg"), None);
        assert_eq!(rehost_target("audio/mp3:https://old.example.com/a.mp3"), None);
        assert_eq!(rehost_target("geo:1.5,30.1"), None);
    }

    #[test]
    fn destination_store_urls_pass_through() {
        assert_eq!(
            rehost_target("application/pdf:https://bucket.s3.amazonaws.com/doc.pdf"),
            None
        );
    }

    #[test]
    fn foreign_documents_are_rehosted() {
        assert_eq!(
            rehost_target("application/pdf:https://old.example.com/doc.pdf"),
            Some(("application/pdf", "https://old.example.com/doc.pdf"))
        );
    }

    #[test]
    fn malformed_attachments_stay_untouched() {
        assert_eq!(rehost_target("no-colon-here"), None);
    }
}
