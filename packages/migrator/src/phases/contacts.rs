//! Phase 3: contacts with their field values and URNs.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::source::ContactRow;
use crate::warehouse::{ContactUpdate, NewContact, NewUrn};

pub struct ContactPhase;

#[async_trait]
impl PhaseMigrator for ContactPhase {
    fn index(&self) -> i32 {
        3
    }

    fn name(&self) -> &'static str {
        "contacts"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[1, 2]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        for contact in ctx.source.contacts(ctx.source_org(), ctx.window()).await? {
            let outcome = match ctx.warehouse.find_contact(dest, contact.uuid).await? {
                Some(existing) => {
                    ctx.warehouse
                        .update_contact(
                            dest,
                            existing,
                            &ContactUpdate {
                                name: contact.name.clone(),
                                is_blocked: contact.is_blocked,
                                is_stopped: contact.is_stopped,
                                is_active: contact.is_active,
                            },
                        )
                        .await?;
                    RecordOutcome::Updated(existing)
                }
                None => {
                    let created = ctx
                        .warehouse
                        .create_contact(
                            dest,
                            &NewContact {
                                uuid: contact.uuid,
                                name: contact.name.clone(),
                                language: contact.language.clone(),
                                is_blocked: contact.is_blocked,
                                is_stopped: contact.is_stopped,
                                is_active: contact.is_active,
                            },
                        )
                        .await?;
                    RecordOutcome::Created(created)
                }
            };
            let Some(new_contact) = outcome.id() else {
                report.absorb(&outcome);
                continue;
            };
            // Inserts stamp now(); rewrite with the source history.
            ctx.warehouse
                .set_contact_timestamps(dest, new_contact, contact.created_on, contact.modified_on)
                .await?;
            ctx.record(EntityType::Contact, contact.id, new_contact).await?;
            report.absorb(&outcome);

            self.copy_values(ctx, &contact, new_contact).await?;
            self.copy_urns(ctx, &contact, new_contact).await?;
        }

        Ok(report)
    }
}

impl ContactPhase {
    async fn copy_values(
        &self,
        ctx: &PhaseContext<'_>,
        contact: &ContactRow,
        new_contact: i64,
    ) -> Result<()> {
        for value in ctx
            .source
            .contact_values(ctx.source_org(), contact.id)
            .await?
        {
            // Values whose field never made it across are dropped quietly.
            let Some(field) = ctx
                .resolve(EntityType::ContactField, value.contact_field_id)
                .await?
            else {
                continue;
            };
            let Some(text) = value.string_value.as_deref() else {
                continue;
            };
            ctx.warehouse
                .set_contact_field(ctx.dest_org(), new_contact, field, text)
                .await?;
        }
        Ok(())
    }

    async fn copy_urns(
        &self,
        ctx: &PhaseContext<'_>,
        contact: &ContactRow,
        new_contact: i64,
    ) -> Result<()> {
        for urn in ctx.source.contact_urns(ctx.source_org(), contact.id).await? {
            let channel_id = ctx.resolve_opt(EntityType::Channel, urn.channel_id).await?;
            let new_urn = ctx
                .warehouse
                .upsert_urn(
                    ctx.dest_org(),
                    new_contact,
                    &NewUrn {
                        identity: external_identity(&urn.identity),
                        channel_id,
                        auth: urn.auth.clone(),
                    },
                )
                .await?;
            ctx.record(EntityType::ContactUrn, urn.id, new_urn).await?;
        }
        Ok(())
    }
}

/// Rewrite legacy websocket URNs onto the external scheme.
fn external_identity(identity: &str) -> String {
    match identity.split_once(':') {
        Some(("ws", path)) => format!("ext:{path}"),
        _ => identity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_identities_are_rewritten() {
        assert_eq!(external_identity("ws:abc-123"), "ext:abc-123");
        assert_eq!(external_identity("tel:+250788123123"), "tel:+250788123123");
        assert_eq!(external_identity("facebook:999"), "facebook:999");
        assert_eq!(external_identity("nocolon"), "nocolon");
    }
}
