//! Phase 0: org profile, credits and languages.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::{NewCreditEvent, NewCreditGrant, NewLanguage, OrgProfile, SmtpConfig};

pub struct OrganizationPhase;

#[async_trait]
impl PhaseMigrator for OrganizationPhase {
    fn index(&self) -> i32 {
        0
    }

    fn name(&self) -> &'static str {
        "organization"
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let org = ctx.org;
        let dest = ctx.dest_org();

        // Profile. SMTP settings hide inside the legacy config blob and move
        // to dedicated columns downstream.
        let mut config = org.config_json();
        let smtp = extract_smtp(&mut config);
        let parent_id = ctx.resolve_opt(EntityType::Organization, org.parent_id).await?;

        ctx.warehouse
            .update_org(
                dest,
                &OrgProfile {
                    plan: org.plan.clone(),
                    plan_start: org.plan_start,
                    stripe_customer: org.stripe_customer.clone(),
                    language: org.language.clone(),
                    date_format: org.date_format.clone(),
                    config,
                    is_anon: org.is_anon,
                    surveyor_password: org.surveyor_password.clone(),
                    parent_id,
                },
            )
            .await?;
        if !smtp.is_empty() {
            ctx.warehouse.configure_smtp(dest, &smtp).await?;
        }
        ctx.record(EntityType::Organization, org.id, dest).await?;
        report.absorb(&RecordOutcome::Updated(dest));

        // Credits. Old grants go inert, then the source grants are copied
        // with their consumption events.
        ctx.warehouse.deactivate_credit_grants(dest).await?;
        for grant in ctx.source.credit_grants(ctx.source_org()).await? {
            let new_grant = ctx
                .warehouse
                .create_credit_grant(
                    dest,
                    &NewCreditGrant {
                        price: grant.price,
                        credits: grant.credits,
                        expires_on: grant.expires_on,
                        created_on: grant.created_on,
                        modified_on: grant.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::CreditGrant, grant.id, new_grant).await?;
            report.absorb(&RecordOutcome::Created(new_grant));

            for event in ctx.source.credit_events(grant.id).await? {
                ctx.warehouse
                    .create_credit_event(
                        new_grant,
                        &NewCreditEvent {
                            used: event.used,
                            is_squashed: event.is_squashed,
                        },
                    )
                    .await?;
            }
        }

        // Languages are recreated wholesale. The primary-language pointer is
        // cleared first so the delete never trips the foreign key, then
        // restored through the fresh mapping.
        ctx.warehouse.clear_primary_language(dest).await?;
        ctx.warehouse.delete_languages(dest).await?;
        for language in ctx.source.languages(ctx.source_org()).await? {
            let new_language = ctx
                .warehouse
                .create_language(
                    dest,
                    &NewLanguage {
                        name: language.name.clone(),
                        iso_code: language.iso_code.clone(),
                    },
                )
                .await?;
            ctx.record(EntityType::Language, language.id, new_language).await?;
            report.absorb(&RecordOutcome::Created(new_language));
        }
        if let Some(primary) = ctx
            .resolve_opt(EntityType::Language, org.primary_language_id)
            .await?
        {
            ctx.warehouse.set_primary_language(dest, primary).await?;
        }

        Ok(report)
    }
}

fn pop(config: &mut Value, key: &str) -> Option<Value> {
    config.as_object_mut()?.remove(key)
}

fn pop_string(config: &mut Value, key: &str) -> Option<String> {
    match pop(config, key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// Pull the legacy SMTP keys out of the config blob, leaving the rest.
fn extract_smtp(config: &mut Value) -> SmtpConfig {
    let port = match pop(config, "SMTP_PORT") {
        Some(Value::Number(n)) => n.as_i64().map(|n| n as i32),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    SmtpConfig {
        from_email: pop_string(config, "SMTP_FROM_EMAIL"),
        host: pop_string(config, "SMTP_HOST"),
        username: pop_string(config, "SMTP_USERNAME"),
        password: pop_string(config, "SMTP_PASSWORD"),
        port,
        encryption: pop_string(config, "SMTP_ENCRYPTION"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn smtp_keys_are_popped_out_of_config() {
        let mut config = json!({
            "SMTP_FROM_EMAIL": "no-reply@acme.org",
            "SMTP_HOST": "smtp.acme.org",
            "SMTP_PORT": "587",
            "GIFTCARDS": ["Promo"],
        });

        let smtp = extract_smtp(&mut config);
        assert_eq!(smtp.from_email.as_deref(), Some("no-reply@acme.org"));
        assert_eq!(smtp.host.as_deref(), Some("smtp.acme.org"));
        assert_eq!(smtp.port, Some(587));
        assert!(smtp.username.is_none());
        assert!(!smtp.is_empty());

        // Only the non-SMTP keys survive in the blob.
        assert_eq!(config, json!({ "GIFTCARDS": ["Promo"] }));
    }

    #[test]
    fn numeric_port_and_empty_strings() {
        let mut config = json!({ "SMTP_PORT": 465, "SMTP_HOST": "" });
        let smtp = extract_smtp(&mut config);
        assert_eq!(smtp.port, Some(465));
        assert!(smtp.host.is_none());
    }

    #[test]
    fn no_smtp_keys_means_empty() {
        let mut config = json!({ "LOOKUPS": [] });
        assert!(extract_smtp(&mut config).is_empty());
    }
}
