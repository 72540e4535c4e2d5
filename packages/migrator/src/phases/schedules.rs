//! Phase 6: trigger and broadcast schedules.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::source::ScheduleRow;
use crate::warehouse::NewSchedule;

/// Day letters in legacy bitmask order, Monday first.
const WEEKDAYS: &str = "MTWRFSU";

pub struct SchedulePhase;

#[async_trait]
impl PhaseMigrator for SchedulePhase {
    fn index(&self) -> i32 {
        6
    }

    fn name(&self) -> &'static str {
        "schedules"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        if ctx.window().is_open() {
            ctx.warehouse.deactivate_schedules(dest).await?;
        }

        let mut schedules = ctx
            .source
            .trigger_schedules(ctx.source_org(), ctx.window())
            .await?;
        schedules.extend(
            ctx.source
                .broadcast_schedules(ctx.source_org(), ctx.window())
                .await?,
        );

        for schedule in schedules {
            let new_schedule = ctx
                .warehouse
                .create_schedule(dest, &translate_schedule(&schedule, &ctx.org.timezone))
                .await?;
            ctx.record(EntityType::Schedule, schedule.id, new_schedule).await?;
            report.absorb(&RecordOutcome::Created(new_schedule));
        }

        Ok(report)
    }
}

/// Legacy schedules store their firing hour in UTC; the destination expects
/// the org-local hour. One-off schedules keep theirs as is.
fn translate_schedule(schedule: &ScheduleRow, timezone: &str) -> NewSchedule {
    let repeat_period = schedule
        .repeat_period
        .clone()
        .unwrap_or_else(|| "O".to_string());
    let reference = schedule.next_fire.unwrap_or(schedule.created_on);
    let repeat_hour_of_day = match (repeat_period.as_str(), schedule.repeat_hour_of_day) {
        ("O", hour) => hour,
        (_, Some(hour)) => Some(local_hour(hour, timezone, reference)),
        (_, None) => None,
    };
    NewSchedule {
        repeat_period,
        repeat_days_of_week: weekday_letters(schedule.repeat_days.unwrap_or(0)),
        repeat_hour_of_day,
        repeat_minute_of_hour: schedule.repeat_minute_of_hour.unwrap_or(0),
        repeat_day_of_month: schedule.repeat_day_of_month,
        next_fire: schedule.next_fire,
        last_fire: schedule.last_fire,
        created_on: schedule.created_on,
        modified_on: schedule.modified_on,
    }
}

/// Expand the legacy weekday bitmask into day letters. Monday carries bit 1.
fn weekday_letters(mask: i32) -> Option<String> {
    let letters: String = WEEKDAYS
        .chars()
        .enumerate()
        .filter(|(i, _)| mask & (1 << (i + 1)) != 0)
        .map(|(_, letter)| letter)
        .collect();
    if letters.is_empty() {
        None
    } else {
        Some(letters)
    }
}

/// Shift a UTC hour into the org timezone, using the zone offset in effect at
/// the reference instant. Unknown zones leave the hour untouched.
fn local_hour(utc_hour: i32, timezone: &str, reference: DateTime<Utc>) -> i32 {
    let Ok(tz) = timezone.parse::<Tz>() else {
        return utc_hour;
    };
    let offset_hours = tz
        .offset_from_utc_datetime(&reference.naive_utc())
        .fix()
        .local_minus_utc()
        / 3600;
    (utc_hour + offset_hours).rem_euclid(24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weekday_letters_follow_the_bitmask() {
        assert_eq!(weekday_letters(2), Some("M".to_string()));
        assert_eq!(weekday_letters(6), Some("MT".to_string()));
        assert_eq!(weekday_letters(254), Some("MTWRFSU".to_string()));
        assert_eq!(weekday_letters(0), None);
    }

    #[test]
    fn hours_shift_into_the_org_zone() {
        let reference = Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap();
        // Kigali is UTC+2 year round.
        assert_eq!(local_hour(7, "Africa/Kigali", reference), 9);
        assert_eq!(local_hour(23, "Africa/Kigali", reference), 1);
    }

    #[test]
    fn unknown_zone_keeps_the_utc_hour() {
        let reference = Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(local_hour(7, "Mars/Olympus", reference), 7);
    }

    #[test]
    fn one_off_schedules_keep_their_hour() {
        let schedule = ScheduleRow {
            id: 1,
            repeat_period: None,
            repeat_days: None,
            repeat_hour_of_day: Some(14),
            repeat_minute_of_hour: None,
            repeat_day_of_month: None,
            next_fire: None,
            last_fire: None,
            created_on: Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap(),
            modified_on: Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap(),
        };
        let translated = translate_schedule(&schedule, "Africa/Kigali");
        assert_eq!(translated.repeat_period, "O");
        assert_eq!(translated.repeat_hour_of_day, Some(14));
        assert_eq!(translated.repeat_minute_of_hour, 0);
    }

    #[test]
    fn weekly_schedules_localize_their_hour() {
        let schedule = ScheduleRow {
            id: 2,
            repeat_period: Some("W".to_string()),
            repeat_days: Some(6),
            repeat_hour_of_day: Some(7),
            repeat_minute_of_hour: Some(30),
            repeat_day_of_month: None,
            next_fire: Some(Utc.with_ymd_and_hms(2020, 6, 15, 7, 30, 0).unwrap()),
            last_fire: None,
            created_on: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            modified_on: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        };
        let translated = translate_schedule(&schedule, "Africa/Kigali");
        assert_eq!(translated.repeat_period, "W");
        assert_eq!(translated.repeat_days_of_week, Some("MT".to_string()));
        assert_eq!(translated.repeat_hour_of_day, Some(9));
        assert_eq!(translated.repeat_minute_of_hour, 30);
    }
}
