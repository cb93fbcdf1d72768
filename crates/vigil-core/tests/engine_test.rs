//! End-to-end tests of the signal engine over an in-memory store and a manual clock.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use vigil_core::preferences::{
    ConditionField, ConditionOperator, RuleAction, RuleCondition, DEFAULT_PERSONA_ID,
};
use vigil_core::{
    CustomAlertRule, DeferReason, DenyReason, FatigueReason, FocusZone, ManualClock, MemoryStore,
    Persona, Priority, ProcessOutcome, RejectReason, Signal, SignalDomain, SignalEngine, Urgency,
    VigilConfig,
};

/// Wednesday 2024-06-05 10:00 UTC.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap()
}

fn engine() -> (SignalEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let engine = SignalEngine::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
        VigilConfig::builder().in_memory().build(),
    );
    (engine, clock)
}

fn signal(
    id: &str,
    domain: SignalDomain,
    priority: Priority,
    relevance: f64,
    clock: &ManualClock,
) -> Signal {
    use vigil_core::Clock;
    Signal::new(id, format!("Signal {}", id), domain, priority, relevance, clock.now())
}

/// Market/high/0.6 scores 69: timely.
fn timely(id: &str, clock: &ManualClock) -> Signal {
    signal(id, SignalDomain::Market, Priority::High, 0.6, clock)
}

#[test]
fn test_critical_regulatory_delivered_immediately() {
    let (engine, clock) = engine();
    let before = engine.budget_status();

    let s = signal("reg-1", SignalDomain::Regulatory, Priority::Critical, 0.9, &clock);
    let delivered = engine.process_signal(&s).expect("delivered");

    assert!(delivered.sis >= 90, "sis was {}", delivered.sis);
    assert_eq!(delivered.urgency, Urgency::Immediate);
    assert!(delivered.cluster_id.is_some());

    let after = engine.budget_status();
    assert_eq!(after.daily, before.daily - 1);
    assert_eq!(after.hourly, before.hourly - 1);
    assert_eq!(engine.unread_count(), 1);
}

#[test]
fn test_ninth_timely_signal_waits_for_hourly_reset() {
    let (engine, clock) = engine();

    for i in 0..8 {
        let s = timely(&format!("t{}", i), &clock);
        let delivered = engine.process_signal(&s).expect("within budget");
        assert_eq!(delivered.urgency, Urgency::Timely);
        clock.advance(Duration::minutes(3));
    }

    let ninth = timely("t8", &clock);
    match engine.evaluate_signal(&ninth) {
        ProcessOutcome::Queued { reason, .. } => assert_eq!(
            reason,
            DeferReason::Fatigue {
                reason: FatigueReason::HourlyLimit
            }
        ),
        other => panic!("expected queued, got {:?}", other),
    }
    assert_eq!(engine.queued_signals().len(), 1);

    // Still inside the hourly window.
    clock.set(start() + Duration::minutes(30));
    let report = engine.process_queue();
    assert!(report.delivered.is_empty());
    assert_eq!(report.remaining, 1);
    assert_eq!(engine.queued_signals()[0].attempts, 1);

    // The window opened at the first delivery and resets an hour later.
    clock.set(start() + Duration::hours(1));
    let report = engine.process_queue();
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].id, "t8");
    assert!(engine.queued_signals().is_empty());
    assert_eq!(engine.active_signals().len(), 9);
}

#[test]
fn test_drain_delivers_highest_score_first() {
    let (engine, clock) = engine();
    assert!(engine.process_signal(&timely("first", &clock)).is_some());

    clock.advance(Duration::seconds(30));
    for (id, relevance) in [("mid", 0.5), ("top", 0.6), ("low", 0.45)] {
        let s = signal(id, SignalDomain::Market, Priority::High, relevance, &clock);
        assert!(engine.evaluate_signal(&s).is_queued());
    }

    // Room for one delivery; the rest hit the minimum gap again.
    clock.advance(Duration::minutes(2));
    let report = engine.process_queue();
    let delivered: Vec<_> = report.delivered.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(delivered, vec!["top"]);
    assert_eq!(report.remaining, 2);

    let queued = engine.queued_signals();
    let ids: Vec<_> = queued.iter().map(|q| q.id()).collect();
    assert_eq!(ids, vec!["mid", "low"]);
    for entry in &queued {
        assert_eq!(entry.attempts, 1);
        assert_eq!(
            entry.reason,
            DeferReason::Fatigue {
                reason: FatigueReason::MinimumGap
            }
        );
    }
}

#[test]
fn test_minimum_gap_defers_second_signal() {
    let (engine, clock) = engine();
    assert!(engine.process_signal(&timely("a", &clock)).is_some());

    clock.advance(Duration::seconds(30));
    match engine.evaluate_signal(&timely("b", &clock)) {
        ProcessOutcome::Queued { reason, .. } => assert_eq!(
            reason,
            DeferReason::Fatigue {
                reason: FatigueReason::MinimumGap
            }
        ),
        other => panic!("expected queued, got {:?}", other),
    }

    clock.advance(Duration::minutes(2));
    assert_eq!(engine.process_queue().delivered.len(), 1);
}

#[test]
fn test_duplicates_and_invalid_rejected() {
    let (engine, clock) = engine();
    let s = timely("dup", &clock);
    assert!(engine.process_signal(&s).is_some());

    clock.advance(Duration::minutes(5));
    assert_eq!(
        engine.evaluate_signal(&s),
        ProcessOutcome::Rejected {
            reason: RejectReason::Duplicate
        }
    );

    let invalid = timely("", &clock);
    assert_eq!(
        engine.evaluate_signal(&invalid),
        ProcessOutcome::Rejected {
            reason: RejectReason::Invalid
        }
    );
    assert_eq!(engine.active_signals().len(), 1);
}

#[test]
fn test_process_raw() {
    let (engine, _clock) = engine();
    assert!(engine.process_raw(serde_json::json!("not an object")).is_none());
    assert!(engine.process_raw(serde_json::json!({"title": "no id"})).is_none());

    let delivered = engine
        .process_raw(serde_json::json!({
            "id": "raw-1",
            "title": "Agency opens consultation",
            "domain": "Regulatory",
            "priority": "critical",
            "relevanceScore": 0.9
        }))
        .expect("delivered");
    assert_eq!(delivered.domain, SignalDomain::Regulatory);
    assert_eq!(delivered.urgency, Urgency::Immediate);
}

#[test]
fn test_snoozed_signals_wait_for_unsnooze() {
    let (engine, clock) = engine();
    engine.snooze_for(Duration::hours(1)).unwrap();
    assert!(engine.is_snoozed());
    assert_eq!(engine.snooze_end(), Some(start() + Duration::hours(1)));

    match engine.evaluate_signal(&timely("s1", &clock)) {
        ProcessOutcome::Queued { reason, .. } => assert_eq!(
            reason,
            DeferReason::Preference {
                reason: DenyReason::Snoozed
            }
        ),
        other => panic!("expected queued, got {:?}", other),
    }

    // Critical signals still get through.
    let critical = signal("c1", SignalDomain::Market, Priority::Critical, 0.5, &clock);
    assert!(engine.process_signal(&critical).is_some());

    clock.advance(Duration::minutes(5));
    assert!(engine.process_queue().delivered.is_empty());

    assert!(engine.unsnooze());
    assert!(!engine.is_snoozed());
    let report = engine.process_queue();
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].id, "s1");
}

#[test]
fn test_focus_holds_out_of_zone_signals_as_batched() {
    let (engine, clock) = engine();
    let zone = engine
        .create_focus_zone(FocusZone::new(
            "Filing deadline",
            vec![SignalDomain::Regulatory],
            clock_now(&clock),
        ))
        .unwrap();
    engine.activate_focus_zone(&zone.id, None).unwrap();
    assert_eq!(engine.active_focus().unwrap().zone_id, zone.id);

    let competitive = signal("comp-1", SignalDomain::Competitive, Priority::Critical, 0.9, &clock);
    match engine.evaluate_signal(&competitive) {
        ProcessOutcome::Queued { signal, reason } => {
            assert_eq!(signal.urgency, Urgency::Batched);
            assert_eq!(
                reason,
                DeferReason::Preference {
                    reason: DenyReason::FocusZone
                }
            );
        }
        other => panic!("expected queued, got {:?}", other),
    }

    let regulatory = signal("reg-1", SignalDomain::Regulatory, Priority::Medium, 0.6, &clock);
    assert!(engine.process_signal(&regulatory).is_some());

    assert!(engine.deactivate_focus());
    clock.advance(Duration::minutes(5));
    let report = engine.process_queue();
    assert_eq!(report.delivered.len(), 1);
    // Urgency is recomputed once the focus no longer applies.
    assert_eq!(report.delivered[0].urgency, Urgency::Immediate);
}

#[test]
fn test_timed_focus_expires_lazily() {
    let (engine, clock) = engine();
    let zone = engine
        .create_focus_zone(FocusZone::new("Sprint", vec![SignalDomain::Technology], clock_now(&clock)))
        .unwrap();
    engine
        .activate_focus_zone(&zone.id, Some(Duration::minutes(30)))
        .unwrap();

    clock.advance(Duration::minutes(31));
    assert!(engine.active_focus().is_none());
    assert!(engine.preferences().active_focus.is_none());
    assert!(engine.process_signal(&timely("m1", &clock)).is_some());
}

#[test]
fn test_disabled_domain_is_held_until_persona_allows_it() {
    let (engine, clock) = engine();
    engine.set_active_persona("compliance").unwrap();

    match engine.evaluate_signal(&timely("m1", &clock)) {
        ProcessOutcome::Queued { reason, .. } => assert_eq!(
            reason,
            DeferReason::Preference {
                reason: DenyReason::DomainDisabled
            }
        ),
        other => panic!("expected queued, got {:?}", other),
    }
    assert_eq!(engine.queued_signals().len(), 1);

    // Still unwanted: kept, not dropped.
    clock.advance(Duration::minutes(5));
    let report = engine.process_queue();
    assert!(report.delivered.is_empty());
    assert_eq!(report.dropped, 0);
    assert_eq!(report.remaining, 1);
    assert_eq!(engine.queued_signals()[0].attempts, 1);

    engine.set_active_persona(DEFAULT_PERSONA_ID).unwrap();
    let report = engine.process_queue();
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].id, "m1");
    assert!(engine.queued_signals().is_empty());
}

#[test]
fn test_override_rule_only_lets_critical_through_quiet_hours() {
    let (engine, clock) = engine();
    let office = vigil_core::QuietHoursConfig::new(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    );
    engine.set_quiet_hours(office).unwrap();
    engine
        .create_alert_rule(
            CustomAlertRule::new("market after hours", clock_now(&clock))
                .with_condition(RuleCondition::new(
                    ConditionField::Domain,
                    ConditionOperator::Equals,
                    "market",
                ))
                .with_action(RuleAction::OverrideQuietHours),
        )
        .unwrap();
    assert!(engine.is_quiet_hours());

    match engine.evaluate_signal(&timely("m-high", &clock)) {
        ProcessOutcome::Queued { reason, .. } => assert_eq!(
            reason,
            DeferReason::Preference {
                reason: DenyReason::QuietHours
            }
        ),
        other => panic!("expected queued, got {:?}", other),
    }

    let critical = signal("m-crit", SignalDomain::Market, Priority::Critical, 0.6, &clock);
    assert!(engine.process_signal(&critical).is_some());
}

#[test]
fn test_low_priority_held_for_digest() {
    let (engine, clock) = engine();
    let low = signal("low-1", SignalDomain::Market, Priority::Low, 0.6, &clock);
    match engine.evaluate_signal(&low) {
        ProcessOutcome::Queued { signal, reason } => {
            assert_eq!(reason, DeferReason::Digest);
            assert_eq!(signal.urgency, Urgency::Digest);
        }
        other => panic!("expected queued, got {:?}", other),
    }

    // Draining leaves digest entries alone.
    assert!(engine.process_queue().delivered.is_empty());
    assert_eq!(engine.queued_signals().len(), 1);

    let digest = engine.take_digest(true).expect("forced digest");
    assert_eq!(digest.signals.len(), 1);
    assert_eq!(digest.clusters.len(), 1);
    assert_eq!(digest.clusters[0].title, "1 market signal");
    assert!(engine.queued_signals().is_empty());
    assert_eq!(engine.budget_status().daily_used, 1);
}

#[test]
fn test_digest_persona_and_schedule() {
    let (engine, clock) = engine();
    engine.set_active_persona("executive").unwrap();

    for id in ["e1", "e2", "e3"] {
        let outcome = engine.evaluate_signal(&timely(id, &clock));
        assert!(outcome.is_queued(), "{:?}", outcome);
    }
    // Below the executive threshold: still ends up in the digest.
    let medium = signal("e4", SignalDomain::Market, Priority::Medium, 0.6, &clock);
    assert!(engine.evaluate_signal(&medium).is_queued());

    // 10:00 is past the 08:00 slot and no digest was sent yet.
    assert!(engine.digest_due());
    let digest = engine.take_digest(false).expect("due");
    assert_eq!(digest.signals.len(), 4);
    assert_eq!(digest.clusters.len(), 1);
    assert_eq!(digest.clusters[0].len(), 4);

    // One budget unit for the whole digest.
    let budget = engine.budget_status();
    assert_eq!(budget.daily_used, 1);
    assert_eq!(budget.daily_limit, 15);

    assert!(!engine.digest_due());
    assert!(engine.take_digest(false).is_none());

    clock.set(Utc.with_ymd_and_hms(2024, 6, 5, 17, 0, 0).unwrap());
    assert!(engine.digest_due());
}

#[test]
fn test_rule_escalates_and_highlights() {
    let (engine, clock) = engine();
    engine
        .create_alert_rule(
            CustomAlertRule::new("Acme moves", clock_now(&clock))
                .with_condition(RuleCondition::new(
                    ConditionField::Competitor,
                    ConditionOperator::Contains,
                    "acme",
                ))
                .with_action(RuleAction::Urgency {
                    level: Urgency::Immediate,
                })
                .with_action(RuleAction::Highlight),
        )
        .unwrap();

    let plain = signal("p1", SignalDomain::Market, Priority::Medium, 0.3, &clock);
    let delivered = engine.process_signal(&plain).unwrap();
    assert_eq!(delivered.urgency, Urgency::Batched);
    assert!(!delivered.highlight);

    clock.advance(Duration::minutes(3));
    let acme = signal("a1", SignalDomain::Market, Priority::Medium, 0.3, &clock)
        .with_competitor("ACME Corp");
    let delivered = engine.process_signal(&acme).unwrap();
    assert_eq!(delivered.urgency, Urgency::Immediate);
    assert!(delivered.highlight);
    assert!(delivered.sound);
}

#[test]
fn test_interactions_feed_learning() {
    let (engine, clock) = engine();
    let s = signal("r1", SignalDomain::Regulatory, Priority::Critical, 0.9, &clock);
    engine.process_signal(&s).unwrap();
    assert!(engine.behavior().is_none());

    assert!(engine.mark_read("r1"));
    let behavior = engine.behavior().unwrap();
    assert!((behavior.read_rate(SignalDomain::Regulatory) - 0.55).abs() < 1e-9);
    assert_eq!(behavior.interaction_count, 1);
    assert_eq!(engine.unread_count(), 0);

    // Reading twice does not learn twice.
    assert!(engine.mark_read("r1"));
    assert_eq!(engine.behavior().unwrap().interaction_count, 1);

    assert!(engine.feedback("r1", 1));
    assert!(!engine.feedback("r1", 3));
    assert!(!engine.mark_read("missing"));
    assert_eq!(engine.behavior().unwrap().helpful_count, 1);
    assert_eq!(engine.signal("r1").unwrap().feedback_score, Some(1));

    assert!(engine.dismiss("r1"));
    assert!(engine.active_signals().is_empty());

    engine.clear_learning_data();
    assert!(engine.behavior().is_none());
}

#[test]
fn test_learning_disabled() {
    let (engine, clock) = engine();
    engine.set_learning_enabled(false);
    engine
        .process_signal(&signal("r1", SignalDomain::Regulatory, Priority::Critical, 0.9, &clock))
        .unwrap();
    assert!(engine.mark_read("r1"));
    assert!(engine.behavior().is_none());
}

#[test]
fn test_persona_management() {
    let (engine, _clock) = engine();
    assert_eq!(engine.active_persona().id, DEFAULT_PERSONA_ID);
    assert_eq!(engine.personas().len(), 5);

    let persona = engine
        .create_persona(Persona::new("Weekend").with_limits(2, 4))
        .unwrap();
    engine.set_active_persona(&persona.id).unwrap();
    assert_eq!(engine.budget_status().hourly_limit, 2);

    assert!(engine.delete_persona("balanced").is_err());
    engine.delete_persona(&persona.id).unwrap();
    assert_eq!(engine.active_persona().id, DEFAULT_PERSONA_ID);
    assert!(engine.set_active_persona("ghost").is_err());
}

#[test]
fn test_rule_management() {
    let (engine, clock) = engine();
    let rule = engine
        .create_alert_rule(CustomAlertRule::new("r", clock_now(&clock)))
        .unwrap();
    assert_eq!(engine.alert_rules().len(), 1);
    assert!(!engine.toggle_alert_rule(&rule.id).unwrap());

    let renamed = CustomAlertRule {
        name: "renamed".to_string(),
        ..rule.clone()
    };
    assert_eq!(engine.update_alert_rule(renamed).unwrap().name, "renamed");
    engine.delete_alert_rule(&rule.id).unwrap();
    assert!(engine.alert_rules().is_empty());
    assert!(engine.delete_alert_rule(&rule.id).is_err());
}

#[test]
fn test_settings_validation_and_reset() {
    let (engine, clock) = engine();
    let bad = vigil_core::QuietHoursConfig::default().with_timezone("Nowhere/Special");
    assert!(engine.set_quiet_hours(bad).is_err());
    assert!(engine.snooze_for(Duration::zero()).is_err());
    assert!(engine.snooze_until(clock_now(&clock) - Duration::minutes(1)).is_err());

    engine.set_active_persona("analyst").unwrap();
    engine.reset_preferences();
    assert_eq!(engine.active_persona().id, DEFAULT_PERSONA_ID);
}

#[test]
fn test_retention_keeps_highest_scores() {
    let clock = Arc::new(ManualClock::new(start()));
    let mut config = VigilConfig::builder().in_memory().build();
    config.retention.max_signals = 3;
    let engine = SignalEngine::new(Arc::new(MemoryStore::new()), clock.clone(), config);

    for (i, relevance) in [0.2, 0.9, 0.4, 0.8, 0.6].into_iter().enumerate() {
        let s = signal(&format!("s{}", i), SignalDomain::Market, Priority::High, relevance, &clock);
        assert!(engine.process_signal(&s).is_some());
        clock.advance(Duration::minutes(3));
    }

    let ids: Vec<_> = engine.active_signals().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["s1", "s3", "s4"]);
}

#[test]
fn test_digest_clusters_held_signals_together() {
    let (engine, clock) = engine();
    for id in ["c1", "c2", "c3"] {
        let s = signal(id, SignalDomain::Competitive, Priority::Low, 0.5, &clock);
        assert!(engine.evaluate_signal(&s).is_queued());
    }

    clock.advance(Duration::hours(1));
    let digest = engine.take_digest(true).expect("forced digest");
    assert_eq!(digest.signals.len(), 3);
    assert_eq!(digest.clusters.len(), 1);
    assert_eq!(digest.clusters[0].len(), 3);
    assert_eq!(digest.clusters[0].title, "3 competitive signals");
    assert_eq!(digest.clusters[0].created_at, start());

    let cluster_id = digest.clusters[0].id.clone();
    assert!(digest.signals.iter().all(|s| s.cluster_id.as_deref() == Some(cluster_id.as_str())));
}

#[test]
fn test_signals_in_same_domain_share_cluster() {
    let (engine, clock) = engine();
    let a = engine.process_signal(&timely("a", &clock)).unwrap();
    clock.advance(Duration::minutes(3));
    let b = engine.process_signal(&timely("b", &clock)).unwrap();
    assert_eq!(a.cluster_id, b.cluster_id);

    let clusters = engine.clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].title, "2 market signals");
}

fn clock_now(clock: &ManualClock) -> DateTime<Utc> {
    use vigil_core::Clock;
    clock.now()
}
