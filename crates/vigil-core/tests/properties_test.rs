//! Property tests for scoring, the fatigue budget, preferences and clustering.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use vigil_core::config::{ClusteringConfig, FatigueConfig};
use vigil_core::{
    determine_urgency, BehaviorLearner, ClusterBuilder, DeliveryCounters, FatigueGuard,
    IntelligentPreferences, IntelligentSignal, Interaction, PreferenceEngine, Priority, Signal,
    SignalContext, SignalDomain, SignalScorer, Urgency,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap()
}

fn domain() -> impl Strategy<Value = SignalDomain> {
    proptest::sample::select(SignalDomain::all())
}

fn priority() -> impl Strategy<Value = Priority> {
    proptest::sample::select(vec![
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ])
}

fn urgency() -> impl Strategy<Value = Urgency> {
    proptest::sample::select(vec![
        Urgency::Immediate,
        Urgency::Timely,
        Urgency::Batched,
        Urgency::Digest,
    ])
}

fn interaction() -> impl Strategy<Value = Interaction> {
    prop_oneof![
        Just(Interaction::Read),
        Just(Interaction::Dismiss),
        (-1i8..=1).prop_map(Interaction::Feedback),
    ]
}

proptest! {
    #[test]
    fn sis_is_always_in_range(
        domain in domain(),
        priority in priority(),
        relevance in -10.0f64..10.0,
        age_hours in -100i64..1000,
        history in proptest::collection::vec((domain(), interaction()), 0..20),
    ) {
        let now = base_time();
        let learner = BehaviorLearner::default();
        let behavior = history
            .into_iter()
            .fold(None, |acc, (d, i)| Some(learner.record(acc, d, i, now)));

        let signal = Signal::new("p", "p", domain, priority, relevance, now - Duration::hours(age_hours));
        let sis = SignalScorer::default().calculate_sis(&signal, behavior.as_ref(), now);
        prop_assert!(sis <= 100);
    }

    #[test]
    fn non_finite_relevance_never_panics(domain in domain(), priority in priority()) {
        let now = base_time();
        for relevance in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let signal = Signal::new("p", "p", domain, priority, relevance, now);
            let sis = SignalScorer::default().calculate_sis(&signal, None, now);
            prop_assert!(sis <= 100);
        }
    }

    #[test]
    fn critical_is_always_immediate(sis in 0u8..=100) {
        prop_assert_eq!(determine_urgency(sis, Priority::Critical), Urgency::Immediate);
    }

    #[test]
    fn sis_is_monotonic_in_priority(domain in domain(), relevance in 0.0f64..=1.0, age_hours in 0i64..200) {
        let now = base_time();
        let scorer = SignalScorer::default();
        let score = |p| {
            let signal = Signal::new("p", "p", domain, p, relevance, now - Duration::hours(age_hours));
            scorer.calculate_sis(&signal, None, now)
        };
        prop_assert!(score(Priority::Critical) >= score(Priority::High));
        prop_assert!(score(Priority::High) >= score(Priority::Medium));
        prop_assert!(score(Priority::Medium) >= score(Priority::Low));
    }

    #[test]
    fn urgency_is_monotonic_in_sis(a in 0u8..=100, b in 0u8..=100, priority in priority()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let less = determine_urgency(low, priority);
        let more = determine_urgency(high, priority);
        prop_assert!(!less.is_more_urgent_than(more));
    }

    #[test]
    fn daily_cap_is_never_exceeded(
        daily_limit in 1u32..20,
        attempts in proptest::collection::vec((urgency(), 0i64..600), 1..80),
    ) {
        let guard = FatigueGuard::new(&FatigueConfig::default()).with_limits(100, daily_limit);
        let mut counters = DeliveryCounters::default();
        let mut now = base_time();
        let mut delivered = 0u32;

        for (urgency, gap_secs) in attempts {
            now += Duration::seconds(gap_secs);
            if guard.check(&counters, urgency, now).allowed {
                guard.record_delivery(&mut counters, now);
                delivered += 1;
            }
            prop_assert!(counters.daily_count(now) <= daily_limit);
        }
        // Everything happened within one day.
        prop_assert!(delivered <= daily_limit);
    }

    #[test]
    fn snooze_denies_everything_but_critical(
        domain in domain(),
        priority in priority(),
        minutes_left in 1i64..600,
    ) {
        let now = base_time();
        let prefs = IntelligentPreferences {
            snoozed_until: Some(now + Duration::minutes(minutes_left)),
            ..Default::default()
        };
        let decision = PreferenceEngine::new(&prefs).should_notify(&SignalContext::new(domain, priority), now);
        if priority == Priority::Critical {
            prop_assert!(decision.allowed);
        } else {
            prop_assert!(!decision.allowed);
            prop_assert_eq!(decision.reason, Some(vigil_core::DenyReason::Snoozed));
        }
    }

    #[test]
    fn clusters_never_exceed_max_members(
        arrivals in proptest::collection::vec((domain(), 0i64..90), 1..60),
    ) {
        let builder = ClusterBuilder::new(&ClusteringConfig::default());
        let mut clusters = Vec::new();
        let mut now = base_time();

        for (i, (domain, gap_minutes)) in arrivals.into_iter().enumerate() {
            now += Duration::minutes(gap_minutes);
            let signal = Signal::new(format!("s{}", i), "t", domain, Priority::Medium, 0.5, now);
            let scored = IntelligentSignal::from_signal(&signal, 50, Urgency::Batched, now);
            let id = builder.find_or_create_cluster(&mut clusters, &scored, now);
            prop_assert!(id.is_some());
        }

        for cluster in &clusters {
            prop_assert!(cluster.len() <= builder.max_members());
            prop_assert!(!cluster.is_empty());
        }
    }

    #[test]
    fn learned_rates_stay_in_unit_interval(
        history in proptest::collection::vec((domain(), interaction()), 1..100),
        rate in 0.0f64..=1.0,
    ) {
        let learner = BehaviorLearner::new(rate);
        let now = base_time();
        let mut behavior = None;
        for (domain, interaction) in history {
            behavior = Some(learner.record(behavior, domain, interaction, now));
        }
        let behavior = behavior.unwrap();
        prop_assert!(behavior.is_well_formed());
        for domain in SignalDomain::all() {
            prop_assert!((0.0..=1.0).contains(&behavior.read_rate(domain)));
            prop_assert!((0.0..=1.0).contains(&behavior.dismiss_rate(domain)));
        }
    }
}
