//! Cross-device session consolidation.
//!
//! Every sub-entity resolves by timestamp, so merging the same candidate set
//! repeatedly converges on the same result.

use crate::types::Session;

/// Merge `candidates` into `target`.
///
/// - Preferences: taken wholesale from the candidate with the latest
///   `last_activity` (earliest candidate wins ties).
/// - Conversation contexts: union by id, strictly later `last_analyzed` wins.
/// - Behavior patterns: union by type, strictly later `last_updated` wins.
/// - Personalizations: merged section by section, candidates in order.
///
/// Does not touch activity bookkeeping; the caller records the merge.
pub fn merge_into(target: &mut Session, candidates: &[Session]) {
    if let Some(latest) = latest_candidate(candidates) {
        target.preferences = latest.preferences.clone();
    }

    for candidate in candidates {
        for (conversation_id, context) in &candidate.conversation_contexts {
            let newer = target
                .conversation_contexts
                .get(conversation_id)
                .is_none_or(|existing| context.last_analyzed > existing.last_analyzed);
            if newer {
                target
                    .conversation_contexts
                    .insert(conversation_id.clone(), context.clone());
            }
        }

        for (pattern_type, pattern) in &candidate.behavior_patterns {
            let newer = target
                .behavior_patterns
                .get(pattern_type)
                .is_none_or(|existing| pattern.last_updated > existing.last_updated);
            if newer {
                target
                    .behavior_patterns
                    .insert(pattern_type.clone(), pattern.clone());
            }
        }

        target.personalizations.merge(&candidate.personalizations);
    }
}

fn latest_candidate(candidates: &[Session]) -> Option<&Session> {
    let mut iter = candidates.iter();
    let mut latest = iter.next()?;
    for candidate in iter {
        if candidate.last_activity > latest.last_activity {
            latest = candidate;
        }
    }
    Some(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn t(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn session(id: &str, last_activity: DateTime<Utc>) -> Session {
        Session {
            id: id.into(),
            user_id: "u1".into(),
            start_time: t(0),
            last_activity,
            end_time: None,
            session_duration: 0,
            is_active: false,
            interaction_count: 0,
            preferences: Preferences::default(),
            conversation_contexts: BTreeMap::new(),
            behavior_patterns: BTreeMap::new(),
            personalizations: Personalizations::default(),
            metadata: SessionMetadata::default(),
        }
    }

    fn context(intent: &str, at: DateTime<Utc>) -> ConversationContext {
        ConversationContext {
            topics: vec!["crawl".into()],
            intent: intent.into(),
            expertise_level: ExpertiseLevel::Intermediate,
            sentiment: Sentiment::Neutral,
            last_analyzed: at,
        }
    }

    #[test]
    fn test_preferences_latest_wins_wholesale() {
        let mut target = session("target", t(0));
        target.preferences.language = "fr".into();

        let mut phone = session("phone", t(30));
        phone.preferences.theme = Theme::Dark;
        let mut laptop = session("laptop", t(10));
        laptop.preferences.theme = Theme::Light;
        laptop.preferences.language = "de".into();

        merge_into(&mut target, &[laptop, phone]);

        assert_eq!(target.preferences.theme, Theme::Dark);
        assert_eq!(target.preferences.language, "en");
    }

    #[test]
    fn test_preferences_tie_keeps_first_candidate() {
        let mut target = session("target", t(0));
        let mut a = session("a", t(5));
        a.preferences.theme = Theme::Light;
        let mut b = session("b", t(5));
        b.preferences.theme = Theme::Dark;

        merge_into(&mut target, &[a, b]);
        assert_eq!(target.preferences.theme, Theme::Light);
    }

    #[test]
    fn test_contexts_union_later_wins() {
        let mut target = session("target", t(0));
        target
            .conversation_contexts
            .insert("c1".into(), context("resident", t(20)));

        let mut other = session("other", t(1));
        other
            .conversation_contexts
            .insert("c1".into(), context("older", t(10)));
        other
            .conversation_contexts
            .insert("c2".into(), context("new", t(5)));

        merge_into(&mut target, &[other]);

        assert_eq!(target.conversation_contexts.len(), 2);
        assert_eq!(target.conversation_contexts["c1"].intent, "resident");
        assert_eq!(target.conversation_contexts["c2"].intent, "new");
    }

    #[test]
    fn test_patterns_equal_timestamp_keeps_resident() {
        let mut target = session("target", t(0));
        let mut resident = BehaviorPattern::new("dark_mode", t(10));
        resident.frequency = 7;
        target
            .behavior_patterns
            .insert("dark_mode".into(), resident);

        let mut other = session("other", t(1));
        let mut tie = BehaviorPattern::new("dark_mode", t(10));
        tie.frequency = 1;
        other.behavior_patterns.insert("dark_mode".into(), tie);
        let mut later = BehaviorPattern::new("shortcuts", t(12));
        later.frequency = 3;
        other.behavior_patterns.insert("shortcuts".into(), later);

        merge_into(&mut target, &[other]);

        assert_eq!(target.behavior_patterns["dark_mode"].frequency, 7);
        assert_eq!(target.behavior_patterns["shortcuts"].frequency, 3);
    }

    #[test]
    fn test_personalizations_applied_in_order() {
        let mut target = session("target", t(0));
        let mut first = session("first", t(1));
        first
            .personalizations
            .adaptive_settings
            .insert("layout".into(), SettingValue::nested([("cols", 2), ("rows", 1)]));
        let mut second = session("second", t(2));
        second
            .personalizations
            .adaptive_settings
            .insert("layout".into(), SettingValue::nested([("cols", 3)]));

        merge_into(&mut target, &[first, second]);

        let SettingValue::Nested(layout) = &target.personalizations.adaptive_settings["layout"]
        else {
            panic!("expected nested layout");
        };
        assert_eq!(layout["cols"], serde_json::json!(3));
        assert_eq!(layout["rows"], serde_json::json!(1));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut a = session("a", t(3));
        a.preferences.theme = Theme::Dark;
        a.conversation_contexts.insert("c1".into(), context("x", t(3)));
        a.behavior_patterns
            .insert("p".into(), BehaviorPattern::new("p", t(3)));
        let mut b = session("b", t(4));
        b.conversation_contexts.insert("c1".into(), context("y", t(4)));

        let candidates = vec![a, b];
        let mut once = session("target", t(0));
        merge_into(&mut once, &candidates);
        let mut twice = once.clone();
        merge_into(&mut twice, &candidates);

        assert_eq!(once.preferences, twice.preferences);
        assert_eq!(once.conversation_contexts, twice.conversation_contexts);
        assert_eq!(once.behavior_patterns, twice.behavior_patterns);
        assert_eq!(once.personalizations, twice.personalizations);
    }

    #[test]
    fn test_no_candidates_leaves_target() {
        let mut target = session("target", t(0));
        target.preferences.theme = Theme::Dark;
        let before = target.clone();
        merge_into(&mut target, &[]);
        assert_eq!(target, before);
    }
}
