//! Policy Engine
//!
//! Pure evaluation of one alert against the ordered rule list. Every rule
//! whose condition holds fires exactly once, in rule order; an empty result
//! is a normal outcome, not an error. STATE_FLUSH is a standing policy: it
//! fires from the alert's recommended action, after the configured rules,
//! never from the rule list itself.

use flare_schema::{Alert, RecommendedAction};

use super::types::{MitigationAction, MitigationKind, PolicyActionKind, PolicyRule};

/// Evaluate an alert against the rule list. Side-effect-free; actuation is
/// the dispatcher's job.
pub fn evaluate(alert: &Alert, rules: &[PolicyRule]) -> Vec<MitigationAction> {
    let mut actions = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        match rule.action {
            PolicyActionKind::RateLimitFlag => {
                // Validated at load time: flag and rate are present.
                let (Some(flag), Some(rate)) = (rule.flag, rule.rate) else {
                    continue;
                };
                if flag.is_set(&alert.flags) {
                    actions.push(MitigationAction {
                        kind: MitigationKind::RateLimit { flag, rate },
                        source_rule: Some(index),
                    });
                }
            }
            PolicyActionKind::DropFragment => {
                let Some(frag_type) = &rule.frag_type else {
                    continue;
                };
                if alert.flags.frag {
                    actions.push(MitigationAction {
                        kind: MitigationKind::DropFragment {
                            frag_type: frag_type.clone(),
                        },
                        source_rule: Some(index),
                    });
                }
            }
            // Never configurable; rejected at load time.
            PolicyActionKind::StateFlush => {}
        }
    }

    if alert.recommended_action == RecommendedAction::StateFlush {
        actions.push(MitigationAction {
            kind: MitigationKind::StateFlush {
                target: alert.destination_ip,
            },
            source_rule: None,
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::FlagName;
    use chrono::Utc;
    use flare_schema::TcpFlags;
    use std::net::Ipv4Addr;
    use uuid::Uuid;

    fn alert(flags: TcpFlags, recommended: RecommendedAction) -> Alert {
        Alert {
            alert_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: Ipv4Addr::new(192, 168, 1, 10),
            destination_ip: Ipv4Addr::new(10, 0, 0, 5),
            protocol: "TCP".to_string(),
            flags,
            classifier_confidence: 0.9,
            recommended_action: recommended,
        }
    }

    fn rst_rule(rate: u64) -> PolicyRule {
        PolicyRule {
            action: PolicyActionKind::RateLimitFlag,
            flag: Some(FlagName::RST),
            rate: Some(rate),
            frag_type: None,
        }
    }

    fn frag_rule(frag_type: &str) -> PolicyRule {
        PolicyRule {
            action: PolicyActionKind::DropFragment,
            flag: None,
            rate: None,
            frag_type: Some(frag_type.to_string()),
        }
    }

    #[test]
    fn test_rst_rule_fires_once() {
        let flags = TcpFlags {
            rst: true,
            ..Default::default()
        };
        let actions = evaluate(
            &alert(flags, RecommendedAction::RateLimit),
            &[rst_rule(100)],
        );
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].kind,
            MitigationKind::RateLimit {
                flag: FlagName::RST,
                rate: 100
            }
        );
        assert_eq!(actions[0].source_rule, Some(0));
    }

    #[test]
    fn test_rst_rule_does_not_fire_without_flag() {
        let actions = evaluate(
            &alert(TcpFlags::default(), RecommendedAction::RateLimit),
            &[rst_rule(100)],
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn test_multiple_rules_fire_in_order() {
        let flags = TcpFlags {
            rst: true,
            frag: true,
            ..Default::default()
        };
        let rules = [rst_rule(100), frag_rule("overlap"), rst_rule(50)];
        let actions = evaluate(&alert(flags, RecommendedAction::NoAction), &rules);

        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].source_rule, Some(0));
        assert_eq!(actions[1].source_rule, Some(1));
        assert_eq!(actions[2].source_rule, Some(2));
        assert!(matches!(
            actions[1].kind,
            MitigationKind::DropFragment { .. }
        ));
    }

    #[test]
    fn test_standing_state_flush_fires_from_recommendation() {
        let actions = evaluate(
            &alert(TcpFlags::default(), RecommendedAction::StateFlush),
            &[rst_rule(100)],
        );
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].source_rule, None);
        assert_eq!(
            actions[0].kind,
            MitigationKind::StateFlush {
                target: Ipv4Addr::new(10, 0, 0, 5)
            }
        );
    }

    #[test]
    fn test_no_match_yields_empty_list() {
        let actions = evaluate(
            &alert(TcpFlags::default(), RecommendedAction::NoAction),
            &[rst_rule(100), frag_rule("tiny")],
        );
        assert!(actions.is_empty());
    }
}
