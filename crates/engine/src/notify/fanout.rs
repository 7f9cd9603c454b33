//! Per-owner notification fan-out: however many patterns matched however
//! many auctions this run, each owner receives at most one push and one
//! email, and one owner's delivery failure never touches another's.

use std::collections::HashMap;
use std::sync::Arc;

use super::channel::{EmailDigest, EmailSender, NotifyError, PushPayload, PushSender};
use crate::matching::MatchResult;

/// How many domain names the push body names before collapsing to "+K more".
pub const DEFAULT_SUMMARY_CAP: usize = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub users_notified: u64,
    pub notifications_sent: u64,
    pub deliveries_failed: u64,
}

pub struct NotificationFanout {
    push: Option<Arc<dyn PushSender>>,
    email: Option<Arc<dyn EmailSender>>,
    summary_cap: usize,
}

impl NotificationFanout {
    pub fn new(push: Option<Arc<dyn PushSender>>, email: Option<Arc<dyn EmailSender>>) -> Self {
        Self {
            push,
            email,
            summary_cap: DEFAULT_SUMMARY_CAP,
        }
    }

    pub fn with_summary_cap(mut self, cap: usize) -> Self {
        self.summary_cap = cap.max(1);
        self
    }

    pub async fn dispatch(
        &self,
        matches_by_owner: &HashMap<String, Vec<MatchResult>>,
    ) -> FanoutReport {
        let mut report = FanoutReport::default();

        for (owner, matches) in matches_by_owner {
            if matches.is_empty() {
                continue;
            }
            let mut delivered = false;

            if let Some(push) = &self.push {
                let payload = self.build_push(matches);
                match push.send_push(owner, &payload).await {
                    Ok(()) => {
                        delivered = true;
                        report.notifications_sent += 1;
                    }
                    Err(e) => {
                        report.deliveries_failed += 1;
                        log_failure(push.name(), owner, &e);
                    }
                }
            }

            if let Some(email) = &self.email {
                let digest = EmailDigest::pattern_match(matches.clone());
                match email.send_email(owner, &digest).await {
                    Ok(()) => {
                        delivered = true;
                        report.notifications_sent += 1;
                    }
                    Err(e) => {
                        report.deliveries_failed += 1;
                        log_failure(email.name(), owner, &e);
                    }
                }
            }

            if delivered {
                report.users_notified += 1;
            }
        }

        report
    }

    fn build_push(&self, matches: &[MatchResult]) -> PushPayload {
        PushPayload {
            title: format!("{} new domain match(es)", matches.len()),
            body: summarize(matches, self.summary_cap),
            tag: "pattern-match".into(),
            url: "/alerts".into(),
        }
    }
}

fn log_failure(channel: &str, owner: &str, err: &NotifyError) {
    tracing::warn!(channel, owner, error = %err, "delivery failed, continuing with other owners");
}

/// First `cap` names joined, then "+K more" when there are more.
fn summarize(matches: &[MatchResult], cap: usize) -> String {
    let named: Vec<&str> = matches
        .iter()
        .take(cap)
        .map(|m| m.domain_name.as_str())
        .collect();
    let mut body = named.join(", ");
    if matches.len() > cap {
        body.push_str(&format!(" +{} more", matches.len() - cap));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;

    fn result(name: &str) -> MatchResult {
        MatchResult {
            auction_id: format!("a-{name}"),
            domain_name: name.into(),
            price: 10.0,
            end_time_ms: 0,
            pattern_id: "p-1".into(),
            pattern_description: String::new(),
        }
    }

    #[derive(Default)]
    struct CapturePush {
        sent: DashMap<String, Vec<PushPayload>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl PushSender for CapturePush {
        fn name(&self) -> &str {
            "capture-push"
        }

        async fn send_push(&self, owner: &str, payload: &PushPayload) -> Result<(), NotifyError> {
            if self.fail_for.as_deref() == Some(owner) {
                return Err(NotifyError("boom".into()));
            }
            self.sent
                .entry(owner.to_string())
                .or_default()
                .push(payload.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CaptureEmail {
        sent: DashMap<String, Vec<EmailDigest>>,
    }

    #[async_trait]
    impl EmailSender for CaptureEmail {
        fn name(&self) -> &str {
            "capture-email"
        }

        async fn send_email(&self, owner: &str, digest: &EmailDigest) -> Result<(), NotifyError> {
            self.sent
                .entry(owner.to_string())
                .or_default()
                .push(digest.clone());
            Ok(())
        }
    }

    #[test]
    fn summary_caps_at_three_names() {
        let matches: Vec<MatchResult> = (0..10).map(|i| result(&format!("d{i}.com"))).collect();
        let body = summarize(&matches, 3);
        assert_eq!(body, "d0.com, d1.com, d2.com +7 more");
    }

    #[test]
    fn summary_without_overflow_has_no_suffix() {
        let matches = vec![result("a.com"), result("b.com")];
        assert_eq!(summarize(&matches, 3), "a.com, b.com");
    }

    #[tokio::test]
    async fn ten_matches_one_push() {
        let push = Arc::new(CapturePush::default());
        let fanout = NotificationFanout::new(Some(push.clone()), None);

        let mut per_owner = HashMap::new();
        per_owner.insert(
            "alice".to_string(),
            (0..10).map(|i| result(&format!("d{i}.com"))).collect(),
        );

        let report = fanout.dispatch(&per_owner).await;
        assert_eq!(report.users_notified, 1);
        assert_eq!(report.notifications_sent, 1);

        let sent = push.sent.get("alice").unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "d0.com, d1.com, d2.com +7 more");
    }

    #[tokio::test]
    async fn one_owner_failure_does_not_block_others() {
        let push = Arc::new(CapturePush {
            fail_for: Some("alice".into()),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(Some(push.clone()), None);

        let mut per_owner = HashMap::new();
        per_owner.insert("alice".to_string(), vec![result("a.com")]);
        per_owner.insert("bob".to_string(), vec![result("b.com")]);

        let report = fanout.dispatch(&per_owner).await;
        assert_eq!(report.users_notified, 1);
        assert_eq!(report.deliveries_failed, 1);
        assert!(push.sent.get("bob").is_some());
        assert!(push.sent.get("alice").is_none());
    }

    #[tokio::test]
    async fn push_and_email_both_dispatched_once_per_owner() {
        let push = Arc::new(CapturePush::default());
        let email = Arc::new(CaptureEmail::default());
        let fanout = NotificationFanout::new(Some(push.clone()), Some(email.clone()));

        let mut per_owner = HashMap::new();
        per_owner.insert("alice".to_string(), vec![result("a.com"), result("b.com")]);

        let report = fanout.dispatch(&per_owner).await;
        assert_eq!(report.users_notified, 1);
        assert_eq!(report.notifications_sent, 2);
        assert_eq!(push.sent.get("alice").unwrap().len(), 1);
        let digests = email.sent.get("alice").unwrap();
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].matches.len(), 2);
        assert_eq!(digests[0].kind, "pattern_match");
    }

    #[tokio::test]
    async fn owners_with_no_matches_get_nothing() {
        let push = Arc::new(CapturePush::default());
        let fanout = NotificationFanout::new(Some(push.clone()), None);

        let mut per_owner = HashMap::new();
        per_owner.insert("alice".to_string(), Vec::new());

        let report = fanout.dispatch(&per_owner).await;
        assert_eq!(report, FanoutReport::default());
        assert!(push.sent.is_empty());
    }
}
