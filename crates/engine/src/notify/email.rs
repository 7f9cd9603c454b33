use async_trait::async_trait;
use dashmap::DashMap;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use super::channel::{EmailDigest, EmailSender, NotifyError};

/// Owner identity to email address. The real directory lives with the
/// account system; this seam keeps the engine ignorant of it.
pub trait AddressBook: Send + Sync {
    fn lookup(&self, owner: &str) -> Option<String>;
}

#[derive(Clone, Default)]
pub struct MemoryAddressBook {
    addresses: Arc<DashMap<String, String>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, owner: &str, address: &str) {
        self.addresses.insert(owner.to_string(), address.to_string());
    }
}

impl AddressBook for MemoryAddressBook {
    fn lookup(&self, owner: &str) -> Option<String> {
        self.addresses.get(owner).map(|a| a.clone())
    }
}

pub struct SmtpEmailSender {
    from: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    directory: Arc<dyn AddressBook>,
}

impl SmtpEmailSender {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        from: String,
        directory: Arc<dyn AddressBook>,
    ) -> Result<Self, NotifyError> {
        let creds = Credentials::new(username.to_string(), password.to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotifyError(e.to_string()))?
            .port(port)
            .credentials(creds)
            .build();
        Ok(Self {
            from,
            transport,
            directory,
        })
    }
}

fn digest_body(digest: &EmailDigest) -> String {
    let mut body = format!("{} new matching auction(s):\n\n", digest.matches.len());
    for m in &digest.matches {
        body.push_str(&format!(
            "  {}  ${:.2}  (pattern: {})\n",
            m.domain_name,
            m.price,
            if m.pattern_description.is_empty() {
                &m.pattern_id
            } else {
                &m.pattern_description
            }
        ));
    }
    body
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_email(&self, owner: &str, digest: &EmailDigest) -> Result<(), NotifyError> {
        let to = self
            .directory
            .lookup(owner)
            .ok_or_else(|| NotifyError(format!("no address for owner {owner}")))?;

        let subject = format!(
            "[domainwatch] {} new domain match(es)",
            digest.matches.len()
        );

        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError(e.to_string()))?,
            )
            .to(to
                .parse()
                .map_err(|e: lettre::address::AddressError| NotifyError(e.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(digest_body(digest))
            .map_err(|e| NotifyError(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchResult;

    #[test]
    fn address_book_round_trip() {
        let book = MemoryAddressBook::new();
        book.set("alice", "alice@example.com");
        assert_eq!(book.lookup("alice").as_deref(), Some("alice@example.com"));
        assert_eq!(book.lookup("bob"), None);
    }

    #[test]
    fn digest_body_names_domains_and_prices() {
        let digest = EmailDigest::pattern_match(vec![MatchResult {
            auction_id: "a-1".into(),
            domain_name: "aidog.com".into(),
            price: 50.0,
            end_time_ms: 0,
            pattern_id: "p-1".into(),
            pattern_description: "ai names".into(),
        }]);
        let body = digest_body(&digest);
        assert!(body.contains("aidog.com"));
        assert!(body.contains("$50.00"));
        assert!(body.contains("ai names"));
    }
}
