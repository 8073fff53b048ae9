use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Mailer
///
/// Abstract contract for outbound email. The only message this service sends
/// is the registration verification code. Delivery is fire-and-forget from
/// the caller's perspective: a failed send is logged by the caller and does
/// not fail the surrounding operation.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the verification code to a freshly registered address.
    async fn send_verification(&self, to: &str, code: Uuid) -> Result<(), String>;
}

/// HttpMailer
///
/// Delivers mail through an HTTP email API (Resend/Mailgun style JSON
/// endpoint), authenticated with a bearer key from AppConfig. SMTP is left
/// to the provider; the service only speaks HTTPS outbound.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification(&self, to: &str, code: Uuid) -> Result<(), String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.sender,
                "to": to,
                "subject": "Verify Your Email",
                "text": format!("Your verification code: {code}"),
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("mail provider returned {}", response.status()));
        }
        Ok(())
    }
}

/// MockMailer
///
/// In-memory mailer used by the test suite. Records every send so tests can
/// assert on the delivered code, and can be flipped into a failing mode to
/// exercise the "mail failure does not block registration" path.
#[derive(Default)]
pub struct MockMailer {
    pub should_fail: bool,
    pub sent: std::sync::Mutex<Vec<(String, Uuid)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_verification(&self, to: &str, code: Uuid) -> Result<(), String> {
        if self.should_fail {
            return Err("mock mailer: simulated delivery failure".to_string());
        }
        self.sent
            .lock()
            .expect("mock mailer lock poisoned")
            .push((to.to_string(), code));
        Ok(())
    }
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;
