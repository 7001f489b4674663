use serde::{Deserialize, Serialize};

/// Messages pushed from the web server to the background worker.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// New queue rows are waiting.
    ProcessQueue,
    /// Platform email to a single recipient (verification, reset, welcome).
    SendEmail(PlatformEmail),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PlatformEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_json() {
        let json = serde_json::to_string(&WorkerMessage::ProcessQueue).unwrap();
        assert_eq!(json, r#"{"type":"process_queue"}"#);

        let email = WorkerMessage::SendEmail(PlatformEmail {
            to: "a@example.com".into(),
            subject: "Verify".into(),
            html: "<p>x</p>".into(),
            text: "x".into(),
        });
        let back: WorkerMessage =
            serde_json::from_str(&serde_json::to_string(&email).unwrap()).unwrap();
        assert_eq!(back, email);
    }
}
