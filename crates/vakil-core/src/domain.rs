/// WhatsApp sender identity (E.164 phone number without `+`, as delivered by
/// the Cloud API). Used as both the rate-limit key and the delivery target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a chat-history row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// A single inbound chat message, already extracted from the webhook payload.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender: SenderId,
    pub text: String,
}
