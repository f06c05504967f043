//! Builder patterns for creating raw test messages.

#![allow(dead_code)]

/// Builder for raw RFC 5322 messages.
pub struct MessageBuilder {
    from: String,
    subject: Option<String>,
    message_id: Option<String>,
    text_body: Option<String>,
    html_body: Option<String>,
}

impl MessageBuilder {
    /// Create a new builder with a plain sender and no content.
    pub fn new() -> Self {
        Self {
            from: "Jane Doe <jane@example.com>".to_string(),
            subject: None,
            message_id: None,
            text_body: None,
            html_body: None,
        }
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = from.to_string();
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.text_body = Some(body.to_string());
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html_body = Some(html.to_string());
        self
    }

    /// Build the raw bytes. A message with both text and HTML bodies is
    /// emitted as multipart/alternative.
    pub fn build(self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str("To: support@example.com\r\n");
        if let Some(subject) = &self.subject {
            out.push_str(&format!("Subject: {}\r\n", subject));
        }
        if let Some(id) = &self.message_id {
            out.push_str(&format!("Message-ID: <{}>\r\n", id));
        }
        out.push_str("Date: Wed, 1 May 2024 12:00:00 +0000\r\n");
        out.push_str("MIME-Version: 1.0\r\n");

        match (self.text_body, self.html_body) {
            (Some(text), Some(html)) => {
                out.push_str("Content-Type: multipart/alternative; boundary=\"qd-boundary\"\r\n\r\n");
                out.push_str("--qd-boundary\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n");
                out.push_str(&text);
                out.push_str("\r\n--qd-boundary\r\nContent-Type: text/html; charset=utf-8\r\n\r\n");
                out.push_str(&html);
                out.push_str("\r\n--qd-boundary--\r\n");
            }
            (None, Some(html)) => {
                out.push_str("Content-Type: multipart/mixed; boundary=\"qd-boundary\"\r\n\r\n");
                out.push_str("--qd-boundary\r\nContent-Type: text/html; charset=utf-8\r\n\r\n");
                out.push_str(&html);
                out.push_str("\r\n--qd-boundary--\r\n");
            }
            (text, None) => {
                out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
                out.push_str(&text.unwrap_or_default());
                out.push_str("\r\n");
            }
        }

        out.into_bytes()
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A query-shaped message: "Payment issue" / "I have a problem".
pub fn payment_issue() -> Vec<u8> {
    MessageBuilder::new()
        .subject("Payment issue")
        .body("I have a problem")
        .build()
}

/// A message that contains none of the default keywords.
pub fn newsletter() -> Vec<u8> {
    MessageBuilder::new()
        .from("news@example.com")
        .subject("Newsletter")
        .body("Our weekly updates")
        .build()
}
