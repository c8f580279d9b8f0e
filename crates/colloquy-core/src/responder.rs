//! Reply generation boundary.
//!
//! A `Responder` turns the user's text into reply text. It holds no
//! conversation state and performs no writes; the conversation service
//! persists whatever it returns. `KeywordResponder` is the built-in policy,
//! a production backend plugs in behind the same trait.

use colloquy_types::error::ResponderError;

/// Text-in/text-out reply generator.
pub trait Responder: Send + Sync {
    /// Produce a reply for `user_text`.
    ///
    /// Backends that cannot be reached must return
    /// [`ResponderError::Unavailable`] so callers can tell outages apart
    /// from bad output.
    fn respond(
        &self,
        user_text: &str,
    ) -> impl std::future::Future<Output = Result<String, ResponderError>> + Send;
}

pub const GREETING_REPLY: &str = "Hello! How can I assist you today?";

pub const HELP_REPLY: &str = "I'm here to help. What questions do you have?";

pub const CONFIGURATION_REPLY: &str = "To configure your device, please follow these steps:\n\n\
1. Connect to the admin panel using the IP address 192.168.1.1\n\
2. Login with your administrator credentials\n\
3. Navigate to the 'Settings' tab\n\
4. Adjust your configuration as needed";

pub const FIRMWARE_REPLY: &str = "Yes, you can update the firmware remotely. Please follow these steps:\n\n\
1. Ensure your device is connected to the internet\n\
2. Access the admin panel\n\
3. Go to 'System' > 'Updates'\n\
4. Click 'Check for Updates'\n\
5. If an update is available, click 'Download and Install'";

pub const CREDENTIALS_REPLY: &str = "Your administrator credentials should have been provided with your device. \
If you've lost them, you can:\n\n\
1. Check the documentation that came with your device\n\
2. Look for a sticker on the device itself\n\
3. Contact customer support with your device serial number";

/// Ordered keyword table. First category with a matching keyword wins.
const CATEGORIES: &[(&[&str], &str)] = &[
    (&["hello", "hi"], GREETING_REPLY),
    (&["help"], HELP_REPLY),
    (&["configure", "configuration"], CONFIGURATION_REPLY),
    (&["update", "firmware"], FIRMWARE_REPLY),
    (&["credentials", "password"], CREDENTIALS_REPLY),
];

/// Keyword-matching responder.
///
/// Matching is a case-insensitive substring test, so "this" matches "hi".
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResponder;

impl KeywordResponder {
    pub fn new() -> Self {
        Self
    }

    /// The reply for `user_text`, computed synchronously.
    pub fn reply_for(&self, user_text: &str) -> String {
        let lowered = user_text.to_lowercase();
        CATEGORIES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, reply)| (*reply).to_string())
            .unwrap_or_else(|| fallback_reply(user_text))
    }
}

/// Template reply quoting the original input verbatim.
pub fn fallback_reply(user_text: &str) -> String {
    format!(
        "Thank you for your message: \"{user_text}\". I'm processing your request and will get back to you shortly."
    )
}

impl Responder for KeywordResponder {
    async fn respond(&self, user_text: &str) -> Result<String, ResponderError> {
        Ok(self.reply_for(user_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_greeting() {
        let reply = KeywordResponder::new().respond("Hello there").await.unwrap();
        assert_eq!(reply, GREETING_REPLY);
    }

    #[test]
    fn test_configuration() {
        let r = KeywordResponder::new();
        assert_eq!(r.reply_for("please configure the device"), CONFIGURATION_REPLY);
        assert_eq!(r.reply_for("Where is the CONFIGURATION page?"), CONFIGURATION_REPLY);
    }

    #[test]
    fn test_fallback_preserves_case() {
        let r = KeywordResponder::new();
        let reply = r.reply_for("xyz123");
        assert!(reply.contains("\"xyz123\""));

        let reply = r.reply_for("Route ABC to Zone 9");
        assert!(reply.contains("\"Route ABC to Zone 9\""));
    }

    #[test]
    fn test_first_category_wins() {
        let r = KeywordResponder::new();
        // "hello" beats "password".
        assert_eq!(r.reply_for("hello, I forgot my password"), GREETING_REPLY);
        // "help" beats "firmware".
        assert_eq!(r.reply_for("need help with firmware"), HELP_REPLY);
        // "configure" beats "update".
        assert_eq!(r.reply_for("configure the update server"), CONFIGURATION_REPLY);
    }

    #[test]
    fn test_each_category() {
        let r = KeywordResponder::new();
        assert_eq!(r.reply_for("Help!"), HELP_REPLY);
        assert_eq!(r.reply_for("new firmware?"), FIRMWARE_REPLY);
        assert_eq!(r.reply_for("lost credentials"), CREDENTIALS_REPLY);
    }

    #[test]
    fn test_hi_matches_as_substring() {
        assert_eq!(KeywordResponder::new().reply_for("is this on"), GREETING_REPLY);
    }
}
