//! Gmail REST backend: OAuth2 installed-app flow plus a blocking ureq client
//! exposed through the async `MailService` trait.

mod auth;
mod client;
mod credentials;

pub use auth::GmailAuth;
pub use client::GmailClient;
pub use credentials::GmailCredentials;

/// Gmail API response and request bodies not covered by the shared wire types.
pub(crate) mod api {
    use serde::{Deserialize, Serialize};

    use ratgmail_core::{Label, MessageRef};

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        #[serde(default)]
        pub messages: Option<Vec<MessageRef>>,
        #[serde(default)]
        pub result_size_estimate: Option<u32>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct ListLabelsResponse {
        #[serde(default)]
        pub labels: Option<Vec<Label>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        #[serde(default)]
        pub data: String,
    }

    #[derive(Debug, Serialize)]
    pub struct SendRequest {
        pub raw: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyRequest {
        pub add_label_ids: Vec<String>,
        pub remove_label_ids: Vec<String>,
    }
}
