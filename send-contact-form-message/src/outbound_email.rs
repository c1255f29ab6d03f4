use crate::{
    config::{SmtpConfiguration, SMTP_USER},
    error::{ConfigurationError, ContactFormError},
    submission::ContactSubmission,
};
use lettre::Address;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

pub const SUBJECT: &str = "New message from the blog contact form";

const BODY_TEMPLATE_NAME: &str = "email-body";
const BODY_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/email-body.txt"
));

#[derive(Serialize)]
struct Context<'a> {
    from_email: &'a str,
    message: &'a str,
}

/// The email relayed for one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: Address,
    pub reply_to: Address,
    pub to: Address,
    pub subject: String,
    pub body: String,
}

impl OutboundEmail {
    /// Sends from the relay account when one is configured, otherwise from the submitter. Replies
    /// always go to the submitter.
    pub fn compose(
        submission: &ContactSubmission,
        configuration: &SmtpConfiguration,
    ) -> Result<Self, ContactFormError> {
        let from = match configuration.username.as_deref() {
            Some(username) => {
                username
                    .parse::<Address>()
                    .map_err(|_| ConfigurationError::InvalidAddress {
                        key: SMTP_USER,
                        value: username.into(),
                    })?
            }
            None => submission.from_email.clone(),
        };
        let from_email: &str = submission.from_email.as_ref();
        let body = render_body(from_email, &submission.message)
            .map_err(|error| ContactFormError::Rendering(error.to_string()))?;

        Ok(Self {
            from,
            reply_to: submission.from_email.clone(),
            to: configuration.recipient.clone(),
            subject: SUBJECT.into(),
            body,
        })
    }
}

fn render_body(from_email: &str, message: &str) -> Result<String, tinytemplate::error::Error> {
    let mut tt = TinyTemplate::new();
    // Plain text, so nothing gets HTML-escaped.
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(BODY_TEMPLATE_NAME, BODY_TEMPLATE)?;
    tt.render(
        BODY_TEMPLATE_NAME,
        &Context {
            from_email,
            message,
        },
    )
}
