use crate::{
    config::{ConfigurationSource, SmtpConfiguration},
    error::{plain_text_response, ContactFormError, SUCCESS_MESSAGE},
    outbound_email::OutboundEmail,
    submission::{decode_fields, ContactSubmission},
    transport::MailTransport,
};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use tracing::info;

/// Turns one contact form request into at most one email and exactly one response.
///
/// Holds no state between requests: the configuration is read afresh on every call and the
/// transport opens its own connection per message.
pub struct ContactRequestHandler<
    ConfigurationSourceT: ConfigurationSource,
    MailTransportT: MailTransport,
> {
    configuration_source: ConfigurationSourceT,
    transport: MailTransportT,
}

impl<ConfigurationSourceT: ConfigurationSource, MailTransportT: MailTransport>
    ContactRequestHandler<ConfigurationSourceT, MailTransportT>
{
    pub fn new(configuration_source: ConfigurationSourceT, transport: MailTransportT) -> Self {
        Self {
            configuration_source,
            transport,
        }
    }

    pub async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        match self.process_request(&event).await {
            Ok(()) => {
                info!("Contact form message sent");
                Ok(plain_text_response(StatusCode::OK, SUCCESS_MESSAGE))
            }
            Err(error) => {
                error.log();
                Ok(error.into_response())
            }
        }
    }

    async fn process_request(&self, event: &Request) -> Result<(), ContactFormError> {
        if event.method() != Method::POST {
            return Err(ContactFormError::MethodNotAllowed(
                event.method().to_string(),
            ));
        }
        let fields = decode_fields(event)?;
        let submission = ContactSubmission::validate(&fields)?;
        let configuration = SmtpConfiguration::load(&self.configuration_source)?;
        let email = OutboundEmail::compose(&submission, &configuration)?;
        self.send_email(email, &configuration).await
    }

    async fn send_email(
        &self,
        email: OutboundEmail,
        configuration: &SmtpConfiguration,
    ) -> Result<(), ContactFormError> {
        self.transport
            .send(email, configuration)
            .await
            .map_err(ContactFormError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::ContactRequestHandler;
    use crate::{
        config::{
            test_support::{fake_settings, FAKE_RECIPIENT},
            SMTP_HOST, SMTP_PORT, TO_EMAIL,
        },
        error::{
            INTERNAL_ERROR_MESSAGE, INVALID_EMAIL_MESSAGE, MISSING_FIELDS_MESSAGE,
            SUCCESS_MESSAGE,
        },
        outbound_email::OutboundEmail,
        transport::test_support::{RecordingMailTransport, FAKE_TRANSPORT_ERROR},
    };
    use googletest::prelude::*;
    use lambda_http::{http::Method, Body, Request};
    use std::collections::HashMap;

    type ContactRequestHandlerForTesting =
        ContactRequestHandler<HashMap<&'static str, String>, RecordingMailTransport>;

    fn handler() -> ContactRequestHandlerForTesting {
        ContactRequestHandler::new(fake_settings(), RecordingMailTransport::default())
    }

    fn handler_without(key: &'static str) -> ContactRequestHandlerForTesting {
        let mut settings = fake_settings();
        settings.remove(key);
        ContactRequestHandler::new(settings, RecordingMailTransport::default())
    }

    struct FormPayload {
        from_email: String,
        message: String,
    }

    impl FormPayload {
        fn arbitrary() -> Self {
            Self {
                from_email: "test@example.com".into(),
                message: "Hello".into(),
            }
        }

        fn with_from_email(self, from_email: impl AsRef<str>) -> Self {
            Self {
                from_email: from_email.as_ref().into(),
                ..self
            }
        }

        fn with_message(self, message: impl AsRef<str>) -> Self {
            Self {
                message: message.as_ref().into(),
                ..self
            }
        }

        fn into_event(self) -> Request {
            form_event(
                Method::POST,
                format!(
                    "fromEmail={}&message={}",
                    url_encode(&self.from_email),
                    url_encode(&self.message)
                ),
            )
        }
    }

    fn form_event(method: Method, body: String) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::Text(body))
            .unwrap()
    }

    fn url_encode(value: &str) -> String {
        value
            .bytes()
            .map(|byte| match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                    (byte as char).to_string()
                }
                _ => format!("%{byte:02X}"),
            })
            .collect()
    }

    #[googletest::test]
    #[tokio::test]
    async fn sends_one_email_and_returns_200_for_valid_submission() {
        let subject = handler();

        let response = subject
            .handle(FormPayload::arbitrary().into_event())
            .await
            .unwrap();

        expect_that!(response.status().as_u16(), eq(200));
        expect_that!(
            response.body(),
            points_to(matches_pattern!(Body::Text(eq(SUCCESS_MESSAGE))))
        );
        expect_that!(
            subject.transport.sent(),
            elements_are![matches_pattern!(OutboundEmail {
                from: anything(),
                reply_to: displays_as(eq("test@example.com")),
                to: displays_as(eq(FAKE_RECIPIENT)),
                subject: anything(),
                body: contains_substring("Hello"),
            })]
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_400_without_sending_when_fields_are_missing_or_blank() {
        let subject = handler();
        let events = [
            FormPayload::arbitrary().with_from_email("").into_event(),
            FormPayload::arbitrary().with_message("").into_event(),
            FormPayload::arbitrary().with_from_email("   ").into_event(),
            FormPayload::arbitrary().with_message("\n\t ").into_event(),
            form_event(Method::POST, "message=Hello".into()),
            form_event(Method::POST, "".into()),
        ];

        for event in events {
            let response = subject.handle(event).await.unwrap();

            expect_that!(response.status().as_u16(), eq(400));
            expect_that!(
                response.body(),
                points_to(matches_pattern!(Body::Text(eq(MISSING_FIELDS_MESSAGE))))
            );
        }
        expect_that!(subject.transport.sent(), empty());
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_400_without_sending_when_email_is_invalid() {
        let subject = handler();

        for from_email in [
            "not-an-email",
            "a@b@c.com",
            " a@b.com",
            "a@b.com ",
            "Display Name <a@b.com>",
        ] {
            let response = subject
                .handle(FormPayload::arbitrary().with_from_email(from_email).into_event())
                .await
                .unwrap();

            expect_that!(response.status().as_u16(), eq(400));
            expect_that!(
                response.body(),
                points_to(matches_pattern!(Body::Text(eq(INVALID_EMAIL_MESSAGE))))
            );
        }
        expect_that!(subject.transport.sent(), empty());
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_500_without_sending_when_required_setting_is_missing() {
        for key in [SMTP_HOST, SMTP_PORT, TO_EMAIL] {
            let subject = handler_without(key);

            let response = subject
                .handle(FormPayload::arbitrary().into_event())
                .await
                .unwrap();

            expect_that!(response.status().as_u16(), eq(500));
            expect_that!(
                response.body(),
                points_to(matches_pattern!(Body::Text(eq(INTERNAL_ERROR_MESSAGE))))
            );
            expect_that!(subject.transport.sent(), empty());
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_500_without_sending_when_port_is_malformed() {
        let mut settings = fake_settings();
        settings.insert(SMTP_PORT, "submission".into());
        let subject = ContactRequestHandler::new(settings, RecordingMailTransport::default());

        let response = subject
            .handle(FormPayload::arbitrary().into_event())
            .await
            .unwrap();

        expect_that!(response.status().as_u16(), eq(500));
        expect_that!(subject.transport.sent(), empty());
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_500_without_transport_detail_when_sending_fails() {
        let subject = ContactRequestHandler::new(fake_settings(), RecordingMailTransport::failing());

        let response = subject
            .handle(FormPayload::arbitrary().into_event())
            .await
            .unwrap();

        expect_that!(response.status().as_u16(), eq(500));
        expect_that!(
            response.body(),
            points_to(matches_pattern!(Body::Text(
                eq(INTERNAL_ERROR_MESSAGE).and(not(contains_substring(FAKE_TRANSPORT_ERROR)))
            )))
        );
        expect_that!(subject.transport.sent(), len(eq(1)));
    }

    #[googletest::test]
    #[tokio::test]
    async fn identical_submissions_each_send_an_email() {
        let subject = handler();

        subject
            .handle(FormPayload::arbitrary().into_event())
            .await
            .unwrap();
        subject
            .handle(FormPayload::arbitrary().into_event())
            .await
            .unwrap();

        expect_that!(subject.transport.sent(), len(eq(2)));
    }

    #[googletest::test]
    #[tokio::test]
    async fn later_duplicate_field_overrides_earlier_one() {
        let subject = handler();
        let event = form_event(
            Method::POST,
            "fromEmail=not-an-email&message=Hello&fromEmail=test%40example.com".into(),
        );

        let response = subject.handle(event).await.unwrap();

        expect_that!(response.status().as_u16(), eq(200));
        expect_that!(subject.transport.sent(), len(eq(1)));
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_400_when_content_type_is_missing() {
        let subject = handler();
        let event = lambda_http::http::Request::builder()
            .method(Method::POST)
            .body(Body::Text("fromEmail=test%40example.com&message=Hello".into()))
            .unwrap();

        let response = subject.handle(event).await.unwrap();

        expect_that!(response.status().as_u16(), eq(400));
        expect_that!(subject.transport.sent(), empty());
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_400_missing_fields_for_json_body() {
        let subject = handler();
        let event = lambda_http::http::Request::builder()
            .method(Method::POST)
            .header("Content-Type", "application/json")
            .body(Body::Text(
                r#"{"fromEmail":"test@example.com","message":"Hello","newsletter":true}"#.into(),
            ))
            .unwrap();

        let response = subject.handle(event).await.unwrap();

        expect_that!(response.status().as_u16(), eq(400));
        expect_that!(
            response.body(),
            points_to(matches_pattern!(Body::Text(eq(MISSING_FIELDS_MESSAGE))))
        );
        expect_that!(subject.transport.sent(), empty());
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_405_without_sending_for_other_methods() {
        let subject = handler();
        let event = form_event(
            Method::GET,
            "fromEmail=test%40example.com&message=Hello".into(),
        );

        let response = subject.handle(event).await.unwrap();

        expect_that!(response.status().as_u16(), eq(405));
        expect_that!(subject.transport.sent(), empty());
    }
}
