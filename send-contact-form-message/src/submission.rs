use crate::{email_address::parse_strict, error::ValidationError};
use lambda_http::{http::header::CONTENT_TYPE, Request, RequestPayloadExt};
use lettre::Address;
use std::collections::HashMap;

pub const FROM_EMAIL_FIELD: &str = "fromEmail";
pub const MESSAGE_FIELD: &str = "message";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decodes the form fields of the request body.
///
/// Decoding into a map means a key given more than once keeps its last value. Only
/// `application/x-www-form-urlencoded` bodies are read; any other request has no fields.
pub fn decode_fields(event: &Request) -> Result<HashMap<String, String>, ValidationError> {
    if !is_form(event) {
        return Ok(HashMap::new());
    }
    match event.payload::<HashMap<String, String>>() {
        Ok(fields) => Ok(fields.unwrap_or_default()),
        Err(error) => Err(ValidationError::MalformedBody(error.to_string())),
    }
}

fn is_form(event: &Request) -> bool {
    event
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// A contact form submission whose fields have passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub from_email: Address,
    pub message: String,
}

impl ContactSubmission {
    pub fn validate(fields: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let from_email = field(fields, FROM_EMAIL_FIELD);
        let message = field(fields, MESSAGE_FIELD);
        if from_email.trim().is_empty() || message.trim().is_empty() {
            return Err(ValidationError::MissingFields);
        }

        Ok(Self {
            from_email: parse_strict(from_email)?,
            message: message.into(),
        })
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or_default()
}
