use lambda_http::{
    http::{
        header::{ALLOW, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    Body, Response,
};
use std::fmt::Display;
use tracing::{error, warn};

pub const SUCCESS_MESSAGE: &str = "Thank you! Your message has been sent successfully.";
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: fromEmail and message";
pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email address";
pub const MALFORMED_BODY_MESSAGE: &str = "Malformed request body";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
pub const INTERNAL_ERROR_MESSAGE: &str = "Sorry, something went wrong. Please try again later.";

/// Everything which can stop a submission from turning into an email.
///
/// Only [`ContactFormError::Validation`] and [`ContactFormError::MethodNotAllowed`] produce a
/// specific message for the caller. Configuration, rendering and transport problems are the
/// operator's concern: their detail goes to the log and the caller gets a generic 500.
#[derive(Debug)]
pub enum ContactFormError {
    MethodNotAllowed(String),
    Validation(ValidationError),
    Configuration(ConfigurationError),
    /// The email body template could not be rendered.
    Rendering(String),
    Transport(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MalformedBody(String),
    MissingFields,
    InvalidEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    Missing(&'static str),
    InvalidPort(String),
    InvalidTlsFlag(String),
    InvalidTimeout(String),
    InvalidAddress { key: &'static str, value: String },
}

impl ContactFormError {
    pub fn log(&self) {
        match self {
            ContactFormError::MethodNotAllowed(_) | ContactFormError::Validation(_) => {
                warn!("Rejected contact form submission: {self}");
            }
            ContactFormError::Configuration(_)
            | ContactFormError::Rendering(_)
            | ContactFormError::Transport(_) => {
                error!("Internal error sending contact form email: {self}");
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ContactFormError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ContactFormError::Validation(_) => StatusCode::BAD_REQUEST,
            ContactFormError::Configuration(_)
            | ContactFormError::Rendering(_)
            | ContactFormError::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn into_response(self) -> Response<Body> {
        let message = match &self {
            ContactFormError::MethodNotAllowed(_) => METHOD_NOT_ALLOWED_MESSAGE,
            ContactFormError::Validation(ValidationError::MalformedBody(_)) => {
                MALFORMED_BODY_MESSAGE
            }
            ContactFormError::Validation(ValidationError::MissingFields) => MISSING_FIELDS_MESSAGE,
            ContactFormError::Validation(ValidationError::InvalidEmail(_)) => INVALID_EMAIL_MESSAGE,
            ContactFormError::Configuration(_)
            | ContactFormError::Rendering(_)
            | ContactFormError::Transport(_) => {
                INTERNAL_ERROR_MESSAGE
            }
        };
        let mut response = plain_text_response(self.status(), message);
        if let ContactFormError::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

pub fn plain_text_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

impl From<ValidationError> for ContactFormError {
    fn from(value: ValidationError) -> Self {
        ContactFormError::Validation(value)
    }
}

impl From<ConfigurationError> for ContactFormError {
    fn from(value: ConfigurationError) -> Self {
        ContactFormError::Configuration(value)
    }
}

impl Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::MethodNotAllowed(method) => {
                write!(f, "Method {method} not allowed")
            }
            ContactFormError::Validation(error) => write!(f, "Client error: {error}"),
            ContactFormError::Configuration(error) => write!(f, "Configuration error: {error}"),
            ContactFormError::Rendering(error) => write!(f, "Error rendering email body: {error}"),
            ContactFormError::Transport(error) => write!(f, "Error sending message: {error:#}"),
        }
    }
}

impl std::error::Error for ContactFormError {}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MalformedBody(detail) => write!(f, "Malformed body: {detail}"),
            ValidationError::MissingFields => write!(f, "Missing fields in request"),
            ValidationError::InvalidEmail(email) => write!(f, "Invalid email address {email:?}"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::Missing(key) => write!(f, "Missing setting {key}"),
            ConfigurationError::InvalidPort(value) => write!(f, "Invalid SMTP port {value:?}"),
            ConfigurationError::InvalidTlsFlag(value) => {
                write!(f, "Invalid TLS flag {value:?}, expected true or false")
            }
            ConfigurationError::InvalidTimeout(value) => {
                write!(f, "Invalid SMTP timeout {value:?}")
            }
            ConfigurationError::InvalidAddress { key, value } => {
                write!(f, "Setting {key} is not a valid email address: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}
