pub mod config;
pub mod email_address;
pub mod error;
pub mod handler;
pub mod outbound_email;
pub mod submission;
pub mod transport;

pub use config::{ConfigurationSource, EnvironmentConfigurationSource, SmtpConfiguration};
pub use handler::ContactRequestHandler;
pub use transport::{LettreMailTransport, MailTransport};
