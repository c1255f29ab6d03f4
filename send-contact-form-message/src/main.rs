use lambda_http::{run, service_fn, Error};
use send_contact_form_message::{
    ContactRequestHandler, EnvironmentConfigurationSource, LettreMailTransport,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let handler = ContactRequestHandler::new(EnvironmentConfigurationSource, LettreMailTransport);
    run(service_fn(|event| handler.handle(event))).await
}
