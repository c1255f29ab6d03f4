use log::{debug, warn};
use mailin::SessionBuilder;
use mailin_embedded::{response, Action, AuthMechanism, Handler, Response, Server, SslConfig};
use std::{
    io::{BufRead, BufReader},
    net::{IpAddr, TcpListener, TcpStream},
    sync::{Arc, Once},
    time::Duration,
};
use tokio::{
    sync::watch::{self, error::RecvError, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;
/// Nothing listens here, so connections are refused.
pub const UNUSED_SMTP_PORT: u16 = 4569;
pub const AUTHENTICATING_SMTP_PORT: u16 = 4570;

const SERVER_NAME: &str = "fake-smtp.localhost";
const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// One message as the fake server saw it: the SMTP envelope, the account the client logged in
/// as, and the raw content with headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceivedMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub authenticated_as: Option<String>,
    pub content: String,
}

struct RecordingSmtpHandler {
    mail: ReceivedMail,
    content: Vec<u8>,
    published: Arc<Sender<ReceivedMail>>,
}

impl RecordingSmtpHandler {
    fn new(published: Arc<Sender<ReceivedMail>>) -> Self {
        Self {
            mail: ReceivedMail::default(),
            content: Vec::new(),
            published,
        }
    }

    fn authenticated(&mut self, username: &str) -> Response {
        debug!("Client authenticated as {username}");
        self.mail.authenticated_as = Some(username.into());
        response::AUTH_OK
    }
}

impl Handler for RecordingSmtpHandler {
    fn data_start(&mut self, _domain: &str, from: &str, _is8bit: bool, to: &[String]) -> Response {
        debug!("Got envelope from {from} to {to:?}");
        self.mail.sender = from.into();
        self.mail.recipients = to.to_vec();
        self.content.clear();
        response::OK
    }

    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.content.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> Response {
        let mail = ReceivedMail {
            content: String::from_utf8_lossy(&self.content).into_owned(),
            ..self.mail.clone()
        };
        debug!("Got data:\n{}", mail.content);
        let _ = self.published.send(mail);
        response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> Response {
        if password.is_empty() {
            return response::INVALID_CREDENTIALS;
        }
        self.authenticated(authentication_id)
    }

    fn auth_login(&mut self, username: &str, password: &str) -> Response {
        if password.is_empty() {
            return response::INVALID_CREDENTIALS;
        }
        self.authenticated(username)
    }
}

/// An SMTP server without TLS which accepts every message and publishes the most recent one.
///
/// Connections are served one at a time on a background thread.
pub struct FakeSmtpServer {
    port: u16,
    requires_authentication: bool,
    started: Once,
    published: Arc<Sender<ReceivedMail>>,
    receiver: tokio::sync::Mutex<Receiver<ReceivedMail>>,
}

impl FakeSmtpServer {
    /// Listens on [`SMTP_PORT`] and accepts mail from anonymous clients.
    pub fn new() -> Self {
        Self::listening_on(SMTP_PORT, false)
    }

    /// Listens on [`AUTHENTICATING_SMTP_PORT`] and only accepts mail after `AUTH PLAIN` or
    /// `AUTH LOGIN`, which it offers without TLS.
    pub fn requiring_authentication() -> Self {
        Self::listening_on(AUTHENTICATING_SMTP_PORT, true)
    }

    fn listening_on(port: u16, requires_authentication: bool) -> Self {
        let (sender, receiver) = watch::channel(ReceivedMail::default());
        Self {
            port,
            requires_authentication,
            started: Once::new(),
            published: Arc::new(sender),
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts serving on a background thread. Subsequent calls do nothing.
    pub fn start(&self) {
        self.started.call_once(|| {
            let listener = TcpListener::bind(("127.0.0.1", self.port)).unwrap();
            let mut session_builder = SessionBuilder::new(SERVER_NAME);
            if self.requires_authentication {
                session_builder
                    .enable_auth(AuthMechanism::Plain)
                    .enable_auth(AuthMechanism::Login)
                    .insecure_enable_plaintext_auth();
            }
            let published = self.published.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let handler = RecordingSmtpHandler::new(published.clone());
                    let result = stream.and_then(|stream| {
                        serve_connection(stream, &session_builder, handler)
                    });
                    if let Err(error) = result {
                        warn!("Fake SMTP connection failed: {error}");
                    }
                }
            });
        });
    }

    /// Waits for the next message to arrive.
    pub async fn last_mail(&self) -> Result<ReceivedMail, RecvError> {
        let mut receiver = self.receiver.lock().await;
        receiver.changed().await?;
        let mail = receiver.borrow_and_update().clone();
        drop(receiver);
        Ok(mail)
    }

    /// Waits for the next message to arrive and returns its content, headers included.
    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        Ok(self.last_mail().await?.content)
    }

    /// Discards a message left over from a previous test, if any.
    pub async fn flush(&self) {
        let mut receiver = self.receiver.lock().await;
        let _ = timeout(Duration::from_millis(100), receiver.changed()).await;
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

fn serve_connection(
    stream: TcpStream,
    session_builder: &SessionBuilder,
    handler: RecordingSmtpHandler,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(CLIENT_IDLE_TIMEOUT))?;
    let remote = stream.peer_addr()?.ip();
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut session = session_builder.build(remote, handler);
    session.greeting().write_to(&mut writer)?;

    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        let response = session.process(&line);
        match response.action {
            Action::Reply => response.write_to(&mut writer)?,
            Action::Close => {
                response.write_to(&mut writer)?;
                return Ok(());
            }
            Action::NoReply => (),
            // STARTTLS is never offered.
            Action::UpgradeTls => return Ok(()),
        }
    }
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> Response {
        response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> Response {
        response::INTERNAL_ERROR
    }
}

/// Starts an SMTP server on [`POISONED_SMTP_PORT`] which rejects every session.
pub fn start_poisoned_smtp_server() {
    static STARTED: Once = Once::new();
    STARTED.call_once(|| {
        let mut server = Server::new(PoisonedSmtpHandler);
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("127.0.0.1:{POISONED_SMTP_PORT}"))
            .unwrap();
        std::thread::spawn(move || {
            let _ = server.serve();
        });
    });
}
