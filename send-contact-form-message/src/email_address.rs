use crate::error::ValidationError;
use lettre::{message::Mailbox, Address};

/// Parses `input` as a bare email address.
///
/// The input goes through lettre's mailbox parser, which is lenient: it accepts display names,
/// comments and surrounding whitespace. The address is only accepted if it carries no display
/// name and its canonical form is exactly `input`.
pub fn parse_strict(input: &str) -> Result<Address, ValidationError> {
    let invalid = || ValidationError::InvalidEmail(input.into());
    let mailbox: Mailbox = input.parse().map_err(|_| invalid())?;
    if mailbox.name.is_some() || AsRef::<str>::as_ref(&mailbox.email) != input {
        return Err(invalid());
    }
    Ok(mailbox.email)
}
