//! Mail I/O: IMAP inbound, SMTP outbound.

pub mod email;

pub use email::{EmailConfig, ImapInbox, SmtpSender};
