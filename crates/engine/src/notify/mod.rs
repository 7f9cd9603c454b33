pub mod channel;
pub mod email;
pub mod fanout;
pub mod push;

pub use channel::{EmailDigest, EmailSender, NotifyError, PushPayload, PushSender};
pub use fanout::{FanoutReport, NotificationFanout};
