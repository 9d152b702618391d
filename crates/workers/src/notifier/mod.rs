mod channel;
mod chat;
mod push;
mod registry;
mod render;
mod sms;
mod smtp;

pub use channel::{Notifier, NotifyError};
pub use chat::ChatNotifier;
pub use push::PushNotifier;
pub use registry::NotifierRegistry;
pub use render::{render, RenderedContent};
pub use sms::SmsNotifier;
pub use smtp::{SmtpNotifier, SmtpSettings};
