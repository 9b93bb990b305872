pub mod delivery;
pub mod mailer;
pub mod payload;
pub mod queue;

pub use delivery::{NotificationDispatcher, ResponseNotificationHandler};
pub use mailer::{EmailGateway, MailerError, UnisenderGateway};
pub use payload::{EmailMessage, ResponseNotification, SenderIdentity};
pub use queue::{Job, JobError, JobHandler, JobId, JobKind, JobQueue, JobReceiver, QueueError, WorkerPool};
