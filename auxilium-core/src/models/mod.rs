mod ai_log;
mod call;
mod location;
mod operator;
mod session;
mod update;
mod user;

pub use ai_log::AiLog;
pub use call::Call;
pub use location::Location;
pub use operator::Operator;
pub use session::{EmergencySession, SessionStatus};
pub use update::SessionUpdate;
pub use user::User;
