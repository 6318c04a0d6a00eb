mod handler;
mod model;

pub use handler::{check_phone, delete_me, login, logout, register, update_me};
pub use model::{CheckPhoneResponse, SessionResponse};
