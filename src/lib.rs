use std::sync::Arc;

pub mod client_state;
pub mod config;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod store;
pub mod utils;

use config::Config;
use registry::{SiblingRegistry, UniquenessGuard};
use store::{IdentityStore, TicketStore};

#[derive(Clone)]
pub struct AppState {
    pub identities: Arc<dyn IdentityStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub sibling: Arc<dyn SiblingRegistry>,
    pub config: Config,
}

impl AppState {
    /// 注册守卫按本实例的注册表角色组装
    pub fn guard(&self) -> UniquenessGuard {
        UniquenessGuard::new(
            self.identities.clone(),
            self.sibling.clone(),
            self.config.registry_role,
        )
    }
}
