use std::sync::Arc;

use crate::store::{Backend, CartRepositoryAsync};

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<dyn CartRepositoryAsync>,
    pub backend: Backend,
}

impl AppState {
    pub fn new(carts: Arc<dyn CartRepositoryAsync>, backend: Backend) -> Self {
        Self { carts, backend }
    }
}
