use parking_lot::RwLock;

/// Tells the engine who is acting. `None` or a blank id aborts every operation.
pub trait IdentitySource: Send + Sync {
    fn acting_user_id(&self) -> Option<String>;
}

/// Identity that the hosting layer sets per request (or a test switches at will).
#[derive(Debug, Default)]
pub struct SettableIdentitySource {
    user_id: RwLock<Option<String>>,
}

impl SettableIdentitySource {
    pub fn new(user_id: Option<&str>) -> Self {
        Self {
            user_id: RwLock::new(user_id.map(str::to_string)),
        }
    }

    pub fn set(&self, user_id: Option<&str>) {
        *self.user_id.write() = user_id.map(str::to_string);
    }
}

impl IdentitySource for SettableIdentitySource {
    fn acting_user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }
}
