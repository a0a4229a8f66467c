use serde::{Deserialize, Serialize};

/// The identity a session was issued to. There is only ever one, the administrator,
/// so the principal carries no roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

impl Principal {
    pub fn new<S: Into<String>>(username: S) -> Self { Self { username: username.into() } }
}
