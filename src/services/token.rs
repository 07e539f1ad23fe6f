use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process session token store.
///
/// Tokens are opaque 32-byte random hex strings mapped 1:1 to a user id. A
/// token exists until revoked; there is no expiry and no tombstone state.
/// Each store owns its map outright, so tests can instantiate independent
/// stores without shared globals.
pub struct TokenStore {
    tokens: RwLock<HashMap<String, i32>>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh token bound to `user_id`.
    ///
    /// A user may hold any number of live tokens. Collisions are regenerated
    /// under the same write guard, so no two live tokens ever collide.
    pub async fn issue(&self, user_id: i32) -> String {
        let mut tokens = self.tokens.write().await;
        loop {
            let token = generate_token();
            if !tokens.contains_key(&token) {
                tokens.insert(token.clone(), user_id);
                return token;
            }
        }
    }

    /// Resolve a token to the user id it was issued for.
    pub async fn resolve(&self, token: &str) -> Option<i32> {
        self.tokens.read().await.get(token).copied()
    }

    /// Remove a token. Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a random session token (64 character hex string, 256 bits)
#[must_use]
fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
