use rand::Rng;

/// Entity kinds the server mints identifiers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Activity,
    User,
}

impl IdentifierKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdentifierKind::Activity => "activity",
            IdentifierKind::User => "user",
        }
    }
}

/// Generate a server-side identifier: `{kind}_{unix_seconds}_{8 hex chars}`.
/// Not globally unique; two calls in the same second collide with
/// probability 2^-32.
pub fn generate_identifier(kind: IdentifierKind) -> String {
    generate_identifier_at(kind, chrono::Utc::now().timestamp())
}

pub fn generate_identifier_at(kind: IdentifierKind, unix_seconds: i64) -> String {
    format!("{}_{}_{}", kind.prefix(), unix_seconds, random_hex(4))
}

/// Generate `n` random bytes and return as hex string.
fn random_hex(n: usize) -> String {
    let bytes: Vec<u8> = (0..n).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex::encode(&bytes)
}
