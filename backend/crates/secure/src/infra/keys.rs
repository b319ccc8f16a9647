//! In-memory key layout and value codecs
//!
//! Peer instances share the store, so prefixes and value shapes must not
//! change between releases.
//!
//! | Key                         | Value                  |
//! |-----------------------------|------------------------|
//! | `s:<token>`                 | user-id                |
//! | `us:<user-id>`              | set of tokens          |
//! | `spn:<service>:<user-id>`   | `1,2,5`                |
//! | `ipn:<instance>:<user-id>`  | `1,2,5`                |
//! | `uh:<login>`                | `<user-id>\|<hash>`    |
//! | `as:<login>`                | state integer          |

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::messages::in_memory;

use crate::domain::entity::{IdAndHash, Scope};
use crate::domain::value_object::{AccountState, Login, PasswordHash, SessionToken, UserId};

pub const SESSION_PREFIX: &str = "s";
pub const USER_SESSIONS_PREFIX: &str = "us";
pub const ID_AND_HASH_PREFIX: &str = "uh";
pub const ACCOUNT_STATE_PREFIX: &str = "as";

const ID_HASH_SEPARATOR: char = '|';

pub fn session(token: &SessionToken) -> String {
    format!("{SESSION_PREFIX}:{}", token.expose())
}

pub fn user_sessions(user_id: &UserId) -> String {
    format!("{USER_SESSIONS_PREFIX}:{user_id}")
}

pub fn permission_numbers(scope: Scope, name: &str, user_id: &UserId) -> String {
    format!("{}:{name}:{user_id}", scope.prefix())
}

pub fn id_and_hash(login: &Login) -> String {
    format!("{ID_AND_HASH_PREFIX}:{login}")
}

pub fn account_state(login: &Login) -> String {
    format!("{ACCOUNT_STATE_PREFIX}:{login}")
}

/// Glob matching every session entry and every per-user index
pub fn all_sessions_patterns() -> [String; 2] {
    [
        format!("{SESSION_PREFIX}:*"),
        format!("{USER_SESSIONS_PREFIX}:*"),
    ]
}

/// Globs matching every cached permission list of one user
pub fn user_permission_patterns(user_id: &UserId) -> [String; 2] {
    [
        format!("{}:*:{user_id}", Scope::Service.prefix()),
        format!("{}:*:{user_id}", Scope::Instance.prefix()),
    ]
}

/// Glob matching every cached permission list of one service or instance
pub fn scope_permission_pattern(scope: Scope, name: &str) -> String {
    format!("{}:{}:*", scope.prefix(), escape_glob(name))
}

/// Backslash-escape the characters `SCAN MATCH` treats as wildcards
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Any,
    Char(char),
}

fn glob_tokens(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Any,
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            c => Token::Char(c),
        });
    }
    tokens
}

/// Minimal glob used by the in-process store: `*` matches any run of
/// characters, `\` escapes the next one, everything else is literal
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let tokens = glob_tokens(pattern);
    let key: Vec<char> = key.chars().collect();

    let (mut t, mut k) = (0, 0);
    // Last `*` seen and the key position it currently swallows up to
    let mut backtrack: Option<(usize, usize)> = None;
    while k < key.len() {
        match tokens.get(t) {
            Some(Token::Char(c)) if *c == key[k] => {
                t += 1;
                k += 1;
            }
            Some(Token::Any) => {
                backtrack = Some((t, k));
                t += 1;
            }
            _ => match backtrack {
                Some((star, swallowed)) => {
                    backtrack = Some((star, swallowed + 1));
                    t = star + 1;
                    k = swallowed + 1;
                }
                None => return false,
            },
        }
    }
    tokens[t..].iter().all(|token| *token == Token::Any)
}

// ============================================================================
// Value codecs
// ============================================================================

pub fn encode_numbers(numbers: &[i32]) -> String {
    numbers
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_numbers(raw: &str) -> AppResult<Vec<i32>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|n| {
            n.trim()
                .parse::<i32>()
                .map_err(|e| AppError::in_memory(in_memory::NOT_NUMERIC).with_source(e))
        })
        .collect()
}

pub fn encode_id_and_hash(value: &IdAndHash) -> String {
    format!(
        "{}{ID_HASH_SEPARATOR}{}",
        value.user_id,
        value.password_hash.as_str()
    )
}

pub fn decode_id_and_hash(raw: &str) -> AppResult<IdAndHash> {
    let (id, hash) = raw
        .split_once(ID_HASH_SEPARATOR)
        .ok_or_else(|| AppError::in_memory(in_memory::MALFORMED_VALUE))?;
    let user_id = id
        .parse::<UserId>()
        .map_err(|e| AppError::in_memory(in_memory::MALFORMED_VALUE).with_source(e))?;
    let password_hash = PasswordHash::from_hash_string(hash)
        .map_err(|e| AppError::in_memory(in_memory::MALFORMED_VALUE).with_source(e))?;
    Ok(IdAndHash {
        user_id,
        password_hash,
    })
}

pub fn encode_state(state: AccountState) -> String {
    state.id().to_string()
}

pub fn decode_state(raw: &str) -> AppResult<AccountState> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| AppError::in_memory(in_memory::NOT_NUMERIC).with_source(e))?;
    AccountState::try_from(value)
        .map_err(|e| AppError::in_memory(in_memory::MALFORMED_VALUE).with_source(e))
}

pub fn decode_user_id(raw: &str) -> AppResult<UserId> {
    raw.parse::<UserId>()
        .map_err(|e| AppError::in_memory(in_memory::MALFORMED_VALUE).with_source(e))
}
