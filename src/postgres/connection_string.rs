//! Connection string parsing.
//!
//! Accepts the Npgsql keyword form (`Host=db;Port=5432;Username=app;...`) as
//! well as the URL and space-separated key/value forms tokio-postgres parses
//! natively.

use std::str::FromStr;
use std::time::Duration;

use tokio_postgres::Config;
use tokio_postgres::config::{SslMode, TargetSessionAttrs};

use crate::error::SyrxDbError;

/// Keywords Npgsql understands that have no tokio-postgres counterpart.
const IGNORED_KEYWORDS: &[&str] = &[
    "pooling",
    "minpoolsize",
    "maxpoolsize",
    "minimumpoolsize",
    "maximumpoolsize",
    "connectionidlelifetime",
    "connectionpruninginterval",
    "connectionlifetime",
    "commandtimeout",
    "internalcommandtimeout",
    "includeerrordetail",
    "trustservercertificate",
    "enlist",
    "multiplexing",
    "maxautoprepare",
    "autoprepareminusages",
    "nobackslashescapes",
    "persistsecurityinfo",
];

/// Parse a connection string into a tokio-postgres [`Config`] without connecting.
///
/// # Errors
/// Returns `SyrxDbError::DriverError` for an empty string, a segment without
/// `=`, an unterminated quote, an unsupported keyword, or a value that does
/// not parse.
pub fn parse_connection_string(connection_string: &str) -> Result<Config, SyrxDbError> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(SyrxDbError::DriverError(
            "connection string is empty".to_string(),
        ));
    }

    if is_libpq_form(trimmed) {
        return Config::from_str(trimmed).map_err(|e| {
            SyrxDbError::DriverError(format!("invalid connection string: {e}"))
        });
    }

    let mut config = Config::new();
    for (keyword, value) in split_pairs(trimmed)? {
        apply_keyword(&mut config, &keyword, &value)?;
    }
    Ok(config)
}

/// URLs, and `key=value` pairs separated by whitespace. A single `;`-free
/// segment such as `Password=a=b` stays in the keyword form.
fn is_libpq_form(s: &str) -> bool {
    s.starts_with("postgres://")
        || s.starts_with("postgresql://")
        || (!s.contains(';') && s.split_whitespace().filter(|t| t.contains('=')).count() > 1)
}

fn apply_keyword(config: &mut Config, keyword: &str, value: &str) -> Result<(), SyrxDbError> {
    let normalized: String = keyword
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    match normalized.as_str() {
        "host" | "server" => {
            for host in value.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                config.host(host);
            }
        }
        "port" => {
            config.port(parse_number(keyword, value)?);
        }
        "database" | "db" | "dbname" => {
            config.dbname(value);
        }
        "username" | "userid" | "user" | "uid" => {
            config.user(value);
        }
        "password" | "pwd" | "psw" => {
            config.password(value);
        }
        "timeout" | "connecttimeout" | "connect_timeout" => {
            let seconds: u64 = parse_number(keyword, value)?;
            if seconds > 0 {
                config.connect_timeout(Duration::from_secs(seconds));
            }
        }
        "applicationname" | "application_name" => {
            config.application_name(value);
        }
        "options" => {
            config.options(value);
        }
        "keepalive" => {
            let seconds: u64 = parse_number(keyword, value)?;
            if seconds == 0 {
                config.keepalives(false);
            } else {
                config.keepalives(true);
                config.keepalives_idle(Duration::from_secs(seconds));
            }
        }
        "sslmode" => {
            config.ssl_mode(parse_ssl_mode(value)?);
        }
        "targetsessionattributes" | "target_session_attrs" => {
            config.target_session_attrs(parse_target_session_attrs(value)?);
        }
        other if IGNORED_KEYWORDS.contains(&other) => {
            tracing::debug!(keyword, "ignoring connection string keyword");
        }
        _ => {
            return Err(SyrxDbError::DriverError(format!(
                "unsupported connection string keyword '{keyword}'"
            )));
        }
    }
    Ok(())
}

fn parse_number<T: FromStr>(keyword: &str, value: &str) -> Result<T, SyrxDbError> {
    value.parse().map_err(|_| {
        SyrxDbError::DriverError(format!(
            "invalid value '{value}' for connection string keyword '{keyword}'"
        ))
    })
}

fn parse_ssl_mode(value: &str) -> Result<SslMode, SyrxDbError> {
    match value.to_ascii_lowercase().replace('-', "").as_str() {
        "disable" => Ok(SslMode::Disable),
        "allow" | "prefer" => Ok(SslMode::Prefer),
        "require" | "verifyca" | "verifyfull" => Ok(SslMode::Require),
        _ => Err(SyrxDbError::DriverError(format!(
            "invalid SSL mode '{value}'"
        ))),
    }
}

fn parse_target_session_attrs(value: &str) -> Result<TargetSessionAttrs, SyrxDbError> {
    match value.to_ascii_lowercase().as_str() {
        "any" => Ok(TargetSessionAttrs::Any),
        "read-write" | "primary" => Ok(TargetSessionAttrs::ReadWrite),
        _ => Err(SyrxDbError::DriverError(format!(
            "unsupported target session attributes '{value}'"
        ))),
    }
}

/// Split `key=value;key='quoted;value'` pairs. Quotes are escaped by doubling.
fn split_pairs(s: &str) -> Result<Vec<(String, String)>, SyrxDbError> {
    let mut pairs = Vec::new();
    let mut rest = s;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix(';') {
            rest = after;
            continue;
        }

        let segment_end = rest.find(';').unwrap_or(rest.len());
        let Some(eq) = rest[..segment_end].find('=') else {
            return Err(SyrxDbError::DriverError(format!(
                "connection string segment '{}' is missing '='",
                rest[..segment_end].trim()
            )));
        };
        let keyword = rest[..eq].trim();
        if keyword.is_empty() {
            return Err(SyrxDbError::DriverError(
                "connection string contains an empty keyword".to_string(),
            ));
        }

        let after_eq = rest[eq + 1..].trim_start();
        let (value, remaining) = match after_eq.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                let (value, remaining) = read_quoted(&after_eq[1..], quote)?;
                let remaining = remaining.trim_start();
                if !(remaining.is_empty() || remaining.starts_with(';')) {
                    return Err(SyrxDbError::DriverError(format!(
                        "unexpected text after quoted value for '{keyword}'"
                    )));
                }
                (value, remaining)
            }
            _ => match after_eq.split_once(';') {
                Some((value, remaining)) => (value.trim().to_string(), remaining),
                None => (after_eq.trim().to_string(), ""),
            },
        };

        pairs.push((keyword.to_string(), value));
        rest = remaining;
    }

    Ok(pairs)
}

fn read_quoted(s: &str, quote: char) -> Result<(String, &str), SyrxDbError> {
    let mut value = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != quote {
            value.push(c);
            continue;
        }
        if chars.peek().is_some_and(|&(_, next)| next == quote) {
            value.push(quote);
            chars.next();
            continue;
        }
        return Ok((value, &s[idx + c.len_utf8()..]));
    }
    Err(SyrxDbError::DriverError(
        "connection string contains an unterminated quote".to_string(),
    ))
}
