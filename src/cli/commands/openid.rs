use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::HashMap;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_CHECK_PATH: &str = "check-path";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_TARGET_PATH: &str = "target-path";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_REQUIRED_ATTRIBUTE: &str = "required-attribute";
pub const ARG_OPTIONAL_ATTRIBUTE: &str = "optional-attribute";
pub const ARG_PROVISION_USERS: &str = "provision-users";
pub const ARG_STATELESS: &str = "stateless";
pub const ARG_LOOPBACK: &str = "loopback";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub check_path: String,
    pub login_path: String,
    pub target_path: String,
    pub session_ttl_seconds: u64,
    pub required_attributes: HashMap<String, String>,
    pub optional_attributes: HashMap<String, String>,
    pub provision_users: bool,
    pub stateless: bool,
    pub loopback: bool,
}

impl Options {
    /// Parse delegated-authentication arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing or an attribute
    /// mapping is malformed.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let base_url = match get_non_empty(ARG_BASE_URL) {
            Some(value) => value,
            None => anyhow::bail!("missing required argument: --{ARG_BASE_URL}"),
        };
        let check_path = match get_non_empty(ARG_CHECK_PATH) {
            Some(value) => value,
            None => anyhow::bail!("missing required argument: --{ARG_CHECK_PATH}"),
        };
        let login_path = match get_non_empty(ARG_LOGIN_PATH) {
            Some(value) => value,
            None => anyhow::bail!("missing required argument: --{ARG_LOGIN_PATH}"),
        };
        let target_path = match get_non_empty(ARG_TARGET_PATH) {
            Some(value) => value,
            None => anyhow::bail!("missing required argument: --{ARG_TARGET_PATH}"),
        };

        let session_ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(43200);

        Ok(Self {
            base_url,
            check_path,
            login_path,
            target_path,
            session_ttl_seconds,
            required_attributes: collect_attributes(matches, ARG_REQUIRED_ATTRIBUTE)?,
            optional_attributes: collect_attributes(matches, ARG_OPTIONAL_ATTRIBUTE)?,
            provision_users: matches.get_flag(ARG_PROVISION_USERS),
            stateless: matches.get_flag(ARG_STATELESS),
            loopback: matches.get_flag(ARG_LOOPBACK),
        })
    }
}

fn collect_attributes(matches: &ArgMatches, id: &str) -> anyhow::Result<HashMap<String, String>> {
    matches
        .get_many::<String>(id)
        .into_iter()
        .flatten()
        .map(|raw| parse_attribute(raw))
        .collect()
}

/// Split an `alias=type-uri` attribute mapping.
fn parse_attribute(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((alias, type_uri)) = raw.split_once('=') else {
        anyhow::bail!("invalid attribute mapping {raw:?}: expected alias=type-uri");
    };
    let alias = alias.trim();
    let type_uri = type_uri.trim();
    if alias.is_empty() || type_uri.is_empty() {
        anyhow::bail!("invalid attribute mapping {raw:?}: expected alias=type-uri");
    }
    Ok((alias.to_string(), type_uri.to_string()))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_endpoint_args(command);
    with_exchange_args(command)
}

fn with_endpoint_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL of this service, used for the CORS origin and cookie flags")
                .env("DELEGI_BASE_URL")
                .default_value("http://localhost:8000"),
        )
        .arg(
            Arg::new(ARG_CHECK_PATH)
                .long(ARG_CHECK_PATH)
                .help("Path the delegated-authentication interceptor claims")
                .env("DELEGI_CHECK_PATH")
                .default_value(crate::openid::DEFAULT_CHECK_PATH),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Path users are sent back to after a failed authentication")
                .env("DELEGI_LOGIN_PATH")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_TARGET_PATH)
                .long(ARG_TARGET_PATH)
                .help("Path users are sent to after a successful authentication")
                .env("DELEGI_TARGET_PATH")
                .default_value("/"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("DELEGI_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_exchange_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REQUIRED_ATTRIBUTE)
                .long(ARG_REQUIRED_ATTRIBUTE)
                .help("alias=type-uri attribute the provider must return (repeatable)")
                .env("DELEGI_REQUIRED_ATTRIBUTES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_OPTIONAL_ATTRIBUTE)
                .long(ARG_OPTIONAL_ATTRIBUTE)
                .help("alias=type-uri attribute the provider may return (repeatable)")
                .env("DELEGI_OPTIONAL_ATTRIBUTES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_PROVISION_USERS)
                .long(ARG_PROVISION_USERS)
                .help("Create unknown identities on first sign-in instead of rejecting them")
                .env("DELEGI_PROVISION_USERS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_STATELESS)
                .long(ARG_STATELESS)
                .help("Skip session rotation after authentication")
                .env("DELEGI_STATELESS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_LOOPBACK)
                .long(ARG_LOOPBACK)
                .help("Wire the built-in loopback relying party (development only)")
                .env("DELEGI_LOOPBACK")
                .action(ArgAction::SetTrue),
        )
}
