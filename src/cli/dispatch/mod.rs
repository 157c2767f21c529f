//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::openid;
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);

    let openid_opts = openid::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        base_url: openid_opts.base_url,
        check_path: openid_opts.check_path,
        login_path: openid_opts.login_path,
        target_path: openid_opts.target_path,
        session_ttl_seconds: openid_opts.session_ttl_seconds,
        required_attributes: openid_opts.required_attributes,
        optional_attributes: openid_opts.optional_attributes,
        provision_users: openid_opts.provision_users,
        stateless: openid_opts.stateless,
        loopback: openid_opts.loopback,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_server_action() {
        temp_env::with_vars(
            [
                ("DELEGI_PORT", None::<&str>),
                ("DELEGI_BASE_URL", None::<&str>),
                ("DELEGI_REQUIRED_ATTRIBUTES", None::<&str>),
                ("DELEGI_LOOPBACK", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["delegi"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8000);
                    assert_eq!(args.base_url, "http://localhost:8000");
                    assert_eq!(args.check_path, "/login_check_openid");
                    assert!(args.required_attributes.is_empty());
                    assert!(!args.loopback);
                }
            },
        );
    }

    #[test]
    fn malformed_attribute_mappings_surface_as_errors() {
        temp_env::with_vars(
            [("DELEGI_REQUIRED_ATTRIBUTES", Some("email-without-uri"))],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["delegi"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("invalid attribute mapping"));
                }
            },
        );
    }
}
