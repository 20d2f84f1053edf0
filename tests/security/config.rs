//! Configuration security tests.
//!
//! The JWT secret may only come from the environment or the command line,
//! and must never surface through `Debug` output or serialized config.

use std::io::Write;
use std::sync::Arc;

use taxiway::config::{Auth, Config, Loader, Overrides};

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

/// A secret written into the TOML file is discarded: without another source
/// loading fails, and with one the other source is used.
#[test]
fn file_secret_is_never_used() {
    let file = config_file("[auth]\njwt_secret = \"should_be_stripped_32_bytes_long!\"\n");
    let loader = Loader::new("SECCFGFILE");

    assert!(loader.load(Some(file.path()), Overrides::default()).is_err());

    let config = loader
        .load(
            Some(file.path()),
            Overrides {
                jwt_secret: Some("cli_override_secret".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(config.auth.jwt_secret, "cli_override_secret");
}

/// Logging a loaded config (the loader does so at debug level) does not
/// print the signing key.
#[test]
fn debug_output_redacts_jwt_secret() {
    let config = Config {
        auth: Auth {
            jwt_secret: "SUPER_SECRET_VALUE".to_string(),
            token_expiry_days: 30,
        },
        ..Default::default()
    };
    let printed = format!("{config:?} {:#?}", config.auth);
    assert!(
        !printed.contains("SUPER_SECRET_VALUE"),
        "Debug output leaks the JWT secret: {printed}"
    );
}

/// Serializing the config (for example to dump effective settings) leaves
/// the secret out.
#[test]
fn serialized_config_omits_jwt_secret() {
    let config = Config {
        auth: Auth {
            jwt_secret: "SUPER_SECRET_VALUE".to_string(),
            token_expiry_days: 30,
        },
        ..Default::default()
    };
    let dumped = toml::to_string(&config).unwrap();
    assert!(!dumped.contains("SUPER_SECRET_VALUE"));
    assert!(!dumped.contains("jwt_secret"));
}

/// Every request's `Context` shares one `Arc<Config>`; the secret is not
/// copied per request.
#[test]
fn config_shared_with_every_request_is_not_copied() {
    let shared: taxiway::SharedConfig = Arc::new(Config {
        auth: Auth {
            jwt_secret: "secret_in_every_request".to_string(),
            token_expiry_days: 30,
        },
        ..Default::default()
    });
    let ctx = taxiway::Context::new(
        taxiway::Method::GET,
        hyper::Uri::from_static("/house-rules"),
        Arc::clone(&shared),
    );
    assert!(Arc::ptr_eq(&shared, &ctx.config));
}
