//! Configuration tests.
//!
//! Verifies secret handling across config layers and checks for
//! accidental secret exposure through `Debug` and serialization.

use std::io::Write;

use subhub::config::{Auth, ConfigLoader, Overrides};

const SECRET: &str = "cli_override_secret_at_least_32_bytes";

fn cli_secret() -> Overrides {
    Overrides {
        jwt_secret: Some(SECRET.to_string()),
        ..Default::default()
    }
}

/// The loader strips `jwt_secret` from TOML files before applying
/// environment and CLI overrides.
#[test]
fn jwt_secret_stripped_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 9090
cors_permissive = true

[auth]
jwt_secret = "file_secret_that_is_long_enough_to_pass"
token_expiry_hours = 7
"#
    )
    .unwrap();

    let loader = ConfigLoader::new("ITCFG_STRIP");
    let config = loader.load(Some(file.path()), &cli_secret()).unwrap();
    assert_eq!(config.auth.jwt_secret, SECRET);
    assert_eq!(config.auth.token_expiry_hours, 7);
    assert_eq!(config.server.port, 9090);
    assert!(config.server.cors_permissive);

    // Without a CLI or env secret the file value does not count.
    let err = loader
        .load(Some(file.path()), &Overrides::default())
        .unwrap_err();
    assert!(err.to_string().contains("ITCFG_STRIP_JWT_SECRET"), "{err}");
}

#[test]
fn debug_output_redacts_jwt_secret() {
    let auth = Auth {
        jwt_secret: "SUPER_SECRET_VALUE".to_string(),
        token_expiry_hours: 24,
    };
    let debug_output = format!("{auth:?}");
    assert!(!debug_output.contains("SUPER_SECRET_VALUE"), "{debug_output}");
}

#[test]
fn serialized_config_omits_secrets() {
    let config = ConfigLoader::new("ITCFG_SER").load(None, &cli_secret()).unwrap();
    let toml = toml::to_string(&config).unwrap();
    assert!(!toml.contains(SECRET), "{toml}");
    assert!(!toml.contains("jwt_secret"), "{toml}");
}

#[test]
fn cli_overrides_defaults() {
    let overrides = Overrides {
        host: Some("127.0.0.1".to_string()),
        port: Some(3000),
        database_url: Some(":memory:".to_string()),
        jwt_secret: Some(SECRET.to_string()),
    };
    let config = ConfigLoader::new("ITCFG_CLI").load(None, &overrides).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.database.url, ":memory:");
}
