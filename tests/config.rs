use courier::cli::{Cli, Command};
use courier::config::{Config, WriterTarget};
use courier::identifier::NamespacedKey;
use courier::FanOut;
use figment::Jail;
use std::path::PathBuf;

const FULL_CONFIG: &str = r#"
    log_level = "debug"
    fan_out = "concurrent"

    [transports.writer]
    key = "console"
    target = { file = "/var/log/courier.log" }

    [transports.slack]
    token = "xoxb-123"
    timeout_seconds = 3

    [[users]]
    key = "rufus"
    [users.identities]
    username = "rufus"
    "slack.com/id" = "U123"
    "gitlab.com/id" = 42
    [users.preferences."com.example.one"]
    console = true
    slack = false
"#;

// Every load runs inside a `Jail`, whose lock keeps one test's env overrides
// out of the others.
fn cli_for(file: &str) -> Cli {
    Cli {
        config: Some(PathBuf::from(file)),
        ..Default::default()
    }
}

#[test]
fn test_load_full_valid_config() {
    Jail::expect_with(|jail| {
        jail.create_file("courier.toml", FULL_CONFIG)?;

        let config = Config::load(&cli_for("courier.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.fan_out, FanOut::Concurrent);
        assert!(!config.validate_on_startup);

        let writer = config.transports.writer.as_ref().unwrap();
        assert_eq!(writer.key, "console");
        assert_eq!(
            writer.target,
            WriterTarget::File(PathBuf::from("/var/log/courier.log"))
        );

        let slack = config.transports.slack.as_ref().unwrap();
        assert_eq!(slack.key, "slack"); // Not in the toml, so it should be the default value
        assert_eq!(slack.token, "xoxb-123");
        assert_eq!(slack.api_url, "https://slack.com/api");
        assert_eq!(slack.timeout_seconds, 3);

        assert_eq!(config.users.len(), 1);
        let rufus = &config.users[0];
        assert_eq!(rufus.key, "rufus");
        assert_eq!(
            rufus.identities.get(&NamespacedKey::parse("slack.com/id").unwrap()),
            Some("U123")
        );
        assert_eq!(
            rufus.identities.get(&NamespacedKey::parse("gitlab.com/id").unwrap()),
            Some("42")
        );
        assert!(rufus.wants(&"com.example.one".into(), &"console".into()));
        assert!(!rufus.wants(&"com.example.one".into(), &"slack".into()));
        Ok(())
    });
}

#[test]
fn test_defaults_without_file() {
    Jail::expect_with(|_jail| {
        let config =
            Config::load(&cli_for("/nonexistent/courier.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "info");
        assert_eq!(config.fan_out, FanOut::Sequential);
        assert!(config.transports.writer.is_none());
        assert!(config.transports.slack.is_none());
        assert!(config.users.is_empty());
        Ok(())
    });
}

#[test]
fn test_cli_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("courier.toml", "log_level = \"warn\"\nfan_out = \"sequential\"\n")?;
        let cli = Cli {
            config: Some(PathBuf::from("courier.toml")),
            log_level: Some("trace".to_string()),
            concurrent: true,
            command: Some(Command::Validate),
        };

        let config = Config::load(&cli).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.fan_out, FanOut::Concurrent);
        assert!(config.validate_on_startup);
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "courier.toml",
            "log_level = \"warn\"\n[transports.slack]\ntoken = \"from-file\"\n",
        )?;
        jail.set_env("COURIER_LOG_LEVEL", "debug");
        jail.set_env("COURIER_TRANSPORTS__SLACK__TOKEN", "from-env");

        let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.transports.slack.unwrap().token, "from-env");
        Ok(())
    });
}

#[test]
fn test_env_overrides_do_not_outlive_their_jail() {
    Jail::expect_with(|jail| {
        jail.set_env("COURIER_LOG_LEVEL", "debug");
        jail.set_env("COURIER_TRANSPORTS__SLACK__TOKEN", "from-env");
        Ok(())
    });

    Jail::expect_with(|_jail| {
        let config =
            Config::load(&cli_for("/nonexistent/courier.toml")).map_err(|e| e.to_string())?;

        assert_eq!(config.log_level, "info");
        assert!(config.transports.slack.is_none());
        Ok(())
    });
}

#[test]
fn test_invalid_identity_key_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "courier.toml",
            r#"
            [[users]]
            key = "broken"
            [users.identities]
            "slack.com/" = "U123"
            "#,
        )?;

        assert!(Config::load(&cli_for("courier.toml")).is_err());
        Ok(())
    });
}
