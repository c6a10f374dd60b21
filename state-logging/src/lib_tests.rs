//! Unit tests for the logging crate

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::io;

    #[test]
    fn test_logging_error_config() {
        let error = LoggingError::Config("Invalid log level".to_string());
        assert_eq!(error.to_string(), "Configuration error: Invalid log level");

        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Config"));
    }

    #[test]
    fn test_logging_error_io() {
        let error = LoggingError::from(io::Error::new(io::ErrorKind::NotFound, "File not found"));
        assert!(error.to_string().contains("I/O error"));
        assert!(matches!(error, LoggingError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.writes_to_terminal());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let config = LoggingConfig {
            level: "info,pulsestate_core=loud".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LoggingError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_file_prefix() {
        for prefix in ["", "logs/state", "logs\\state"] {
            let config = LoggingConfig {
                output: LogOutput::File {
                    directory: "logs".into(),
                    file_prefix: prefix.to_string(),
                },
                ..Default::default()
            };
            assert!(config.validate().is_err(), "prefix {prefix:?} accepted");
        }
    }

    #[test]
    fn test_config_deserialization() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{
                "level": "debug",
                "format": "json",
                "output": {"type": "file", "directory": "/var/log/app", "file_prefix": "state"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(
            config.output,
            LogOutput::File {
                directory: "/var/log/app".into(),
                file_prefix: "state".to_string(),
            }
        );
        assert!(!config.writes_to_terminal());
        assert!(config.ansi);
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"output": {"type": "stderr"}}"#).unwrap();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_file_output_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested");
        let config = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Json,
            output: LogOutput::File {
                directory: log_dir.clone(),
                file_prefix: "state".to_string(),
            },
            ansi: true,
        };

        let (subscriber, guard) = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(total = 42u64, "Evicted stale interval buckets");
            tracing::trace!("filtered out");
        });
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("state."), "unexpected file {name}");

        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("Evicted stale interval buckets"));
        assert!(contents.contains("42"));
        if std::env::var("RUST_LOG").is_err() {
            assert!(!contents.contains("filtered out"));
        }
    }

    #[test]
    fn test_terminal_subscribers_build() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let config = LoggingConfig {
                format,
                output: LogOutput::Stderr,
                ..Default::default()
            };
            let (_subscriber, _guard) = build_subscriber(&config).unwrap();
        }
    }
}
