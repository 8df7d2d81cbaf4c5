use anyhow::Result;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use time::macros::format_description;

/// Initialize the global logger at the requested level. Unknown level
/// strings fall back to INFO with a note on stderr.
pub fn setup_logging(log_level: &str) -> Result<()> {
    SimpleLogger::new()
        .with_level(parse_log_level(log_level))
        .with_timestamp_format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .init()?;
    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Unknown log level '{}', using INFO", other);
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_accepts_aliases() {
        assert_eq!(parse_log_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_log_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_log_level("WARNING"), LevelFilter::Warn);
        assert_eq!(parse_log_level("nonsense"), LevelFilter::Info);
    }
}
