//! Level filtering: `log.level` plus `log.level.<target>` overrides, as an
//! `EnvFilter` directive string.

use tracing_subscriber::EnvFilter;

use logward_core::LogSettings;

use crate::error::SinkError;

/// `"<root>,<target>=<level>,…"`
pub fn filter_directives(settings: &LogSettings) -> String {
    let mut directives = vec![settings.level.as_directive().to_string()];
    directives.extend(
        settings
            .target_levels
            .iter()
            .map(|(target, level)| format!("{target}={}", level.as_directive())),
    );
    directives.join(",")
}

pub fn build_filter(settings: &LogSettings) -> Result<EnvFilter, SinkError> {
    Ok(EnvFilter::try_new(filter_directives(settings))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::LevelSetting;

    #[test]
    fn root_level_only() {
        let settings = LogSettings {
            level: LevelSetting::Warn,
            ..LogSettings::default()
        };
        assert_eq!(filter_directives(&settings), "warn");
    }

    #[test]
    fn target_overrides_follow_root() {
        let mut settings = LogSettings::default();
        settings
            .target_levels
            .insert("my_app::db".to_string(), LevelSetting::Trace);
        settings
            .target_levels
            .insert("hyper".to_string(), LevelSetting::Off);
        assert_eq!(
            filter_directives(&settings),
            "info,hyper=off,my_app::db=trace"
        );
        assert!(build_filter(&settings).is_ok());
    }

    #[test]
    fn unparseable_target_is_an_error() {
        let mut settings = LogSettings::default();
        settings
            .target_levels
            .insert("bad[target".to_string(), LevelSetting::Debug);
        assert!(matches!(build_filter(&settings), Err(SinkError::Filter(_))));
    }
}
