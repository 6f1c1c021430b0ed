//! `logward check`: validate a settings file and show what it resolves to.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use logward_core::settings::keys;
use logward_core::{LogSettings, Settings};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Settings file (`.properties`, `.yaml` or `.yml`).
    pub file: PathBuf,

    /// Emit the effective configuration as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let settings = Settings::load(&self.file)
            .with_context(|| format!("failed to load {}", self.file.display()))?;
        let typed = LogSettings::from_settings(&settings)
            .with_context(|| format!("invalid settings in {}", self.file.display()))?;

        if self.json {
            let json = serde_json::to_string_pretty(&typed)
                .context("failed to serialize effective settings")?;
            println!("{json}");
            return Ok(());
        }

        let rows: Vec<SettingRow> = settings
            .iter()
            .map(|(key, value)| SettingRow {
                key: key.to_string(),
                value: if key == keys::EMAIL_PASSWORD {
                    "********".to_string()
                } else {
                    value.to_string()
                },
            })
            .collect();

        println!("{} {}", "✓".green(), self.file.display());
        if rows.is_empty() {
            println!("no settings; defaults apply");
        } else {
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
        println!(
            "level {}  log dir {}  retention {} day(s)  archive {}",
            typed.level,
            typed.log_dir.display(),
            typed.max_history_days,
            if typed.archive { "on" } else { "off" },
        );
        Ok(())
    }
}
