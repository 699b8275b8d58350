use std::sync::OnceLock;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct BackendSettings {
    pub base_url: String,
}

#[derive(Deserialize, Debug)]
pub struct UserSettings {
    pub id: i64,
    pub name: String,
}

/// When missed recurring reminders become visible again. The backend owns
/// the authoritative day; `local_midnight` refreshes the today snapshot at
/// local midnight, `server_day` defers entirely to explicit fetches.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundary {
    LocalMidnight,
    ServerDay,
}

#[derive(Deserialize, Debug)]
pub struct ScheduleSettings {
    pub day_boundary: DayBoundary,
}

#[derive(Deserialize, Debug)]
pub struct LocationSettings {
    pub poll_interval_secs: u64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub user: UserSettings,
    pub schedule: ScheduleSettings,
    pub location: LocationSettings,
}

impl AppSettings {
    fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?;

        settings.try_deserialize()
    }
}

pub fn get() -> &'static AppSettings {
    static APPSETTINGS: OnceLock<AppSettings> = OnceLock::new();
    APPSETTINGS.get_or_init(|| AppSettings::new().unwrap())
}
