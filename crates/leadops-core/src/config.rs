/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize`; field names map to upper-case
/// env vars (`batch_size` ← `BATCH_SIZE`). Comma-separated values deserialize
/// into `Vec<String>`.
pub trait Config: Sized + serde::de::DeserializeOwned {
    /// Load from the process environment.
    fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Load from explicit key/value pairs instead of the process environment.
    fn load_from<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// # Panics
    ///
    /// Panics if any required env var is missing or cannot be deserialized.
    fn from_env() -> Self {
        Self::load().expect("failed to load config from environment")
    }
}
