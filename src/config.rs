use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub max_playlist_entries: usize,

    // Ciclo de vida
    pub idle_timeout_secs: u64, // Espera de cola vacía antes de soltar la voz
    pub reap_idle_secs: u64,    // Edad mínima de un player muerto antes de liberarlo

    // APIs opcionales
    pub genius_token: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_playlist_entries: std::env::var("MAX_PLAYLIST_ENTRIES")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            reap_idle_secs: std::env::var("REAP_IDLE_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()?,

            genius_token: std::env::var("GENIUS_TOKEN").ok().filter(|s| !s.is_empty()),
            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 1.0, recibido: {}",
                self.default_volume
            );
        }

        if self.max_playlist_entries == 0 {
            anyhow::bail!("MAX_PLAYLIST_ENTRIES debe ser mayor a 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT_SECS debe ser mayor a 0");
        }

        if self.reap_idle_secs < self.idle_timeout_secs {
            anyhow::bail!(
                "REAP_IDLE_SECS ({}) no puede ser menor que IDLE_TIMEOUT_SECS ({})",
                self.reap_idle_secs,
                self.idle_timeout_secs
            );
        }

        // Spotify requiere ambas credenciales o ninguna
        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET deben configurarse juntos");
        }

        Ok(())
    }

    /// Resumen apto para logs (sin tokens).
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), vol {}%, playlists hasta {} entradas, \
            idle {}s / reap {}s, genius={}, spotify={}",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_playlist_entries,
            self.idle_timeout_secs,
            self.reap_idle_secs,
            self.genius_token.is_some(),
            self.spotify_client_id.is_some(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_playlist_entries: 100,

            idle_timeout_secs: 300,
            reap_idle_secs: 900,

            genius_token: None,
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_volume_out_of_bounds_rejected() {
        let config = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reap_shorter_than_idle_rejected() {
        let config = Config {
            idle_timeout_secs: 300,
            reap_idle_secs: 60,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotify_credentials_must_come_in_pairs() {
        let config = Config {
            spotify_client_id: Some("id".to_string()),
            spotify_client_secret: None,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
