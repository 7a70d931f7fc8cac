use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::MusicError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Expansión de enlaces de Spotify en términos de búsqueda "título artista".
///
/// Usa el flujo client-credentials; el token se cachea hasta poco antes de
/// su expiración.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
    track_re: Regex,
    playlist_re: Regex,
    max_entries: usize,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, max_entries: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            token: Mutex::new(None),
            track_re: Regex::new(r"open\.spotify\.com/track/([a-zA-Z0-9]+)")
                .expect("regex estática"),
            playlist_re: Regex::new(r"open\.spotify\.com/playlist/([a-zA-Z0-9]+)")
                .expect("regex estática"),
            max_entries,
        }
    }

    pub fn is_spotify_link(&self, query: &str) -> bool {
        query.contains("open.spotify.com")
    }

    fn track_id<'a>(&self, link: &'a str) -> Option<&'a str> {
        self.track_re
            .captures(link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn playlist_id<'a>(&self, link: &'a str) -> Option<&'a str> {
        self.playlist_re
            .captures(link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Convierte un enlace de track o playlist en la lista ordenada de
    /// términos de búsqueda que lo representan.
    pub async fn queries_for(&self, link: &str) -> Result<Vec<String>, MusicError> {
        if let Some(id) = self.track_id(link) {
            let track = self.fetch_track(id).await?;
            return Ok(vec![track.search_query()]);
        }
        if let Some(id) = self.playlist_id(link) {
            return self.fetch_playlist_queries(id, link).await;
        }
        Err(MusicError::resolution(
            link,
            "enlace de Spotify no soportado (solo track o playlist)",
        ))
    }

    async fn fetch_track(&self, id: &str) -> Result<SpotifyTrack, MusicError> {
        let token = self.token().await?;
        self.http
            .get(format!("{API_BASE}/tracks/{id}"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| MusicError::resolution(id, e))?
            .error_for_status()
            .map_err(|e| MusicError::resolution(id, e))?
            .json::<SpotifyTrack>()
            .await
            .map_err(|e| MusicError::resolution(id, e))
    }

    async fn fetch_playlist_queries(
        &self,
        id: &str,
        link: &str,
    ) -> Result<Vec<String>, MusicError> {
        let token = self.token().await?;
        let mut queries = Vec::new();
        let mut next = Some(format!("{API_BASE}/playlists/{id}/tracks?limit=100"));

        while let Some(url) = next {
            let page = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| MusicError::resolution(link, e))?
                .error_for_status()
                .map_err(|e| MusicError::resolution(link, e))?
                .json::<PlaylistPage>()
                .await
                .map_err(|e| MusicError::resolution(link, e))?;

            for item in page.items {
                // Episodios y tracks removidos vienen como null
                if let Some(track) = item.track {
                    queries.push(track.search_query());
                    if queries.len() >= self.max_entries {
                        warn!(
                            "⚠️ Playlist truncada a {} entradas (límite configurado)",
                            self.max_entries
                        );
                        return Ok(queries);
                    }
                }
            }
            next = page.next;
        }

        info!("🎼 Playlist expandida: {} entradas", queries.len());
        Ok(queries)
    }

    async fn token(&self) -> Result<String, MusicError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("🔑 Renovando token de Spotify");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| MusicError::resolution("spotify", e))?
            .error_for_status()
            .map_err(|e| MusicError::resolution("spotify", e))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| MusicError::resolution("spotify", e))?;

        let value = response.access_token.clone();
        *cached = Some(CachedToken {
            value: response.access_token,
            // Renovar con margen para no usar un token al borde de expirar
            expires_at: Utc::now() + ChronoDuration::seconds(response.expires_in - 60),
        });
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    artists: Vec<SpotifyArtist>,
}

impl SpotifyTrack {
    fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> SpotifyClient {
        SpotifyClient::new("id".to_string(), "secret".to_string(), 100)
    }

    #[test]
    fn test_spotify_link_detection() {
        let client = client();
        assert!(client.is_spotify_link(
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"
        ));
        assert!(client.is_spotify_link(
            "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"
        ));
        assert!(!client.is_spotify_link("https://www.youtube.com/watch?v=abc"));
        assert!(!client.is_spotify_link("una búsqueda cualquiera"));
    }

    #[test]
    fn test_track_and_playlist_id_extraction() {
        let client = client();
        assert_eq!(
            client.track_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x"),
            Some("4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(
            client.playlist_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some("37i9dQZF1DXcBWIGoYBM5M")
        );
        assert_eq!(
            client.track_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            None
        );
    }

    #[test]
    fn test_search_query_formatting() {
        let track = SpotifyTrack {
            name: "Canción".to_string(),
            artists: vec![
                SpotifyArtist {
                    name: "Artista".to_string(),
                },
                SpotifyArtist {
                    name: "Invitado".to_string(),
                },
            ],
        };
        assert_eq!(track.search_query(), "Canción Artista");

        let sin_artista = SpotifyTrack {
            name: "Sola".to_string(),
            artists: vec![],
        };
        assert_eq!(sin_artista.search_query(), "Sola");
    }
}
