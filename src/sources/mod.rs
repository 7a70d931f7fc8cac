pub mod lyrics;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use songbird::input::Input;

use crate::audio::track::TrackMetadata;
use crate::error::MusicError;

pub use lyrics::{GeniusClient, Lyrics};
pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpClient;

/// Colaboradores de resolución que consume el reproductor.
///
/// El loop de reproducción y los comandos ven solo este trait; los clientes
/// concretos (yt-dlp, Spotify) quedan detrás de [`QueryResolver`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Resuelve una búsqueda o un enlace directo en metadatos reproducibles.
    async fn resolve(&self, query: &str) -> Result<TrackMetadata, MusicError>;

    /// Expande un enlace de playlist en términos de búsqueda individuales,
    /// en orden.
    async fn expand_playlist(&self, link: &str) -> Result<Vec<String>, MusicError>;

    /// Abre el stream de audio de un track. Se llama recién cuando el track
    /// pasa a ser el actual; un track encolado no retiene recursos.
    async fn open_stream(&self, meta: &TrackMetadata) -> Result<Input, MusicError>;

    /// Indica si la consulta es un enlace expandible en varias entradas.
    fn is_playlist_link(&self, query: &str) -> bool;
}

/// Resolución combinada: yt-dlp para búsqueda/stream, Spotify (opcional)
/// para expandir playlists en términos de búsqueda.
pub struct QueryResolver {
    ytdlp: YtDlpClient,
    spotify: Option<SpotifyClient>,
}

impl QueryResolver {
    pub fn new(ytdlp: YtDlpClient, spotify: Option<SpotifyClient>) -> Self {
        Self { ytdlp, spotify }
    }
}

#[async_trait]
impl AudioSource for QueryResolver {
    async fn resolve(&self, query: &str) -> Result<TrackMetadata, MusicError> {
        self.ytdlp.resolve(query).await
    }

    async fn expand_playlist(&self, link: &str) -> Result<Vec<String>, MusicError> {
        match &self.spotify {
            Some(spotify) => spotify.queries_for(link).await,
            None => Err(MusicError::resolution(
                link,
                "integración de Spotify no configurada",
            )),
        }
    }

    async fn open_stream(&self, meta: &TrackMetadata) -> Result<Input, MusicError> {
        self.ytdlp.open_stream(meta).await
    }

    fn is_playlist_link(&self, query: &str) -> bool {
        self.spotify
            .as_ref()
            .map(|s| s.is_spotify_link(query))
            .unwrap_or(false)
    }
}
