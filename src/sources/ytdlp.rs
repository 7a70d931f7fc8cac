use serde::Deserialize;
use songbird::input::{Compose, Input, YoutubeDl};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::audio::track::TrackMetadata;
use crate::error::MusicError;

/// Resolución de consultas vía el binario `yt-dlp`.
///
/// Una consulta que no es URL se trata como búsqueda (`ytsearch1:`), igual
/// que un enlace directo: una sola invocación `-j` que devuelve el JSON del
/// video sin descargarlo.
pub struct YtDlpClient {
    http: reqwest::Client,
}

impl YtDlpClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("configuración estática de reqwest");
        Self { http }
    }

    pub async fn resolve(&self, query: &str) -> Result<TrackMetadata, MusicError> {
        let target = if is_http_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        debug!("🔍 Resolviendo con yt-dlp: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "-j",
                "--no-playlist",
                "--format",
                "bestaudio/best",
                "--no-check-certificate",
                "--no-warnings",
                "--quiet",
                target.as_str(),
            ])
            .output()
            .await
            .map_err(|e| MusicError::resolution(query, format!("yt-dlp no disponible: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::resolution(query, stderr.trim()));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let line = raw
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| MusicError::resolution(query, "sin resultados"))?;

        let meta = entry_to_metadata(line, query)?;
        info!("🎵 Resuelto: {} ({})", meta.title, meta.source_url);
        Ok(meta)
    }

    /// Abre el stream del track actual. El preflight de metadatos hace que
    /// un video borrado o bloqueado falle acá, como `Stream`, en lugar de
    /// quedar en silencio dentro del driver.
    pub async fn open_stream(&self, meta: &TrackMetadata) -> Result<Input, MusicError> {
        let mut source = YoutubeDl::new(self.http.clone(), meta.source_url.clone());
        source
            .aux_metadata()
            .await
            .map_err(|e| MusicError::stream(&meta.title, e))?;
        Ok(Input::from(source))
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn is_http_url(query: &str) -> bool {
    Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
}

fn entry_to_metadata(raw: &str, query: &str) -> Result<TrackMetadata, MusicError> {
    let entry: YtDlpEntry = serde_json::from_str(raw)
        .map_err(|e| MusicError::resolution(query, format!("JSON inválido de yt-dlp: {e}")))?;

    let source_url = entry
        .webpage_url
        .or(entry.original_url)
        .ok_or_else(|| MusicError::resolution(query, "entrada sin URL de origen"))?;

    Ok(TrackMetadata {
        title: entry.title.unwrap_or_else(|| "Desconocido".to_string()),
        source_url,
        thumbnail: entry.thumbnail,
        duration_secs: entry.duration.unwrap_or(0.0).max(0.0) as u64,
        uploader: entry.uploader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_detection() {
        assert!(is_http_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_http_url("http://youtu.be/abc"));
        assert!(!is_http_url("never gonna give you up"));
        assert!(!is_http_url("ftp://example.com/file"));
    }

    #[test]
    fn test_entry_to_metadata_maps_fields() {
        let raw = r#"{
            "title": "Una canción",
            "webpage_url": "https://www.youtube.com/watch?v=abc123",
            "thumbnail": "https://i.ytimg.com/vi/abc123/hq720.jpg",
            "duration": 245.3,
            "uploader": "Alguien"
        }"#;

        let meta = entry_to_metadata(raw, "una canción").unwrap();
        assert_eq!(meta.title, "Una canción");
        assert_eq!(meta.source_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(meta.duration_secs, 245);
        assert_eq!(meta.uploader.as_deref(), Some("Alguien"));
    }

    #[test]
    fn test_entry_to_metadata_defaults_missing_fields() {
        let raw = r#"{"original_url": "https://example.com/audio"}"#;

        let meta = entry_to_metadata(raw, "q").unwrap();
        assert_eq!(meta.title, "Desconocido");
        assert_eq!(meta.source_url, "https://example.com/audio");
        assert_eq!(meta.duration_secs, 0);
        assert!(meta.thumbnail.is_none());
    }

    #[test]
    fn test_entry_without_url_is_resolution_error() {
        let err = entry_to_metadata(r#"{"title": "x"}"#, "q").unwrap_err();
        assert!(matches!(err, MusicError::Resolution { .. }));
    }
}
