use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::MusicError;

const SEARCH_URL: &str = "https://api.genius.com/search";

/// Límite de Discord para la descripción de un embed.
const MAX_LYRICS_LEN: usize = 4000;

#[derive(Debug, Clone)]
pub struct Lyrics {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// Búsqueda de letras vía la API de Genius más extracción del texto desde
/// la página de la canción (la API no expone la letra directamente).
pub struct GeniusClient {
    http: reqwest::Client,
    token: String,
    container_re: Regex,
    tag_re: Regex,
}

impl GeniusClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            container_re: Regex::new(r#"(?s)data-lyrics-container="true"[^>]*>(.*?)</div>"#)
                .expect("regex estática"),
            tag_re: Regex::new(r"<[^>]+>").expect("regex estática"),
        }
    }

    pub async fn fetch_lyrics(&self, query: &str) -> Result<Lyrics, MusicError> {
        let hit = self.search(query).await?;
        debug!("🎤 Letra encontrada: {} ({})", hit.full_title, hit.url);

        let page = self
            .http
            .get(&hit.url)
            .send()
            .await
            .map_err(|e| MusicError::Lyrics {
                reason: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| MusicError::Lyrics {
                reason: e.to_string(),
            })?;

        let text = self.extract_text(&page);
        if text.is_empty() {
            return Err(MusicError::LyricsNotFound {
                query: query.to_string(),
            });
        }

        Ok(Lyrics {
            title: hit.full_title,
            url: hit.url,
            text,
        })
    }

    async fn search(&self, query: &str) -> Result<GeniusHit, MusicError> {
        let response = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&self.token)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| MusicError::Lyrics {
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| MusicError::Lyrics {
                reason: e.to_string(),
            })?
            .json::<SearchResponse>()
            .await
            .map_err(|e| MusicError::Lyrics {
                reason: e.to_string(),
            })?;

        response
            .response
            .hits
            .into_iter()
            .map(|h| h.result)
            .next()
            .ok_or_else(|| MusicError::LyricsNotFound {
                query: query.to_string(),
            })
    }

    /// Junta los bloques `data-lyrics-container` de la página y los reduce a
    /// texto plano.
    fn extract_text(&self, html: &str) -> String {
        let mut out = String::new();
        for capture in self.container_re.captures_iter(html) {
            let block = capture
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .replace("<br/>", "\n")
                .replace("<br>", "\n");
            let plain = self.tag_re.replace_all(&block, "");
            out.push_str(plain.trim());
            out.push('\n');
        }

        let mut text = out.trim().to_string();
        if text.len() > MAX_LYRICS_LEN {
            let mut cut = MAX_LYRICS_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push('…');
        }
        text
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    result: GeniusHit,
}

#[derive(Debug, Deserialize)]
struct GeniusHit {
    full_title: String,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_text_strips_markup() {
        let client = GeniusClient::new("token".to_string());
        let html = r#"<div data-lyrics-container="true" class="x">Primera línea<br/><i>segunda</i> línea</div>"#;

        assert_eq!(client.extract_text(html), "Primera línea\nsegunda línea");
    }

    #[test]
    fn test_extract_text_joins_multiple_containers() {
        let client = GeniusClient::new("token".to_string());
        let html = concat!(
            r#"<div data-lyrics-container="true">Verso uno</div>"#,
            r#"<p>basura</p>"#,
            r#"<div data-lyrics-container="true">Verso dos</div>"#,
        );

        assert_eq!(client.extract_text(html), "Verso uno\nVerso dos");
    }

    #[test]
    fn test_extract_text_empty_page() {
        let client = GeniusClient::new("token".to_string());
        assert_eq!(client.extract_text("<html><body>nada</body></html>"), "");
    }
}
