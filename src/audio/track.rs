use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

/// Descriptor inmutable de una canción ya resuelta.
///
/// Se obtiene una sola vez por consulta; el stream de audio asociado se abre
/// recién cuando el track pasa a ser el actual, usando `source_url` como
/// identificador de origen.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub source_url: String,
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
    pub uploader: Option<String>,
}

impl TrackMetadata {
    /// Duración en formato `m:ss` para embeds.
    pub fn duration_display(&self) -> String {
        format!("{}:{:02}", self.duration_secs / 60, self.duration_secs % 60)
    }
}

/// Unidad encolada de audio: metadatos más el volumen con el que se
/// reproducirá. No retiene ningún recurso de red mientras espera en la cola.
#[derive(Debug, Clone)]
pub struct Track {
    pub meta: TrackMetadata,
    pub volume: f32,
    pub requested_by: UserId,
    #[allow(dead_code)]
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(meta: TrackMetadata, volume: f32, requested_by: UserId) -> Self {
        Self {
            meta,
            volume: volume.clamp(0.0, 1.0),
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_metadata(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            source_url: format!("https://example.com/{title}"),
            thumbnail: None,
            duration_secs: 180,
            uploader: Some("Uploader".to_string()),
        }
    }

    #[test]
    fn test_duration_display() {
        let mut meta = sample_metadata("a");
        meta.duration_secs = 754;
        assert_eq!(meta.duration_display(), "12:34");

        meta.duration_secs = 59;
        assert_eq!(meta.duration_display(), "0:59");
    }

    #[test]
    fn test_volume_clamped_on_creation() {
        let track = Track::new(sample_metadata("a"), 7.0, UserId::new(1));
        assert_eq!(track.volume, 1.0);

        let track = Track::new(sample_metadata("a"), -0.5, UserId::new(1));
        assert_eq!(track.volume, 0.0);
    }
}
