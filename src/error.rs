use thiserror::Error;

/// Errores del subsistema de música.
///
/// El timeout de espera de cola NO es un error: `PlaybackQueue::dequeue`
/// devuelve `None` y el loop lo trata como señal de inactividad.
#[derive(Debug, Error)]
pub enum MusicError {
    /// La consulta no pudo convertirse en una fuente reproducible.
    #[error("no se pudo resolver «{query}»: {reason}")]
    Resolution { query: String, reason: String },

    /// El stream de audio no pudo abrirse o se cortó durante la reproducción.
    #[error("stream de audio falló para «{title}»: {reason}")]
    Stream { title: String, reason: String },

    /// Posición de cola inválida provista por el usuario.
    #[error("posición {position} fuera de rango (la cola tiene {len} canciones)")]
    OutOfRange { position: usize, len: usize },

    /// No hay letra disponible para la búsqueda.
    #[error("no se encontró letra para «{query}»")]
    LyricsNotFound { query: String },

    /// Fallo consultando el servicio de letras.
    #[error("error consultando letras: {reason}")]
    Lyrics { reason: String },

    /// La conexión de voz no pudo obtenerse o mantenerse.
    /// Único fallo que termina la sesión de reproducción de una guild.
    #[error("conexión de voz no disponible: {reason}")]
    Voice { reason: String },
}

impl MusicError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    pub fn stream(title: impl Into<String>, reason: impl ToString) -> Self {
        Self::Stream {
            title: title.into(),
            reason: reason.to_string(),
        }
    }
}
