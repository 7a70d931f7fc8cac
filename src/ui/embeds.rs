use serenity::all::Colour;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::player::LoopMode;
use crate::audio::track::Track;
use crate::error::MusicError;
use crate::sources::Lyrics;

/// Color de la marca en todos los embeds.
const EMBED_COLOUR: Colour = Colour(0x4c00b0);

pub fn now_playing(track: &Track, loop_mode: LoopMode) -> CreateEmbed {
    let meta = &track.meta;
    let mut embed = CreateEmbed::new()
        .title(format!("🎶 Reproduciendo - {}", meta.title))
        .description(format!("[{}]({})", meta.title, meta.source_url))
        .field("Duración", meta.duration_display(), true)
        .colour(EMBED_COLOUR);

    if let Some(uploader) = &meta.uploader {
        embed = embed.field("Subido por", uploader, true);
    }
    if let Some(thumbnail) = &meta.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if loop_mode != LoopMode::Off {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Repetición: {}",
            loop_mode.as_str()
        )));
    }

    embed
}

pub fn track_added(track: &Track) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!(
            "✅ Agregado a la cola: **[{}]({})**",
            track.meta.title, track.meta.source_url
        ))
        .colour(EMBED_COLOUR)
}

pub fn playlist_added(added: usize, failed: usize) -> CreateEmbed {
    let mut description = format!("✅ Agregadas {} canciones de la playlist", added);
    if failed > 0 {
        description.push_str(&format!(" ({} no pudieron resolverse)", failed));
    }
    CreateEmbed::new()
        .description(description)
        .colour(EMBED_COLOUR)
}

pub fn queue_list(current: Option<&Track>, items: &[Track]) -> CreateEmbed {
    let mut description = String::new();

    if let Some(current) = current {
        description.push_str(&format!(
            "▶️ **[{}]({})**\n\n",
            current.meta.title, current.meta.source_url
        ));
    }

    if items.is_empty() {
        description.push_str("La cola está vacía.");
    } else {
        for (index, track) in items.iter().enumerate() {
            description.push_str(&format!(
                "{}. [{}]({}) `{}`\n",
                index + 1,
                track.meta.title,
                track.meta.source_url,
                track.meta.duration_display()
            ));
            // Margen para no exceder el límite de descripción de Discord
            if description.len() > 3500 && index + 1 < items.len() {
                description.push_str(&format!("… y {} más\n", items.len() - index - 1));
                break;
            }
        }
    }

    let total: u64 = items.iter().map(|t| t.meta.duration_secs).sum();
    let footer = format!(
        "{} canciones en cola · {}",
        items.len(),
        humantime::format_duration(Duration::from_secs(total))
    );

    CreateEmbed::new()
        .title("🎶 Cola de reproducción")
        .description(description)
        .footer(CreateEmbedFooter::new(footer))
        .colour(EMBED_COLOUR)
}

pub fn lyrics(lyrics: &Lyrics) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("🎤 Letra - {}", lyrics.title))
        .url(&lyrics.url)
        .description(&lyrics.text)
        .colour(EMBED_COLOUR)
}

pub fn playback_error(title: &str, err: &MusicError) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!(
            "❌ No se pudo reproducir **{}**: {}\nSigo con la siguiente de la cola.",
            title, err
        ))
        .colour(EMBED_COLOUR)
}

pub fn help() -> CreateEmbed {
    CreateEmbed::new()
        .title("📖 Comandos disponibles")
        .field(
            "Reproducción",
            "`/play` busca o encola un enlace (también playlists de Spotify)\n\
             `/pause` · `/resume` · `/skip`\n\
             `/nowplaying` muestra la canción actual con controles\n\
             `/loop` configura la repetición (`off`, `one`, `all`)",
            false,
        )
        .field(
            "Cola",
            "`/queue` lista la cola\n\
             `/remove posición` · `/move desde hasta`\n\
             `/shuffle` mezcla · `/dedupe` quita repetidas · `/clear` vacía",
            false,
        )
        .field(
            "Otros",
            "`/lyrics` letra de la canción actual o de una búsqueda\n\
             `/join` · `/leave`",
            false,
        )
        .colour(EMBED_COLOUR)
}
