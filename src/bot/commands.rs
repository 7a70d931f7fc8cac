use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        queue_command(),
        remove_command(),
        move_command(),
        clear_command(),
        nowplaying_command(),
        loop_command(),
        shuffle_command(),
        dedupe_command(),
        lyrics_command(),
        join_command(),
        leave_command(),
        help_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Busca una canción o encola un enlace (también playlists de Spotify)")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra la canción actual con controles")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Desactivado", "off")
                .add_string_choice("Canción actual", "one")
                .add_string_choice("Toda la cola", "all")
                .required(true),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina una canción de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición en la cola (1 es la próxima)",
            )
            .min_int_value(1)
            .required(true),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Mueve una canción a otra posición de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "from", "Posición actual")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "Posición destino")
                .min_int_value(1)
                .required(true),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Vacía la cola de reproducción")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola de reproducción")
}

fn dedupe_command() -> CreateCommand {
    CreateCommand::new("dedupe").description("Elimina canciones repetidas de la cola")
}

// Comandos adicionales

fn lyrics_command() -> CreateCommand {
    CreateCommand::new("lyrics")
        .description("Busca la letra de una canción")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "query",
            "Canción a buscar (por defecto, la actual)",
        ))
}

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra los comandos disponibles")
}
