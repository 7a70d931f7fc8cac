use anyhow::Result;
use serenity::{
    builder::{
        CreateActionRow, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use songbird::tracks::PlayMode;
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{EnqueueOutcome, GuildPlayer, LoopMode, PlayerSession},
    bot::NocturneBot,
    error::MusicError,
    ui::{buttons::button_ids, buttons, embeds},
};

/// Maneja comandos slash. Todo error de handler se rinde acá como mensaje
/// visible; nunca tumba al bot.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, command, bot, guild_id).await?,
        "move" => handle_move(ctx, command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await?,
        "dedupe" => handle_dedupe(ctx, command, bot, guild_id).await?,
        "lyrics" => handle_lyrics(ctx, command, bot, guild_id).await?,
        "join" => handle_join(ctx, command, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "help" => handle_help(ctx, command).await?,
        _ => respond_text(ctx, &command, "❌ Comando no reconocido").await?,
    }

    Ok(())
}

/// Maneja clicks de botones. Cada botón invoca exactamente el mismo método
/// del reproductor que su comando slash equivalente, así el estado queda
/// consistente sin importar la vía de invocación.
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &NocturneBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(player) = bot.registry.get(guild_id) else {
        return component_text(ctx, &component, "⚠️ No hay un reproductor activo.").await;
    };

    match component.data.custom_id.as_str() {
        button_ids::PLAY_PAUSE => {
            let text = match toggle_pause(&player).await {
                Some(true) => "⏸ Pausado!",
                Some(false) => "▶ Reanudado!",
                None => "⚠️ No hay nada reproduciéndose.",
            };
            component_text(ctx, &component, text).await?;
        }
        button_ids::SKIP => {
            let text = if player.skip() {
                "⏭ Saltado!"
            } else {
                "⚠️ No hay nada reproduciéndose."
            };
            component_text(ctx, &component, text).await?;
        }
        button_ids::LOOP => {
            let mode = player.cycle_loop_mode();
            component_text(
                ctx,
                &component,
                &format!("🔁 Modo de repetición: `{}`", mode.as_str()),
            )
            .await?;
        }
        button_ids::QUEUE => {
            let embed = embeds::queue_list(
                player.current_track().as_ref(),
                &player.queue_snapshot(),
            );
            component_embed(ctx, &component, embed, buttons::queue_controls()).await?;
        }
        button_ids::SHUFFLE => {
            player.shuffle();
            component_text(ctx, &component, "🔀 Cola mezclada.").await?;
        }
        button_ids::CLEAR => {
            let removed = player.clear_queue();
            component_text(
                ctx,
                &component,
                &format!("🗑 Cola vaciada ({} canciones).", removed),
            )
            .await?;
        }
        _ => component_text(ctx, &component, "❌ Acción no reconocida").await?,
    }

    Ok(())
}

/// Pausa o reanuda según el estado real del track. `None` si no hay nada
/// sonando.
async fn toggle_pause(player: &GuildPlayer) -> Option<bool> {
    let handle = player.current_handle()?;
    let info = handle.get_info().await.ok()?;
    if info.playing == PlayMode::Play {
        player.pause().then_some(true)
    } else {
        player.resume().then_some(false)
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer: la resolución puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let call = match voice_call_for(ctx, guild_id, command.user.id).await {
        Ok(call) => call,
        Err(err) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().content(format!("⚠️ {err}")),
                )
                .await?;
            return Ok(());
        }
    };

    let player = bot.registry.get_or_create(guild_id);
    player.set_text_channel(command.channel_id);

    let response = match player
        .enqueue_query(bot.source.as_ref(), &query, command.user.id)
        .await
    {
        Ok(EnqueueOutcome::Single(track)) => {
            EditInteractionResponse::new().embed(embeds::track_added(&track))
        }
        Ok(EnqueueOutcome::Playlist { added, failed }) => {
            EditInteractionResponse::new().embed(embeds::playlist_added(added, failed))
        }
        Err(err) => EditInteractionResponse::new().content(format!("❌ {err}")),
    };

    // El loop se relanza si murió por inactividad; el CAS interno evita dos
    // loops para la misma guild
    player.ensure_loop(PlayerSession {
        http: ctx.http.clone(),
        call,
        source: bot.source.clone(),
        idle_timeout: bot.idle_timeout(),
    });

    command.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) if player.pause() => "⏸ Pausado!",
        _ => "⚠️ No hay nada reproduciéndose.",
    };
    respond_text(ctx, &command, text).await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) if player.resume() => "▶ Reanudado!",
        _ => "⚠️ No hay nada pausado.",
    };
    respond_text(ctx, &command, text).await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) if player.skip() => "⏭ Saltado!",
        _ => "⚠️ No hay nada reproduciéndose.",
    };
    respond_text(ctx, &command, text).await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "⚠️ La cola está vacía.").await;
    };

    let items = player.queue_snapshot();
    let current = player.current_track();
    if items.is_empty() && current.is_none() {
        return respond_text(ctx, &command, "⚠️ La cola está vacía.").await;
    }

    let embed = embeds::queue_list(current.as_ref(), &items);
    respond_embed(ctx, &command, embed, buttons::queue_controls()).await
}

async fn handle_remove(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let position = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "position")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))? as usize;

    let text = match bot.registry.get(guild_id) {
        Some(player) => match player.remove_at(position) {
            Ok(removed) => format!("❌ Eliminada **{}** de la cola.", removed.title()),
            Err(err) => format!("⚠️ {err}"),
        },
        None => "⚠️ La cola está vacía.".to_string(),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_move(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let option = |name: &str| {
        command
            .data
            .options
            .iter()
            .find(|opt| opt.name == name)
            .and_then(|opt| opt.value.as_i64())
    };
    let from = option("from").ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))? as usize;
    let to = option("to").ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))? as usize;

    let text = match bot.registry.get(guild_id) {
        Some(player) => match player.move_to(from, to) {
            Ok(moved) => format!("✅ Movida **{}** a la posición {}.", moved.title(), to),
            Err(err) => format!("⚠️ {err}"),
        },
        None => "⚠️ La cola está vacía.".to_string(),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_clear(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) => format!("🗑 Cola vaciada ({} canciones).", player.clear_queue()),
        None => "⚠️ La cola está vacía.".to_string(),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_text(ctx, &command, "⚠️ No hay nada reproduciéndose.").await;
    };
    match player.current_track() {
        Some(track) => {
            let embed = embeds::now_playing(&track, player.loop_mode());
            respond_embed(ctx, &command, embed, buttons::now_playing_controls()).await
        }
        None => respond_text(ctx, &command, "⚠️ No hay nada reproduciéndose.").await,
    }
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let mode = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "mode")
        .and_then(|opt| opt.value.as_str())
        .and_then(LoopMode::from_str)
        .ok_or_else(|| anyhow::anyhow!("Modo de repetición inválido"))?;

    bot.registry.get_or_create(guild_id).set_loop_mode(mode);
    respond_text(
        ctx,
        &command,
        &format!("🔁 Modo de repetición: `{}`", mode.as_str()),
    )
    .await
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) => {
            player.shuffle();
            "🔀 Cola mezclada.".to_string()
        }
        None => "⚠️ La cola está vacía.".to_string(),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_dedupe(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let text = match bot.registry.get(guild_id) {
        Some(player) => format!(
            "🗑 Eliminadas {} canciones repetidas.",
            player.dedupe()
        ),
        None => "⚠️ La cola está vacía.".to_string(),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_lyrics(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(genius) = &bot.lyrics else {
        return respond_text(ctx, &command, "⚠️ La API de Genius no está configurada.").await;
    };

    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .map(str::to_string)
        .or_else(|| {
            bot.registry
                .get(guild_id)
                .and_then(|p| p.current_track())
                .map(|t| t.meta.title)
        });

    let Some(query) = query else {
        return respond_text(ctx, &command, "⚠️ No hay nada reproduciéndose.").await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let response = match genius.fetch_lyrics(&query).await {
        Ok(lyrics) => EditInteractionResponse::new().embed(embeds::lyrics(&lyrics)),
        Err(err @ MusicError::LyricsNotFound { .. }) => {
            EditInteractionResponse::new().content(format!("⚠️ {err}"))
        }
        Err(err) => EditInteractionResponse::new().content(format!("❌ {err}")),
    };

    command.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_join(ctx: &Context, command: CommandInteraction, guild_id: GuildId) -> Result<()> {
    let text = match voice_call_for(ctx, guild_id, command.user.id).await {
        Ok(_) => "🔊 Conectado al canal de voz.".to_string(),
        Err(err) => format!("⚠️ {err}"),
    };
    respond_text(ctx, &command, &text).await
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NocturneBot,
    guild_id: GuildId,
) -> Result<()> {
    if let Some(player) = bot.registry.get(guild_id) {
        player.end_session();
    }

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
    let text = if manager.get(guild_id).is_some() {
        manager.remove(guild_id).await?;
        "👋 Desconectado del canal de voz."
    } else {
        "⚠️ No estoy conectado a un canal de voz."
    };
    respond_text(ctx, &command, text).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::help())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

// Funciones auxiliares

/// Obtiene la conexión de voz para el canal del usuario, uniéndose si hace
/// falta. El error resultante es apto para mostrarse.
async fn voice_call_for(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Arc<tokio::sync::Mutex<songbird::Call>>, MusicError> {
    let channel_id = user_voice_channel(ctx, guild_id, user_id)?;

    let manager = songbird::get(ctx).await.ok_or_else(|| MusicError::Voice {
        reason: "Songbird no inicializado".to_string(),
    })?;

    if let Some(call) = manager.get(guild_id) {
        if call.lock().await.current_connection().is_some() {
            return Ok(call);
        }
    }

    manager
        .join(guild_id, channel_id)
        .await
        .map_err(|e| MusicError::Voice {
            reason: e.to_string(),
        })
}

fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, MusicError> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| MusicError::Voice {
            reason: "Guild no encontrada en caché".to_string(),
        })?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| MusicError::Voice {
            reason: "Debes estar en un canal de voz".to_string(),
        })
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    components: Vec<CreateActionRow>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .components(components),
            ),
        )
        .await?;
    Ok(())
}

async fn component_text(
    ctx: &Context,
    component: &ComponentInteraction,
    text: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn component_embed(
    ctx: &Context,
    component: &ComponentInteraction,
    embed: CreateEmbed,
    components: Vec<CreateActionRow>,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .components(components),
            ),
        )
        .await?;
    Ok(())
}
