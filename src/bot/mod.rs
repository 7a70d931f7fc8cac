//! Bot de Discord: registro de comandos, despacho de interacciones y ciclo
//! de vida de las conexiones de voz.
//!
//! El estado compartido (registro de reproductores, resolución de fuentes,
//! cliente de letras) vive en [`NocturneBot`] y se inyecta en los handlers;
//! no hay singletons de módulo.

use anyhow::Result;
use serenity::{
    all::{ActivityData, Context, EventHandler, Interaction, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub mod commands;
pub mod handlers;

use crate::{
    audio::PlayerRegistry,
    config::Config,
    sources::{AudioSource, GeniusClient},
};

pub struct NocturneBot {
    config: Arc<Config>,
    /// Registro guild → reproductor; la única vía de creación de players
    pub registry: Arc<PlayerRegistry>,
    /// Resolución de consultas y apertura de streams
    pub source: Arc<dyn AudioSource>,
    /// Cliente de letras, si hay token configurado
    pub lyrics: Option<Arc<GeniusClient>>,
}

impl NocturneBot {
    pub fn new(
        config: Config,
        source: Arc<dyn AudioSource>,
        lyrics: Option<Arc<GeniusClient>>,
    ) -> Self {
        let registry = Arc::new(PlayerRegistry::new(config.default_volume));
        Self {
            config: Arc::new(config),
            registry,
            source,
            lyrics,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.idle_timeout_secs)
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                info!("📝 Registrando comandos para guild {}", guild_id);
                commands::register_guild_commands(ctx, guild_id.into()).await?;
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for NocturneBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        ctx.set_activity(Some(ActivityData::listening("/play")));

        // Tarea de mantenimiento: liberar reproductores inactivos
        match songbird::get(&ctx).await {
            Some(manager) => {
                let registry = self.registry.clone();
                let max_idle = Duration::from_secs(self.config.reap_idle_secs);
                tokio::spawn(async move {
                    reaper_loop(registry, manager, max_idle).await;
                });
            }
            None => error!("Songbird no inicializado; sin tarea de mantenimiento"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) =
                    handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si el bot fue desconectado del canal de voz (expulsado o `/leave`
    /// desde otra vía), la sesión de reproducción de esa guild termina; un
    /// `/play` posterior reconecta y relanza el loop.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado de voz en guild {}", guild_id);
                if let Some(player) = self.registry.get(guild_id) {
                    player.end_session();
                }
            }
        }
    }
}

/// Libera periódicamente los reproductores cuyo loop murió por inactividad
/// y cierra la conexión de voz que haya quedado registrada.
async fn reaper_loop(registry: Arc<PlayerRegistry>, manager: Arc<Songbird>, max_idle: Duration) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        for guild_id in registry.reap_idle(max_idle) {
            if manager.get(guild_id).is_some() {
                if let Err(e) = manager.remove(guild_id).await {
                    debug!("Sin conexión que cerrar para guild {}: {:?}", guild_id, e);
                }
            }
        }
    }
}
