use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::bot::NocturneBot;
use crate::config::Config;
use crate::sources::{AudioSource, GeniusClient, QueryResolver, SpotifyClient, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nocturne=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Nocturne v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    // Clientes de resolución
    let spotify = match (&config.spotify_client_id, &config.spotify_client_secret) {
        (Some(id), Some(secret)) => Some(SpotifyClient::new(
            id.clone(),
            secret.clone(),
            config.max_playlist_entries,
        )),
        _ => {
            info!("🎼 Spotify no configurado: expansión de playlists desactivada");
            None
        }
    };
    let source: Arc<dyn AudioSource> = Arc::new(QueryResolver::new(YtDlpClient::new(), spotify));

    let lyrics = config
        .genius_token
        .clone()
        .map(|token| Arc::new(GeniusClient::new(token)));
    if lyrics.is_none() {
        info!("🎤 Genius no configurado: /lyrics desactivado");
    }

    // Intents mínimos: comandos slash + estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = NocturneBot::new(config.clone(), source, lyrics);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Shutdown con Ctrl+C
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
