use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::audio::player::GuildPlayer;

/// Mapa proceso-global guild → reproductor, inyectado en el bot (no es un
/// singleton de módulo). La inserción es la única mutación y es atómica: dos
/// primeros usos concurrentes de la misma guild obtienen la misma instancia.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    default_volume: f32,
}

impl PlayerRegistry {
    pub fn new(default_volume: f32) -> Self {
        Self {
            players: DashMap::new(),
            default_volume,
        }
    }

    /// Idempotente: crea el reproductor en el primer uso y devuelve siempre
    /// la misma instancia para una guild.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🎛️ Reproductor creado para guild {}", guild_id);
                Arc::new(GuildPlayer::new(guild_id, self.default_volume))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Libera reproductores cuyo loop murió y que no registran actividad en
    /// `max_idle`. Devuelve las guilds liberadas para que el llamador cierre
    /// sus conexiones de voz.
    pub fn reap_idle(&self, max_idle: Duration) -> Vec<GuildId> {
        let mut reaped = Vec::new();
        self.players.retain(|guild_id, player| {
            if player.is_reapable(max_idle) {
                reaped.push(*guild_id);
                false
            } else {
                true
            }
        });
        for guild_id in &reaped {
            info!("🧹 Reproductor inactivo liberado para guild {}", guild_id);
        }
        reaped
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = PlayerRegistry::new(0.5);
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_players_are_partitioned_per_guild() {
        let registry = PlayerRegistry::new(0.5);
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_single_player() {
        let registry = Arc::new(PlayerRegistry::new(0.5));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create(GuildId::new(7)) })
            })
            .collect();

        let mut players = Vec::new();
        for handle in handles {
            players.push(handle.await.unwrap());
        }

        assert_eq!(registry.len(), 1);
        for player in &players[1..] {
            assert!(Arc::ptr_eq(&players[0], player));
        }
    }

    #[test]
    fn test_reap_removes_only_idle_players() {
        let registry = PlayerRegistry::new(0.5);
        registry.get_or_create(GuildId::new(1));
        registry.get_or_create(GuildId::new(2));

        // Con ventana generosa nadie es liberable todavía
        assert!(registry.reap_idle(Duration::from_secs(3600)).is_empty());
        assert_eq!(registry.len(), 2);

        // Con ventana cero ambos loops están muertos y se liberan
        let mut reaped = registry.reap_idle(Duration::ZERO);
        reaped.sort();
        assert_eq!(reaped, vec![GuildId::new(1), GuildId::new(2)]);
        assert_eq!(registry.len(), 0);
    }
}
