use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info, warn};

use crate::audio::queue::PlaybackQueue;
use crate::audio::track::Track;
use crate::error::MusicError;
use crate::sources::AudioSource;
use crate::ui::{buttons, embeds};

/// Política de re-encolado de un track terminado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Off,
    One,
    All,
}

impl LoopMode {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "one" => Some(Self::One),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::One => "one",
            Self::All => "all",
        }
    }

    /// Ciclo off → one → all → off, para el botón de loop.
    pub fn next(&self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }
}

/// Resultado de un `/play`, para el mensaje de respuesta.
pub enum EnqueueOutcome {
    Single(Track),
    Playlist { added: usize, failed: usize },
}

/// Dependencias que necesita una sesión del loop de reproducción.
///
/// La conexión de voz (`call`) es propiedad exclusiva del loop mientras la
/// sesión vive; los comandos actúan solo a través del `TrackHandle`.
#[derive(Clone)]
pub struct PlayerSession {
    pub http: Arc<Http>,
    pub call: Arc<tokio::sync::Mutex<Call>>,
    pub source: Arc<dyn AudioSource>,
    pub idle_timeout: Duration,
}

struct CurrentTrack {
    track: Track,
    handle: TrackHandle,
}

/// Reproductor de una guild: una cola, un loop de fondo y el estado del
/// track actual.
///
/// El loop vive en una tarea propia y es el único que arranca/detiene la
/// reproducción sobre el transporte. Comandos y botones mutan la cola o
/// piden acciones sobre el track actual; la bandera de vida (`loop_alive`)
/// garantiza que nunca corran dos loops para la misma guild y permite
/// relanzar uno nuevo cuando el anterior terminó por inactividad.
pub struct GuildPlayer {
    guild_id: GuildId,
    queue: PlaybackQueue,
    current: Mutex<Option<CurrentTrack>>,
    loop_mode: Mutex<LoopMode>,
    volume: Mutex<f32>,
    text_channel: Mutex<Option<ChannelId>>,
    np_message: tokio::sync::Mutex<Option<(ChannelId, MessageId)>>,
    skip_requested: AtomicBool,
    resolving: AtomicBool,
    loop_alive: AtomicBool,
    session_end: Notify,
    last_activity: Mutex<Instant>,
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId, default_volume: f32) -> Self {
        Self {
            guild_id,
            queue: PlaybackQueue::new(),
            current: Mutex::new(None),
            loop_mode: Mutex::new(LoopMode::Off),
            volume: Mutex::new(default_volume.clamp(0.0, 1.0)),
            text_channel: Mutex::new(None),
            np_message: tokio::sync::Mutex::new(None),
            skip_requested: AtomicBool::new(false),
            resolving: AtomicBool::new(false),
            loop_alive: AtomicBool::new(false),
            session_end: Notify::new(),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    // ---- Superficie de mutación (comandos y botones llaman lo mismo) ----

    /// Resuelve la consulta y encola el resultado. Para enlaces de playlist
    /// expande primero y encola cada entrada en orden; los fallos
    /// individuales se saltean sin afectar al resto del lote.
    pub async fn enqueue_query(
        &self,
        source: &dyn AudioSource,
        query: &str,
        requested_by: UserId,
    ) -> Result<EnqueueOutcome, MusicError> {
        let volume = *self.volume.lock();

        if source.is_playlist_link(query) {
            let entries = source.expand_playlist(query).await?;
            let total = entries.len();
            let mut added = 0;

            let mut resolved = futures::stream::iter(entries)
                .map(|entry| async move {
                    let result = source.resolve(&entry).await;
                    (result, entry)
                })
                .buffered(4);

            while let Some((result, entry)) = resolved.next().await {
                match result {
                    Ok(meta) => {
                        self.enqueue(Track::new(meta, volume, requested_by));
                        added += 1;
                    }
                    Err(err) => {
                        warn!("⚠️ Entrada de playlist omitida «{}»: {}", entry, err);
                    }
                }
            }

            Ok(EnqueueOutcome::Playlist {
                added,
                failed: total - added,
            })
        } else {
            let meta = source.resolve(query).await?;
            let track = Track::new(meta, volume, requested_by);
            self.enqueue(track.clone());
            Ok(EnqueueOutcome::Single(track))
        }
    }

    pub fn enqueue(&self, track: Track) {
        self.queue.enqueue(track);
        self.touch();
    }

    pub fn pause(&self) -> bool {
        self.touch();
        match self.current.lock().as_ref() {
            Some(current) => current.handle.pause().is_ok(),
            None => false,
        }
    }

    pub fn resume(&self) -> bool {
        self.touch();
        match self.current.lock().as_ref() {
            Some(current) => current.handle.play().is_ok(),
            None => false,
        }
    }

    /// Salta el track actual. Efectivo también si el loop está en plena
    /// resolución del próximo track: la bandera pendiente hace que el stream
    /// recién abierto se descarte en lugar de reproducirse.
    pub fn skip(&self) -> bool {
        self.touch();
        if self.resolving.load(Ordering::Acquire) {
            self.skip_requested.store(true, Ordering::Release);
            return true;
        }
        match self.current.lock().as_ref() {
            Some(current) => {
                let _ = current.handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&self, position: usize) -> Result<Track, MusicError> {
        self.touch();
        self.queue.remove_at(position)
    }

    pub fn move_to(&self, from: usize, to: usize) -> Result<Track, MusicError> {
        self.touch();
        self.queue.move_to(from, to)
    }

    pub fn shuffle(&self) {
        self.touch();
        self.queue.shuffle();
    }

    pub fn dedupe(&self) -> usize {
        self.touch();
        self.queue.dedupe()
    }

    /// Vacía la cola sin afectar al track que ya está sonando.
    pub fn clear_queue(&self) -> usize {
        self.touch();
        self.queue.clear()
    }

    pub fn set_loop_mode(&self, mode: LoopMode) {
        self.touch();
        *self.loop_mode.lock() = mode;
        info!("🔁 Loop en modo «{}» para guild {}", mode.as_str(), self.guild_id);
    }

    pub fn cycle_loop_mode(&self) -> LoopMode {
        let mut mode = self.loop_mode.lock();
        *mode = mode.next();
        *mode
    }

    // ---- Accesores de lectura ----

    pub fn queue_snapshot(&self) -> Vec<Track> {
        self.queue.snapshot()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.current.lock().as_ref().map(|c| c.track.clone())
    }

    pub fn current_handle(&self) -> Option<TrackHandle> {
        self.current.lock().as_ref().map(|c| c.handle.clone())
    }

    pub fn loop_mode(&self) -> LoopMode {
        *self.loop_mode.lock()
    }

    pub fn set_text_channel(&self, channel_id: ChannelId) {
        *self.text_channel.lock() = Some(channel_id);
    }

    // ---- Ciclo de vida del loop ----

    /// Lanza el loop de reproducción si no hay uno vivo. El CAS sobre la
    /// bandera asegura a lo sumo un loop por guild aun con `/play`
    /// concurrentes, y que un loop muerto por inactividad se reemplace.
    pub fn ensure_loop(self: &Arc<Self>, session: PlayerSession) {
        if self
            .loop_alive
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let player = Arc::clone(self);
            tokio::spawn(async move { player.playback_loop(session).await });
        }
    }

    /// Termina la sesión actual (bot desconectado o `/leave`). El loop sale
    /// en su próximo punto de suspensión y puede relanzarse después.
    pub fn end_session(&self) {
        if self.loop_alive.load(Ordering::Acquire) {
            self.session_end.notify_one();
        }
    }

    /// Un player es liberable cuando su loop murió y no registró actividad
    /// en `max_idle`. La cola remanente (si la hay) se descarta con él.
    pub fn is_reapable(&self, max_idle: Duration) -> bool {
        !self.loop_alive.load(Ordering::Acquire)
            && self.current.lock().is_none()
            && self.last_activity.lock().elapsed() >= max_idle
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn note_resolution_started(&self) {
        self.resolving.store(true, Ordering::Release);
    }

    /// Cierra la ventana de resolución y devuelve si hubo un skip pendiente
    /// mientras duraba.
    fn note_resolution_finished(&self) -> bool {
        self.resolving.store(false, Ordering::Release);
        self.skip_requested.swap(false, Ordering::AcqRel)
    }

    /// Aplica la política de loop al track terminado. El stream ya fue
    /// consumido; al volver a ser el actual se abre uno nuevo a partir del
    /// mismo identificador de origen.
    fn requeue_finished(&self, track: Track) {
        match *self.loop_mode.lock() {
            LoopMode::One => {
                info!("🔂 Repitiendo track: {}", track.title());
                self.queue.push_front(track);
            }
            LoopMode::All => {
                info!("🔁 Track re-encolado al final: {}", track.title());
                self.queue.enqueue(track);
            }
            LoopMode::Off => {}
        }
    }

    async fn playback_loop(self: Arc<Self>, session: PlayerSession) {
        info!("🎧 Loop de reproducción iniciado para guild {}", self.guild_id);

        // Descartar señales de cierre que hayan quedado de sesiones previas
        self.session_end.notified().now_or_never();

        loop {
            let dequeued = tokio::select! {
                track = self.queue.dequeue(session.idle_timeout) => track,
                _ = self.session_end.notified() => {
                    debug!("🔌 Sesión terminada en espera de cola (guild {})", self.guild_id);
                    break;
                }
            };

            let Some(track) = dequeued else {
                info!(
                    "💤 {}s sin canciones en guild {}, soltando la conexión de voz",
                    session.idle_timeout.as_secs(),
                    self.guild_id
                );
                let mut call = session.call.lock().await;
                if let Err(e) = call.leave().await {
                    warn!("Error al desconectar de voz: {:?}", e);
                }
                break;
            };

            // La conexión pudo morir mientras esperábamos; el track vuelve
            // al frente para la próxima sesión.
            if session.call.lock().await.current_connection().is_none() {
                self.queue.push_front(track);
                break;
            }

            self.touch();

            // Abrir el stream recién acá: un track encolado nunca retiene
            // recursos de red.
            self.note_resolution_started();
            let opened = session.source.open_stream(&track.meta).await;
            let skipped_while_resolving = self.note_resolution_finished();

            let input = match opened {
                Ok(_) if skipped_while_resolving => {
                    debug!("⏭️ Skip durante la resolución, stream descartado");
                    continue;
                }
                Ok(input) => input,
                Err(err) => {
                    warn!("⚠️ No se pudo abrir «{}»: {}", track.title(), err);
                    self.report_playback_error(&session, &track, &err).await;
                    continue;
                }
            };

            let handle = {
                let mut call = session.call.lock().await;
                call.play_input(input)
            };
            let _ = handle.set_volume(track.volume);

            let (tx, rx) = oneshot::channel();
            let signal = Arc::new(Mutex::new(Some(tx)));
            for (event, reason) in [
                (TrackEvent::End, TrackEndReason::Finished),
                (TrackEvent::Error, TrackEndReason::Errored),
            ] {
                if let Err(e) = handle.add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        reason,
                        signal: signal.clone(),
                    },
                ) {
                    error!("Error registrando notificador de fin de track: {:?}", e);
                }
            }

            *self.current.lock() = Some(CurrentTrack {
                track: track.clone(),
                handle: handle.clone(),
            });

            // Un skip que llegó entre el fin de la resolución y este punto
            // encontró `current` vacío; se aplica ahora.
            if self.skip_requested.swap(false, Ordering::AcqRel) {
                let _ = handle.stop();
            }

            self.publish_now_playing(&session, &track).await;

            let outcome = tokio::select! {
                reason = rx => reason.unwrap_or(TrackEndReason::Finished),
                _ = self.session_end.notified() => TrackEndReason::Interrupted,
            };

            let finished = self.current.lock().take();
            self.skip_requested.store(false, Ordering::Release);
            self.touch();

            match outcome {
                TrackEndReason::Finished => {
                    if let Some(finished) = finished {
                        self.requeue_finished(finished.track);
                    }
                }
                TrackEndReason::Errored => {
                    // Un track que falló no se repite aunque haya loop activo
                    warn!("⚠️ El transporte reportó un error en «{}»", track.title());
                    let err = MusicError::stream(track.title(), "fallo durante la reproducción");
                    self.report_playback_error(&session, &track, &err).await;
                }
                TrackEndReason::Interrupted => {
                    if let Some(finished) = finished {
                        let _ = finished.handle.stop();
                    }
                    debug!("🔌 Sesión interrumpida durante la reproducción");
                    break;
                }
            }
        }

        self.loop_alive.store(false, Ordering::Release);
        info!("🛑 Loop de reproducción terminado para guild {}", self.guild_id);
    }

    async fn publish_now_playing(&self, session: &PlayerSession, track: &Track) {
        let Some(channel_id) = *self.text_channel.lock() else {
            return;
        };

        let mut np = self.np_message.lock().await;

        // Borrar el mensaje anterior para que los controles vivan siempre en
        // el último
        if let Some((old_channel, old_message)) = np.take() {
            let _ = old_channel.delete_message(&session.http, old_message).await;
        }

        let message = CreateMessage::new()
            .embed(embeds::now_playing(track, self.loop_mode()))
            .components(buttons::now_playing_controls());

        match channel_id.send_message(&session.http, message).await {
            Ok(sent) => *np = Some((channel_id, sent.id)),
            Err(e) => warn!("No se pudo publicar el mensaje de reproducción: {:?}", e),
        }
    }

    async fn report_playback_error(
        &self,
        session: &PlayerSession,
        track: &Track,
        err: &MusicError,
    ) {
        let Some(channel_id) = *self.text_channel.lock() else {
            return;
        };
        let message = CreateMessage::new().embed(embeds::playback_error(track.title(), err));
        if let Err(e) = channel_id.send_message(&session.http, message).await {
            warn!("No se pudo reportar el error de reproducción: {:?}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackEndReason {
    Finished,
    Errored,
    Interrupted,
}

/// Notificador de fin de track. Corre en un hilo del driver de audio, por lo
/// que solo dispara la señal one-shot que el loop espera; nunca toca la cola.
struct TrackEndNotifier {
    reason: TrackEndReason,
    signal: Arc<Mutex<Option<oneshot::Sender<TrackEndReason>>>>,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(tx) = self.signal.lock().take() {
            let _ = tx.send(self.reason);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::TrackMetadata;
    use crate::sources::MockAudioSource;
    use pretty_assertions::assert_eq;

    fn player() -> Arc<GuildPlayer> {
        Arc::new(GuildPlayer::new(GuildId::new(1), 0.5))
    }

    fn metadata(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            source_url: format!("https://example.com/{title}"),
            thumbnail: None,
            duration_secs: 120,
            uploader: None,
        }
    }

    fn track(title: &str) -> Track {
        Track::new(metadata(title), 0.5, UserId::new(1))
    }

    fn titles(player: &GuildPlayer) -> Vec<String> {
        player
            .queue_snapshot()
            .into_iter()
            .map(|t| t.meta.title)
            .collect()
    }

    #[test]
    fn test_loop_mode_parse_and_cycle() {
        assert_eq!(LoopMode::from_str("one"), Some(LoopMode::One));
        assert_eq!(LoopMode::from_str("all"), Some(LoopMode::All));
        assert_eq!(LoopMode::from_str("off"), Some(LoopMode::Off));
        assert_eq!(LoopMode::from_str("otra"), None);

        assert_eq!(LoopMode::Off.next(), LoopMode::One);
        assert_eq!(LoopMode::One.next(), LoopMode::All);
        assert_eq!(LoopMode::All.next(), LoopMode::Off);
    }

    #[test]
    fn test_requeue_finished_loop_one_goes_to_head() {
        let player = player();
        player.enqueue(track("siguiente"));
        player.set_loop_mode(LoopMode::One);

        player.requeue_finished(track("terminada"));
        assert_eq!(titles(&player), vec!["terminada", "siguiente"]);
    }

    #[test]
    fn test_requeue_finished_loop_all_goes_to_tail() {
        let player = player();
        player.enqueue(track("siguiente"));
        player.set_loop_mode(LoopMode::All);

        player.requeue_finished(track("terminada"));
        assert_eq!(titles(&player), vec!["siguiente", "terminada"]);
    }

    #[test]
    fn test_requeue_finished_loop_off_discards() {
        let player = player();
        player.enqueue(track("siguiente"));

        player.requeue_finished(track("terminada"));
        assert_eq!(titles(&player), vec!["siguiente"]);
    }

    #[test]
    fn test_skip_during_resolution_is_latched_once() {
        let player = player();

        player.note_resolution_started();
        assert!(player.skip(), "el skip en plena resolución debe aceptarse");

        // El loop observa el skip exactamente una vez
        assert!(player.note_resolution_finished());
        player.note_resolution_started();
        assert!(!player.note_resolution_finished());
    }

    #[test]
    fn test_skip_with_nothing_playing_is_rejected() {
        let player = player();
        assert!(!player.skip());

        // Y no deja una bandera colgada que descarte el próximo track
        player.note_resolution_started();
        assert!(!player.note_resolution_finished());
    }

    #[test]
    fn test_clear_does_not_touch_current_state() {
        let player = player();
        player.enqueue(track("a"));
        player.enqueue(track("b"));

        assert_eq!(player.clear_queue(), 2);
        assert!(player.queue_snapshot().is_empty());
        assert!(player.current_track().is_none());
    }

    #[tokio::test]
    async fn test_enqueue_query_single_track() {
        let player = player();
        let mut source = MockAudioSource::new();
        source.expect_is_playlist_link().return_const(false);
        source
            .expect_resolve()
            .returning(|q| Ok(metadata(q)));

        let outcome = player
            .enqueue_query(&source, "una canción", UserId::new(9))
            .await
            .unwrap();

        match outcome {
            EnqueueOutcome::Single(track) => assert_eq!(track.meta.title, "una canción"),
            _ => panic!("se esperaba un track único"),
        }
        assert_eq!(titles(&player), vec!["una canción"]);
    }

    #[tokio::test]
    async fn test_enqueue_query_playlist_skips_failed_entries() {
        let player = player();
        let mut source = MockAudioSource::new();
        source.expect_is_playlist_link().return_const(true);
        source.expect_expand_playlist().returning(|_| {
            Ok(vec![
                "uno".to_string(),
                "dos".to_string(),
                "tres".to_string(),
            ])
        });
        source.expect_resolve().returning(|q| {
            if q == "dos" {
                Err(MusicError::resolution(q, "video eliminado"))
            } else {
                Ok(metadata(q))
            }
        });

        let outcome = player
            .enqueue_query(
                &source,
                "https://open.spotify.com/playlist/xyz",
                UserId::new(9),
            )
            .await
            .unwrap();

        match outcome {
            EnqueueOutcome::Playlist { added, failed } => {
                assert_eq!(added, 2);
                assert_eq!(failed, 1);
            }
            _ => panic!("se esperaba resultado de playlist"),
        }
        assert_eq!(titles(&player), vec!["uno", "tres"]);
    }

    #[tokio::test]
    async fn test_enqueue_query_propagates_expansion_failure() {
        let player = player();
        let mut source = MockAudioSource::new();
        source.expect_is_playlist_link().return_const(true);
        source
            .expect_expand_playlist()
            .returning(|link| Err(MusicError::resolution(link, "playlist privada")));

        let result = player
            .enqueue_query(
                &source,
                "https://open.spotify.com/playlist/privada",
                UserId::new(9),
            )
            .await;

        assert!(matches!(result, Err(MusicError::Resolution { .. })));
        assert!(player.queue_snapshot().is_empty());
    }

    #[test]
    fn test_fresh_player_is_not_reapable_before_idle_window() {
        let player = player();
        assert!(!player.is_reapable(Duration::from_secs(60)));
        // Con ventana cero el player recién creado (loop muerto) sí es
        // liberable
        assert!(player.is_reapable(Duration::ZERO));
    }
}
